//! Client role: one handshake run against a listening Server.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use triadtrust::{Cipher, ClientRun, Identity, LongTermKey, SessionKey};

use crate::actor::{spawn_actor, stop_pair, Actor, StopSignal, Stopper};
use crate::channel::{Delivery, Signal};
use crate::config::ClientConfig;
use crate::listener::ListenerHandle;

/// How a Client run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOutcome {
    /// The grant echoed our nonce; the session key is shared with the Server.
    Accepted(SessionKey),
    /// The Server answered `ERROR`, went away, or sent a reply that failed a check.
    Rejected,
    /// No reply within the configured timeout.
    TimedOut,
    /// Stop was requested mid-run.
    Interrupted,
}

impl ClientOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ClientOutcome::Accepted(_))
    }

    pub fn session_key(&self) -> Option<&SessionKey> {
        match self {
            ClientOutcome::Accepted(key) => Some(key),
            _ => None,
        }
    }

    /// The outward `OK` / `ERROR` signal for this outcome.
    pub fn signal(&self) -> Signal {
        if self.is_accepted() {
            Signal::Ok
        } else {
            Signal::Error
        }
    }
}

pub struct Client {
    run: ClientRun,
    server: ListenerHandle,
    config: ClientConfig,
    stopper: Stopper,
    stop: StopSignal,
}

impl Client {
    pub fn new(
        client_id: Identity,
        key: LongTermKey,
        server_id: Identity,
        cipher: Arc<dyn Cipher>,
        server: ListenerHandle,
        config: ClientConfig,
    ) -> Self {
        let run = ClientRun::new(client_id, server_id, key, cipher).with_challenge_check(config.verify_challenge);
        let (stopper, stop) = stop_pair();
        Self {
            run,
            server,
            config,
            stopper,
            stop,
        }
    }

    pub fn stopper(&self) -> Stopper {
        self.stopper.clone()
    }

    /// Run the handshake on its own task.
    pub fn start(self) -> JoinHandle<ClientOutcome> {
        spawn_actor(self)
    }

    async fn handshake(&mut self) -> ClientOutcome {
        let connected = tokio::select! {
            biased;
            _ = self.stop.stopped() => return ClientOutcome::Interrupted,
            connected = self.server.connect() => connected,
        };
        let mut session = match connected {
            Ok(session) => session,
            Err(err) => {
                warn!(%err, "server unreachable");
                self.run.reject();
                return ClientOutcome::Rejected;
            }
        };

        let request = match self.run.create_request() {
            Ok(request) => request,
            Err(err) => {
                warn!(%err, "could not build request");
                self.run.reject();
                return ClientOutcome::Rejected;
            }
        };
        debug!(challenge = %request.challenge, "sending request");
        if session.outbox.send(Signal::Envelope(request.into())).is_err() {
            self.run.reject();
            return ClientOutcome::Rejected;
        }

        match session.inbox.recv(&mut self.stop, self.config.reply_timeout()).await {
            Delivery::Message(Signal::Envelope(envelope)) => match self.run.process_reply(envelope) {
                Ok(key) => ClientOutcome::Accepted(key.clone()),
                Err(err) => {
                    warn!(%err, kind = ?err.kind(), "reply rejected");
                    ClientOutcome::Rejected
                }
            },
            Delivery::Message(other) => {
                debug!(signal = other.name(), "server did not grant a key");
                self.run.reject();
                ClientOutcome::Rejected
            }
            Delivery::Finish => ClientOutcome::Interrupted,
            Delivery::Closed => {
                self.run.reject();
                ClientOutcome::Rejected
            }
            Delivery::TimedOut => {
                self.run.reject();
                ClientOutcome::TimedOut
            }
        }
    }
}

impl Actor for Client {
    type Output = ClientOutcome;

    fn name(&self) -> String {
        format!("client/{}", self.run.client_id())
    }

    async fn run(mut self) -> ClientOutcome {
        let outcome = self.handshake().await;
        match &outcome {
            ClientOutcome::Accepted(key) => {
                info!(server = %self.run.server_id(), fingerprint = %key.fingerprint(), "OK")
            }
            other => warn!(server = %self.run.server_id(), outcome = ?other, "ERROR"),
        }
        outcome
    }
}
