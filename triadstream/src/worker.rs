//! Server role: a listener whose session workers run the Server half of the
//! handshake against a Trusted Server.
//!
//! Each worker serves exactly one Client run. It waits for the Client's
//! request, opens its own session with the Trusted Server, relays the grant
//! and exits. Any fault is answered with `ERROR` to the Client.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use triadtrust::{Cipher, FaultKind, Identity, LongTermKey, ServerRun, SessionKey, TriadTrustError};

use crate::actor::{stop_pair, Actor, StopSignal, Stopper, WorkerOutcome};
use crate::channel::{Delivery, Signal, WorkerChannels};
use crate::config::ListenerConfig;
use crate::error::Result;
use crate::listener::{ListenerHandle, Listening, ListeningServer, SessionFactory, SessionSlot};

/// A session key the Server agreed on with a Client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstablishedSession {
    pub client_id: Identity,
    pub session_key: SessionKey,
}

/// Factory for the Server's session workers.
pub struct Server {
    server_id: Identity,
    key: LongTermKey,
    cipher: Arc<dyn Cipher>,
    trusted: ListenerHandle,
    sessions: Option<mpsc::UnboundedSender<EstablishedSession>>,
    stopper: Stopper,
}

impl Server {
    pub fn new(server_id: Identity, key: LongTermKey, cipher: Arc<dyn Cipher>, trusted: ListenerHandle) -> Self {
        Self {
            server_id,
            key,
            cipher,
            trusted,
            sessions: None,
            stopper: stop_pair().0,
        }
    }

    /// Publish every established session to `sink`.
    pub fn with_session_sink(mut self, sink: mpsc::UnboundedSender<EstablishedSession>) -> Self {
        self.sessions = Some(sink);
        self
    }

    /// Stops every worker this server has admitted or will admit.
    pub fn session_stopper(&self) -> Stopper {
        self.stopper.clone()
    }

    pub fn server_id(&self) -> &Identity {
        &self.server_id
    }

    /// Start listening under the server's identity.
    pub fn listen(self, config: ListenerConfig) -> Result<Listening<SessionWorker>> {
        let label = self.server_id.to_string();
        ListeningServer::start(label, self, config)
    }
}

impl SessionFactory for Server {
    type Worker = SessionWorker;

    fn new_worker(&self, channels: WorkerChannels, slot: SessionSlot, config: &ListenerConfig) -> SessionWorker {
        SessionWorker {
            run: ServerRun::new(self.server_id.clone(), self.key.clone(), self.cipher.clone()),
            channels,
            trusted: self.trusted.clone(),
            sessions: self.sessions.clone(),
            stop: self.stopper.signal(),
            timeout: config.reply_timeout(),
            _slot: slot,
        }
    }
}

/// Serves one Client run.
pub struct SessionWorker {
    run: ServerRun,
    channels: WorkerChannels,
    trusted: ListenerHandle,
    sessions: Option<mpsc::UnboundedSender<EstablishedSession>>,
    stop: StopSignal,
    timeout: Option<Duration>,
    _slot: SessionSlot,
}

impl SessionWorker {
    async fn serve(&mut self) -> WorkerOutcome {
        let request = match self.channels.inbox.recv(&mut self.stop, self.timeout).await {
            Delivery::Message(Signal::Envelope(envelope)) => envelope,
            Delivery::Message(other) => {
                debug!(signal = other.name(), "expected a client request");
                return self.fail(WorkerOutcome::Rejected(FaultKind::MalformedMessage));
            }
            Delivery::Finish => return WorkerOutcome::Interrupted,
            Delivery::Closed => return WorkerOutcome::Abandoned,
            Delivery::TimedOut => return self.fail(WorkerOutcome::TimedOut),
        };

        let forward = match self.run.process_client_request(request) {
            Ok(forward) => forward,
            Err(err) => return self.reject(err),
        };
        debug!(client = %forward.client_id, "forwarding to trusted server");

        let connected = tokio::select! {
            biased;
            _ = self.stop.stopped() => return WorkerOutcome::Interrupted,
            connected = self.trusted.connect() => connected,
        };
        let mut trusted = match connected {
            Ok(session) => session,
            Err(err) => {
                warn!(%err, "trusted server unreachable");
                return self.fail(WorkerOutcome::Abandoned);
            }
        };
        if trusted.outbox.send(Signal::Envelope(forward.into())).is_err() {
            return self.fail(WorkerOutcome::Abandoned);
        }

        let reply = match trusted.inbox.recv(&mut self.stop, self.timeout).await {
            Delivery::Message(Signal::Envelope(envelope)) => envelope,
            Delivery::Message(Signal::Error) => {
                warn!("trusted server refused the run");
                return self.fail(WorkerOutcome::Refused);
            }
            Delivery::Message(other) => {
                debug!(signal = other.name(), "expected a trusted reply");
                return self.fail(WorkerOutcome::Rejected(FaultKind::MalformedMessage));
            }
            Delivery::Finish => return WorkerOutcome::Interrupted,
            Delivery::Closed => return self.fail(WorkerOutcome::Abandoned),
            Delivery::TimedOut => return self.fail(WorkerOutcome::TimedOut),
        };

        let response = match self.run.process_trusted_reply(reply) {
            Ok(response) => response,
            Err(err) => return self.reject(err),
        };
        if self.channels.outbox.send(Signal::Envelope(response.into())).is_err() {
            return WorkerOutcome::Abandoned;
        }
        self.publish();
        WorkerOutcome::Completed
    }

    fn reject(&self, err: TriadTrustError) -> WorkerOutcome {
        let kind = err.kind();
        warn!(%err, ?kind, "run rejected");
        self.fail(WorkerOutcome::Rejected(kind))
    }

    /// Tell the Client the run failed.
    fn fail(&self, outcome: WorkerOutcome) -> WorkerOutcome {
        if self.channels.outbox.send(Signal::Error).is_err() {
            debug!("client already gone");
        }
        outcome
    }

    fn publish(&self) {
        let (Some(sink), Some(client_id), Some(session_key)) =
            (&self.sessions, self.run.peer(), self.run.session_key())
        else {
            return;
        };
        let session = EstablishedSession {
            client_id: client_id.clone(),
            session_key: session_key.clone(),
        };
        if sink.send(session).is_err() {
            debug!("session sink dropped");
        }
    }
}

impl Actor for SessionWorker {
    type Output = WorkerOutcome;

    fn name(&self) -> String {
        format!("worker/{}", self.run.server_id())
    }

    async fn run(mut self) -> WorkerOutcome {
        let outcome = self.serve().await;
        match outcome {
            WorkerOutcome::Completed => {
                let fingerprint = self.run.session_key().map(SessionKey::fingerprint);
                info!(client = ?self.run.peer().map(Identity::as_str), ?fingerprint, "session established");
            }
            other => debug!(outcome = ?other, state = self.run.state().label(), "session ended"),
        }
        outcome
    }
}
