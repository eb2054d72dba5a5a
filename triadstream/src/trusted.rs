//! Trusted Server role.
//!
//! The key registry is shared by every worker behind a `parking_lot` lock, so
//! parties can be registered while the server is listening. Workers only hold
//! the read lock for the synchronous part of a run.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, warn};
use triadtrust::{Cipher, FaultKind, Identity, KeyRegistry, LongTermKey, TrustedRun};

use crate::actor::{stop_pair, Actor, StopSignal, Stopper, WorkerOutcome};
use crate::channel::{Delivery, Signal, WorkerChannels};
use crate::config::ListenerConfig;
use crate::error::Result;
use crate::listener::{Listening, ListeningServer, SessionFactory, SessionSlot};

/// Label the Trusted Server listens under.
pub const TRUSTED_LABEL: &str = "trusted";

/// Factory for the Trusted Server's session workers.
pub struct TrustedServer {
    registry: Arc<RwLock<KeyRegistry>>,
    cipher: Arc<dyn Cipher>,
    stopper: Stopper,
}

impl TrustedServer {
    pub fn new(registry: KeyRegistry, cipher: Arc<dyn Cipher>) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
            cipher,
            stopper: stop_pair().0,
        }
    }

    /// The live registry shared with every worker.
    pub fn registry(&self) -> Arc<RwLock<KeyRegistry>> {
        self.registry.clone()
    }

    /// Register (or replace) a party's long-term key.
    pub fn register(&self, id: Identity, key: LongTermKey) -> Option<LongTermKey> {
        debug!(%id, fingerprint = %key.fingerprint(), "registering party");
        self.registry.write().insert(id, key)
    }

    /// Stops every worker this server has admitted or will admit.
    pub fn session_stopper(&self) -> Stopper {
        self.stopper.clone()
    }

    pub fn listen(self, config: ListenerConfig) -> Result<Listening<TrustedWorker>> {
        info!(parties = self.registry.read().len(), "trusted server starting");
        ListeningServer::start(TRUSTED_LABEL, self, config)
    }
}

impl SessionFactory for TrustedServer {
    type Worker = TrustedWorker;

    fn new_worker(&self, channels: WorkerChannels, slot: SessionSlot, config: &ListenerConfig) -> TrustedWorker {
        TrustedWorker {
            run: TrustedRun::new(self.cipher.clone()),
            registry: self.registry.clone(),
            channels,
            stop: self.stopper.signal(),
            timeout: config.reply_timeout(),
            _slot: slot,
        }
    }
}

/// Serves one key request.
pub struct TrustedWorker {
    run: TrustedRun,
    registry: Arc<RwLock<KeyRegistry>>,
    channels: WorkerChannels,
    stop: StopSignal,
    timeout: Option<Duration>,
    _slot: SessionSlot,
}

impl TrustedWorker {
    async fn serve(&mut self) -> WorkerOutcome {
        let request = match self.channels.inbox.recv(&mut self.stop, self.timeout).await {
            Delivery::Message(Signal::Envelope(envelope)) => envelope,
            Delivery::Message(other) => {
                debug!(signal = other.name(), "expected a key request");
                return self.fail(WorkerOutcome::Rejected(FaultKind::MalformedMessage));
            }
            Delivery::Finish => return WorkerOutcome::Interrupted,
            Delivery::Closed => return WorkerOutcome::Abandoned,
            Delivery::TimedOut => return self.fail(WorkerOutcome::TimedOut),
        };

        let granted = {
            let registry = self.registry.read();
            self.run.process_request(&registry, request)
        };
        match granted {
            Ok(reply) => {
                if self.channels.outbox.send(Signal::Envelope(reply.into())).is_err() {
                    return WorkerOutcome::Abandoned;
                }
                WorkerOutcome::Completed
            }
            Err(err) => {
                let kind = err.kind();
                warn!(%err, ?kind, "key request rejected");
                self.fail(WorkerOutcome::Rejected(kind))
            }
        }
    }

    fn fail(&self, outcome: WorkerOutcome) -> WorkerOutcome {
        if self.channels.outbox.send(Signal::Error).is_err() {
            debug!("requester already gone");
        }
        outcome
    }
}

impl Actor for TrustedWorker {
    type Output = WorkerOutcome;

    fn name(&self) -> String {
        format!("worker/{TRUSTED_LABEL}")
    }

    async fn run(mut self) -> WorkerOutcome {
        let outcome = self.serve().await;
        debug!(outcome = ?outcome, state = self.run.state().label(), "key request done");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use triadtrust::crypto::keys::KEY_LEN;
    use triadtrust::AeadCipher;

    use super::*;

    #[test]
    fn registration_is_visible_through_shared_registry() {
        let server = TrustedServer::new(KeyRegistry::new(), Arc::new(AeadCipher::default()));
        let shared = server.registry();
        assert!(server.register(Identity::new("c1"), LongTermKey::from_bytes([1; KEY_LEN])).is_none());
        assert!(shared.read().contains(&Identity::new("c1")));

        let replaced = server.register(Identity::new("c1"), LongTermKey::from_bytes([2; KEY_LEN]));
        assert_eq!(replaced, Some(LongTermKey::from_bytes([1; KEY_LEN])));
        assert_eq!(shared.read().len(), 1);
    }
}
