// Shared fixtures for the actor-level tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use triadstream::{
    Client, ClientConfig, EstablishedSession, ListenerConfig, ListenerHandle, Listening, Server,
    SessionWorker, Stopper, TrustedServer, TrustedWorker,
};
use triadtrust::{AeadCipher, Cipher, Identity, KeyRegistry, LongTermKey};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_test_writer()
        .with_env_filter("debug,triadstream=trace")
        .try_init();
}

/// Long-term key of `id`, derived from a per-party passphrase.
pub fn key(id: &str) -> LongTermKey {
    LongTermKey::derive(format!("{id} passphrase").as_bytes(), &Identity::new(id)).unwrap()
}

pub fn registry(ids: &[&str]) -> KeyRegistry {
    ids.iter().map(|id| (Identity::new(*id), key(id))).collect()
}

pub fn cipher() -> Arc<dyn Cipher> {
    Arc::new(AeadCipher::default())
}

/// A Trusted Server knowing c1, c2 and s1, and Server s1 in front of it.
pub struct World {
    pub cipher: Arc<dyn Cipher>,
    pub trusted: Listening<TrustedWorker>,
    pub server: Listening<SessionWorker>,
    pub server_workers: Stopper,
    pub sessions: mpsc::UnboundedReceiver<EstablishedSession>,
}

impl World {
    pub fn new(server_config: ListenerConfig) -> Self {
        init_tracing();
        let cipher = cipher();
        let trusted = TrustedServer::new(registry(&["c1", "c2", "s1"]), cipher.clone())
            .listen(ListenerConfig::default())
            .unwrap();
        Self::with_trusted(cipher, trusted, server_config)
    }

    pub fn with_trusted(
        cipher: Arc<dyn Cipher>,
        trusted: Listening<TrustedWorker>,
        server_config: ListenerConfig,
    ) -> Self {
        let (tx, sessions) = mpsc::unbounded_channel();
        let server = Server::new(Identity::new("s1"), key("s1"), cipher.clone(), trusted.handle.clone())
            .with_session_sink(tx);
        let server_workers = server.session_stopper();
        let server = server.listen(server_config).unwrap();
        Self {
            cipher,
            trusted,
            server,
            server_workers,
            sessions,
        }
    }

    pub fn client(&self, id: &str, target: &str) -> Client {
        self.client_with(id, target, ClientConfig::default())
    }

    pub fn client_with(&self, id: &str, target: &str, config: ClientConfig) -> Client {
        client_for(&self.server.handle, self.cipher.clone(), id, target, config)
    }
}

pub fn client_for(
    server: &ListenerHandle,
    cipher: Arc<dyn Cipher>,
    id: &str,
    target: &str,
    config: ClientConfig,
) -> Client {
    Client::new(Identity::new(id), key(id), Identity::new(target), cipher, server.clone(), config)
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition never held");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
