//! Tunables for listening servers and clients.
//!
//! Both configs deserialize with `serde` and fall back to their defaults for
//! any field left out, so a partial TOML/JSON table is enough.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, TriadStreamError};

/// Default bound on concurrently admitted sessions per listener.
pub const DEFAULT_MAX_CONNECTIONS: usize = 16;

/// Whole milliseconds covering `timeout`, at least one and saturating at
/// `u64::MAX`.
fn millis_ceil(timeout: Duration) -> u64 {
    let millis = timeout.as_nanos().div_ceil(1_000_000).max(1);
    u64::try_from(millis).unwrap_or(u64::MAX)
}

/// Configuration of a [`ListeningServer`](crate::listener::ListeningServer).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Sessions admitted but not yet finished. Further handshakes wait.
    pub max_connections: usize,
    /// Start each admitted worker immediately. When false, workers are parked
    /// and the caller starts them.
    pub spawn_workers: bool,
    /// How long a worker waits for any single inbound message.
    /// `None` waits forever.
    pub reply_timeout_ms: Option<u64>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            spawn_workers: true,
            reply_timeout_ms: None,
        }
    }
}

impl ListenerConfig {
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_spawn_workers(mut self, spawn_workers: bool) -> Self {
        self.spawn_workers = spawn_workers;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout_ms = Some(millis_ceil(timeout));
        self
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(TriadStreamError::InvalidConfig(
                "max_connections must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration of a [`Client`](crate::client::Client).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Also require the reply's challenge to echo the one this run sent.
    pub verify_challenge: bool,
    /// How long the client waits for the Server's reply. `None` waits forever.
    pub reply_timeout_ms: Option<u64>,
}

impl ClientConfig {
    pub fn with_challenge_check(mut self, enabled: bool) -> Self {
        self.verify_challenge = enabled;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout_ms = Some(millis_ceil(timeout));
        self
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_ms.map(Duration::from_millis)
    }
}
