//! TriadStream: the actor substrate the Triad handshake runs on.
//!
//! Three roles, each a tokio task:
//!
//! - [`Client`] starts one run against a listening Server and ends with
//!   [`ClientOutcome::Accepted`] or an error outcome.
//! - [`Server`] listens for Clients and gives every admitted session its own
//!   [`SessionWorker`], which consults the Trusted Server.
//! - [`TrustedServer`] listens for Servers and mints session keys.
//!
//! Sessions are admitted through [`ListenerHandle::connect`], which plays the
//! `HELLO` exchange and returns a private channel pair.

pub mod actor;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod listener;
pub mod trusted;
pub mod wire;
pub mod worker;

pub use actor::{spawn_actor, stop_pair, Actor, StopSignal, Stopper, WorkerOutcome};
pub use channel::{Delivery, Inbox, Outbox, SessionChannels, Signal, WorkerChannels};
pub use client::{Client, ClientOutcome};
pub use config::{ClientConfig, ListenerConfig};
pub use error::{Result, TriadStreamError};
pub use listener::{ListenerHandle, Listening, ListeningServer, ParkedWorkers, SessionFactory, SessionSlot};
pub use trusted::{TrustedServer, TrustedWorker};
pub use worker::{EstablishedSession, Server, SessionWorker};
