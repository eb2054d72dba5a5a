//! Session channels and the signals they carry.
//!
//! A session is a pair of one-way unbounded channels between a requester
//! and the worker the listener admitted for it. Every blocking receive goes
//! through [`recv_or_stop`], which races the message against the actor's
//! [`StopSignal`] and an optional timeout.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use triadtrust::Envelope;

use crate::actor::StopSignal;
use crate::error::{Result, TriadStreamError};

/// Everything that can travel between actors.
///
/// `Hello` and `MaxConnectionsReached` belong to the listener vocabulary and
/// only appear on the wire; in-process admission goes through
/// [`ListenerHandle::connect`](crate::listener::ListenerHandle::connect).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Request a session from a listener.
    Hello,
    /// Terminate the receiving actor.
    Finish,
    /// The sending party rejected the run.
    Error,
    /// Reserved. Never emitted: a full listener applies backpressure instead.
    MaxConnectionsReached,
    /// The run completed.
    Ok,
    /// A protocol leg.
    Envelope(Envelope),
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Hello => "HELLO",
            Signal::Finish => "FINISH",
            Signal::Error => "ERROR",
            Signal::MaxConnectionsReached => "MAX_CONNECTIONS_REACHED",
            Signal::Ok => "OK",
            Signal::Envelope(_) => "ENVELOPE",
        }
    }
}

impl From<Envelope> for Signal {
    fn from(envelope: Envelope) -> Self {
        Signal::Envelope(envelope)
    }
}

/// Result of a blocking receive.
#[derive(Debug, PartialEq, Eq)]
pub enum Delivery<T> {
    Message(T),
    /// A termination marker arrived, in band or through the stop signal.
    Finish,
    /// Every sender is gone.
    Closed,
    TimedOut,
}

/// Wait for `next`, giving up on stop or after `timeout`.
pub(crate) async fn recv_or_stop<T>(
    next: impl Future<Output = Option<T>>,
    stop: &mut StopSignal,
    timeout: Option<Duration>,
) -> Delivery<T> {
    let received = async {
        tokio::select! {
            biased;
            _ = stop.stopped() => Delivery::Finish,
            msg = next => match msg {
                Some(msg) => Delivery::Message(msg),
                None => Delivery::Closed,
            },
        }
    };
    match timeout {
        Some(limit) => tokio::time::timeout(limit, received)
            .await
            .unwrap_or(Delivery::TimedOut),
        None => received.await,
    }
}

/// Sending half of a session channel.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Signal>,
}

impl Outbox {
    pub fn send(&self, signal: impl Into<Signal>) -> Result<()> {
        self.tx
            .send(signal.into())
            .map_err(|_| TriadStreamError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of a session channel.
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Signal>,
}

impl Inbox {
    /// Receive the next signal. An in-band `FINISH` is reported as
    /// [`Delivery::Finish`], never as a message.
    pub async fn recv(&mut self, stop: &mut StopSignal, timeout: Option<Duration>) -> Delivery<Signal> {
        match recv_or_stop(self.rx.recv(), stop, timeout).await {
            Delivery::Message(Signal::Finish) => Delivery::Finish,
            other => other,
        }
    }

    /// Non-blocking receive, for draining.
    pub fn try_recv(&mut self) -> Option<Signal> {
        self.rx.try_recv().ok()
    }
}

/// One direction of a session.
pub fn channel() -> (Outbox, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Outbox { tx }, Inbox { rx })
}

/// The requester's end of an admitted session.
#[derive(Debug)]
pub struct SessionChannels {
    /// Towards the worker.
    pub outbox: Outbox,
    /// From the worker.
    pub inbox: Inbox,
}

/// The worker's end of an admitted session.
#[derive(Debug)]
pub struct WorkerChannels {
    /// From the requester.
    pub inbox: Inbox,
    /// Towards the requester.
    pub outbox: Outbox,
}

/// A fresh session: two one-way channels cross-wired.
pub fn session_pair() -> (SessionChannels, WorkerChannels) {
    let (to_worker, worker_inbox) = channel();
    let (to_requester, requester_inbox) = channel();
    (
        SessionChannels {
            outbox: to_worker,
            inbox: requester_inbox,
        },
        WorkerChannels {
            inbox: worker_inbox,
            outbox: to_requester,
        },
    )
}
