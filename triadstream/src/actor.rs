//! Actor substrate: a stoppable unit of work running as one tokio task.
//!
//! Every actor owns a [`StopSignal`]. Blocking receives race the signal, so a
//! [`Stopper::stop`] call wakes an actor parked on an empty channel and lets it
//! return through its normal exit path.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;
use triadtrust::FaultKind;

/// A unit of work with its own execution context.
pub trait Actor: Send + Sized + 'static {
    type Output: Send + 'static;

    /// Label used for the actor's tracing span.
    fn name(&self) -> String;

    /// Drive the actor to completion.
    fn run(self) -> impl Future<Output = Self::Output> + Send;
}

/// Run `actor` on its own task inside an `actor` span.
pub fn spawn_actor<A: Actor>(actor: A) -> JoinHandle<A::Output> {
    let span = tracing::info_span!("actor", name = %actor.name());
    tokio::spawn(actor.run().instrument(span))
}

/// Create a linked stop pair.
pub fn stop_pair() -> (Stopper, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (Stopper { tx: Arc::new(tx) }, StopSignal { rx })
}

/// The requesting side of an actor's termination.
#[derive(Debug, Clone)]
pub struct Stopper {
    tx: Arc<watch::Sender<bool>>,
}

impl Stopper {
    /// Ask the actor to terminate. Idempotent.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Another observer of the same stop request.
    pub fn signal(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// The observing side of an actor's termination.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Resolves once stop has been requested. Never resolves if every
    /// [`Stopper`] was dropped without stopping.
    pub async fn stopped(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }
}

/// How a session worker's run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Every leg succeeded and the final reply was sent.
    Completed,
    /// A leg failed; `ERROR` was sent back to the requester.
    Rejected(FaultKind),
    /// An upstream peer answered `ERROR`; `ERROR` was passed on.
    Refused,
    /// The requester or an upstream peer went away.
    Abandoned,
    /// No message arrived within the reply timeout.
    TimedOut,
    /// Stop was requested mid-run.
    Interrupted,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn stop_wakes_waiter() {
        let (stopper, mut signal) = stop_pair();
        let waiter = tokio::spawn(async move { signal.stopped().await });
        stopper.stop();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .unwrap();
        assert!(stopper.is_stopped());
    }

    #[tokio::test]
    async fn late_subscriber_sees_stop() {
        let (stopper, _signal) = stop_pair();
        stopper.stop();
        stopper.stop();
        let mut late = stopper.signal();
        assert!(late.is_stopped());
        tokio::time::timeout(Duration::from_secs(1), late.stopped())
            .await
            .expect("already stopped");
    }

    #[tokio::test]
    async fn dropped_stopper_never_fires() {
        let (stopper, mut signal) = stop_pair();
        drop(stopper);
        let waited = tokio::time::timeout(Duration::from_millis(20), signal.stopped()).await;
        assert!(waited.is_err());
    }
}
