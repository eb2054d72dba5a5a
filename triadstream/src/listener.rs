//! Listening server: admits sessions and hands each to a fresh worker.
//!
//! A requester calls [`ListenerHandle::connect`]; the listener answers with a
//! private channel pair and a worker bound to the other end. At most
//! `max_connections` sessions are admitted at once. Each worker holds a
//! [`SessionSlot`] for its whole life, and a `HELLO` that arrives while every
//! slot is taken simply waits. The listener never blocks on a worker, and
//! finishing the listener leaves admitted workers running.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_queue::SegQueue;
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::actor::{spawn_actor, stop_pair, Actor, StopSignal, Stopper};
use crate::channel::{recv_or_stop, session_pair, Delivery, SessionChannels, WorkerChannels};
use crate::config::ListenerConfig;
use crate::error::{Result, TriadStreamError};

/// What a listener's inbound channel carries.
#[derive(Debug)]
enum Admission {
    Hello(oneshot::Sender<SessionChannels>),
    Finish,
}

/// Proof that a session occupies one of the listener's slots. Dropping it
/// frees the slot.
#[derive(Debug)]
pub struct SessionSlot {
    _permit: OwnedSemaphorePermit,
}

/// Builds the worker that serves one admitted session.
pub trait SessionFactory: Send + 'static {
    type Worker: Actor;

    fn new_worker(&self, channels: WorkerChannels, slot: SessionSlot, config: &ListenerConfig) -> Self::Worker;
}

/// Cloneable address of a running listener.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    label: Arc<str>,
    requests: mpsc::Sender<Admission>,
    stopper: Stopper,
    slots: Arc<Semaphore>,
    accepted: Arc<AtomicUsize>,
}

impl ListenerHandle {
    /// Perform the session handshake: send `HELLO` and wait for the private
    /// channel pair. Waits while the listener is at capacity.
    pub async fn connect(&self) -> Result<SessionChannels> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(Admission::Hello(reply_tx))
            .await
            .map_err(|_| TriadStreamError::ListenerClosed)?;
        reply_rx.await.map_err(|_| TriadStreamError::HandshakeRefused)
    }

    /// Queue an in-band `FINISH`. Handshakes queued before it are still served.
    pub async fn finish(&self) -> Result<()> {
        self.requests
            .send(Admission::Finish)
            .await
            .map_err(|_| TriadStreamError::ListenerClosed)
    }

    /// Stop the listener now, waking it if it is blocked.
    pub fn stop(&self) {
        self.stopper.stop();
    }

    /// Number of sessions admitted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Slots not held by any live worker.
    pub fn open_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Workers admitted while `spawn_workers` is off, waiting to be started.
#[derive(Debug)]
pub struct ParkedWorkers<W> {
    queue: Arc<SegQueue<W>>,
}

impl<W> Clone for ParkedWorkers<W> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<W> ParkedWorkers<W> {
    /// Oldest parked worker, if any.
    pub fn take(&self) -> Option<W> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// A started listener.
pub struct Listening<W> {
    pub handle: ListenerHandle,
    pub parked: ParkedWorkers<W>,
    pub task: JoinHandle<()>,
}

/// The admission loop.
pub struct ListeningServer<F: SessionFactory> {
    label: Arc<str>,
    factory: F,
    config: ListenerConfig,
    requests: mpsc::Receiver<Admission>,
    stop: StopSignal,
    slots: Arc<Semaphore>,
    parked: Arc<SegQueue<F::Worker>>,
    accepted: Arc<AtomicUsize>,
}

impl<F: SessionFactory> ListeningServer<F> {
    pub fn new(
        label: impl Into<String>,
        factory: F,
        config: ListenerConfig,
    ) -> Result<(Self, ListenerHandle, ParkedWorkers<F::Worker>)> {
        config.validate()?;
        let label: Arc<str> = label.into().into();
        let (tx, rx) = mpsc::channel(config.max_connections);
        let (stopper, stop) = stop_pair();
        let slots = Arc::new(Semaphore::new(config.max_connections));
        let parked = Arc::new(SegQueue::new());
        let accepted = Arc::new(AtomicUsize::new(0));

        let handle = ListenerHandle {
            label: label.clone(),
            requests: tx,
            stopper,
            slots: slots.clone(),
            accepted: accepted.clone(),
        };
        let server = Self {
            label,
            factory,
            config,
            requests: rx,
            stop,
            slots,
            parked: parked.clone(),
            accepted,
        };
        Ok((server, handle, ParkedWorkers { queue: parked }))
    }

    /// Build the listener and run it on its own task.
    pub fn start(label: impl Into<String>, factory: F, config: ListenerConfig) -> Result<Listening<F::Worker>> {
        let (server, handle, parked) = Self::new(label, factory, config)?;
        let task = spawn_actor(server);
        Ok(Listening { handle, parked, task })
    }

    /// Admit one session. Returns false if the listener must stop.
    async fn admit(&mut self, mut reply: oneshot::Sender<SessionChannels>) -> bool {
        let permit = tokio::select! {
            biased;
            _ = self.stop.stopped() => return false,
            _ = reply.closed() => {
                debug!("requester left while waiting for a slot");
                return true;
            }
            permit = self.slots.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return false,
            },
        };

        let (requester, channels) = session_pair();
        let worker = self
            .factory
            .new_worker(channels, SessionSlot { _permit: permit }, &self.config);
        let admitted = self.accepted.fetch_add(1, Ordering::SeqCst) + 1;

        if self.config.spawn_workers {
            spawn_actor(worker);
        } else {
            self.parked.push(worker);
        }
        // A refused reply drops the requester's ends; the worker then sees a
        // closed inbox and releases its slot.
        if reply.send(requester).is_err() {
            debug!("requester left before admission");
        }
        debug!(admitted, open_slots = self.slots.available_permits(), "session admitted");
        true
    }
}

impl<F: SessionFactory> Actor for ListeningServer<F> {
    type Output = ();

    fn name(&self) -> String {
        format!("listener/{}", self.label)
    }

    async fn run(mut self) {
        info!(max_connections = self.config.max_connections, spawn_workers = self.config.spawn_workers, "listening");
        loop {
            match recv_or_stop(self.requests.recv(), &mut self.stop, None).await {
                Delivery::Message(Admission::Hello(reply)) => {
                    if !self.admit(reply).await {
                        break;
                    }
                }
                Delivery::Message(Admission::Finish) | Delivery::Finish => {
                    debug!("finish received");
                    break;
                }
                Delivery::Closed => break,
                Delivery::TimedOut => {}
            }
        }
        self.requests.close();
        info!(accepted = self.accepted.load(Ordering::SeqCst), "listener stopped");
    }
}
