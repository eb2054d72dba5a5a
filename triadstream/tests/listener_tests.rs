//! Listener admission, capacity and termination behaviour.

mod common;

use std::time::Duration;

use common::{eventually, key, World};
use triadstream::{
    spawn_actor, stop_pair, ClientConfig, ClientOutcome, Delivery, ListenerConfig, Signal,
    TriadStreamError, WorkerOutcome,
};
use triadtrust::{ClientRun, Identity};

#[tokio::test]
async fn handshake_waits_while_listener_is_full() {
    let world = World::new(
        ListenerConfig::default()
            .with_max_connections(1)
            .with_spawn_workers(false),
    );
    let handle = world.server.handle.clone();

    let _first = handle.connect().await.unwrap();
    assert_eq!(handle.open_slots(), 0);

    // No slot: the second HELLO is not answered.
    let blocked = tokio::time::timeout(Duration::from_millis(50), handle.connect()).await;
    assert!(blocked.is_err());
    assert_eq!(handle.accepted(), 1);

    // Dropping the parked worker frees its slot.
    drop(world.server.parked.take().unwrap());
    eventually(|| handle.open_slots() == 1).await;
    let _second = tokio::time::timeout(Duration::from_secs(1), handle.connect())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(handle.accepted(), 2);
}

#[tokio::test]
async fn waiting_handshake_is_served_once_a_session_finishes() {
    let world = World::new(ListenerConfig::default().with_max_connections(1));

    let (a, b) = tokio::join!(
        world.client("c1", "s1").start(),
        world.client("c2", "s1").start(),
    );
    assert!(a.unwrap().is_accepted());
    assert!(b.unwrap().is_accepted());
    assert_eq!(world.server.handle.accepted(), 2);
    eventually(|| world.server.handle.open_slots() == 1).await;
}

#[tokio::test]
async fn parked_workers_start_on_demand() {
    let world = World::new(ListenerConfig::default().with_spawn_workers(false));
    let run = world.client("c1", "s1").start();

    eventually(|| world.server.parked.len() == 1).await;
    assert!(!run.is_finished());

    let worker = world.server.parked.take().unwrap();
    assert_eq!(spawn_actor(worker).await.unwrap(), WorkerOutcome::Completed);
    assert!(run.await.unwrap().is_accepted());
}

#[tokio::test]
async fn finished_listener_refuses_new_sessions() {
    let world = World::new(ListenerConfig::default());
    world.server.handle.finish().await.unwrap();
    eventually(|| world.server.handle.is_closed()).await;

    assert!(matches!(
        world.server.handle.connect().await,
        Err(TriadStreamError::ListenerClosed)
    ));
    let outcome = world.client("c1", "s1").start().await.unwrap();
    assert_eq!(outcome, ClientOutcome::Rejected);
}

#[tokio::test]
async fn in_flight_session_survives_listener_finish() {
    let world = World::new(ListenerConfig::default());
    let (_stopper, mut stop) = stop_pair();

    let mut session = world.server.handle.connect().await.unwrap();
    world.server.handle.finish().await.unwrap();
    eventually(|| world.server.handle.is_closed()).await;

    // The admitted worker still completes the run.
    let mut run = ClientRun::new(Identity::new("c1"), Identity::new("s1"), key("c1"), world.cipher.clone());
    let request = run.create_request().unwrap();
    session.outbox.send(Signal::Envelope(request.into())).unwrap();

    let Delivery::Message(Signal::Envelope(reply)) = session.inbox.recv(&mut stop, None).await else {
        panic!("expected the server reply");
    };
    assert!(run.process_reply(reply).is_ok());
}

#[tokio::test]
async fn stop_wakes_idle_listener() {
    let world = World::new(ListenerConfig::default());
    world.server.handle.stop();
    tokio::time::timeout(Duration::from_secs(1), world.server.task)
        .await
        .expect("listener woke")
        .unwrap();
}

#[tokio::test]
async fn pending_handshakes_are_refused_when_listener_stops() {
    let world = World::new(
        ListenerConfig::default()
            .with_max_connections(1)
            .with_spawn_workers(false),
    );
    let handle = world.server.handle.clone();
    let _first = handle.connect().await.unwrap();

    let waiting = tokio::spawn({
        let handle = handle.clone();
        async move { handle.connect().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.stop();

    let refused = tokio::time::timeout(Duration::from_secs(1), waiting).await.unwrap().unwrap();
    assert!(refused.is_err());
}

// ── Timeouts and client stop ────────────────────────────────────────────────

#[tokio::test]
async fn client_times_out_when_no_worker_runs() {
    let world = World::new(ListenerConfig::default().with_spawn_workers(false));
    let config = ClientConfig::default().with_reply_timeout(Duration::from_millis(50));
    let outcome = world.client_with("c1", "s1", config).start().await.unwrap();
    assert_eq!(outcome, ClientOutcome::TimedOut);
    assert_eq!(outcome.signal(), Signal::Error);
}

#[tokio::test]
async fn stopped_client_is_interrupted() {
    let world = World::new(ListenerConfig::default().with_spawn_workers(false));
    let client = world.client("c1", "s1");
    let stopper = client.stopper();
    let run = client.start();

    eventually(|| world.server.parked.len() == 1).await;
    stopper.stop();
    let outcome = tokio::time::timeout(Duration::from_secs(1), run).await.unwrap().unwrap();
    assert_eq!(outcome, ClientOutcome::Interrupted);
}

#[tokio::test]
async fn silent_requester_gets_error_after_timeout() {
    let world = World::new(ListenerConfig::default().with_reply_timeout(Duration::from_millis(50)));
    let (_stopper, mut stop) = stop_pair();

    let mut session = world.server.handle.connect().await.unwrap();
    let got = tokio::time::timeout(Duration::from_secs(1), session.inbox.recv(&mut stop, None))
        .await
        .unwrap();
    assert_eq!(got, Delivery::Message(Signal::Error));
    drop(session.outbox);
}

#[tokio::test]
async fn in_band_finish_interrupts_worker() {
    let world = World::new(ListenerConfig::default().with_spawn_workers(false));
    let session = world.server.handle.connect().await.unwrap();
    let worker = world.server.parked.take().unwrap();

    session.outbox.send(Signal::Finish).unwrap();
    assert_eq!(spawn_actor(worker).await.unwrap(), WorkerOutcome::Interrupted);
}

#[tokio::test]
async fn stopping_workers_interrupts_parked_worker() {
    let world = World::new(ListenerConfig::default().with_spawn_workers(false));
    let _session = world.server.handle.connect().await.unwrap();
    let worker = world.server.parked.take().unwrap();

    world.server_workers.stop();
    assert_eq!(spawn_actor(worker).await.unwrap(), WorkerOutcome::Interrupted);
}
