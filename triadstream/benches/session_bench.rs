// TriadStream actor-layer benchmarks using criterion.
//
// Measures:
//   - Signal frame encode / decode
//   - One full Client/Server/Trusted Server run over in-process channels
//   - A batch of concurrent runs against one Server

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;

use triadstream::{wire, Client, ClientConfig, ListenerConfig, ListenerHandle, Server, Signal, TrustedServer};
use triadtrust::handshake::messages::ServerReply;
use triadtrust::{AeadCipher, Challenge, Cipher, Identity, KeyRegistry, LongTermKey, SealedBlock};

fn key(id: &str) -> LongTermKey {
    LongTermKey::derive(format!("{id} passphrase").as_bytes(), &Identity::new(id)).unwrap()
}

struct Deployment {
    cipher: Arc<dyn Cipher>,
    server: ListenerHandle,
}

fn deploy(rt: &Runtime, max_connections: usize) -> Deployment {
    let _guard = rt.enter();
    let cipher: Arc<dyn Cipher> = Arc::new(AeadCipher::default());
    let registry: KeyRegistry = ["c1", "s1"].iter().map(|id| (Identity::new(*id), key(id))).collect();
    let trusted = TrustedServer::new(registry, cipher.clone())
        .listen(ListenerConfig::default().with_max_connections(max_connections))
        .unwrap();
    let server = Server::new(Identity::new("s1"), key("s1"), cipher.clone(), trusted.handle)
        .listen(ListenerConfig::default().with_max_connections(max_connections))
        .unwrap();
    Deployment {
        cipher,
        server: server.handle,
    }
}

fn client(d: &Deployment) -> Client {
    Client::new(
        Identity::new("c1"),
        key("c1"),
        Identity::new("s1"),
        d.cipher.clone(),
        d.server.clone(),
        ClientConfig::default(),
    )
}

// ---------------------------------------------------------------------------
// Signal framing
// ---------------------------------------------------------------------------

fn bench_wire(c: &mut Criterion) {
    let reply = Signal::Envelope(
        ServerReply {
            challenge: Challenge::from_bytes([7; 16]),
            client_grant: SealedBlock::from_bytes(vec![0xAB; 108]),
        }
        .into(),
    );
    let frame = wire::encode(&reply).unwrap();

    let mut group = c.benchmark_group("signal_wire");
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("encode", |b| b.iter(|| black_box(wire::encode(&reply).unwrap())));
    group.bench_function("decode", |b| b.iter(|| black_box(wire::decode(&frame).unwrap())));
    group.finish();
}

// ---------------------------------------------------------------------------
// Full runs
// ---------------------------------------------------------------------------

fn bench_single_run(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let deployment = deploy(&rt, 16);

    c.bench_function("actor_full_run", |b| {
        b.iter(|| {
            let outcome = rt.block_on(async { client(&deployment).start().await.unwrap() });
            black_box(outcome.is_accepted())
        })
    });
}

fn bench_concurrent_runs(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let batches: &[usize] = &[4, 16, 64];

    let mut group = c.benchmark_group("actor_concurrent_runs");
    for &batch in batches {
        let deployment = deploy(&rt, 16);
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.iter(|| {
                rt.block_on(async {
                    let runs: Vec<_> = (0..batch).map(|_| client(&deployment).start()).collect();
                    for run in runs {
                        black_box(run.await.unwrap());
                    }
                })
            })
        });
    }
    group.finish();
}

criterion_group!(session_benches, bench_wire, bench_single_run, bench_concurrent_runs);
criterion_main!(session_benches);
