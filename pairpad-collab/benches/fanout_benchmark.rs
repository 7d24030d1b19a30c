use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pairpad_collab::broadcast::RoomChannel;
use pairpad_collab::protocol::{ClientEvent, ServerEvent};
use pairpad_collab::registry::RoomRegistry;
use uuid::Uuid;

fn bench_event_encode(c: &mut Criterion) {
    let event = ClientEvent::CodeChange {
        room_id: "r1".to_string(),
        buffer: "x".repeat(1024),
    };

    c.bench_function("code_change_encode_1KB", |b| {
        b.iter(|| {
            black_box(black_box(&event).encode().unwrap());
        })
    });
}

fn bench_event_decode(c: &mut Criterion) {
    let event = ServerEvent::CodeUpdate {
        buffer: "x".repeat(1024),
    };
    let encoded = event.encode().unwrap();

    c.bench_function("code_update_decode_1KB", |b| {
        b.iter(|| {
            black_box(ServerEvent::decode(black_box(&encoded)).unwrap());
        })
    });
}

fn bench_room_fan_out(c: &mut Criterion) {
    let channel = RoomChannel::new(4096);
    let receivers: Vec<_> = (0..100).map(|_| channel.subscribe()).collect();
    let sender = Uuid::new_v4();
    let event = ServerEvent::CodeUpdate {
        buffer: "x".repeat(256),
    };

    c.bench_function("fan_out_100_receivers", |b| {
        b.iter(|| {
            black_box(channel.send(Some(sender), black_box(&event)).unwrap());
        })
    });

    drop(receivers);
}

fn bench_registry_join_leave(c: &mut Criterion) {
    c.bench_function("registry_join_leave_churn", |b| {
        let mut registry = RoomRegistry::new();
        let session = Uuid::new_v4();
        b.iter(|| {
            registry.create_or_join(black_box("r1"), session, black_box("alice"));
            black_box(registry.leave("r1", session));
        })
    });
}

fn bench_presence_snapshot(c: &mut Criterion) {
    let mut registry = RoomRegistry::new();
    for i in 0..50 {
        registry.create_or_join("r1", Uuid::new_v4(), &format!("user-{i}"));
    }

    c.bench_function("presence_snapshot_50_members", |b| {
        b.iter(|| {
            black_box(registry.members(black_box("r1")));
        })
    });
}

criterion_group!(
    benches,
    bench_event_encode,
    bench_event_decode,
    bench_room_fan_out,
    bench_registry_join_leave,
    bench_presence_snapshot
);
criterion_main!(benches);
