use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use docbot_collab::{classify_frame, decode_frame, encode_event};
use docbot_core::{AnnotationEvent, ChatEvent, RelayEvent};
use uuid::Uuid;

fn chat_frame(message_len: usize) -> String {
    let event = RelayEvent::from(ChatEvent::new("alice", "x".repeat(message_len), Uuid::new_v4()));
    encode_event(&event).unwrap()
}

fn bench_encode_chat(c: &mut Criterion) {
    let event = RelayEvent::from(ChatEvent::new("alice", "hello there", Uuid::new_v4()));

    c.bench_function("encode_chat", |b| {
        b.iter(|| black_box(encode_event(black_box(&event)).unwrap()))
    });
}

fn bench_decode_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_chat");
    for &len in &[16, 1_024, 16_384] {
        let frame = chat_frame(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &frame, |b, frame| {
            b.iter(|| black_box(decode_frame(black_box(frame)).unwrap()));
        });
    }
    group.finish();
}

fn bench_decode_annotation(c: &mut Criterion) {
    let event = RelayEvent::from(AnnotationEvent::new(
        3,
        "the selected passage",
        "a comment about it",
        "bob",
        Uuid::new_v4(),
    ));
    let frame = encode_event(&event).unwrap();

    c.bench_function("decode_annotation", |b| {
        b.iter(|| black_box(decode_frame(black_box(&frame)).unwrap()))
    });
}

fn bench_classify(c: &mut Criterion) {
    let me = Uuid::new_v4();
    let own = encode_event(&RelayEvent::from(ChatEvent::new("me", "hi", me))).unwrap();
    let peer = chat_frame(32);
    let unknown = r#"{"type":"presence","user":"x","timestamp":1}"#;

    let mut group = c.benchmark_group("classify_frame");
    group.bench_function("own_echo", |b| {
        b.iter(|| black_box(classify_frame(black_box(&own), me).unwrap()))
    });
    group.bench_function("peer", |b| {
        b.iter(|| black_box(classify_frame(black_box(&peer), me).unwrap()))
    });
    group.bench_function("unknown_type", |b| {
        b.iter(|| black_box(classify_frame(black_box(unknown), me).unwrap()))
    });
    group.bench_function("malformed", |b| {
        b.iter(|| black_box(classify_frame(black_box("{oops"), me).is_err()))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_encode_chat,
    bench_decode_sizes,
    bench_decode_annotation,
    bench_classify
);
criterion_main!(benches);
