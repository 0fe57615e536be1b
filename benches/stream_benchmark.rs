//! Performance benchmarks for streamed frame handling
//!
//! Measures delta appends on the conversation and full frame dispatch
//! through a session.
//! Run with: cargo bench

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tether::adapters::MockFrameSink;
use tether::config::SessionConfig;
use tether::session::Session;
use tether::state::Conversation;
use tether::traits::AutoApproveToggle;

const DELTA: &str = "lorem ipsum dolor sit amet ";

/// Benchmark raw delta appends on an open assistant entry
fn bench_conversation_deltas(c: &mut Criterion) {
    let mut group = c.benchmark_group("conversation_deltas");

    for count in [100usize, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let mut conversation = Conversation::new();
                conversation.begin_assistant_stream();
                for _ in 0..count {
                    conversation.append_stream_delta(black_box(DELTA));
                }
                conversation.complete_assistant_stream();
                black_box(conversation)
            });
        });
    }

    group.finish();
}

/// Benchmark parsing and routing delta frames through a session
fn bench_session_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_dispatch");
    let delta = serde_json::json!({"type": "stream_delta", "text": DELTA}).to_string();

    for count in [100usize, 1_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let mut session = Session::new(
                    &SessionConfig::default(),
                    Arc::new(MockFrameSink::new()),
                    Arc::new(AutoApproveToggle::new(false)),
                );
                session.handle_frame(r#"{"type":"stream_start"}"#);
                for _ in 0..count {
                    session.handle_frame(black_box(&delta));
                }
                session.handle_frame(r#"{"type":"stream_complete"}"#);
                black_box(session.conversation().len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_conversation_deltas, bench_session_dispatch);
criterion_main!(benches);
