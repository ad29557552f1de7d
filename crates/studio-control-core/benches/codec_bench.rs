//! Criterion benchmarks for the studio-control JSON codec.
//!
//! The poller decodes the command key on every tick, so decode cost bounds
//! how small the poll interval can reasonably be.
//!
//! Run with:
//! ```bash
//! cargo bench --package studio-control-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use studio_control_core::{decode, encode, Ack, Action, Command, State};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn make_command() -> Command {
    Command::with_timestamp(Action::Toggle, 1_718_000_000_000, Some("bench".to_string()))
}

fn make_state() -> State {
    State {
        open: true,
        ts: 1_718_000_000_000,
        source: Some("bench".to_string()),
    }
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let cmd = make_command();
    let state = make_state();
    let ack = Ack {
        id: cmd.id.clone(),
        ts: 1_718_000_000_100,
    };

    let mut group = c.benchmark_group("encode");
    group.bench_function("command", |b| b.iter(|| encode(black_box(&cmd))));
    group.bench_function("state", |b| b.iter(|| encode(black_box(&state))));
    group.bench_function("ack", |b| b.iter(|| encode(black_box(&ack))));
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let command_text = encode(&make_command());
    let state_text = encode(&make_state());

    let mut group = c.benchmark_group("decode");
    group.bench_function("command", |b| {
        b.iter(|| decode::<Command>(black_box(&command_text)))
    });
    group.bench_function("state", |b| b.iter(|| decode::<State>(black_box(&state_text))));
    // The common idle tick: the command key was cleared after delivery.
    group.bench_function("cleared", |b| b.iter(|| decode::<Command>(black_box(""))));
    group.bench_function("corrupt", |b| {
        b.iter(|| decode::<Command>(black_box("{\"id\":\"x\",\"action\"")))
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
