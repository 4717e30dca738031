//! Control-path cost of the handoff primitives and a full cycle boundary.

use std::hint::black_box;
use std::time::Instant;

use criterion::{Criterion, criterion_group, criterion_main};
use foc_state::handoff::snapshot_mailbox;
use foc_state::persistence;
use foc_state::prelude::*;

/// Producer boundary with no outstanding request (the common case).
fn bench_fulfill_idle(c: &mut Criterion) {
    let (mut tx, _rx) = snapshot_mailbox(Results::default());
    let live = Results::default();
    c.bench_function("results_fulfill_idle", |b| {
        b.iter(|| black_box(tx.try_fulfill(black_box(&live))));
    });
}

/// Request, copy, take of one Results record.
fn bench_snapshot_roundtrip(c: &mut Criterion) {
    let (mut tx, mut rx) = snapshot_mailbox(Results::default());
    let live = Results {
        vin: 24.0,
        ..Results::default()
    };
    c.bench_function("results_snapshot_roundtrip", |b| {
        b.iter(|| {
            rx.request();
            tx.try_fulfill(&live);
            black_box(rx.try_consume())
        });
    });
}

/// Full begin/end cycle with an outstanding Results request every cycle.
fn bench_control_cycle(c: &mut Criterion) {
    let nv = CalibrationStore::new(MemoryStore::new(4096), 0).unwrap();
    let (mut control, mut comms) = SharedControlState::new(10).split(nv, NullGate);
    comms.recorder().lock().start();

    c.bench_function("control_cycle_with_request", |b| {
        b.iter(|| {
            comms.request_results();
            comms.finish_message();
            control.run_cycle(Instant::now(), |p, cal, r| {
                r.foc_q_current = p.foc_q_current_sp * cal.foc_kp_q;
            });
            black_box(comms.poll_results())
        });
    });
}

/// Encode and decode of the persisted calibration block.
fn bench_calibration_codec(c: &mut Criterion) {
    let cal = Calibration::default();
    c.bench_function("calibration_encode", |b| {
        b.iter(|| black_box(persistence::encode(black_box(&cal)).unwrap()));
    });

    let block = persistence::encode(&cal).unwrap();
    c.bench_function("calibration_decode", |b| {
        b.iter(|| black_box(persistence::decode(black_box(&block)).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_fulfill_idle,
    bench_snapshot_roundtrip,
    bench_control_cycle,
    bench_calibration_codec
);
criterion_main!(benches);
