// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

/// Pool, channel and stage runner behaviour through the public API only.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use framepipe::core::executor::{FnStage, PacingConfig, StageExit, StageReport, StageRunner};
use framepipe::core::frames::{FrameData, TrackingData};
use framepipe::core::link_channel::{StageChannel, StageChannelConfig};
use framepipe::core::pool::{AcquireSource, ExhaustionPolicy, FramePoolConfig};
use framepipe::prelude::*;

fn pool(capacity: usize) -> FrameBufferPool {
    FrameBufferPool::new(
        FrameLayout::new(4, 4, 1),
        FramePoolConfig {
            capacity,
            exhaustion_policy: ExhaustionPolicy::Block { timeout_ms: None },
        },
    )
    .unwrap()
}

fn frame_envelope(pool: &FrameBufferPool, sequence: u64) -> Envelope {
    let pixels = vec![sequence as u8; pool.layout().byte_len()];
    let handle = pool.acquire(AcquireSource::Pixels(&pixels)).unwrap();
    Envelope::new(sequence)
        .with(FrameData::pooled(handle, pool.layout()))
        .unwrap()
}

fn fast_pacing() -> PacingConfig {
    PacingConfig {
        poll_interval_ms: 1,
        ..PacingConfig::default()
    }
}

#[test]
fn test_fourth_acquire_waits_for_release() {
    let pool = pool(3);
    let pixels = [7u8; 16];
    let mut handles: Vec<_> = (0..3)
        .map(|_| pool.acquire(AcquireSource::Pixels(&pixels)).unwrap())
        .collect();
    assert_eq!(pool.free_slots(), 0);

    let handle = handles.remove(1);
    let freed_slot = handle.slot();
    let releaser = {
        let pool = pool.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            pool.release(handle).unwrap();
        })
    };

    let started = Instant::now();
    let fourth = pool.acquire(AcquireSource::Pixels(&pixels)).unwrap();
    assert!(started.elapsed() >= Duration::from_millis(40));
    assert_eq!(fourth.slot(), freed_slot);
    releaser.join().unwrap();

    assert_eq!(pool.outstanding(), 3);
    handles.push(fourth);
    for handle in handles {
        pool.release(handle).unwrap();
    }
    pool.shutdown().unwrap();
}

#[test]
fn test_latest_frame_wins() {
    let pool = pool(16);
    let channel = StageChannel::new("frames", &StageChannelConfig::default(), Some(pool.clone()));
    let tx = channel.sender();
    let rx = channel.receiver();

    for sequence in 0..10 {
        tx.publish(frame_envelope(&pool, sequence)).unwrap();
    }

    assert_eq!(channel.len(), 1);
    assert_eq!(pool.outstanding(), 1);
    let latest = rx.try_recv().unwrap();
    assert_eq!(latest.sequence(), 9);
    assert_eq!(pool.resolve(latest.frame_handle().unwrap()).unwrap()[0], 9);
    assert_eq!(channel.stats().evicted, 9);
    assert!(rx.try_recv().is_none());
}

#[test]
fn test_close_through_runner_chain_arrives_once() {
    let pool = pool(8);
    let config = StageChannelConfig::default();
    let head = StageChannel::new("head", &config, Some(pool.clone()));
    let middle = StageChannel::new("middle", &config, Some(pool.clone()));
    let tail = StageChannel::new("tail", &config, Some(pool.clone()));

    let head_tx = head.sender();
    let tail_rx = tail.receiver();
    let after_close = Arc::new(AtomicU64::new(0));

    let first = StageRunner::new(
        Box::new(FnStage::new("enrich", |env: &mut Envelope, _: &mut StageContext| {
            env.insert(TrackingData::default())?;
            Ok(Disposition::Publish)
        })),
        head.receiver(),
        middle.sender(),
        Some(pool.clone()),
        fast_pacing(),
    );
    let counter = Arc::clone(&after_close);
    let second = StageRunner::new(
        Box::new(
            FnStage::new("check", move |env: &mut Envelope, _: &mut StageContext| {
                counter.fetch_add(1, Ordering::Relaxed);
                assert!(env.contains::<TrackingData>());
                Ok(Disposition::Publish)
            })
            .requires(&[PayloadKind::Frame, PayloadKind::Tracking]),
        ),
        middle.receiver(),
        tail.sender(),
        Some(pool.clone()),
        fast_pacing(),
    );

    let first = thread::spawn(move || first.run());
    let second = thread::spawn(move || second.run());

    head_tx.publish(frame_envelope(&pool, 1)).unwrap();
    head_tx.publish(Envelope::close()).unwrap();

    let first = first.join().unwrap();
    let second = second.join().unwrap();
    assert!(matches!(first.exit, StageExit::Closed));
    assert!(matches!(second.exit, StageExit::Closed));
    let processed = after_close.load(Ordering::Relaxed);
    assert_eq!(processed, second.processed);

    let mut terminals = 0;
    while let Some(mut envelope) = tail_rx.try_recv() {
        if envelope.is_terminal() {
            terminals += 1;
        } else {
            envelope.release_frame(Some(&pool)).unwrap();
        }
    }
    assert_eq!(terminals, 1);
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn test_stage_writes_pixels_in_place() {
    let pool = pool(4);
    let config = StageChannelConfig::default();
    let input = StageChannel::new("in", &config, Some(pool.clone()));
    let output = StageChannel::new("out", &config, Some(pool.clone()));
    let tx = input.sender();
    let rx = output.receiver();

    let runner = StageRunner::new(
        Box::new(FnStage::new("stamp", |env: &mut Envelope, ctx: &mut StageContext| {
            let pool = ctx.pool();
            let frame = env.get_mut::<FrameData>().expect("frame payload");
            frame.view_mut(pool)?[0] = 200;
            Ok(Disposition::Publish)
        })),
        input.receiver(),
        output.sender(),
        Some(pool.clone()),
        fast_pacing(),
    );
    let worker = thread::spawn(move || runner.run());

    tx.publish(frame_envelope(&pool, 3)).unwrap();
    tx.publish(Envelope::close()).unwrap();
    let report = worker.join().unwrap();
    assert!(matches!(report.exit, StageExit::Closed));

    let mut stamped = rx.try_recv().expect("stamped frame");
    let view = stamped.frame().unwrap().view(Some(&pool)).unwrap();
    assert_eq!(view[0], 200);
    assert!(view[1..].iter().all(|&b| b == 3));
    stamped.release_frame(Some(&pool)).unwrap();
    assert!(rx.try_recv().unwrap().is_terminal());
    assert_eq!(pool.outstanding(), 0);
}

fn run_into_unconsumed_output(envelopes: u64, pacing: PacingConfig) -> (StageReport, u64) {
    let input = StageChannel::new("in", &StageChannelConfig { capacity: 64 }, None);
    let output = StageChannel::new("out", &StageChannelConfig::default(), None);
    let tx = input.sender();
    for sequence in 0..envelopes {
        tx.publish(Envelope::new(sequence)).unwrap();
    }
    tx.publish(Envelope::close()).unwrap();

    let runner = StageRunner::new(
        Box::new(FnStage::new("fast", |_: &mut Envelope, _: &mut StageContext| {
            Ok(Disposition::Publish)
        })),
        input.receiver(),
        output.sender(),
        None,
        pacing,
    );
    let report = runner.run();
    let evicted = output.stats().evicted;
    (report, evicted)
}

#[test]
fn test_runner_backs_off_under_sustained_eviction() {
    // Evictions 2..=5 push the discard timer to 30, 45, 60 and 75 ms.
    let (paced, channel_evicted) = run_into_unconsumed_output(6, fast_pacing());
    assert!(matches!(paced.exit, StageExit::Closed));
    assert_eq!(paced.published, 6);
    assert_eq!(paced.evicted, 5);
    assert_eq!(channel_evicted, 5);
    assert!(paced.elapsed >= Duration::from_millis(200), "{:?}", paced.elapsed);

    let (unpaced, _) = run_into_unconsumed_output(
        6,
        PacingConfig {
            threshold_secs: f64::MAX,
            ..fast_pacing()
        },
    );
    assert_eq!(unpaced.evicted, 5);
    assert!(unpaced.elapsed < paced.elapsed);
}

#[test]
fn test_fan_in_waits_for_every_producer() {
    let channel = StageChannel::new("output", &StageChannelConfig::default(), None);
    let workers = [channel.sender(), channel.sender()];
    let rx = channel.receiver();

    workers[0].publish(Envelope::close()).unwrap();
    assert!(rx.try_recv().is_none());
    workers[1].publish(Envelope::close()).unwrap();
    assert!(rx.try_recv().unwrap().is_terminal());
    assert!(rx.try_recv().is_none());
}
