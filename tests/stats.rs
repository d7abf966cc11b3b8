use crossbeam::thread;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ziqtools::stats::{DecoderStats, StatsAggregator};

fn consistent(k: u64) -> DecoderStats {
    DecoderStats {
        frame_lock: k % 2 == 0,
        total_packets: k,
        total_dropped_packets: k * 2,
        snr: k as f64,
        avg_snr: k as f64 + 0.5,
        peak_snr: k as f64 * 3.0,
    }
}

#[test]
fn snapshots_are_never_torn() {
    const WRITERS: u64 = 4;
    const READERS: usize = 4;
    const PUBLISHES: u64 = 5_000;

    let agg = StatsAggregator::new();
    agg.publish(consistent(0));
    let writing = AtomicBool::new(true);
    let writers_left = AtomicUsize::new(WRITERS as usize);
    let snapshots = AtomicUsize::new(0);

    thread::scope(|s| {
        for w in 0..WRITERS {
            let agg = &agg;
            let writers_left = &writers_left;
            let writing = &writing;
            s.spawn(move |_| {
                for i in 0..PUBLISHES {
                    agg.publish(consistent(w * PUBLISHES + i));
                }
                if writers_left.fetch_sub(1, Ordering::SeqCst) == 1 {
                    writing.store(false, Ordering::SeqCst);
                }
            });
        }

        for _ in 0..READERS {
            let agg = &agg;
            let writing = &writing;
            let snapshots = &snapshots;
            s.spawn(move |_| loop {
                let done = !writing.load(Ordering::SeqCst);
                let snap = agg.snapshot();
                assert_eq!(snap, consistent(snap.total_packets), "torn snapshot {:?}", snap);
                snapshots.fetch_add(1, Ordering::SeqCst);
                if done {
                    break;
                }
            });
        }
    })
    .unwrap();

    assert!(snapshots.load(Ordering::SeqCst) >= READERS);
    let last = agg.snapshot();
    assert_eq!(last, consistent(last.total_packets));
}
