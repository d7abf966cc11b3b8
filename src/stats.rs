use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Packet counters for one virtual channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Channel {
    pub id: u32,
    pub name: String,
    pub packets: u64,
    pub dropped_packets: u64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecoderStats {
    pub frame_lock: bool,
    pub total_packets: u64,
    pub total_dropped_packets: u64,
    pub snr: f64,
    pub avg_snr: f64,
    pub peak_snr: f64,
}

impl DecoderStats {
    /// Folds per-channel counters into the overall totals.
    pub fn from_channels(frame_lock: bool, channels: &[Channel], snr: f64, avg_snr: f64, peak_snr: f64) -> DecoderStats {
        DecoderStats {
            frame_lock: frame_lock,
            total_packets: channels.iter().map(|c| c.packets).sum(),
            total_dropped_packets: channels.iter().map(|c| c.dropped_packets).sum(),
            snr: snr,
            avg_snr: avg_snr,
            peak_snr: peak_snr,
        }
    }
}

impl fmt::Display for DecoderStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Locked: {}\tCurrent SNR: {:.3}\tAvg SNR: {:.3}\tPeak SNR: {:.3}\tDecoded packets: {}\tDropped packets: {}",
            self.frame_lock,
            self.snr,
            self.avg_snr,
            self.peak_snr,
            self.total_packets,
            self.total_dropped_packets
        )
    }
}

/// Shared decoder health. Writers replace the whole value, readers get a
/// copy of exactly one published value.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    current: RwLock<DecoderStats>,
}

impl StatsAggregator {
    pub fn new() -> StatsAggregator {
        StatsAggregator::default()
    }

    pub fn publish(&self, stats: DecoderStats) {
        // a poisoned lock still holds a whole value, assignment is the only write
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = stats;
    }

    pub fn snapshot(&self) -> DecoderStats {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_zeroed() {
        assert_eq!(StatsAggregator::new().snapshot(), DecoderStats::default());
    }

    #[test]
    fn snapshot_sees_last_publish() {
        let agg = StatsAggregator::new();
        let stats = DecoderStats {
            frame_lock: true,
            total_packets: 10,
            total_dropped_packets: 1,
            snr: 4.5,
            avg_snr: 4.0,
            peak_snr: 6.25,
        };
        agg.publish(stats.clone());
        assert_eq!(agg.snapshot(), stats);

        agg.publish(DecoderStats::default());
        assert_eq!(agg.snapshot(), DecoderStats::default());
    }

    #[test]
    fn channel_totals() {
        let channels = vec![
            Channel { id: 0, name: "admin".into(), packets: 40, dropped_packets: 2 },
            Channel { id: 60, name: "fill".into(), packets: 2, dropped_packets: 0 },
            Channel { id: 63, name: "idle".into(), packets: 100, dropped_packets: 5 },
        ];
        let stats = DecoderStats::from_channels(true, &channels, 1.0, 2.0, 3.0);
        assert_eq!(stats.total_packets, 142);
        assert_eq!(stats.total_dropped_packets, 7);
        assert!(stats.frame_lock);
    }

    #[test]
    fn survives_poisoned_lock() {
        let agg = Arc::new(StatsAggregator::new());
        let poisoner = agg.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.current.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        agg.publish(DecoderStats { total_packets: 3, ..Default::default() });
        assert_eq!(agg.snapshot().total_packets, 3);
    }

    #[test]
    fn display_line() {
        let line = DecoderStats { frame_lock: true, total_packets: 9, ..Default::default() }.to_string();
        assert!(line.starts_with("Locked: true"));
        assert!(line.contains("Decoded packets: 9"));
    }
}
