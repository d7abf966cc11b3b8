use crossbeam::thread;
use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use log::*;
use num_complex::Complex32;
use std::panic;
use std::time::Duration;

use crate::error::{Result, ZiqError};
use crate::stats::{DecoderStats, StatsAggregator};
use crate::SampleSource;

pub type Chunk = Vec<Complex32>;

/// Samples handed to the pipeline per push.
pub const XRIT_CHUNK_SIZE: usize = 66560;

/// The downstream demodulator/decoder. Its internals live elsewhere; the
/// feed only drives its lifecycle and reads its health counters.
pub trait Pipeline: Sync {
    fn start(&self);
    fn flush(&self);
    fn destroy(&self);
    fn health(&self) -> DecoderStats;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedConfig {
    pub chunk_size: usize,
    pub queue_capacity: usize,
    pub poll_interval: Duration,
    /// Consecutive empty polls tolerated; shutdown happens on the next one.
    pub idle_threshold: u32,
}

impl FeedConfig {
    pub fn xrit() -> FeedConfig {
        FeedConfig {
            chunk_size: XRIT_CHUNK_SIZE,
            queue_capacity: 64,
            poll_interval: Duration::from_secs(5),
            idle_threshold: 2,
        }
    }

    /// Rejects settings the feed cannot run with. A zero capacity queue
    /// always reads as empty, so the monitor would shut down on schedule.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ZiqError::InvalidArgument("chunk size must be at least one sample".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ZiqError::InvalidArgument("queue capacity must be at least one chunk".into()));
        }
        Ok(())
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig::xrit()
    }
}

/// Counts consecutive empty observations of the input queue and fires once
/// the count exceeds the threshold. Fires at most once.
#[derive(Debug)]
pub struct IdleDetector {
    threshold: u32,
    empty_polls: u32,
    fired: bool,
}

impl IdleDetector {
    pub fn new(threshold: u32) -> IdleDetector {
        IdleDetector {
            threshold: threshold,
            empty_polls: 0,
            fired: false,
        }
    }

    pub fn observe(&mut self, queue_depth: usize) -> bool {
        if self.fired {
            return false;
        }

        if queue_depth > 0 {
            self.empty_polls = 0;
            return false;
        }

        self.empty_polls += 1;
        if self.empty_polls > self.threshold {
            self.fired = true;
        }
        self.fired
    }

    pub fn empty_polls(&self) -> u32 {
        self.empty_polls
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedReport {
    pub chunks: u64,
    pub samples: u64,
    pub polls: u64,
}

impl FeedReport {
    /// Seconds of signal pushed, at `sample_rate` samples per second.
    pub fn signal_seconds(&self, sample_rate: f64) -> f64 {
        signal_seconds(self.samples, sample_rate)
    }
}

pub fn signal_seconds(samples: u64, sample_rate: f64) -> f64 {
    if sample_rate > 0.0 {
        samples as f64 / sample_rate
    } else {
        0.0
    }
}

/// Moves chunks from a sample source into the pipeline's bounded input
/// queue and tears the pipeline down once that queue stays empty.
pub struct FeedController<S: SampleSource> {
    config: FeedConfig,
    source: S,
    samples_in: Sender<Chunk>,
}

impl<S: SampleSource> FeedController<S> {
    /// Returns the controller and the consumer end of its input queue,
    /// which belongs to the pipeline.
    pub fn new(config: FeedConfig, source: S) -> Result<(FeedController<S>, Receiver<Chunk>)> {
        config.validate()?;
        let (samples_in, samples_out) = bounded(config.queue_capacity);
        let controller = FeedController {
            config: config,
            source: source,
            samples_in: samples_in,
        };
        Ok((controller, samples_out))
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Starts the pipeline, then runs producer and monitor until the monitor
    /// declares the input idle. A source error is returned after shutdown.
    pub fn run<P: Pipeline>(self, pipeline: &P, stats: &StatsAggregator) -> Result<FeedReport> {
        let FeedController {
            config,
            mut source,
            samples_in,
        } = self;
        let queue = samples_in.clone();
        let chunk_size = config.chunk_size;
        // closed by the monitor once the pipeline is gone
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        debug!("starting pipeline");
        pipeline.start();

        let (produced, polls) = thread::scope(|scope| {
            let producer_handle =
                scope.spawn(move |_| produce(&mut source, samples_in, shutdown_rx, chunk_size));
            let monitor_handle = scope.spawn(move |_| monitor(queue, shutdown_tx, pipeline, stats, config));
            (producer_handle.join(), monitor_handle.join())
        })
        .unwrap_or_else(|e| panic::resume_unwind(e));

        let polls = polls.unwrap_or_else(|e| panic::resume_unwind(e));
        let (chunks, samples) = produced.unwrap_or_else(|e| panic::resume_unwind(e))?;

        Ok(FeedReport {
            chunks: chunks,
            samples: samples,
            polls: polls,
        })
    }
}

fn produce<S: SampleSource>(
    source: &mut S,
    samples_in: Sender<Chunk>,
    shutdown: Receiver<()>,
    chunk_size: usize,
) -> Result<(u64, u64)> {
    let mut chunks = 0u64;
    let mut samples = 0u64;

    while !source.is_done() {
        if let Err(TryRecvError::Disconnected) = shutdown.try_recv() {
            info!("pipeline destroyed, stopping producer");
            break;
        }
        let chunk = match source.next_chunk(chunk_size) {
            Ok(chunk) => chunk,
            Err(e) => {
                error!("could not read samples: {}", e);
                return Err(e);
            }
        };
        if chunk.is_empty() {
            continue;
        }

        let n = chunk.len() as u64;
        let queued = select! {
            send(samples_in, chunk) -> sent => match sent {
                Ok(()) => true,
                Err(_) => {
                    warn!("pipeline input closed, stopping producer");
                    false
                }
            },
            recv(shutdown) -> _ => {
                info!("pipeline destroyed with a chunk in hand, stopping producer");
                false
            }
        };
        if !queued {
            break;
        }
        chunks += 1;
        samples += n;
        trace!("queued chunk {} ({} samples)", chunks, n);
    }

    info!("finished reading samples: {} chunks, {} samples", chunks, samples);
    Ok((chunks, samples))
}

// holds its own sender so the queue stays connected until shutdown
fn monitor<P: Pipeline>(
    queue: Sender<Chunk>,
    shutdown: Sender<()>,
    pipeline: &P,
    stats: &StatsAggregator,
    config: FeedConfig,
) -> u64 {
    let mut idle = IdleDetector::new(config.idle_threshold);
    let mut polls = 0u64;

    loop {
        std::thread::sleep(config.poll_interval);
        polls += 1;

        let depth = queue.len();
        let health = pipeline.health();
        if depth > 0 {
            info!("{}", health);
            info!("buffers: samples_in: {}/{}", depth, config.queue_capacity);
        }
        stats.publish(health);

        if idle.observe(depth) {
            info!(
                "input idle for {} polls, flushing and destroying pipeline",
                idle.empty_polls()
            );
            pipeline.flush();
            pipeline.destroy();
            drop(shutdown);
            break;
        }
        if depth == 0 {
            debug!("samples_in empty ({} consecutive polls)", idle.empty_polls());
        }
    }

    polls
}
