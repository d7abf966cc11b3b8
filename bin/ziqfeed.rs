use crossbeam::thread;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::*;
use std::panic;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use structopt::StructOpt;

use ziqtools::feed::{signal_seconds, Chunk, FeedConfig, FeedController, FeedReport, Pipeline, XRIT_CHUNK_SIZE};
use ziqtools::stats::{DecoderStats, StatsAggregator};
use ziqtools::ziq::ChunkedSampleReader;
use ziqtools::ZiqError;

#[derive(StructOpt)]
#[structopt(name = "ziqfeed", about = "feeds a ziq IQ recording through a sample pipeline")]
struct Cli {
    /// Prints debug output
    #[structopt(short, long)]
    verbose: bool,

    /// Path to a ziq IQ file
    #[structopt(parse(from_os_str))]
    file: PathBuf,

    /// Overrides the sample rate from the ziq header
    #[structopt(long)]
    sample_rate: Option<f64>,

    /// Samples per chunk pushed to the pipeline
    #[structopt(long, default_value = "66560")]
    chunk_size: usize,

    /// Chunks buffered between reader and pipeline
    #[structopt(long, default_value = "64")]
    queue_capacity: usize,

    /// Seconds between queue depth checks
    #[structopt(long, default_value = "5")]
    poll_secs: u64,
}

/// Stand-in pipeline that drains the input queue and counts what it saw.
struct DrainPipeline {
    samples_out: Receiver<Chunk>,
    sample_rate: f64,
    chunks: AtomicU64,
    samples: AtomicU64,
    stopped: AtomicBool,
}

impl DrainPipeline {
    fn new(samples_out: Receiver<Chunk>, sample_rate: f64) -> DrainPipeline {
        DrainPipeline {
            samples_out: samples_out,
            sample_rate: sample_rate,
            chunks: AtomicU64::new(0),
            samples: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    // runs on its own thread until destroy()
    fn drain(&self) {
        while !self.stopped.load(Ordering::SeqCst) {
            match self.samples_out.recv_timeout(Duration::from_millis(100)) {
                Ok(chunk) => {
                    self.chunks.fetch_add(1, Ordering::SeqCst);
                    self.samples.fetch_add(chunk.len() as u64, Ordering::SeqCst);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("drain worker finished");
    }
}

impl Pipeline for DrainPipeline {
    fn start(&self) {
        info!("pipeline started at {} S/s", self.sample_rate);
    }

    fn flush(&self) {
        let samples = self.samples.load(Ordering::SeqCst);
        info!(
            "flushing pipeline after {} chunks ({} samples, {:.2}s of signal)",
            self.chunks.load(Ordering::SeqCst),
            samples,
            signal_seconds(samples, self.sample_rate)
        );
    }

    fn destroy(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn health(&self) -> DecoderStats {
        DecoderStats {
            total_packets: self.chunks.load(Ordering::SeqCst),
            ..Default::default()
        }
    }
}

fn run(cli: &Cli, stats: &StatsAggregator) -> Result<(FeedReport, f64), ZiqError> {
    let reader = ChunkedSampleReader::open(&cli.file, true)?;
    let sample_rate = match cli.sample_rate {
        Some(rate) if !(rate > 0.0) => {
            return Err(ZiqError::InvalidArgument(format!("sample rate {} S/s", rate)));
        }
        Some(rate) => rate,
        None => reader.header().sample_rate as f64,
    };
    info!("ziq header: {}", reader.header());

    let config = FeedConfig {
        chunk_size: cli.chunk_size,
        queue_capacity: cli.queue_capacity,
        poll_interval: Duration::from_secs(cli.poll_secs),
        ..FeedConfig::xrit()
    };
    if config.chunk_size != XRIT_CHUNK_SIZE {
        debug!("using non-default chunk size {}", config.chunk_size);
    }

    let (controller, samples_out) = FeedController::new(config, reader)?;
    let pipeline = DrainPipeline::new(samples_out, sample_rate);

    let report = thread::scope(|s| {
        let pipeline = &pipeline;
        s.spawn(move |_| pipeline.drain());
        controller.run(pipeline, stats)
    })
    .unwrap_or_else(|e| panic::resume_unwind(e))?;

    Ok((report, sample_rate))
}

fn main() {
    let cli = Cli::from_args();
    ziqtools::init_logging(cli.verbose);

    let stats = StatsAggregator::new();
    match run(&cli, &stats) {
        Ok((report, sample_rate)) => {
            info!(
                "fed {} chunks ({} samples, {:.2}s at {} S/s) over {} polls",
                report.chunks,
                report.samples,
                report.signal_seconds(sample_rate),
                sample_rate,
                report.polls
            );
            info!("{}", stats.snapshot());
        }
        Err(e) => {
            error!("{}: {}", cli.file.display(), e);
            std::process::exit(e.exit_code());
        }
    }
}
