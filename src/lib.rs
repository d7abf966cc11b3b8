pub mod error;
pub mod feed;
pub mod stats;
pub mod ziq;

use log::LevelFilter;
use num_complex::Complex32;

pub use error::{Result, ZiqError};

/// Something that hands out complex samples a chunk at a time until it runs
/// dry. Once `is_done` turns true it stays true.
pub trait SampleSource: Send {
    fn next_chunk(&mut self, max_samples: usize) -> Result<Vec<Complex32>>;
    fn is_done(&self) -> bool;
}

/// Sets up pretty_env_logger. The default level is info, or debug when
/// `verbose` is set; `RUST_LOG` directives are applied on top.
pub fn init_logging(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(match verbose {
        true => LevelFilter::Debug,
        false => LevelFilter::Info,
    });
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    if builder.try_init().is_err() {
        log::warn!("logger already initialized");
    }
}
