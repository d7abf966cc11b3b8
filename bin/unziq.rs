use log::*;
use std::path::PathBuf;
use structopt::StructOpt;

use ziqtools::ziq::{self, ChunkedSampleReader, ConvertSummary};
use ziqtools::ZiqError;

#[derive(StructOpt)]
#[structopt(name = "unziq", about = "converts a ziq IQ recording to raw complex64 samples")]
struct Cli {
    /// Prints debug output
    #[structopt(short, long)]
    verbose: bool,

    /// Writes samples at the raw +/-127 scale instead of normalized
    #[structopt(long = "no-normalize", parse(from_flag = std::ops::Not::not))]
    normalize: bool,

    /// Path to a ziq IQ file
    #[structopt(parse(from_os_str))]
    file: PathBuf,

    /// File path to output file
    #[structopt(parse(from_os_str))]
    output_file: PathBuf,
}

fn run(cli: &Cli) -> Result<ConvertSummary, ZiqError> {
    let mut reader = ChunkedSampleReader::open(&cli.file, cli.normalize)?;
    debug!("writing output file {}", cli.output_file.display());
    ziq::convert(&mut reader, &cli.output_file, 1.0)
}

fn main() {
    let cli = Cli::from_args();
    ziqtools::init_logging(cli.verbose);

    match run(&cli) {
        Ok(summary) => info!(
            "wrote {} samples ({} bytes) to {}",
            summary.samples,
            summary.bytes,
            cli.output_file.display()
        ),
        Err(e) => {
            error!("{}: {}", cli.file.display(), e);
            std::process::exit(e.exit_code());
        }
    }
}
