pub mod header;
pub mod reader;
pub mod writer;

pub use header::{Header, HeaderCodec, ZIQ_SIGNATURE};
pub use reader::{ChunkedSampleReader, MAX_CHUNK_SAMPLES};
pub use writer::{convert, write_container, ConvertSummary, SampleWriter};
