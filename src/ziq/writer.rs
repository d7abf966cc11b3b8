use bytes::{BufMut, BytesMut};
use log::*;
use num_complex::Complex32;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::header::Header;
use crate::error::{Result, ZiqError};
use crate::SampleSource;

/// Samples per read when converting, one XRIT radio chunk.
pub const CONVERT_CHUNK_SAMPLES: usize = 66560;

const BYTES_PER_OUTPUT_SAMPLE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConvertSummary {
    pub chunks: u64,
    pub samples: u64,
    pub bytes: u64,
}

/// Serializes complex samples as interleaved little-endian f32 (real, imag).
pub struct SampleWriter<W: Write> {
    inner: W,
    divisor: f32,
    buf: BytesMut,
}

impl SampleWriter<BufWriter<File>> {
    /// Creates `path` for writing. Fails with `OutputExists` rather than
    /// truncating a file that is already there.
    pub fn create<P: AsRef<Path>>(path: P, divisor: f32) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => ZiqError::OutputExists(path.display().to_string()),
                _ => ZiqError::Io(e),
            })?;
        Ok(SampleWriter::new(BufWriter::new(file), divisor))
    }
}

impl<W: Write> SampleWriter<W> {
    pub fn new(inner: W, divisor: f32) -> Self {
        SampleWriter {
            inner: inner,
            divisor: divisor,
            buf: BytesMut::new(),
        }
    }

    /// Encodes one chunk into a single buffer and writes it out.
    pub fn write_chunk(&mut self, samples: &[Complex32]) -> Result<usize> {
        self.buf.clear();
        self.buf.reserve(samples.len() * BYTES_PER_OUTPUT_SAMPLE);
        for s in samples {
            self.buf.put_f32_le(s.re / self.divisor);
            self.buf.put_f32_le(s.im / self.divisor);
        }
        self.inner.write_all(&self.buf)?;
        Ok(self.buf.len())
    }

    /// Drains `source` into the writer, `chunk_size` samples at a time.
    pub fn write_all_from<S: SampleSource>(&mut self, source: &mut S, chunk_size: usize) -> Result<ConvertSummary> {
        if chunk_size == 0 {
            return Err(ZiqError::InvalidArgument("chunk size must be at least one sample".into()));
        }

        let mut summary = ConvertSummary::default();
        while !source.is_done() {
            let samples = source.next_chunk(chunk_size)?;
            if samples.is_empty() {
                continue;
            }
            let written = self.write_chunk(&samples)?;
            debug!(
                "wrote chunk of {} samples to output file ({} bytes)",
                samples.len(),
                written
            );
            summary.chunks += 1;
            summary.samples += samples.len() as u64;
            summary.bytes += written as u64;
        }
        self.flush()?;
        Ok(summary)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Converts a whole sample stream into a new raw f32 file at `output`.
pub fn convert<S: SampleSource, P: AsRef<Path>>(source: &mut S, output: P, divisor: f32) -> Result<ConvertSummary> {
    let mut writer = SampleWriter::create(output, divisor)?;
    writer.write_all_from(source, CONVERT_CHUNK_SAMPLES)
}

/// Writes a complete ziq container. `raw_body` is interleaved 8-bit IQ and
/// is zstd compressed when the header asks for it.
pub fn write_container<W: Write>(mut w: W, header: &Header, raw_body: &[u8]) -> Result<()> {
    w.write_all(&header.encode())?;
    match header.compressed {
        true => zstd::stream::copy_encode(raw_body, &mut w, 0)?,
        false => w.write_all(raw_body)?,
    }
    w.flush()?;
    Ok(())
}
