use log::*;
use num_complex::Complex32;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use super::header::Header;
use crate::error::{Result, ZiqError};
use crate::SampleSource;

const NORMALIZE_DIVISOR: f32 = 127.0;

/// Largest chunk a single `next_chunk` call will buffer.
pub const MAX_CHUNK_SAMPLES: usize = 1 << 24;

/// Bytes per I or Q component for a supported sample width.
pub fn bytes_per_component(bits_per_sample: u8) -> Result<usize> {
    match bits_per_sample {
        8 => Ok(1),
        other => Err(ZiqError::UnsupportedSampleWidth(other)),
    }
}

/// Converts interleaved (real, imag) components to complex samples. A
/// trailing partial pair is ignored.
pub fn bytes_to_samples(bits_per_sample: u8, input: &[u8], normalize: bool) -> Result<Vec<Complex32>> {
    let divisor = match normalize {
        true => NORMALIZE_DIVISOR,
        false => 1.0,
    };

    match bits_per_sample {
        8 => Ok(input
            .chunks_exact(2)
            .map(|iq| Complex32::new(iq[0] as i8 as f32 / divisor, iq[1] as i8 as f32 / divisor))
            .collect()),
        other => Err(ZiqError::UnsupportedSampleWidth(other)),
    }
}

/// Reads a ziq body in fixed size chunks of complex samples.
pub struct ChunkedSampleReader {
    header: Header,
    body: Box<dyn Read + Send>,
    compressed: bool,
    normalize: bool,
    done: bool,
    dropped_trailing_bytes: usize,
}

impl ChunkedSampleReader {
    /// Opens a ziq file, parsing its header.
    pub fn open<P: AsRef<Path>>(path: P, normalize: bool) -> Result<ChunkedSampleReader> {
        let path = path.as_ref();
        debug!("opening ziq file: {}", path.display());

        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let header = Header::read_from(&mut reader)?;
        debug!("found ziq header {}", header);

        ChunkedSampleReader::new(header, reader, normalize)
    }

    /// Wraps `source`, which must be positioned at the first body byte.
    pub fn new<R: Read + Send + 'static>(header: Header, source: R, normalize: bool) -> Result<ChunkedSampleReader> {
        bytes_per_component(header.bits_per_sample)?;

        let body: Box<dyn Read + Send> = match header.compressed {
            true => {
                debug!("ziq body is compressed, decompressing");
                Box::new(zstd::stream::read::Decoder::new(source)?)
            }
            false => {
                debug!("ziq body is not compressed");
                Box::new(source)
            }
        };

        Ok(ChunkedSampleReader {
            compressed: header.compressed,
            header: header,
            body: body,
            normalize: normalize,
            done: false,
            dropped_trailing_bytes: 0,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Bytes at the end of the body that did not form a whole sample.
    pub fn dropped_trailing_bytes(&self) -> usize {
        self.dropped_trailing_bytes
    }

    /// Reads up to `max_samples` samples. A short (possibly empty) chunk is
    /// returned exactly once, on the call that hits end of stream; after
    /// that every call returns an empty chunk.
    pub fn next_chunk(&mut self, max_samples: usize) -> Result<Vec<Complex32>> {
        if self.done {
            return Ok(Vec::new());
        }

        let bytes_per_sample = 2 * bytes_per_component(self.header.bits_per_sample)?;
        let chunk_bytes = match max_samples {
            0 => None,
            n if n > MAX_CHUNK_SAMPLES => None,
            n => n.checked_mul(bytes_per_sample),
        };
        let chunk_bytes = chunk_bytes.ok_or_else(|| {
            ZiqError::InvalidArgument(format!(
                "chunk size must be 1..={} samples, got {}",
                MAX_CHUNK_SAMPLES, max_samples
            ))
        })?;
        let mut data = vec![0u8; chunk_bytes];
        let filled = self.fill(&mut data)?;

        if filled < data.len() {
            self.done = true;
            let leftover = filled % bytes_per_sample;
            if leftover != 0 {
                warn!("dropping {} trailing byte(s) at end of ziq body", leftover);
                self.dropped_trailing_bytes += leftover;
            }
            debug!("end of ziq body, final chunk has {} bytes", filled);
        }

        trace!("read {} bytes of ziq body", filled);
        bytes_to_samples(self.header.bits_per_sample, &data[..filled], self.normalize)
    }

    /// Iterates chunks of `size` samples until the body is exhausted.
    pub fn chunks(&mut self, size: usize) -> Chunks<'_> {
        Chunks { reader: self, size: size }
    }

    // like read_exact, but reports how far it got instead of failing on eof
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.body.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && !self.compressed => break,
                Err(e) => {
                    error!("could not read ziq data: {}", e);
                    return Err(self.classify(e));
                }
            }
        }
        Ok(filled)
    }

    fn classify(&self, e: io::Error) -> ZiqError {
        if !self.compressed {
            return ZiqError::Io(e);
        }
        // zstd reports garbled frames as Other and cut-off frames as UnexpectedEof
        match e.kind() {
            io::ErrorKind::Other | io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => {
                ZiqError::Decompression(e)
            }
            _ => ZiqError::Io(e),
        }
    }
}

impl SampleSource for ChunkedSampleReader {
    fn next_chunk(&mut self, max_samples: usize) -> Result<Vec<Complex32>> {
        ChunkedSampleReader::next_chunk(self, max_samples)
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

pub struct Chunks<'a> {
    reader: &'a mut ChunkedSampleReader,
    size: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<Vec<Complex32>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reader.is_done() {
            return None;
        }
        match self.reader.next_chunk(self.size) {
            Ok(chunk) if chunk.is_empty() => None,
            Ok(chunk) => Some(Ok(chunk)),
            Err(e) => Some(Err(e)),
        }
    }
}
