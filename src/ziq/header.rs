use bytes::{Buf, BufMut, BytesMut};
use log::*;
use std::fmt;
use std::io::Read;
use tokio_util::codec;

use crate::error::{Result, ZiqError};

pub const ZIQ_SIGNATURE: [u8; 4] = *b"ZIQ_";

/* signature(4) + compressed(1) + bits_per_sample(1) + sample_rate(8) + annotation_length(8) */
pub const ZIQ_FIXED_HEADER_BYTES: usize = 22;

const ANNOTATION_LENGTH_OFFSET: usize = 14;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub signature: [u8; 4],
    pub compressed: bool,
    pub bits_per_sample: u8,
    pub sample_rate: u64,
    pub annotation: String,
}

impl Header {
    pub fn new(compressed: bool, bits_per_sample: u8, sample_rate: u64) -> Header {
        Header {
            signature: ZIQ_SIGNATURE,
            compressed: compressed,
            bits_per_sample: bits_per_sample,
            sample_rate: sample_rate,
            annotation: String::new(),
        }
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Header {
        self.annotation = annotation.into();
        self
    }

    pub fn annotation_length(&self) -> u64 {
        self.annotation.len() as u64
    }

    /// Total encoded size, fixed part plus annotation.
    pub fn encoded_len(&self) -> usize {
        ZIQ_FIXED_HEADER_BYTES + self.annotation.len()
    }

    /// Decode a header from the start of `bytes`. Trailing bytes are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Header> {
        let mut buf = BytesMut::from(bytes);
        let mut decoder = HeaderCodec::new();
        match codec::Decoder::decode(&mut decoder, &mut buf)? {
            Some(header) => Ok(header),
            None => Err(ZiqError::InvalidFormat(format!(
                "truncated header ({} bytes)",
                bytes.len()
            ))),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut dst = BytesMut::with_capacity(self.encoded_len());
        HeaderCodec::put_header(self, &mut dst);
        dst.to_vec()
    }

    /// Reads exactly one header off the front of `reader`, leaving it
    /// positioned on the first body byte.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Header> {
        let mut fixed = [0u8; ZIQ_FIXED_HEADER_BYTES];
        reader.read_exact(&mut fixed).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                ZiqError::InvalidFormat("file too short for a ziq header".into())
            }
            _ => ZiqError::Io(e),
        })?;

        if fixed[0..4] != ZIQ_SIGNATURE {
            return Err(invalid_signature(&fixed[0..4]));
        }

        let annotation_length = (&fixed[ANNOTATION_LENGTH_OFFSET..]).get_u64_le();

        // read through take() so a bogus length cannot force a huge allocation
        let mut annotation = Vec::new();
        reader
            .by_ref()
            .take(annotation_length)
            .read_to_end(&mut annotation)?;
        if (annotation.len() as u64) < annotation_length {
            return Err(ZiqError::InvalidFormat(format!(
                "annotation truncated: have {} bytes, want {}",
                annotation.len(),
                annotation_length
            )));
        }

        let mut buf = BytesMut::with_capacity(fixed.len() + annotation.len());
        buf.put_slice(&fixed);
        buf.put_slice(&annotation);
        Header::decode(&buf)
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(signature: {}, compressed: {}, bits: {}, rate: {} S/s, annotation: {:?})",
            String::from_utf8_lossy(&self.signature),
            self.compressed,
            self.bits_per_sample,
            self.sample_rate,
            self.annotation
        )
    }
}

fn invalid_signature(sig: &[u8]) -> ZiqError {
    ZiqError::InvalidFormat(format!(
        "header does not start with ZIQ_ (found {:?})",
        String::from_utf8_lossy(sig)
    ))
}

/// Framed codec for ziq headers.
pub struct HeaderCodec {}

impl HeaderCodec {
    pub fn new() -> HeaderCodec {
        HeaderCodec {}
    }

    fn put_header(header: &Header, dst: &mut BytesMut) {
        dst.reserve(header.encoded_len());
        dst.put_slice(&header.signature);
        dst.put_u8(header.compressed as u8);
        dst.put_u8(header.bits_per_sample);
        dst.put_u64_le(header.sample_rate);
        dst.put_u64_le(header.annotation_length());
        dst.put_slice(header.annotation.as_bytes());
    }
}

impl codec::Decoder for HeaderCodec {
    type Item = Header;
    type Error = ZiqError;

    fn decode(&mut self, src: &mut BytesMut) -> std::result::Result<Option<Header>, ZiqError> {
        // reject a bad signature as soon as it is visible
        if src.len() >= ZIQ_SIGNATURE.len() && src[0..4] != ZIQ_SIGNATURE {
            return Err(invalid_signature(&src[0..4]));
        }

        if src.len() < ZIQ_FIXED_HEADER_BYTES {
            trace!("header decoder waiting on fixed part, have {} bytes", src.len());
            return Ok(None);
        }

        let annotation_length = (&src[ANNOTATION_LENGTH_OFFSET..ZIQ_FIXED_HEADER_BYTES]).get_u64_le();
        let needed = (ZIQ_FIXED_HEADER_BYTES as u64).checked_add(annotation_length);
        match needed {
            Some(n) if (src.len() as u64) >= n => {}
            _ => {
                trace!(
                    "header decoder waiting on {} byte annotation, have {} bytes",
                    annotation_length,
                    src.len()
                );
                return Ok(None);
            }
        }

        let mut signature = [0u8; 4];
        src.copy_to_slice(&mut signature);
        let compressed = src.get_u8() != 0;
        let bits_per_sample = src.get_u8();
        let sample_rate = src.get_u64_le();
        src.advance(8);
        let annotation_bytes = src.split_to(annotation_length as usize);

        let annotation = String::from_utf8(annotation_bytes.to_vec())
            .map_err(|_| ZiqError::InvalidFormat("annotation is not valid UTF-8".into()))?;

        Ok(Some(Header {
            signature: signature,
            compressed: compressed,
            bits_per_sample: bits_per_sample,
            sample_rate: sample_rate,
            annotation: annotation,
        }))
    }
}

impl codec::Encoder<&Header> for HeaderCodec {
    type Error = ZiqError;

    fn encode(&mut self, header: &Header, dst: &mut BytesMut) -> std::result::Result<(), ZiqError> {
        HeaderCodec::put_header(header, dst);
        Ok(())
    }
}
