use failure::*;
use std::io;

pub const RC_IO_ERROR: i32 = 1;
pub const RC_INVALID_HEADER: i32 = 2;
pub const RC_INVALID_RESULT: i32 = 3;
pub const RC_FAILED_DECOMPRESSION: i32 = 4;
pub const RC_OUTPUT_EXISTS: i32 = 5;
pub const RC_INVALID_ARGUMENT: i32 = 6;

#[derive(Debug, Fail)]
pub enum ZiqError {
    #[fail(display = "invalid ziq file: {}", _0)]
    InvalidFormat(String),

    #[fail(display = "unsupported sample width: {} bits per sample", _0)]
    UnsupportedSampleWidth(u8),

    #[fail(display = "i/o error: {}", _0)]
    Io(#[cause] io::Error),

    #[fail(display = "could not decompress ziq body: {}", _0)]
    Decompression(#[cause] io::Error),

    #[fail(display = "output file {} exists, cowardly not overwriting", _0)]
    OutputExists(String),

    #[fail(display = "invalid argument: {}", _0)]
    InvalidArgument(String),
}

impl ZiqError {
    /// Process exit status for this failure category.
    pub fn exit_code(&self) -> i32 {
        match self {
            ZiqError::Io(_) => RC_IO_ERROR,
            ZiqError::InvalidFormat(_) => RC_INVALID_HEADER,
            ZiqError::UnsupportedSampleWidth(_) => RC_INVALID_RESULT,
            ZiqError::Decompression(_) => RC_FAILED_DECOMPRESSION,
            ZiqError::OutputExists(_) => RC_OUTPUT_EXISTS,
            ZiqError::InvalidArgument(_) => RC_INVALID_ARGUMENT,
        }
    }
}

impl From<io::Error> for ZiqError {
    fn from(e: io::Error) -> Self {
        ZiqError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, ZiqError>;
