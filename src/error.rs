//! Error types for `sm64_extract`

use std::path::PathBuf;

use thiserror::Error;

use crate::mio0::{DecodeError, Rejection};
use crate::sequence::SequenceError;

#[derive(Error, Debug)]
pub enum Error {
    /// The ROM image itself could not be read. Nothing is scanned in this case.
    #[error("error reading ROM {}: {source}", .path.display())]
    RomRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no MIO0 header at 0x{0:X}")]
    NotMio0(usize),

    #[error("MIO0 header at 0x{anchor:X} rejected: {reason}")]
    Rejected { anchor: usize, reason: Rejection },

    #[error("failed to decode MIO0: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),
}

pub type Result<T> = std::result::Result<T, Error>;
