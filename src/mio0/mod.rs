//! Functions for reading and decompressing MIO0 blocks
//!
//! A block starts with a 16 byte big-endian header:
//!
//! | offset | field                                   |
//! |--------|-----------------------------------------|
//! | 0x0    | magic, `"MIO0"`                         |
//! | 0x4    | decompressed length                     |
//! | 0x8    | offset of the control/back-reference data |
//! | 0xC    | offset of the literal data              |
//!
//! Both data offsets are relative to the position of the magic.

use crate::bitstream::IBitStream;
use crate::io_traits::{read_be, ReadOrdered};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"MIO0";
pub const HEADER_SIZE: usize = 16;

/// Declared lengths above this are treated as garbage rather than real blocks.
pub const MAX_DECLARED_LEN: u32 = 0x40_0000;

/// Raw header fields read at a magic hit, before any sanity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub anchor: usize,
    pub declared_len: u32,
    pub comp_offset: u32,
    pub uncomp_offset: u32,
}

/// Why a header was not accepted as a block.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("declared length {0} is not in 1..={}", MAX_DECLARED_LEN)]
    BadLength(u32),
    #[error("compressed data offset 0x{0:X} is past the end of the ROM")]
    CompOutOfBounds(u32),
    #[error("raw data offset 0x{0:X} is past the end of the ROM")]
    UncompOutOfBounds(u32),
}

/// A header that passed validation against the buffer it was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    anchor: usize,
    declared_len: u32,
    comp_offset: u32,
    uncomp_offset: u32,
}

impl Header {
    /// Reads the header at `anchor`. Returns `None` if the magic isn't there
    /// or the header would run off the end of `src`.
    pub fn read(src: &[u8], anchor: usize) -> Option<Header> {
        let end = anchor.checked_add(HEADER_SIZE)?;
        if src.get(anchor..end)?[..4] != MAGIC[..] {
            return None;
        }

        Some(Header {
            anchor,
            declared_len: read_be(src, anchor + 4)?,
            comp_offset: read_be(src, anchor + 8)?,
            uncomp_offset: read_be(src, anchor + 12)?,
        })
    }

    /// Checks the declared fields against a buffer of `src_len` bytes.
    pub fn validate(&self, src_len: usize) -> Result<Candidate, Rejection> {
        if self.declared_len == 0 || self.declared_len > MAX_DECLARED_LEN {
            return Err(Rejection::BadLength(self.declared_len));
        }

        let in_bounds = |offset: u32| {
            self.anchor
                .checked_add(offset as usize)
                .map_or(false, |pos| pos < src_len)
        };

        if !in_bounds(self.comp_offset) {
            return Err(Rejection::CompOutOfBounds(self.comp_offset));
        }
        if !in_bounds(self.uncomp_offset) {
            return Err(Rejection::UncompOutOfBounds(self.uncomp_offset));
        }

        Ok(Candidate {
            anchor: self.anchor,
            declared_len: self.declared_len,
            comp_offset: self.comp_offset,
            uncomp_offset: self.uncomp_offset,
        })
    }
}

impl Candidate {
    pub fn anchor(&self) -> usize {
        self.anchor
    }

    pub fn declared_len(&self) -> u32 {
        self.declared_len
    }

    pub fn comp_offset(&self) -> u32 {
        self.comp_offset
    }

    pub fn uncomp_offset(&self) -> u32 {
        self.uncomp_offset
    }

    /// Absolute position of the first control byte
    pub fn comp_start(&self) -> usize {
        self.anchor + self.comp_offset as usize
    }

    /// Absolute position of the first literal byte
    pub fn uncomp_start(&self) -> usize {
        self.anchor + self.uncomp_offset as usize
    }
}

/// Validates `header` against `src`. A rejected header is just `None`.
pub fn validate_header(src: &[u8], header: &Header) -> Option<Candidate> {
    header.validate(src.len()).ok()
}

/// Decompressed output along with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlock {
    pub anchor: usize,
    pub bytes: Vec<u8>,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The control/back-reference stream ran past the end of the buffer
    #[error("comp overflow at 0x{at:X}")]
    CompStreamOverflow { at: usize },
    /// The literal stream ran past the end of the buffer
    #[error("uncomp overflow at 0x{at:X}")]
    UncompStreamOverflow { at: usize },
    /// A back-reference pointed before the start of the output
    #[error("back-reference at output position {position} reaches {distance} bytes before the start")]
    BackrefOutOfRange { position: usize, distance: usize },
}

/// What to do with a back-reference that points before the first output byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackrefPolicy {
    /// Start copying from output position 0 instead. This is what existing
    /// extraction tools do, so it is the default.
    Clamp,
    /// Fail with [`DecodeError::BackrefOutOfRange`].
    Strict,
}

impl Default for BackrefPolicy {
    fn default() -> Self {
        BackrefPolicy::Clamp
    }
}

/// Decompresses a validated MIO0 block using the default back-reference policy
pub fn decode(src: &[u8], candidate: &Candidate) -> Result<Vec<u8>, DecodeError> {
    decode_with(src, candidate, BackrefPolicy::default())
}

/// Decompresses a validated MIO0 block
///
/// The output is exactly `declared_len` bytes long. No byte past what is
/// needed to produce that many bytes is read from either stream.
pub fn decode_with(
    src: &[u8],
    candidate: &Candidate,
    policy: BackrefPolicy,
) -> Result<Vec<u8>, DecodeError> {
    let len = candidate.declared_len() as usize;

    // Preallocated so that a clamped reference reads zeroes for bytes not yet written
    let mut dst = vec![0_u8; len];
    let mut dst_pos = 0_usize;

    let mut comp = Cursor::new(src);
    comp.set_position(candidate.comp_start() as u64);
    let mut raw = Cursor::new(src);
    raw.set_position(candidate.uncomp_start() as u64);

    let mut bits = IBitStream::<u8, BigEndian>::new();

    while dst_pos < len {
        let at = comp.position() as usize;
        let literal = bits
            .get(&mut comp)
            .map_err(|_| DecodeError::CompStreamOverflow { at })?;

        if literal {
            let at = raw.position() as usize;
            dst[dst_pos] = raw
                .read_u8()
                .map_err(|_| DecodeError::UncompStreamOverflow { at })?;
            dst_pos += 1;
        } else {
            let at = comp.position() as usize;
            if src.len().saturating_sub(at) < 2 {
                return Err(DecodeError::CompStreamOverflow { at });
            }
            let pair = ReadOrdered::<u16>::read_ordered::<BigEndian>(&mut comp)
                .map_err(|_| DecodeError::CompStreamOverflow { at })?;

            let distance = (pair & 0x0FFF) as usize;
            let count = (pair >> 12) as usize + 3;

            let mut src_idx = match dst_pos.checked_sub(distance + 1) {
                Some(idx) => idx,
                None => match policy {
                    BackrefPolicy::Clamp => 0,
                    BackrefPolicy::Strict => {
                        return Err(DecodeError::BackrefOutOfRange {
                            position: dst_pos,
                            distance,
                        })
                    }
                },
            };

            // Byte at a time, so a run can repeat what it has just written
            for _ in 0..count {
                if dst_pos >= len {
                    break;
                }
                dst[dst_pos] = dst[src_idx];
                dst_pos += 1;
                src_idx += 1;
            }
        }
    }

    Ok(dst)
}

/// Reads, validates and decodes the block whose magic is at `anchor`
pub fn decode_at(src: &[u8], anchor: usize) -> crate::Result<DecodedBlock> {
    let header = Header::read(src, anchor).ok_or(crate::Error::NotMio0(anchor))?;
    let candidate = header
        .validate(src.len())
        .map_err(|reason| crate::Error::Rejected { anchor, reason })?;

    let bytes = decode(src, &candidate)?;
    Ok(DecodedBlock { anchor, bytes })
}
