//! Loading ROM images and normalizing them to big-endian (`.z64`) order
//!
//! Dumps come in three layouts, told apart by the first word of the image:
//!
//! * `.z64`: native big-endian, `80 37 12 40`
//! * `.v64`: every 16-bit half swapped, `37 80 40 12`
//! * `.n64`: every 32-bit word reversed, `40 12 37 80`
//!
//! Everything else in this crate assumes `.z64` order.

use crate::error::{Error, Result};
use crate::io_traits::read_be;
use std::path::Path;

/// Internal name of the US/JP retail game, found at 0x20
const SM64_TITLE: &str = "SUPER MARIO 64";
const TITLE_OFFSET: usize = 0x20;
const TITLE_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomFormat {
    Z64,
    V64,
    N64,
    /// Unrecognized first word; the data is left as is
    Unknown,
}

impl RomFormat {
    pub fn detect(data: &[u8]) -> RomFormat {
        match read_be::<u32>(data, 0) {
            Some(0x8037_1240) => RomFormat::Z64,
            Some(0x3780_4012) => RomFormat::V64,
            Some(0x4012_3780) => RomFormat::N64,
            _ => RomFormat::Unknown,
        }
    }
}

/// Rewrites `data` in place into `.z64` order, returning the layout it had.
///
/// A trailing partial half-word or word is left untouched.
pub fn normalize(data: &mut [u8]) -> RomFormat {
    let format = RomFormat::detect(data);

    match format {
        RomFormat::V64 => data.chunks_exact_mut(2).for_each(|half| half.swap(0, 1)),
        RomFormat::N64 => data.chunks_exact_mut(4).for_each(|word| word.reverse()),
        RomFormat::Z64 | RomFormat::Unknown => {}
    }

    if format != RomFormat::Z64 {
        tracing::debug!("Converted {:?} image to z64 order in memory", format);
    }

    format
}

/// A ROM image in `.z64` order
#[derive(Debug, Clone)]
pub struct Rom {
    data: Vec<u8>,
    format: RomFormat,
}

impl Rom {
    /// Reads and normalizes the image at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Rom> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| Error::RomRead {
            path: path.to_path_buf(),
            source,
        })?;

        let rom = Rom::from_bytes(data);
        tracing::info!(
            "Opened ROM {} ({} bytes, {:?})",
            path.display(),
            rom.len(),
            rom.format
        );
        Ok(rom)
    }

    pub fn from_bytes(mut data: Vec<u8>) -> Rom {
        let format = normalize(&mut data);
        Rom { data, format }
    }

    /// Layout of the image before normalization
    pub fn original_format(&self) -> RomFormat {
        self.format
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The `len` bytes at `offset`, cut short at the end of the image
    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        let start = offset.min(self.data.len());
        let end = offset.saturating_add(len).min(self.data.len());
        &self.data[start..end]
    }

    /// Internal name from the header, with padding trimmed
    pub fn title(&self) -> String {
        String::from_utf8_lossy(self.bytes(TITLE_OFFSET, TITLE_LEN))
            .trim_end()
            .to_owned()
    }

    pub fn looks_like_sm64(&self) -> bool {
        String::from_utf8_lossy(self.bytes(TITLE_OFFSET, TITLE_LEN)).contains(SM64_TITLE)
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl AsRef<[u8]> for Rom {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn z64_image() -> Vec<u8> {
        let mut data = vec![0x80, 0x37, 0x12, 0x40];
        data.resize(0x40, 0);
        data[0x20..0x34].copy_from_slice(b"SUPER MARIO 64      ");
        data
    }

    fn swap_halves(data: &[u8]) -> Vec<u8> {
        data.chunks(2).flat_map(|half| half.iter().rev().copied()).collect()
    }

    fn reverse_words(data: &[u8]) -> Vec<u8> {
        data.chunks(4).flat_map(|word| word.iter().rev().copied()).collect()
    }

    #[test]
    fn detect() {
        let z64 = z64_image();

        assert_eq!(RomFormat::detect(&z64), RomFormat::Z64);
        assert_eq!(RomFormat::detect(&swap_halves(&z64)), RomFormat::V64);
        assert_eq!(RomFormat::detect(&reverse_words(&z64)), RomFormat::N64);
        assert_eq!(RomFormat::detect(&[0x80, 0x37]), RomFormat::Unknown);
        assert_eq!(RomFormat::detect(b"MIO0"), RomFormat::Unknown);
    }

    #[test]
    fn normalizes_v64() {
        let z64 = z64_image();
        let rom = Rom::from_bytes(swap_halves(&z64));

        assert_eq!(rom.original_format(), RomFormat::V64);
        assert_eq!(rom.as_bytes(), &z64[..]);
    }

    #[test]
    fn normalizes_n64() {
        let z64 = z64_image();
        let rom = Rom::from_bytes(reverse_words(&z64));

        assert_eq!(rom.original_format(), RomFormat::N64);
        assert_eq!(rom.as_bytes(), &z64[..]);
    }

    #[test]
    fn partial_trailing_word() {
        let mut data = reverse_words(&z64_image());
        data.extend_from_slice(&[0xAA, 0xBB, 0xCC]);

        let rom = Rom::from_bytes(data);
        assert_eq!(&rom.as_bytes()[0x40..], [0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn unknown_is_untouched() {
        let data = vec![1, 2, 3, 4, 5, 6];
        let rom = Rom::from_bytes(data.clone());

        assert_eq!(rom.original_format(), RomFormat::Unknown);
        assert_eq!(rom.into_inner(), data);
    }

    #[test]
    fn title() {
        let rom = Rom::from_bytes(z64_image());
        assert!(rom.looks_like_sm64());
        assert_eq!(rom.title(), "SUPER MARIO 64");

        let mut other = z64_image();
        other[0x20..0x34].copy_from_slice(b"ZELDA MAJORA'S MASK ");
        assert!(!Rom::from_bytes(other).looks_like_sm64());

        assert!(!Rom::from_bytes(vec![0; 0x10]).looks_like_sm64());
    }

    #[test]
    fn bytes_are_clamped() {
        let rom = Rom::from_bytes(vec![1, 2, 3, 4]);

        assert_eq!(rom.bytes(1, 2), [2, 3]);
        assert_eq!(rom.bytes(2, 10), [3, 4]);
        assert!(rom.bytes(10, 2).is_empty());
        assert!(rom.bytes(usize::MAX, usize::MAX).is_empty());
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.z64");

        match Rom::open(&path) {
            Err(Error::RomRead { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
