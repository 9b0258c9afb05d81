use std::convert::TryFrom;

/// Size of a retail ROM. Anything larger has been extended by a hack and
/// only the added space past this point is scanned.
pub const STANDARD_ROM_SIZE: u64 = 0x80_0000;

/// Half-open byte range `[start, end)` eligible for signature scanning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRegion {
    pub start: usize,
    pub end: usize,
}

impl ScanRegion {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The region covering all of `src`
    pub fn whole(src: &[u8]) -> Self {
        Self::new(0, src.len())
    }

    /// Whether this region was picked for an extended ROM
    pub fn is_extended(&self) -> bool {
        self.start as u64 >= STANDARD_ROM_SIZE
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Picks the range to scan for a ROM of `total_len` bytes.
///
/// Standard images are always treated as exactly 8 MiB, regardless of the
/// actual length; the scanner clamps the region to the real buffer.
pub fn select_region(total_len: u64) -> ScanRegion {
    let standard = STANDARD_ROM_SIZE as usize;

    if total_len > STANDARD_ROM_SIZE {
        ScanRegion::new(standard, usize::try_from(total_len).unwrap_or(usize::MAX))
    } else {
        ScanRegion::new(0, standard)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn standard_rom() {
        let region = select_region(0x80_0000);
        assert_eq!(region, ScanRegion::new(0, 0x80_0000));
        assert!(!region.is_extended());
    }

    #[test]
    fn short_rom_is_treated_as_standard() {
        assert_eq!(select_region(0), ScanRegion::new(0, 0x80_0000));
        assert_eq!(select_region(0x1234), ScanRegion::new(0, 0x80_0000));
    }

    #[test]
    fn extended_rom() {
        let region = select_region(0x80_0001);
        assert_eq!(region, ScanRegion::new(0x80_0000, 0x80_0001));
        assert!(region.is_extended());

        let region = select_region(0x200_0000);
        assert_eq!(region, ScanRegion::new(0x80_0000, 0x200_0000));
        assert_eq!(region.len(), 0x180_0000);
    }
}
