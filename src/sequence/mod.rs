//! Functions for reading the audio sequence bank of a US SM64 ROM
//!
//! The bank starts at [`MUSIC_START`] with a small header:
//!
//! ```text
//! u16 revision
//! u16 count
//! count * { u32 start, u32 length }
//! ```
//!
//! All values are big-endian, and `start` is relative to the bank.

use crate::io_traits::read_be;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MUSIC_START: usize = 0x7B_0860;
pub const MUSIC_END: usize = 0x7C_C620;

const ENTRY_SIZE: usize = 8;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceError {
    #[error("invalid sequence header (rev={revision}, count={count})")]
    InvalidHeader { revision: u16, count: u16 },
}

/// Display name for a sequence id, `"Unknown"` for ids without one.
pub fn song_name(id: usize) -> &'static str {
    match id {
        0x00 => "Lakitu Intro",
        0x01 => "Title Screen",
        0x02 => "Bob-omb Battlefield",
        0x03 => "Inside Castle",
        0x04 => "Snow Mountain",
        0x05 => "Slider",
        0x06 => "Metal Cap",
        0x07 => "Bowser's Road",
        0x08 => "Wing Cap",
        0x09 => "Dire Dire Docks",
        0x0A => "Big Boo's Haunt",
        0x0B => "Koopa's Road",
        0x0C => "Boss",
        0x0E => "Bowser Battle",
        0x12 => "Castle Grounds",
        0x13 => "Final Bowser",
        0x19 => "Ending",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceEntry {
    /// Index in the bank
    pub id: usize,
    /// Where this entry sits in the bank header
    pub table_offset: usize,
    /// Absolute ROM offset of the sequence data
    pub rom_offset: usize,
    pub length: usize,
}

impl SequenceEntry {
    pub fn name(&self) -> &'static str {
        song_name(self.id)
    }

    /// One past the last byte of the sequence
    pub fn end(&self) -> usize {
        self.rom_offset + self.length
    }

    pub fn dump_file_name(&self) -> String {
        format!("seq_{:02X}_0x{:06X}.txt", self.id, self.rom_offset)
    }

    pub fn range_line(&self) -> String {
        format!("RANGE: {:06X}-{:06X}", self.rom_offset, self.end())
    }
}

impl fmt::Display for SequenceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:02X}] {} @0x{:06X} (len={})",
            self.id,
            self.name(),
            self.rom_offset,
            self.length
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceBank {
    pub revision: u16,
    pub count: u16,
    /// Entries that passed the bounds checks, in table order
    pub entries: Vec<SequenceEntry>,
}

impl SequenceBank {
    pub fn get(&self, id: usize) -> Option<&SequenceEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }
}

/// Parses the sequence bank header.
///
/// A ROM too short to hold the header gives an empty bank. Entries that
/// point outside the bank are skipped.
pub fn parse(src: &[u8]) -> Result<SequenceBank, SequenceError> {
    let header = (
        read_be::<u16>(src, MUSIC_START),
        read_be::<u16>(src, MUSIC_START + 2),
    );
    let (revision, count) = match header {
        (Some(revision), Some(count)) => (revision, count),
        _ => return Ok(SequenceBank::default()),
    };

    let table_start = MUSIC_START + 4;
    let table_end = table_start + count as usize * ENTRY_SIZE;
    if count == 0 || table_end > MUSIC_END || table_end > src.len() {
        return Err(SequenceError::InvalidHeader { revision, count });
    }

    let mut entries = Vec::new();
    for id in 0..count as usize {
        let table_offset = table_start + id * ENTRY_SIZE;
        // The table is in bounds, so these reads can't fail
        let rel_start = read_be::<u32>(src, table_offset).unwrap_or_default() as i32;
        let length = read_be::<u32>(src, table_offset + 4).unwrap_or_default() as i32;

        if rel_start < 0 || length <= 0 {
            continue;
        }

        let rom_offset = MUSIC_START + rel_start as usize;
        let end = rom_offset + length as usize;
        if end > MUSIC_END || end > src.len() {
            tracing::trace!(
                "Skipping sequence {:02X}: 0x{:X}..0x{:X} is outside the bank",
                id,
                rom_offset,
                end
            );
            continue;
        }

        entries.push(SequenceEntry {
            id,
            table_offset,
            rom_offset,
            length: length as usize,
        });
    }

    tracing::debug!(
        "Parsed {} sequences (rev={}, count={})",
        entries.len(),
        revision,
        count
    );

    Ok(SequenceBank {
        revision,
        count,
        entries,
    })
}

/// Writes one `0xOFFSET: XX` line per byte of the sequence.
///
/// The range is cut short at the end of `src`.
pub fn hex_dump<W: Write + ?Sized>(
    src: &[u8],
    entry: &SequenceEntry,
    dst: &mut W,
) -> std::io::Result<()> {
    let start = entry.rom_offset.min(src.len());
    let end = entry.end().min(src.len());

    for (offset, byte) in (start..end).zip(&src[start..end]) {
        writeln!(dst, "0x{:06X}: {:02X}", offset, byte)?;
    }

    Ok(())
}

/// Writes the hex dump of `entry` to its own file in `dir`
pub fn export_one(src: &[u8], entry: &SequenceEntry, dir: &Path) -> std::io::Result<PathBuf> {
    let path = dir.join(entry.dump_file_name());
    let mut file = std::io::BufWriter::new(std::fs::File::create(&path)?);
    hex_dump(src, entry, &mut file)?;
    file.flush()?;
    Ok(path)
}

/// Dumps every sequence in the bank, returning how many were written.
/// A file that fails to write is logged and skipped.
pub fn export_all(src: &[u8], bank: &SequenceBank, dir: &Path) -> usize {
    bank.entries
        .iter()
        .filter(|entry| match export_one(src, entry, dir) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!("Failed to export {}: {}", entry.dump_file_name(), err);
                false
            }
        })
        .count()
}

/// Writes a `RANGE:` line for every entry
pub fn export_ranges<'a, I, W>(entries: I, dst: &mut W) -> std::io::Result<()>
where
    I: IntoIterator<Item = &'a SequenceEntry>,
    W: Write + ?Sized,
{
    for entry in entries {
        writeln!(dst, "{}", entry.range_line())?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    /// A ROM just long enough to hold the bank, with the given table
    fn rom_with_table(revision: u16, table: &[(u32, u32)]) -> Vec<u8> {
        let mut rom = vec![0; MUSIC_END];
        rom[MUSIC_START..MUSIC_START + 2].copy_from_slice(&revision.to_be_bytes());
        rom[MUSIC_START + 2..MUSIC_START + 4].copy_from_slice(&(table.len() as u16).to_be_bytes());

        for (i, (start, length)) in table.iter().enumerate() {
            let at = MUSIC_START + 4 + i * ENTRY_SIZE;
            rom[at..at + 4].copy_from_slice(&start.to_be_bytes());
            rom[at + 4..at + 8].copy_from_slice(&length.to_be_bytes());
        }

        rom
    }

    #[test]
    fn names() {
        assert_eq!(song_name(0x02), "Bob-omb Battlefield");
        assert_eq!(song_name(0x19), "Ending");
        assert_eq!(song_name(0x0D), "Unknown");
        assert_eq!(song_name(0x400), "Unknown");
    }

    #[test]
    fn parses_table() {
        let rom = rom_with_table(3, &[(0x20, 0x10), (0x30, 0x08)]);
        let bank = parse(&rom).unwrap();

        assert_eq!(bank.revision, 3);
        assert_eq!(bank.count, 2);
        assert_eq!(
            bank.entries,
            vec![
                SequenceEntry {
                    id: 0,
                    table_offset: MUSIC_START + 4,
                    rom_offset: MUSIC_START + 0x20,
                    length: 0x10,
                },
                SequenceEntry {
                    id: 1,
                    table_offset: MUSIC_START + 12,
                    rom_offset: MUSIC_START + 0x30,
                    length: 0x08,
                },
            ]
        );
        assert_eq!(bank.get(1).map(|entry| entry.length), Some(8));
        assert_eq!(bank.get(2), None);
    }

    #[test]
    fn skips_bad_entries() {
        let bank_len = (MUSIC_END - MUSIC_START) as u32;
        let rom = rom_with_table(
            0,
            &[
                (0x20, 0),           // empty
                (0x8000_0000, 0x10), // negative start
                (0x20, 0x8000_0000), // negative length
                (bank_len - 4, 8),   // runs past the bank
                (bank_len - 8, 8),   // ends exactly at the bank end
            ],
        );

        let bank = parse(&rom).unwrap();
        let ids = bank.entries.iter().map(|entry| entry.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![4]);
    }

    #[test]
    fn short_rom_gives_empty_bank() {
        assert_eq!(parse(&[0; 0x100]), Ok(SequenceBank::default()));
        assert_eq!(parse(&vec![0; MUSIC_START + 3]), Ok(SequenceBank::default()));
    }

    #[test]
    fn invalid_headers() {
        let rom = rom_with_table(7, &[]);
        assert_eq!(
            parse(&rom),
            Err(SequenceError::InvalidHeader {
                revision: 7,
                count: 0
            })
        );

        let mut rom = rom_with_table(1, &[(0x20, 0x10)]);
        rom.truncate(MUSIC_START + 8);
        assert_eq!(
            parse(&rom),
            Err(SequenceError::InvalidHeader {
                revision: 1,
                count: 1
            })
        );

        let mut rom = rom_with_table(1, &[]);
        rom[MUSIC_START + 2..MUSIC_START + 4].copy_from_slice(&0xFFFF_u16.to_be_bytes());
        assert!(parse(&rom).is_err());
    }

    #[test]
    fn display() {
        let entry = SequenceEntry {
            id: 0x03,
            table_offset: 0,
            rom_offset: 0x7B_1234,
            length: 512,
        };

        assert_eq!(entry.to_string(), "[03] Inside Castle @0x7B1234 (len=512)");
        assert_eq!(entry.dump_file_name(), "seq_03_0x7B1234.txt");
        assert_eq!(entry.range_line(), "RANGE: 7B1234-7B1434");
    }

    #[test]
    fn dumps() {
        let mut rom = rom_with_table(0, &[(0x20, 3)]);
        rom[MUSIC_START + 0x20..MUSIC_START + 0x23].copy_from_slice(&[0x0A, 0xFF, 0x00]);
        let bank = parse(&rom).unwrap();

        let mut dump = Vec::new();
        hex_dump(&rom, &bank.entries[0], &mut dump).unwrap();
        assert_eq!(
            String::from_utf8(dump).unwrap(),
            "0x7B0880: 0A\n0x7B0881: FF\n0x7B0882: 00\n"
        );

        let mut ranges = Vec::new();
        export_ranges(&bank.entries, &mut ranges).unwrap();
        assert_eq!(String::from_utf8(ranges).unwrap(), "RANGE: 7B0880-7B0883\n");
    }

    #[test]
    fn exports_files() {
        let dir = tempfile::tempdir().unwrap();
        let rom = rom_with_table(0, &[(0x20, 2), (0x40, 1)]);
        let bank = parse(&rom).unwrap();

        assert_eq!(export_all(&rom, &bank, dir.path()), 2);

        let first = std::fs::read_to_string(dir.path().join("seq_00_0x7B0880.txt")).unwrap();
        assert_eq!(first, "0x7B0880: 00\n0x7B0881: 00\n");
        assert!(dir.path().join("seq_01_0x7B08A0.txt").exists());

        assert_eq!(export_all(&rom, &bank, &dir.path().join("missing")), 0);
    }
}
