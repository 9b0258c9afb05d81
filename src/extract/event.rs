use crate::mio0::{DecodeError, Rejection};
use crate::scan::ScanRegion;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::Level;

/// One observable step of an extraction run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    RegionSelected { region: ScanRegion, rom_len: usize },
    /// A signature whose header failed validation
    Rejected { anchor: usize, reason: Rejection },
    /// A signature that passed validation and is about to be decoded
    Accepted { anchor: usize, declared_len: u32 },
    Extracted { anchor: usize, path: PathBuf, len: usize },
    DecodeFailed { anchor: usize, error: DecodeError },
    WriteFailed { anchor: usize, path: PathBuf, error: String },
    Cancelled { position: usize },
    Finished { extracted: usize },
}

impl ScanEvent {
    /// ROM offset the event refers to, if any
    pub fn anchor(&self) -> Option<usize> {
        match *self {
            ScanEvent::Rejected { anchor, .. }
            | ScanEvent::Accepted { anchor, .. }
            | ScanEvent::Extracted { anchor, .. }
            | ScanEvent::DecodeFailed { anchor, .. }
            | ScanEvent::WriteFailed { anchor, .. } => Some(anchor),
            _ => None,
        }
    }

    /// Log level for the event. Nothing is logged above `INFO`.
    pub fn level(&self) -> Level {
        match self {
            ScanEvent::Rejected { .. } => Level::TRACE,
            ScanEvent::Accepted { .. } => Level::DEBUG,
            _ => Level::INFO,
        }
    }

    pub(crate) fn trace(&self) {
        match self.level() {
            Level::TRACE => tracing::trace!("{}", self),
            Level::DEBUG => tracing::debug!("{}", self),
            _ => tracing::info!("{}", self),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl fmt::Display for ScanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanEvent::RegionSelected { region, rom_len } => {
                if region.is_extended() {
                    writeln!(f, "Extended ROM detected ({} bytes)", rom_len)?;
                    write!(
                        f,
                        "Scanning region: 0x{:X} – 0x{:X}",
                        region.start, region.end
                    )
                } else {
                    writeln!(f, "Normal ROM detected (8 MB)")?;
                    write!(
                        f,
                        "Scanning region: 0x{:X} – 0x{:X}",
                        region.start,
                        region.end.saturating_sub(1)
                    )
                }
            }
            ScanEvent::Rejected { anchor, reason } => {
                write!(f, "Rejected MIO0 at 0x{:X}: {}", anchor, reason)
            }
            ScanEvent::Accepted {
                anchor,
                declared_len,
            } => write!(
                f,
                "Valid MIO0 at 0x{:X} ({} bytes) → {}",
                anchor,
                declared_len,
                super::file_stem(*anchor)
            ),
            ScanEvent::Extracted { path, len, .. } => {
                write!(f, "→ Extracted {} ({} bytes)", file_name(path), len)
            }
            ScanEvent::DecodeFailed { anchor, error } => {
                write!(f, "Failed to decode MIO0 at 0x{:X}: {}", anchor, error)
            }
            ScanEvent::WriteFailed {
                anchor,
                path,
                error,
            } => write!(
                f,
                "Failed to write {} for MIO0 at 0x{:X}: {}",
                file_name(path),
                anchor,
                error
            ),
            ScanEvent::Cancelled { position } => {
                write!(f, "Scan cancelled at 0x{:X}", position)
            }
            ScanEvent::Finished { extracted } => {
                write!(f, "Finished. Extracted {} files.", extracted)
            }
        }
    }
}

/// Receives events as an extraction run produces them
pub trait EventSink {
    fn event(&mut self, event: &ScanEvent);
}

impl<F: FnMut(&ScanEvent)> EventSink for F {
    fn event(&mut self, event: &ScanEvent) {
        self(event)
    }
}

/// Sink that drops everything
pub struct Discard;

impl EventSink for Discard {
    fn event(&mut self, _event: &ScanEvent) {}
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn failures_are_not_logged_as_warnings() {
        let events = [
            ScanEvent::Rejected {
                anchor: 0x10,
                reason: Rejection::BadLength(0),
            },
            ScanEvent::DecodeFailed {
                anchor: 0x10,
                error: DecodeError::CompStreamOverflow { at: 0x20 },
            },
            ScanEvent::WriteFailed {
                anchor: 0x10,
                path: PathBuf::from("mio0_000010.bin"),
                error: "denied".to_string(),
            },
            ScanEvent::Finished { extracted: 0 },
        ];

        // The CLI's default filter is `warn`, so none of these reach stderr
        // on top of the sink's own output
        for event in &events {
            // More verbose levels compare greater
            assert!(event.level() >= Level::INFO, "{:?}", event);
        }
        assert_eq!(events[0].level(), Level::TRACE);
    }

    #[test]
    fn region_lines() {
        let normal = ScanEvent::RegionSelected {
            region: ScanRegion::new(0, 0x80_0000),
            rom_len: 0x80_0000,
        };
        assert_eq!(
            normal.to_string(),
            "Normal ROM detected (8 MB)\nScanning region: 0x0 – 0x7FFFFF"
        );

        let extended = ScanEvent::RegionSelected {
            region: ScanRegion::new(0x80_0000, 0x200_0000),
            rom_len: 0x200_0000,
        };
        assert_eq!(
            extended.to_string(),
            "Extended ROM detected (33554432 bytes)\nScanning region: 0x800000 – 0x2000000"
        );
    }

    #[test]
    fn candidate_lines() {
        let accepted = ScanEvent::Accepted {
            anchor: 0x10_8A40,
            declared_len: 4096,
        };
        assert_eq!(
            accepted.to_string(),
            "Valid MIO0 at 0x108A40 (4096 bytes) → mio0_108A40"
        );

        let extracted = ScanEvent::Extracted {
            anchor: 0x1000,
            path: PathBuf::from("out").join("mio0_001000.bin"),
            len: 32,
        };
        assert_eq!(extracted.to_string(), "→ Extracted mio0_001000.bin (32 bytes)");
        assert_eq!(extracted.anchor(), Some(0x1000));

        let failed = ScanEvent::DecodeFailed {
            anchor: 0xABC,
            error: DecodeError::UncompStreamOverflow { at: 0x20 },
        };
        assert_eq!(
            failed.to_string(),
            "Failed to decode MIO0 at 0xABC: uncomp overflow at 0x20"
        );

        assert_eq!(failed.level(), Level::INFO);

        let finished = ScanEvent::Finished { extracted: 2 };
        assert_eq!(finished.to_string(), "Finished. Extracted 2 files.");
        assert_eq!(finished.anchor(), None);
    }
}
