//! Brute-force search for MIO0 signatures
//!
//! Every byte position in the region is tested, including positions inside
//! blocks that were already found, so nested or overlapping hits are all
//! reported.

mod region;

pub use region::{select_region, ScanRegion, STANDARD_ROM_SIZE};

use crate::mio0::{Header, HEADER_SIZE, MAGIC};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag for stopping a scan from another thread
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Yields the header at every `"MIO0"` hit, in ascending offset order
pub struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
    end: usize,
    cancel: Option<CancelToken>,
    cancelled: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a [u8], region: ScanRegion) -> Self {
        // Positions below `region.end - 16`, and only those with a full
        // header's worth of bytes left in `src`
        let last_in_src = src
            .len()
            .checked_sub(HEADER_SIZE)
            .map_or(0, |last| last + 1);
        let end = region.end.saturating_sub(HEADER_SIZE).min(last_in_src);

        Self {
            src,
            pos: region.start,
            end,
            cancel: None,
            cancelled: false,
        }
    }

    /// Checks `token` once per scan position and stops when it is set
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The next position that will be examined
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether the scan ended because of the cancel token
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Header;

    fn next(&mut self) -> Option<Header> {
        while self.pos < self.end {
            if self.cancel.as_ref().map_or(false, CancelToken::is_cancelled) {
                self.cancelled = true;
                return None;
            }

            let anchor = self.pos;
            self.pos += 1;

            if self.src[anchor..anchor + MAGIC.len()] == MAGIC[..] {
                if let Some(header) = Header::read(self.src, anchor) {
                    return Some(header);
                }
            }
        }

        None
    }
}
