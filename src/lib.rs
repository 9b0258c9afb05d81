//! Tools for pulling assets out of Super Mario 64 ROM images:
//! a brute-force scanner and decompressor for MIO0 blocks, and a reader
//! for the audio sequence bank.
//!
//! ```no_run
//! use sm64_extract::extract::extract_all;
//! use sm64_extract::rom::Rom;
//!
//! let rom = Rom::open("sm64.z64")?;
//! let report = extract_all(rom.as_bytes(), "out/");
//! println!("{}", report.summary());
//! # Ok::<(), sm64_extract::Error>(())
//! ```

mod bitstream;
pub mod error;
pub mod extract;
pub mod io_traits;
pub mod mio0;
pub mod rom;
pub mod scan;
pub mod sequence;

pub use error::{Error, Result};
