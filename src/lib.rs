//! # rangelz
//!
//! A pure-Rust compression core pairing a 32-bit range coder with an
//! adaptive Lempel-Ziv match engine.
//!
//! Streams are built from [`Interval`]s: a symbol is the pair of a
//! value and the base it is drawn from, and an element of the stream
//! is a short list of such intervals. The range coder turns interval
//! sequences into bits; the match engine rewrites repeated element
//! runs into back-reference tokens whose distance, length, and spiral
//! fields are coded under per-stream split policies derived from the
//! match statistics themselves.
//!
//! ## Quick Start
//!
//! ```rust
//! use rangelz::{bytes, Result};
//!
//! fn main() -> Result<()> {
//!     let data = b"abcabcabcabcabcabcabcabcabcabc".repeat(20);
//!     let packed = bytes::compress(&data)?;
//!     assert!(packed.len() < data.len());
//!     assert_eq!(bytes::decompress(&packed)?, data);
//!     Ok(())
//! }
//! ```
//!
//! Lower layers are public for callers that code their own alphabets:
//!
//! ```rust
//! use rangelz::{Interval, RangeDecoder, RangeEncoder, Result};
//!
//! fn main() -> Result<()> {
//!     let mut enc = RangeEncoder::new();
//!     enc.write_equal(3, 10)?;
//!     enc.write_part(Interval::new(7, 20))?;
//!     enc.write_fibonacci(42)?;
//!     let packed = enc.finish();
//!
//!     let mut dec = RangeDecoder::from_bytes(packed);
//!     assert_eq!(dec.read_equal(10)?, 3);
//!     assert_eq!(dec.read_equal(20)?, 7);
//!     assert_eq!(dec.read_fibonacci()?, 42);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `parallel` | Yes | Multi-threaded match finding with Rayon |
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. [`Error::is_corruption`] separates
//! malformed input streams from caller contract violations.
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bits;
pub mod bytes;
pub mod coder;
pub mod error;
pub mod interval;
pub mod lz;
pub mod model;
pub mod progress;

pub use bits::BitBuf;
pub use error::{Error, Result};
pub use interval::{INLINE_CAP, Interval, IntervalList};

// Re-export the coding API at crate root for convenience
pub use coder::{RangeDecoder, RangeEncoder, STREAM_END_BASE, STREAM_END_VALUE};

// Re-export the frequency models
pub use model::{CumulativeMap, FrequencyModel, SumTable};

// Re-export the match engine API
pub use lz::{LzData, LzDecoder, LzEncoder, LzOptions, LzOutput, SplitMode, SplitPolicy};

// Re-export the progress API
pub use progress::{CountingProgress, NoProgress, ProgressSink};
