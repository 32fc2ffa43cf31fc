//! LZ77-family match engine over interval streams.
//!
//! The engine rewrites runs of repeated elements into back-reference
//! tokens. Encoding proceeds in stages: [`finder`] discovers repeat
//! candidates by recursive prefix grouping, [`encoder`] keeps the
//! candidates that pay for themselves and rewrites the element stream,
//! and [`decoder`] expands tokens back into elements. Token fields are
//! parameterized per stream by [`split`] policies.

pub mod decoder;
pub mod encoder;
pub mod finder;
pub mod split;

pub use decoder::LzDecoder;
pub use encoder::{LzEncoder, LzOptions, LzOutput};
pub use split::{LzData, SplitMode, SplitPolicy};

/// Exponent width of the short counters in LZ headers.
pub(crate) const COUNT_SHORT: u32 = 16;

/// Matches shorter than this many covered elements are rewritten by
/// parallel workers; longer ones sequentially, since they may overlap
/// worker boundaries.
pub(crate) const LONG_MATCH_BOUND: u64 = 10;

/// A repeat found by the match finder, in stream coordinates.
///
/// The token at `start` copies `(length + 2) * (spiral + 1)` elements
/// from `start - dist - length - 2` onward; a non-zero `spiral` repeats
/// the source period past its own end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub start: u32,
    pub dist: u32,
    pub length: u32,
    pub spiral: u32,
}

impl Candidate {
    /// Number of stream elements the token replaces.
    pub fn covered(&self) -> u64 {
        (u64::from(self.length) + 2) * (u64::from(self.spiral) + 1)
    }
}

#[cfg(feature = "parallel")]
pub(crate) fn worker_count() -> usize {
    rayon::current_num_threads()
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn worker_count() -> usize {
    1
}

/// Width of the escape tail appended to a base when literals must
/// coexist with escape-prefixed tokens.
pub(crate) fn buffer_interval(base: u32) -> u32 {
    ((f64::from(base)).sqrt().ceil() as u32).max(1)
}

/// A base widened by its escape tail.
pub(crate) fn base_with_buffer(base: u32) -> u32 {
    base + buffer_interval(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_grows_with_the_square_root() {
        assert_eq!(buffer_interval(0), 1);
        assert_eq!(buffer_interval(1), 1);
        assert_eq!(buffer_interval(4), 2);
        assert_eq!(buffer_interval(5), 3);
        assert_eq!(buffer_interval(256), 16);
        assert_eq!(base_with_buffer(256), 272);
    }

    #[test]
    fn covered_counts_spiral_repeats() {
        let plain = Candidate {
            start: 10,
            dist: 3,
            length: 4,
            spiral: 0,
        };
        assert_eq!(plain.covered(), 6);
        let spiral = Candidate { spiral: 2, ..plain };
        assert_eq!(spiral.covered(), 18);
    }
}
