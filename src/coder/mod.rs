//! 32-bit range coder.
//!
//! The coder works over the full `u32` range split into quarters. Both
//! sides keep a live range `[low, high]`; writing or reading a symbol
//! narrows the range proportionally to the symbol's interval and then
//! renormalizes, shifting out settled bits and tracking underflow near
//! the midpoint. The construction follows the classic Witten-Neal-Cleary
//! scheme, carried out on 64-bit intermediates so the products never
//! overflow.

mod decoder;
mod encoder;

pub use decoder::RangeDecoder;
pub use encoder::RangeEncoder;

/// First quarter boundary of the coding range.
pub(crate) const FIRST_QTR: u32 = (u32::MAX - 1) / 4 + 1;
/// Midpoint of the coding range.
pub(crate) const HALF: u32 = FIRST_QTR * 2;
/// Third quarter boundary of the coding range.
pub(crate) const THIRD_QTR: u32 = FIRST_QTR * 3;

/// Sentinel symbol sealing every encoded stream.
pub const STREAM_END_VALUE: u32 = 1_234_567_890;
/// Alphabet size the sentinel is coded against.
pub const STREAM_END_BASE: u32 = u32::MAX;

/// Largest exponent storable by a default-width counter code.
pub(crate) const COUNT_MAX_T: u32 = 31;

/// Fibonacci numbers that fit in `u32`, starting from 1, 2.
///
/// Indexed by Zeckendorf position; two consecutive one-bits terminate a
/// code, which is why the sequence skips the leading 1, 1.
pub(crate) const FIBONACCI: [u32; 46] = [
    1,
    2,
    3,
    5,
    8,
    13,
    21,
    34,
    55,
    89,
    144,
    233,
    377,
    610,
    987,
    1_597,
    2_584,
    4_181,
    6_765,
    10_946,
    17_711,
    28_657,
    46_368,
    75_025,
    121_393,
    196_418,
    317_811,
    514_229,
    832_040,
    1_346_269,
    2_178_309,
    3_524_578,
    5_702_887,
    9_227_465,
    14_930_352,
    24_157_817,
    39_088_169,
    63_245_986,
    102_334_155,
    165_580_141,
    267_914_296,
    433_494_437,
    701_408_733,
    1_134_903_170,
    1_836_311_903,
    2_971_215_073,
];

/// Number of significant bits in `x`; zero for zero.
pub(crate) const fn bits_count(x: u32) -> u32 {
    32 - x.leading_zeros()
}
