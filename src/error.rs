//! Error types for encoding and decoding.

use thiserror::Error;

/// The error type returned by every fallible operation in this crate.
///
/// Errors fall into two families: *contract violations*, raised when a
/// caller hands the encoder an impossible symbol description, and
/// *corruption errors*, raised when a decoder meets a bit stream that no
/// encoder could have produced.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A symbol index does not fit the alphabet it was written against.
    #[error("symbol {symbol} out of range for base {base}")]
    SymbolOutOfRange { symbol: u32, base: u32 },

    /// An interval triple violates `lower + length <= base` or has a
    /// zero length or base.
    #[error("invalid interval ({lower}, {length} of {base})")]
    InvalidInterval { lower: u32, length: u32, base: u32 },

    /// The Fibonacci code is defined for positive integers only.
    #[error("cannot write a Fibonacci code for zero")]
    FibonacciZero,

    /// The decoder met data that no well-formed encoder output
    /// contains. `position` is a bit offset for bit-stream readers and
    /// an element index for list-level decoding.
    #[error("corrupt stream at position {position}: {reason}")]
    CorruptStream { position: usize, reason: &'static str },

    /// A stream header carries parameters that contradict each other.
    #[error("invalid stream parameters: {reason}")]
    InvalidParameters { reason: &'static str },
}

impl Error {
    pub(crate) fn corrupt(position: usize, reason: &'static str) -> Self {
        Error::CorruptStream { position, reason }
    }

    /// Returns `true` if the error reports misuse of the encoding API
    /// rather than a problem with the input stream.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::SymbolOutOfRange { .. } | Error::InvalidInterval { .. } | Error::FibonacciZero
        )
    }

    /// Returns `true` if the error was caused by a malformed or
    /// truncated input stream.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::CorruptStream { .. } | Error::InvalidParameters { .. }
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
