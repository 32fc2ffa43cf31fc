//! Growable bit buffer shared by the range coder.
//!
//! Bits are stored LSB-first within each byte, so bit `i` lives at
//! `bytes[i / 8] >> (i % 8)`. The decoder reads past the end of the
//! buffer as an endless run of zero bits; the encoder's terminator
//! makes that safe.

/// An append-only sequence of bits backed by a `Vec<u8>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitBuf {
    bytes: Vec<u8>,
    len: usize,
}

impl BitBuf {
    /// An empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty buffer with room for `bits` bits.
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bits.div_ceil(8)),
            len: 0,
        }
    }

    /// Wraps raw bytes for reading; every byte contributes eight bits.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let len = bytes.len() * 8;
        Self { bytes, len }
    }

    /// Number of bits pushed so far.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no bit has been pushed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends one bit.
    pub fn push(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.bytes.push(0);
        }
        if bit {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 1 << (self.len % 8);
        }
        self.len += 1;
    }

    /// Appends `count` copies of `bit`.
    pub fn push_repeat(&mut self, bit: bool, count: usize) {
        for _ in 0..count {
            self.push(bit);
        }
    }

    /// Bit at position `i`, or zero when `i` is past the end.
    pub fn bit_or_zero(&self, i: usize) -> u32 {
        if i >= self.len {
            return 0;
        }
        u32::from(self.bytes[i / 8] >> (i % 8)) & 1
    }

    /// Unwraps the backing bytes; trailing pad bits are zero.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
