//! Range encoder.

use super::{COUNT_MAX_T, FIBONACCI, FIRST_QTR, HALF, STREAM_END_BASE, STREAM_END_VALUE, THIRD_QTR, bits_count};
use crate::bits::BitBuf;
use crate::error::{Error, Result};
use crate::interval::Interval;
use crate::model::FrequencyModel;

/// Encodes a sequence of probability intervals into a bit stream.
///
/// Symbols are written through [`write_part`](Self::write_part) and its
/// convenience wrappers; [`finish`](Self::finish) seals the stream with
/// the end sentinel and flushes the pending carry bits. A stream that
/// was not sealed cannot be decoded reliably.
#[derive(Debug, Clone)]
pub struct RangeEncoder {
    bits: BitBuf,
    low: u32,
    high: u32,
    pending: usize,
}

impl Default for RangeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RangeEncoder {
    /// An encoder with the full range open.
    pub fn new() -> Self {
        Self {
            bits: BitBuf::new(),
            low: 0,
            high: u32::MAX,
            pending: 0,
        }
    }

    /// Number of bits emitted so far, not counting pending underflow
    /// bits.
    pub fn bit_len(&self) -> usize {
        self.bits.len()
    }

    /// Writes one interval: `length` slots out of `base`, starting at
    /// `lower`.
    pub fn write_part(&mut self, interval: Interval) -> Result<()> {
        interval.check()?;
        self.narrow(interval.lower, interval.length, interval.base);
        Ok(())
    }

    /// Writes `symbol` drawn uniformly from an alphabet of `base`
    /// symbols.
    pub fn write_equal(&mut self, symbol: u32, base: u32) -> Result<()> {
        if base == 0 || symbol >= base {
            return Err(Error::SymbolOutOfRange { symbol, base });
        }
        self.narrow(symbol, 1, base);
        Ok(())
    }

    /// Writes the symbol at `index` with the weights of `model`.
    pub fn write_model<M: FrequencyModel + ?Sized>(&mut self, model: &M, index: usize) -> Result<()> {
        if index >= model.len() {
            return Err(Error::SymbolOutOfRange {
                symbol: index as u32,
                base: model.len() as u32,
            });
        }
        self.write_part(model.interval_for(index))
    }

    /// Writes a positive integer as a self-delimiting Zeckendorf
    /// (Fibonacci) code. Two consecutive one-bits terminate the code.
    pub fn write_fibonacci(&mut self, number: u32) -> Result<()> {
        if number == 0 {
            return Err(Error::FibonacciZero);
        }
        let mut remaining = number;
        let top = FIBONACCI
            .iter()
            .rposition(|&f| f <= remaining)
            .unwrap_or(0);
        let mut bits = vec![false; top + 2];
        bits[top] = true;
        bits[top + 1] = true;
        remaining -= FIBONACCI[top];
        let mut i = top as isize - 1;
        while i >= 0 {
            if FIBONACCI[i as usize] <= remaining {
                bits[i as usize] = true;
                remaining -= FIBONACCI[i as usize];
                i -= 2;
            } else {
                i -= 1;
            }
        }
        for bit in bits {
            self.write_equal(u32::from(bit), 2)?;
        }
        Ok(())
    }

    /// Writes a non-negative integer as an exponent-then-offset pair:
    /// the bit length of the value, then the value stripped of its top
    /// bit. Counts of `2^31` and above do not fit the exponent alphabet
    /// and are rejected.
    pub fn write_count(&mut self, count: u32) -> Result<()> {
        self.write_count_with(count, COUNT_MAX_T)
    }

    pub(crate) fn write_count_with(&mut self, count: u32, max_t: u32) -> Result<()> {
        let t = bits_count(count).saturating_sub(1);
        self.write_equal(t, max_t)?;
        let t2 = 1u32 << t.max(1);
        let offset = if t == 0 { 0 } else { t2 };
        self.write_equal(count - offset, t2)
    }

    /// Seals the stream: writes the end sentinel, disambiguates the
    /// final quarter and returns the encoded bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.narrow(STREAM_END_VALUE, 1, STREAM_END_BASE);
        self.pending += 1;
        let final_bit = self.low >= FIRST_QTR;
        self.follow(final_bit);
        self.bits.into_bytes()
    }

    fn narrow(&mut self, lower: u32, length: u32, base: u32) {
        let olow = u64::from(self.low);
        let range = u64::from(self.high) - olow + 1;
        let base = u64::from(base);
        self.low = (olow + u64::from(lower) * range / base) as u32;
        self.high = (olow + u64::from(lower + length) * range / base - 1) as u32;
        loop {
            if self.high < HALF {
                self.follow(false);
            } else if self.low >= HALF {
                self.follow(true);
                self.low -= HALF;
                self.high -= HALF;
            } else if self.low >= FIRST_QTR && self.high < THIRD_QTR {
                self.pending += 1;
                self.low -= FIRST_QTR;
                self.high -= FIRST_QTR;
            } else {
                break;
            }
            // Wrapping: a base wider than the live range (the stream-end
            // sentinel) momentarily inverts the interval; the original
            // coder runs the doubling on unchecked `uint`s and the wrap
            // self-heals to the full range while emitting correct bits.
            self.low = self.low.wrapping_add(self.low);
            self.high = self.high.wrapping_add(self.high).wrapping_add(1);
        }
        // Renormalization leaves the range straddling the midpoint and
        // at least a quarter wide.
        debug_assert!(self.low < HALF && self.high >= HALF);
        debug_assert!(self.high - self.low >= FIRST_QTR);
    }

    // Emits `bit` followed by the buffered underflow bits, inverted.
    fn follow(&mut self, bit: bool) {
        self.bits.push(bit);
        self.bits.push_repeat(!bit, self.pending);
        self.pending = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_symbols() {
        let mut enc = RangeEncoder::new();
        assert!(matches!(
            enc.write_equal(4, 4),
            Err(Error::SymbolOutOfRange { symbol: 4, base: 4 })
        ));
        assert!(enc.write_equal(0, 0).is_err());
        assert!(enc.write_part(Interval::with_length(3, 2, 4)).is_err());
    }

    #[test]
    fn fibonacci_zero_is_a_contract_violation() {
        let mut enc = RangeEncoder::new();
        let err = enc.write_fibonacci(0).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn sealed_stream_is_nonempty() {
        let out = RangeEncoder::new().finish();
        assert!(!out.is_empty());
    }

    #[test]
    fn renormalization_keeps_the_range_wide() {
        // Drives `narrow` across many bases and symbols; the debug
        // assertions after each renormalization check the range
        // invariant on every write.
        let mut enc = RangeEncoder::new();
        for base in 2u32..600 {
            for s in 0..4 {
                enc.write_equal(s * 97 % base, base).unwrap();
            }
        }
        assert!(!enc.finish().is_empty());
    }

    #[test]
    fn narrowing_emits_settled_bits() {
        let mut enc = RangeEncoder::new();
        // Repeatedly writing symbol 0 of 2 pins the range to the lower
        // half, settling one zero bit per write.
        for _ in 0..16 {
            enc.write_equal(0, 2).unwrap();
        }
        assert_eq!(enc.bit_len(), 16);
    }
}
