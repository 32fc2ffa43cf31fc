//! Range decoder.

use super::{COUNT_MAX_T, FIBONACCI, FIRST_QTR, HALF, THIRD_QTR};
use crate::bits::BitBuf;
use crate::error::{Error, Result};
use crate::model::FrequencyModel;

/// Decodes the bit stream produced by [`RangeEncoder`](super::RangeEncoder).
///
/// Every read must mirror the corresponding write with the same
/// parameters; the decoder keeps the same `[low, high]` range as the
/// encoder did and reconstructs symbols from the 32-bit window `value`.
/// Reads past the end of the input see zero bits, which the encoder's
/// sentinel and final flush make unambiguous.
#[derive(Debug, Clone)]
pub struct RangeDecoder {
    bits: BitBuf,
    pos: usize,
    low: u32,
    high: u32,
    value: u32,
}

impl RangeDecoder {
    /// Starts decoding `bytes`, priming the 32-bit window.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bits = BitBuf::from_bytes(bytes.into());
        let mut dec = Self {
            bits,
            pos: 0,
            low: 0,
            high: u32::MAX,
            value: 0,
        };
        for _ in 0..32 {
            dec.value = (dec.value << 1) | dec.next_bit();
        }
        dec
    }

    /// Bit position of the read cursor, counting zero-fill past the
    /// end.
    pub fn bit_pos(&self) -> usize {
        self.pos
    }

    /// Reads a symbol written with `write_equal(_, base)`.
    pub fn read_equal(&mut self, base: u32) -> Result<u32> {
        if base == 0 {
            return Err(Error::InvalidParameters {
                reason: "read over an empty alphabet",
            });
        }
        let symbol = self.freq_below(base);
        self.narrow(symbol, 1, base);
        Ok(symbol)
    }

    /// Reads a symbol written with `write_model` against the same
    /// model, returning its index.
    pub fn read_model<M: FrequencyModel + ?Sized>(&mut self, model: &M) -> Result<usize> {
        let total = model.total_weight();
        if total == 0 {
            return Ok(0);
        }
        let freq = self.freq_below(total);
        let index = model.index_of_cumulative(freq);
        self.narrow(model.weight_left_of(index), model.weight(index), total);
        Ok(index)
    }

    /// Reads a Fibonacci code written with `write_fibonacci`.
    pub fn read_fibonacci(&mut self) -> Result<u32> {
        let mut value = 0u32;
        let mut previous_one = false;
        let mut position = 0usize;
        while self.pos < self.bits.len() {
            let one = self.read_equal(2)? == 1;
            if (one && previous_one) || position == FIBONACCI.len() {
                return Ok(value);
            }
            if one {
                value += FIBONACCI[position];
            }
            position += 1;
            previous_one = one;
        }
        Err(Error::corrupt(self.pos, "unterminated fibonacci code"))
    }

    /// Reads a counter written with `write_count`.
    pub fn read_count(&mut self) -> Result<u32> {
        self.read_count_with(COUNT_MAX_T)
    }

    pub(crate) fn read_count_with(&mut self, max_t: u32) -> Result<u32> {
        let t = self.read_equal(max_t)?;
        let t2 = 1u32 << t.max(1);
        let offset = if t == 0 { 0 } else { t2 };
        Ok(self.read_equal(t2)? + offset)
    }

    // Cumulative frequency of the current value inside a range of
    // `divisor` slots, clamped so corrupt input cannot index past the
    // alphabet.
    fn freq_below(&self, divisor: u32) -> u32 {
        let olow = u64::from(self.low);
        let range = u64::from(self.high) - olow + 1;
        let offset = u64::from(self.value).saturating_sub(olow);
        let freq = ((offset + 1) * u64::from(divisor) - 1) / range;
        freq.min(u64::from(divisor) - 1) as u32
    }

    fn narrow(&mut self, lower: u32, length: u32, base: u32) {
        let olow = u64::from(self.low);
        let range = u64::from(self.high) - olow + 1;
        let base = u64::from(base);
        self.low = (olow + u64::from(lower) * range / base) as u32;
        self.high = (olow + u64::from(lower + length) * range / base - 1) as u32;
        loop {
            if self.high < HALF {
            } else if self.low >= HALF {
                self.low -= HALF;
                self.high -= HALF;
                // Wrapping: corrupt input may put `value` below `low`.
                self.value = self.value.wrapping_sub(HALF);
            } else if self.low >= FIRST_QTR && self.high < THIRD_QTR {
                self.low -= FIRST_QTR;
                self.high -= FIRST_QTR;
                self.value = self.value.wrapping_sub(FIRST_QTR);
            } else {
                break;
            }
            // Wrapping doubling, mirroring the encoder's renormalization.
            self.low = self.low.wrapping_add(self.low);
            self.high = self.high.wrapping_add(self.high).wrapping_add(1);
            self.value = (self.value << 1) | self.next_bit();
        }
        // Same exit invariant as the encoder's renormalization.
        debug_assert!(self.low < HALF && self.high >= HALF);
        debug_assert!(self.high - self.low >= FIRST_QTR);
    }

    fn next_bit(&mut self) -> u32 {
        let bit = self.bits.bit_or_zero(self.pos);
        self.pos += 1;
        bit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coder::RangeEncoder;
    use crate::interval::Interval;
    use crate::model::{CumulativeMap, SumTable};

    #[test]
    fn equal_round_trip() {
        let mut enc = RangeEncoder::new();
        enc.write_equal(3, 5).unwrap();
        let bytes = enc.finish();
        let mut dec = RangeDecoder::from_bytes(bytes);
        assert_eq!(dec.read_equal(5).unwrap(), 3);
    }

    #[test]
    fn mixed_symbols_round_trip() {
        let mut enc = RangeEncoder::new();
        enc.write_equal(0, 2).unwrap();
        enc.write_part(Interval::with_length(10, 6, 100)).unwrap();
        enc.write_equal(255, 256).unwrap();
        enc.write_count(77).unwrap();
        enc.write_fibonacci(1_000_000).unwrap();
        let bytes = enc.finish();

        let mut dec = RangeDecoder::from_bytes(bytes);
        assert_eq!(dec.read_equal(2).unwrap(), 0);
        // Any frequency inside [10, 16) identifies the interval; check
        // via a model with matching weights.
        let model = CumulativeMap::from_weights(&[10, 6, 84]);
        assert_eq!(dec.read_model(&model).unwrap(), 1);
        assert_eq!(dec.read_equal(256).unwrap(), 255);
        assert_eq!(dec.read_count().unwrap(), 77);
        assert_eq!(dec.read_fibonacci().unwrap(), 1_000_000);
    }

    #[test]
    fn model_round_trip_with_adaptation() {
        let symbols = [0usize, 3, 3, 1, 3, 2, 0, 3];
        let mut enc_model = SumTable::uniform(4, 1);
        let mut enc = RangeEncoder::new();
        for &s in &symbols {
            enc.write_model(&enc_model, s).unwrap();
            enc_model.increase(s, 100);
        }
        let bytes = enc.finish();

        let mut dec_model = SumTable::uniform(4, 1);
        let mut dec = RangeDecoder::from_bytes(bytes);
        for &s in &symbols {
            assert_eq!(dec.read_model(&dec_model).unwrap(), s);
            dec_model.increase(s, 100);
        }
    }

    #[test]
    fn fibonacci_round_trip() {
        let values = [1u32, 2, 3, 4, 12, 88, 89, 1_000, 2_971_215_073, u32::MAX];
        let mut enc = RangeEncoder::new();
        for &v in &values {
            enc.write_fibonacci(v).unwrap();
        }
        let mut dec = RangeDecoder::from_bytes(enc.finish());
        for &v in &values {
            assert_eq!(dec.read_fibonacci().unwrap(), v);
        }
    }

    #[test]
    fn count_round_trip() {
        let values = [0u32, 1, 2, 3, 4, 31, 32, 1_000_000, u32::MAX / 2];
        let mut enc = RangeEncoder::new();
        for &v in &values {
            enc.write_count(v).unwrap();
        }
        let mut dec = RangeDecoder::from_bytes(enc.finish());
        for &v in &values {
            assert_eq!(dec.read_count().unwrap(), v);
        }
    }

    #[test]
    fn corrupt_fibonacci_reports_corruption() {
        // The buffer runs out before any terminator appears: expect a
        // corruption error, not a panic.
        let mut dec = RangeDecoder::from_bytes(vec![0x00; 2]);
        let err = dec.read_fibonacci().unwrap_err();
        assert!(err.is_corruption());
    }
}
