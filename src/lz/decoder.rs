//! Token expansion: turns escape-prefixed tokens back into elements.

use super::split::{LzData, SplitMode, SplitPolicy};
use crate::coder::RangeDecoder;
use crate::error::{Error, Result};
use crate::interval::IntervalList;

/// Expands an element stream containing back-reference tokens.
///
/// The stream's first two elements are always literal; from the third
/// on, an element whose first interval reaches its base is a token.
/// Its fields are interpreted with the policies in [`LzData`], and the
/// referenced span is copied from the already-decoded output,
/// repeating the source period when a spiral length is present.
pub struct LzDecoder {
    data: LzData,
}

pub(crate) struct Token {
    pub(crate) dist: u32,
    pub(crate) length: u32,
    pub(crate) spiral: u32,
}

impl LzDecoder {
    /// A decoder for streams parameterized by `data`.
    pub fn new(data: LzData) -> Self {
        Self { data }
    }

    /// Expands every token in `compressed` back into the elements
    /// it covers.
    pub fn decode(&self, compressed: &[IntervalList]) -> Result<Vec<IntervalList>> {
        let mut out: Vec<IntervalList> = Vec::with_capacity(compressed.len());
        for (i, el) in compressed.iter().enumerate() {
            let first = el
                .first()
                .ok_or(Error::corrupt(i, "empty stream element"))?;
            if i < 2 || !first.is_escape() {
                out.push(*el);
                continue;
            }
            let token = self.parse_token(el, out.len(), i)?;
            let start = out.len() as i64
                - i64::from(token.dist)
                - i64::from(token.length)
                - 2;
            if start < 0 {
                return Err(Error::corrupt(i, "back-reference before stream start"));
            }
            let start = start as usize;
            let chunk = token.length as usize + 2;
            let mut remaining =
                (u64::from(token.length) + 2) * (u64::from(token.spiral) + 1);
            while remaining > 0 {
                let take = (chunk as u64).min(remaining) as usize;
                for t in 0..take {
                    let copied = out[start + t];
                    out.push(copied);
                }
                remaining -= take as u64;
            }
        }
        Ok(out)
    }

    pub(crate) fn parse_token(
        &self,
        el: &IntervalList,
        out_len: usize,
        position: usize,
    ) -> Result<Token> {
        let (length, next) = read_list_field(el, 1, &self.data.length, position)?;

        let us = u32::from(self.data.use_spiral);
        let avail = out_len as i64 - i64::from(length) - 2;
        let max_dist = i64::from(self.data.dist.max).min(avail.max(0)) as u32;
        let d = &self.data.dist;
        let lower = |j: usize| -> Result<u32> {
            el.get(j)
                .map(|iv| iv.lower)
                .ok_or(Error::corrupt(position, "truncated token"))
        };

        let effectively_direct = d.mode == SplitMode::Direct || max_dist < d.threshold;
        let dist = if effectively_direct {
            let v = lower(next)?;
            if us == 1 && v == max_dist + 1 {
                return self.finish_spiral(el, next + 1, length, position);
            }
            v
        } else if d.mode == SplitMode::LowHalf {
            let v = lower(next)?;
            if v <= d.threshold {
                v
            } else if v == d.threshold + 1 {
                let v2 = lower(next + 1)?;
                if us == 1 && v2 == max_dist - d.threshold {
                    return self.finish_spiral(el, next + 2, length, position);
                }
                d.threshold + 1 + v2
            } else {
                return Err(Error::corrupt(position, "distance out of range"));
            }
        } else {
            let v = lower(next)?;
            if v <= max_dist - d.threshold {
                v + d.threshold
            } else if v == max_dist - d.threshold + 1 {
                let v2 = lower(next + 1)?;
                if us == 1 && v2 == d.threshold {
                    return self.finish_spiral(el, next + 2, length, position);
                }
                v2
            } else {
                return Err(Error::corrupt(position, "distance out of range"));
            }
        };
        if dist > max_dist {
            return Err(Error::corrupt(position, "distance exceeds window"));
        }
        Ok(Token {
            dist,
            length,
            spiral: 0,
        })
    }

    /// The distance landed on the reserved spiral slot: the distance is
    /// zero and a spiral length follows.
    fn finish_spiral(
        &self,
        el: &IntervalList,
        field: usize,
        length: u32,
        position: usize,
    ) -> Result<Token> {
        let (spiral, _) = read_list_field(el, field, &self.data.spiral, position)?;
        Ok(Token {
            dist: 0,
            length,
            spiral,
        })
    }
}

/// Reads one split-coded field from a token element, returning the
/// value and the index after the field.
fn read_list_field(
    el: &IntervalList,
    f: usize,
    policy: &SplitPolicy,
    position: usize,
) -> Result<(u32, usize)> {
    let lower = |j: usize| -> Result<u32> {
        el.get(j)
            .map(|iv| iv.lower)
            .ok_or(Error::corrupt(position, "truncated token"))
    };
    if policy.is_effectively_direct() {
        let v = lower(f)?;
        if v > policy.max {
            return Err(Error::corrupt(position, "field out of range"));
        }
        return Ok((v, f + 1));
    }
    if policy.mode == SplitMode::LowHalf {
        let v = lower(f)?;
        if v <= policy.threshold {
            Ok((v, f + 1))
        } else if v == policy.threshold + 1 {
            let v2 = lower(f + 1)?;
            let value = policy.threshold + 1 + v2;
            if value > policy.max {
                return Err(Error::corrupt(position, "field out of range"));
            }
            Ok((value, f + 2))
        } else {
            Err(Error::corrupt(position, "field out of range"))
        }
    } else {
        let v = lower(f)?;
        if v <= policy.max - policy.threshold {
            Ok((v + policy.threshold, f + 1))
        } else if v == policy.max - policy.threshold + 1 {
            let v2 = lower(f + 1)?;
            if v2 >= policy.threshold.max(1) {
                return Err(Error::corrupt(position, "field out of range"));
            }
            Ok((v2, f + 2))
        } else {
            Err(Error::corrupt(position, "field out of range"))
        }
    }
}

/// Outcome of reading a token's distance field from the bit stream.
pub(crate) enum DistRead {
    Plain(u32),
    /// The reserved slot: distance is zero, a spiral length follows.
    Spiral,
}

/// Reads a token's length field from the bit stream.
pub(crate) fn read_token_length(dec: &mut RangeDecoder, data: &LzData) -> Result<u32> {
    data.length.read_value(dec, 0)
}

/// Reads a token's distance field from the bit stream, mirroring the
/// encoder's effective bound: `out_len` is the number of elements
/// decoded so far. Returns the distance or the spiral marker.
pub(crate) fn read_token_dist(
    dec: &mut RangeDecoder,
    data: &LzData,
    out_len: usize,
    length: u32,
) -> Result<DistRead> {
    let us = u32::from(data.use_spiral);
    let avail = out_len as i64 - i64::from(length) - 2;
    if avail < 0 {
        return Err(Error::corrupt(
            dec.bit_pos(),
            "token length exceeds decoded prefix",
        ));
    }
    let max_dist = i64::from(data.dist.max).min(avail) as u32;
    let d = &data.dist;
    if d.mode == SplitMode::Direct || max_dist < d.threshold {
        let v = dec.read_equal(max_dist + us + 1)?;
        if us == 1 && v == max_dist + 1 {
            return Ok(DistRead::Spiral);
        }
        Ok(DistRead::Plain(v))
    } else if d.mode == SplitMode::LowHalf {
        let v = dec.read_equal(d.threshold + 2)?;
        if v <= d.threshold {
            return Ok(DistRead::Plain(v));
        }
        let v2 = dec.read_equal(max_dist - d.threshold + us)?;
        if us == 1 && v2 == max_dist - d.threshold {
            return Ok(DistRead::Spiral);
        }
        Ok(DistRead::Plain(d.threshold + 1 + v2))
    } else {
        let v = dec.read_equal(max_dist - d.threshold + us + 2)?;
        if v <= max_dist - d.threshold {
            return Ok(DistRead::Plain(v + d.threshold));
        }
        if v != max_dist - d.threshold + 1 {
            return Err(Error::corrupt(dec.bit_pos(), "distance out of range"));
        }
        let v2 = dec.read_equal(d.threshold + us)?;
        if us == 1 && v2 == d.threshold {
            return Ok(DistRead::Spiral);
        }
        Ok(DistRead::Plain(v2))
    }
}

/// Reads a token's spiral length from the bit stream.
pub(crate) fn read_token_spiral(dec: &mut RangeDecoder, data: &LzData) -> Result<u32> {
    data.spiral.read_value(dec, 0)
}
