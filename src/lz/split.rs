//! Split-integer policies for LZ token fields.
//!
//! Match distances and lengths are heavily skewed, so coding them
//! uniformly over `0..=max` wastes bits. A [`SplitPolicy`] optionally
//! splits the value range at a threshold: the populous side is coded in
//! one short interval and the rare side behind an escape slot. Which
//! side is populous is decided per stream from the observed values and
//! recorded in the [`LzData`] header.

use crate::coder::{RangeDecoder, RangeEncoder};
use crate::error::{Error, Result};
use crate::interval::{Interval, IntervalList};

/// How a token field's value range is partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMode {
    /// One uniform interval over the whole range.
    #[default]
    Direct,
    /// Values at or below the threshold are coded directly; larger
    /// ones behind an escape slot.
    LowHalf,
    /// Values at or above the threshold are coded directly; smaller
    /// ones behind an escape slot.
    HighHalf,
}

impl SplitMode {
    pub(crate) fn from_u32(r: u32) -> Result<Self> {
        match r {
            0 => Ok(SplitMode::Direct),
            1 => Ok(SplitMode::LowHalf),
            2 => Ok(SplitMode::HighHalf),
            _ => Err(Error::InvalidParameters {
                reason: "split mode out of range",
            }),
        }
    }

    pub(crate) fn as_u32(self) -> u32 {
        match self {
            SplitMode::Direct => 0,
            SplitMode::LowHalf => 1,
            SplitMode::HighHalf => 2,
        }
    }
}

/// The coding parameters of one token field: split mode, largest value
/// and split threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SplitPolicy {
    /// How the range is partitioned.
    pub mode: SplitMode,
    /// Largest value the field takes in this stream.
    pub max: u32,
    /// Boundary between the directly coded and the escaped side.
    pub threshold: u32,
}

impl SplitPolicy {
    /// An unsplit policy over `0..=max`.
    pub const fn direct(max: u32) -> Self {
        Self {
            mode: SplitMode::Direct,
            max,
            threshold: 0,
        }
    }

    /// Derives a policy from the values observed in one stream.
    ///
    /// The pivot is the mean (at least 1). When fewer than a third of
    /// the values reach the pivot the low half is coded directly; when
    /// more than two thirds reach it, the high half; otherwise no
    /// split.
    pub fn choose(values: &[u32]) -> Self {
        let max = values.iter().copied().max().unwrap_or(0);
        if values.is_empty() {
            return Self::direct(0);
        }
        let sum: u64 = values.iter().map(|&v| u64::from(v)).sum();
        let pivot = (sum / values.len() as u64).max(1) as u32;
        let upper = values.iter().filter(|&&v| v >= pivot).count();
        if upper <= values.len() / 3 {
            Self {
                mode: SplitMode::LowHalf,
                max,
                threshold: values
                    .iter()
                    .copied()
                    .filter(|&v| v < pivot)
                    .max()
                    .unwrap_or(0),
            }
        } else if upper > values.len() * 2 / 3 {
            Self {
                mode: SplitMode::HighHalf,
                max,
                threshold: values
                    .iter()
                    .copied()
                    .filter(|&v| v >= pivot)
                    .min()
                    .unwrap_or(0),
            }
        } else {
            Self::direct(max)
        }
    }

    /// True when the split degenerates to a single uniform interval,
    /// either by mode or because the effective range sits below the
    /// threshold.
    pub(crate) fn is_effectively_direct(&self) -> bool {
        self.mode == SplitMode::Direct || self.max < self.threshold
    }

    /// Appends the interval(s) coding `value` under this policy.
    ///
    /// `extra` widens the final interval by that many reserved slots;
    /// the distance field uses one such slot as the spiral sentinel.
    pub fn write_value(&self, list: &mut IntervalList, value: u32, extra: u32) {
        if self.is_effectively_direct() {
            list.push(Interval::new(value, self.max + extra + 1));
        } else if self.mode == SplitMode::LowHalf {
            if value <= self.threshold {
                list.push(Interval::new(value, self.threshold + 2));
            } else {
                list.push(Interval::new(self.threshold + 1, self.threshold + 2));
                list.push(Interval::new(
                    value - self.threshold - 1,
                    self.max - self.threshold + extra,
                ));
            }
        } else if value >= self.threshold {
            // The slot one past `max` escapes to the low half; with a
            // non-zero `extra` one more reserved slot follows it.
            list.push(Interval::new(
                value - self.threshold,
                self.max - self.threshold + extra + 2,
            ));
        } else {
            list.push(Interval::new(
                self.max - self.threshold + 1,
                self.max - self.threshold + extra + 2,
            ));
            list.push(Interval::new(value, self.threshold + extra));
        }
    }

    /// Reads a value coded with [`write_value`](Self::write_value)
    /// directly from the bit stream.
    pub fn read_value(&self, dec: &mut RangeDecoder, extra: u32) -> Result<u32> {
        if self.is_effectively_direct() {
            return dec.read_equal(self.max + extra + 1);
        }
        if self.mode == SplitMode::LowHalf {
            let mut value = dec.read_equal(self.threshold + 2)?;
            if value == self.threshold + 1 {
                value += dec.read_equal(self.max - self.threshold + extra)?;
            }
            Ok(value)
        } else {
            let first = dec.read_equal(self.max - self.threshold + extra + 2)?;
            if first == self.max - self.threshold + 1 {
                dec.read_equal(self.threshold + extra)
            } else {
                Ok(first + self.threshold)
            }
        }
    }

    /// Cost of coding `value` under this policy, in nats.
    pub fn cost_nats(&self, value: u32, extra: u32) -> f64 {
        if self.is_effectively_direct() {
            f64::from(self.max + extra + 1).ln()
        } else if self.mode == SplitMode::LowHalf {
            let mut sum = f64::from(self.threshold + 2).ln();
            if value > self.threshold {
                sum += f64::from(self.max - self.threshold + extra).ln();
            }
            sum
        } else {
            let mut sum = f64::from(self.max - self.threshold + extra + 2).ln();
            if value < self.threshold {
                sum += f64::from(self.threshold + extra).ln();
            }
            sum
        }
    }
}

/// The per-stream LZ parameterization carried in the stream header:
/// one [`SplitPolicy`] per token field plus the spiral-length switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LzData {
    /// Policy of the token distance field.
    pub dist: SplitPolicy,
    /// Policy of the token length field.
    pub length: SplitPolicy,
    /// Whether tokens may carry a spiral length.
    pub use_spiral: bool,
    /// Policy of the spiral length field, meaningful when
    /// `use_spiral` is set.
    pub spiral: SplitPolicy,
}

impl LzData {
    /// Writes the header announcing these parameters.
    ///
    /// Layout: distance triple, length triple, a one-bit "matches
    /// present" flag when both maxima are zero, the spiral switch, and
    /// the spiral triple when the switch is set. Counter fields use the
    /// short exponent width except the distance maximum.
    pub fn write_header(&self, enc: &mut RangeEncoder) -> Result<()> {
        write_policy(enc, &self.dist, false)?;
        write_policy(enc, &self.length, true)?;
        if self.dist.max == 0 && self.length.max == 0 {
            enc.write_equal(1, 2)?;
        }
        enc.write_equal(u32::from(self.use_spiral), 2)?;
        if self.use_spiral {
            write_policy(enc, &self.spiral, true)?;
        }
        Ok(())
    }

    /// Writes the header of a stream that carries no matches at all:
    /// zeroed policies and a cleared flag bit.
    pub fn write_dummy_header(enc: &mut RangeEncoder) -> Result<()> {
        enc.write_equal(0, 3)?;
        enc.write_count(0)?;
        enc.write_equal(0, 3)?;
        enc.write_count_with(0, super::COUNT_SHORT)?;
        enc.write_equal(0, 2)
    }

    /// Reads a header written by [`write_header`](Self::write_header)
    /// or [`write_dummy_header`](Self::write_dummy_header). Returns
    /// `None` for the dummy form.
    pub fn read_header(dec: &mut RangeDecoder) -> Result<Option<Self>> {
        let dist = read_policy(dec, false)?;
        let length = read_policy(dec, true)?;
        if dist.max == 0 && length.max == 0 && dec.read_equal(2)? == 0 {
            return Ok(None);
        }
        let use_spiral = dec.read_equal(2)? == 1;
        let spiral = if use_spiral {
            read_policy(dec, true)?
        } else {
            SplitPolicy::default()
        };
        Ok(Some(Self {
            dist,
            length,
            use_spiral,
            spiral,
        }))
    }
}

fn write_policy(enc: &mut RangeEncoder, policy: &SplitPolicy, short: bool) -> Result<()> {
    enc.write_equal(policy.mode.as_u32(), 3)?;
    if short {
        enc.write_count_with(policy.max, super::COUNT_SHORT)?;
    } else {
        enc.write_count(policy.max)?;
    }
    if policy.mode != SplitMode::Direct {
        enc.write_equal(policy.threshold, policy.max + 1)?;
    }
    Ok(())
}

fn read_policy(dec: &mut RangeDecoder, short: bool) -> Result<SplitPolicy> {
    let mode = SplitMode::from_u32(dec.read_equal(3)?)?;
    let max = if short {
        dec.read_count_with(super::COUNT_SHORT)?
    } else {
        dec.read_count()?
    };
    let threshold = if mode != SplitMode::Direct {
        dec.read_equal(max + 1)?
    } else {
        0
    };
    Ok(SplitPolicy {
        mode,
        max,
        threshold,
    })
}
