//! Probability intervals and per-element interval lists.
//!
//! An [`Interval`] describes one symbol as a sub-range of a discrete
//! alphabet: `length` slots out of `base`, starting at `lower`. A plain
//! symbol `s` drawn from an alphabet of size `n` is `(s, 1, n)`; a
//! frequency-model symbol owns as many slots as its weight. Every
//! element of a stream is an [`IntervalList`], a short inline sequence
//! of intervals coded back to back.

use crate::error::{Error, Result};

/// One symbol expressed as a sub-range of `base` equally likely slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    /// First slot covered.
    pub lower: u32,
    /// Number of slots covered.
    pub length: u32,
    /// Size of the alphabet the slots are drawn from.
    pub base: u32,
}

impl Interval {
    /// A unit-length interval: symbol `lower` out of `base`.
    pub const fn new(lower: u32, base: u32) -> Self {
        Self {
            lower,
            length: 1,
            base,
        }
    }

    /// An interval covering `length` slots from `lower`.
    pub const fn with_length(lower: u32, length: u32, base: u32) -> Self {
        Self {
            lower,
            length,
            base,
        }
    }

    /// Validates the triple: positive length and base, range inside base.
    pub fn check(&self) -> Result<()> {
        if self.base == 0
            || self.length == 0
            || self.lower > self.base - self.length
            || self.length > self.base
        {
            return Err(Error::InvalidInterval {
                lower: self.lower,
                length: self.length,
                base: self.base,
            });
        }
        Ok(())
    }

    /// An escape interval covers the widened tail of its alphabet, so
    /// its upper bound coincides with the base.
    pub fn is_escape(&self) -> bool {
        self.lower + self.length == self.base && self.length != self.base
    }
}

impl Default for Interval {
    fn default() -> Self {
        Interval::new(0, 1)
    }
}

/// Inline capacity of an [`IntervalList`].
///
/// The widest element any encoder in this crate produces is an LZ token
/// with a split distance, a spiral length and an escape prefix, which
/// needs six intervals; eight leaves headroom for callers attaching a
/// secondary interval or two.
pub const INLINE_CAP: usize = 8;

/// A fixed-capacity list of intervals making up one stream element.
///
/// Backed by an inline array, so elements are `Copy` and never touch
/// the heap. Pushing past [`INLINE_CAP`] is a bug in the caller and
/// panics.
#[derive(Debug, Clone, Copy)]
pub struct IntervalList {
    items: [Interval; INLINE_CAP],
    len: u8,
}

impl IntervalList {
    /// An empty list.
    pub const fn new() -> Self {
        Self {
            items: [Interval::new(0, 1); INLINE_CAP],
            len: 0,
        }
    }

    /// A list holding a single interval.
    pub fn single(interval: Interval) -> Self {
        let mut list = Self::new();
        list.push(interval);
        list
    }

    /// A list holding a copy of `intervals`, which must fit inline.
    pub fn from_slice(intervals: &[Interval]) -> Self {
        let mut list = Self::new();
        for &iv in intervals {
            list.push(iv);
        }
        list
    }

    /// Appends an interval; panics past [`INLINE_CAP`].
    pub fn push(&mut self, interval: Interval) {
        assert!(
            (self.len as usize) < INLINE_CAP,
            "interval list is limited to {INLINE_CAP} entries"
        );
        self.items[self.len as usize] = interval;
        self.len += 1;
    }

    /// Number of intervals held.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// True when the list holds no interval.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Interval at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Interval> {
        self.as_slice().get(index)
    }

    /// First interval, if any.
    pub fn first(&self) -> Option<&Interval> {
        self.as_slice().first()
    }

    /// The occupied prefix as a slice.
    pub fn as_slice(&self) -> &[Interval] {
        &self.items[..self.len as usize]
    }

    /// Iterates over the held intervals.
    pub fn iter(&self) -> std::slice::Iter<'_, Interval> {
        self.as_slice().iter()
    }
}

impl Default for IntervalList {
    fn default() -> Self {
        Self::new()
    }
}

// Equality and hashing look only at the occupied prefix, so two lists
// with the same intervals compare equal regardless of construction
// history.
impl PartialEq for IntervalList {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for IntervalList {}

impl std::hash::Hash for IntervalList {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl std::ops::Index<usize> for IntervalList {
    type Output = Interval;

    fn index(&self, index: usize) -> &Interval {
        &self.as_slice()[index]
    }
}

impl<'a> IntoIterator for &'a IntervalList {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Interval> for IntervalList {
    fn from_iter<T: IntoIterator<Item = Interval>>(iter: T) -> Self {
        let mut list = Self::new();
        for iv in iter {
            list.push(iv);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_rejects_degenerate_triples() {
        assert!(Interval::new(0, 0).check().is_err());
        assert!(Interval::with_length(0, 0, 4).check().is_err());
        assert!(Interval::new(4, 4).check().is_err());
        assert!(Interval::with_length(2, 3, 4).check().is_err());
        assert!(Interval::with_length(1, 3, 4).check().is_ok());
    }

    #[test]
    fn escape_detection() {
        // Escape token over the widened base 272: tail of 16 slots.
        assert!(Interval::with_length(256, 16, 272).is_escape());
        // Ordinary literals never reach the base.
        assert!(!Interval::new(255, 272).is_escape());
        // A full-alphabet interval is not an escape.
        assert!(!Interval::with_length(0, 4, 4).is_escape());
    }

    #[test]
    fn equality_ignores_spare_capacity() {
        let a = IntervalList::single(Interval::new(3, 16));
        let mut b = IntervalList::new();
        b.push(Interval::new(3, 16));
        assert_eq!(a, b);

        let mut c = b;
        c.push(Interval::new(0, 2));
        assert_ne!(a, c);
    }

    #[test]
    #[should_panic(expected = "limited")]
    fn push_past_capacity_panics() {
        let mut list = IntervalList::new();
        for i in 0..=INLINE_CAP as u32 {
            list.push(Interval::new(i, 32));
        }
    }
}
