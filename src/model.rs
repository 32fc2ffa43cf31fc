//! Frequency models mapping symbols to cumulative-weight intervals.
//!
//! The range coder only ever needs three answers from a model: the
//! total weight, the interval `[weight_left_of(i), weight_left_of(i) +
//! weight(i))` of a symbol, and the reverse lookup from a cumulative
//! frequency back to a symbol index. [`FrequencyModel`] captures that
//! contract; [`CumulativeMap`] serves static tables and [`SumTable`]
//! serves adaptive ones with logarithmic updates.

use crate::interval::Interval;

/// Cumulative-weight queries over an indexed alphabet.
///
/// Implementations must keep every weight positive; a zero-weight
/// symbol cannot be coded.
pub trait FrequencyModel {
    /// Number of symbols in the alphabet.
    fn len(&self) -> usize;

    /// True for an empty alphabet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of all symbol weights.
    fn total_weight(&self) -> u32;

    /// Weight of the symbol at `index`.
    fn weight(&self, index: usize) -> u32;

    /// Sum of the weights of all symbols before `index`.
    fn weight_left_of(&self, index: usize) -> u32;

    /// The symbol owning the cumulative frequency `freq`, i.e. the
    /// smallest `i` with `weight_left_of(i) + weight(i) > freq`.
    /// `freq` must be below [`FrequencyModel::total_weight`].
    fn index_of_cumulative(&self, freq: u32) -> usize;

    /// The coding interval of the symbol at `index`.
    fn interval_for(&self, index: usize) -> Interval {
        Interval::with_length(
            self.weight_left_of(index),
            self.weight(index),
            self.total_weight(),
        )
    }
}

/// A static frequency table storing cumulative sums.
///
/// Lookup by cumulative frequency is a binary search; weights cannot
/// change after construction. Use [`SumTable`] when the model adapts
/// while coding.
#[derive(Debug, Clone)]
pub struct CumulativeMap {
    cums: Vec<u32>,
}

impl CumulativeMap {
    /// Builds the table from per-symbol weights. Weights must be
    /// positive and their sum must fit in `u32`.
    pub fn from_weights(weights: &[u32]) -> Self {
        let mut cums = Vec::with_capacity(weights.len());
        let mut sum = 0u32;
        for &w in weights {
            debug_assert!(w > 0, "zero-weight symbol");
            sum += w;
            cums.push(sum);
        }
        Self { cums }
    }

    /// A uniform alphabet of `len` symbols with weight `weight` each.
    pub fn uniform(len: usize, weight: u32) -> Self {
        let mut cums = Vec::with_capacity(len);
        let mut sum = 0u32;
        for _ in 0..len {
            sum += weight;
            cums.push(sum);
        }
        Self { cums }
    }
}

impl FrequencyModel for CumulativeMap {
    fn len(&self) -> usize {
        self.cums.len()
    }

    fn total_weight(&self) -> u32 {
        self.cums.last().copied().unwrap_or(0)
    }

    fn weight(&self, index: usize) -> u32 {
        let left = if index == 0 { 0 } else { self.cums[index - 1] };
        self.cums[index] - left
    }

    fn weight_left_of(&self, index: usize) -> u32 {
        if index == 0 { 0 } else { self.cums[index - 1] }
    }

    fn index_of_cumulative(&self, freq: u32) -> usize {
        self.cums.partition_point(|&c| c <= freq)
    }
}

/// An adaptive frequency table backed by a Fenwick tree.
///
/// Prefix sums, cumulative lookups and weight increases all run in
/// `O(log n)`. Insertion and removal rebuild the tree in `O(n)`; both
/// are rare in coding loops.
#[derive(Debug, Clone)]
pub struct SumTable {
    weights: Vec<u32>,
    // 1-based Fenwick tree over `weights`.
    tree: Vec<u32>,
    total: u32,
}

impl SumTable {
    /// Builds the table from per-symbol weights.
    pub fn from_weights(weights: &[u32]) -> Self {
        let mut table = Self {
            weights: weights.to_vec(),
            tree: Vec::new(),
            total: 0,
        };
        table.rebuild();
        table
    }

    /// A uniform alphabet of `len` symbols with weight `weight` each.
    pub fn uniform(len: usize, weight: u32) -> Self {
        Self::from_weights(&vec![weight; len])
    }

    /// Adds `delta` to the weight of the symbol at `index`.
    pub fn increase(&mut self, index: usize, delta: u32) {
        self.weights[index] += delta;
        self.total += delta;
        let mut i = index + 1;
        while i <= self.weights.len() {
            self.tree[i - 1] += delta;
            i += i & i.wrapping_neg();
        }
    }

    /// Inserts a new symbol at `index`. Rebuilds the tree.
    pub fn insert(&mut self, index: usize, weight: u32) {
        self.weights.insert(index, weight);
        self.rebuild();
    }

    /// Removes the symbol at `index`, returning its weight. Rebuilds
    /// the tree.
    pub fn remove(&mut self, index: usize) -> u32 {
        let weight = self.weights.remove(index);
        self.rebuild();
        weight
    }

    fn rebuild(&mut self) {
        let n = self.weights.len();
        self.tree = self.weights.clone();
        for i in 1..=n {
            let parent = i + (i & i.wrapping_neg());
            if parent <= n {
                self.tree[parent - 1] += self.tree[i - 1];
            }
        }
        self.total = self.weights.iter().sum();
    }

    fn prefix_sum(&self, count: usize) -> u32 {
        let mut sum = 0;
        let mut i = count;
        while i > 0 {
            sum += self.tree[i - 1];
            i &= i - 1;
        }
        sum
    }
}

impl FrequencyModel for SumTable {
    fn len(&self) -> usize {
        self.weights.len()
    }

    fn total_weight(&self) -> u32 {
        self.total
    }

    fn weight(&self, index: usize) -> u32 {
        self.weights[index]
    }

    fn weight_left_of(&self, index: usize) -> u32 {
        self.prefix_sum(index)
    }

    fn index_of_cumulative(&self, freq: u32) -> usize {
        // Descend the tree: find the largest prefix whose sum is <= freq.
        let n = self.weights.len();
        let mut index = 0usize;
        let mut remaining = freq;
        let mut step = n.next_power_of_two();
        while step > 0 {
            let next = index + step;
            if next <= n && self.tree[next - 1] <= remaining {
                index = next;
                remaining -= self.tree[next - 1];
            }
            step >>= 1;
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_matches_scan(model: &dyn FrequencyModel) {
        for i in 0..model.len() {
            let left = model.weight_left_of(i);
            for f in left..left + model.weight(i) {
                assert_eq!(model.index_of_cumulative(f), i, "freq {f}");
            }
        }
    }

    #[test]
    fn cumulative_map_lookup() {
        let model = CumulativeMap::from_weights(&[3, 1, 4, 1, 5]);
        assert_eq!(model.total_weight(), 14);
        assert_eq!(model.interval_for(2), Interval::with_length(4, 4, 14));
        lookup_matches_scan(&model);
    }

    #[test]
    fn sum_table_matches_cumulative_map() {
        let weights = [7u32, 2, 2, 9, 1, 1, 3];
        let map = CumulativeMap::from_weights(&weights);
        let table = SumTable::from_weights(&weights);
        assert_eq!(map.total_weight(), table.total_weight());
        for i in 0..weights.len() {
            assert_eq!(map.interval_for(i), table.interval_for(i));
        }
        lookup_matches_scan(&table);
    }

    #[test]
    fn sum_table_adapts() {
        let mut table = SumTable::uniform(4, 1);
        table.increase(2, 100);
        assert_eq!(table.total_weight(), 104);
        assert_eq!(table.interval_for(2), Interval::with_length(2, 101, 104));
        lookup_matches_scan(&table);

        table.insert(0, 5);
        assert_eq!(table.total_weight(), 109);
        assert_eq!(table.weight(3), 101);
        lookup_matches_scan(&table);

        assert_eq!(table.remove(3), 101);
        assert_eq!(table.total_weight(), 8);
        lookup_matches_scan(&table);
    }
}
