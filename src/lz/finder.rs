//! Match discovery by recursive prefix grouping.
//!
//! Positions sharing a short code prefix are grouped, then each group
//! is regrouped on the next code, one level per step. Small groups at
//! every level are scanned pairwise for adjacent repeats; groups that
//! survive to the deepest level are searched exhaustively with greedy
//! extension. Candidates land in sharded maps keyed by start position,
//! keeping the widest covering token per start.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::Candidate;
use crate::coder::bits_count;
use crate::interval::IntervalList;
use crate::progress::ProgressSink;

/// Rejection bound multiplier for the coarse cost filter: the coded
/// size of the replaced span must exceed roughly the size of a token.
const COST_FILTER_FACTOR: f64 = 21.0;

pub(crate) struct FinderParams {
    pub dict_size: u32,
    pub prefix: usize,
}

type PrefixKey = [u32; 3];

/// Finds repeat candidates in `elements`, whose per-position identity
/// is given by `codes` (and `secondary`, when present). Returns the
/// surviving candidates (order unspecified) and whether any of them
/// spirals past its source period.
pub(crate) fn find_candidates(
    elements: &[IntervalList],
    codes: &[u32],
    secondary: Option<&[u32]>,
    params: &FinderParams,
    progress: &dyn ProgressSink,
) -> (Vec<Candidate>, bool) {
    debug_assert_eq!(elements.len(), codes.len());
    let n = codes.len();
    if n < params.prefix + 2 {
        return (Vec::new(), false);
    }

    let search = Search {
        elements,
        codes,
        secondary,
        dict_size: params.dict_size.max(4),
        prefix: params.prefix,
        max_level: (bits_count(params.dict_size) / 2).saturating_sub(5),
        shards: CandidateShards::new(super::worker_count()),
        use_spiral: AtomicBool::new(false),
        progress,
    };

    let positions = n - params.prefix + 1;
    progress.on_stage("grouping", positions);
    let groups = search.prefix_groups(positions);
    progress.on_stage("matching", groups.len());
    log::debug!(
        "lz finder: {} prefix groups over {} positions",
        groups.len(),
        positions
    );

    #[cfg(feature = "parallel")]
    groups.par_iter().for_each(|g| search.descend(g, 0));
    #[cfg(not(feature = "parallel"))]
    for g in &groups {
        search.descend(g, 0);
    }

    let found = search.use_spiral.load(Ordering::Relaxed);
    (search.shards.into_vec(), found)
}

struct Search<'a> {
    elements: &'a [IntervalList],
    codes: &'a [u32],
    secondary: Option<&'a [u32]>,
    dict_size: u32,
    prefix: usize,
    max_level: u32,
    shards: CandidateShards,
    use_spiral: AtomicBool,
    progress: &'a dyn ProgressSink,
}

impl Search<'_> {
    fn key(&self, p: usize) -> PrefixKey {
        let mut key = [0u32; 3];
        for (slot, &c) in key.iter_mut().zip(&self.codes[p..p + self.prefix]) {
            *slot = c;
        }
        key
    }

    /// Groups every position by its code prefix, keeping groups of two
    /// or more, each sorted ascending.
    fn prefix_groups(&self, positions: usize) -> Vec<Vec<u32>> {
        #[cfg(feature = "parallel")]
        let map = (0..positions)
            .into_par_iter()
            .fold(HashMap::<PrefixKey, Vec<u32>>::new, |mut m, p| {
                m.entry(self.key(p)).or_default().push(p as u32);
                m
            })
            .reduce(HashMap::new, |mut a, b| {
                for (k, mut v) in b {
                    a.entry(k).or_default().append(&mut v);
                }
                a
            });
        #[cfg(not(feature = "parallel"))]
        let map = {
            let mut m = HashMap::<PrefixKey, Vec<u32>>::new();
            for p in 0..positions {
                m.entry(self.key(p)).or_default().push(p as u32);
            }
            m
        };

        map.into_values()
            .filter(|g| g.len() >= 2)
            .map(|mut g| {
                g.sort_unstable();
                g
            })
            .collect()
    }

    /// Regroups `group` on the next code and recurses, then scans it
    /// for adjacent repeats with the prefix length known at this level.
    fn descend(&self, group: &[u32], level: u32) {
        self.progress.on_group();
        let known = level as usize + self.prefix;
        if level < self.max_level {
            // The last position may have no code at the next level.
            let limit = self.codes.len() as i64 - i64::from(level) - self.prefix as i64;
            let head = match group.last() {
                Some(&last) if i64::from(last) == limit => &group[..group.len() - 1],
                _ => group,
            };
            let mut sub = HashMap::<u32, Vec<u32>>::new();
            for &p in head {
                sub.entry(self.codes[p as usize + known]).or_default().push(p);
            }
            for g in sub.into_values() {
                if g.len() >= 2 {
                    self.descend(&g, level + 1);
                }
            }
            self.matches_adjacent(group, known);
        } else if group.len() > 1 {
            self.matches_deep(group, known);
        }
    }

    /// Pairwise scan of neighboring group members; the equal prefix
    /// length `k` is fixed by the grouping level.
    fn matches_adjacent(&self, group: &[u32], k: usize) {
        for w in group.windows(2) {
            let (j, i) = (w[0] as usize, w[1] as usize);
            let gap = i - j;
            if gap < 2 || gap >= self.dict_size as usize {
                continue;
            }
            if !self.secondary_equal(j, i, k) {
                continue;
            }
            if !self.passes_cost_filter(i, k) {
                continue;
            }
            let spiral = (k as u32 / gap as u32).saturating_sub(1);
            self.push(i as u32, gap as u32, k as u32, spiral);
        }
    }

    /// Exhaustive scan at the deepest level: for each position, try
    /// every earlier group member inside the dictionary window, nearest
    /// first, extending the known prefix greedily.
    fn matches_deep(&self, group: &[u32], k0: usize) {
        let mut next_target = 0u32;
        for idx in 1..group.len() {
            if group[idx] < next_target {
                continue;
            }
            let i = group[idx] as usize;
            let window_lo = (i as i64 - i64::from(self.dict_size)).max(0) as u32;
            let lo = group[..idx].partition_point(|&p| p < window_lo);
            // An immediately preceding member repeats what extension
            // from the one before it already covers.
            let hi = if group[idx - 1] as usize == i - 1 {
                idx - 1
            } else {
                idx
            };
            let mut best_len = 0u32;
            for &jv in group[lo..hi].iter().rev() {
                let j = jv as usize;
                let gap = i - j;
                if gap < 2 {
                    continue;
                }
                if !self.secondary_equal(j, i, k0) {
                    continue;
                }
                let k = k0 + self.extend(i + k0, j + k0);
                if k as u32 - 2 <= best_len {
                    continue;
                }
                best_len = k as u32 - 2;
                if !self.passes_cost_filter(i, k) {
                    continue;
                }
                let spiral = (best_len / gap as u32).saturating_sub(1);
                self.push(i as u32, gap as u32, k as u32, spiral);
                if spiral > 0 {
                    // The spiral already covers everything up to j + k.
                    next_target = (j + k) as u32;
                }
            }
        }
    }

    /// Number of positions from `a` and `b` onward with equal codes.
    fn extend(&self, mut a: usize, mut b: usize) -> usize {
        let n = self.codes.len();
        let mut k = 0;
        while a < n && b < n && self.codes[a] == self.codes[b] && self.position_equal(a, b) {
            a += 1;
            b += 1;
            k += 1;
        }
        k
    }

    fn position_equal(&self, a: usize, b: usize) -> bool {
        match self.secondary {
            Some(s) => s[a] == s[b],
            None => true,
        }
    }

    fn secondary_equal(&self, j: usize, i: usize, k: usize) -> bool {
        match self.secondary {
            Some(s) => s[j..j + k] == s[i..i + k],
            None => true,
        }
    }

    /// Coarse pre-filter: the coded size of the span to be replaced
    /// must reach the bound, otherwise a token cannot pay off.
    fn passes_cost_filter(&self, start: usize, k: usize) -> bool {
        let bound = COST_FILTER_FACTOR * f64::from(self.dict_size) * k as f64;
        let mut product = 1.0f64;
        for el in &self.elements[start..start + k] {
            for iv in el {
                product *= f64::from(iv.base) / f64::from(iv.length);
            }
            if product >= bound {
                return true;
            }
        }
        false
    }

    fn push(&self, start: u32, gap: u32, k: u32, spiral: u32) {
        // The header codes the length maximum with a short counter, so
        // lengths saturate at 16 bits. The copy source always sits one
        // period back, which fixes the distance for any length. A
        // saturated length no longer spans the whole period, so such a
        // token cannot repeat it and must stay a plain back-reference.
        let length = (k - 2).min(gap - 2).min(u32::from(u16::MAX));
        let spiral = if length < gap - 2 {
            0
        } else {
            spiral.min(u32::from(u16::MAX))
        };
        let candidate = Candidate {
            start,
            dist: gap - length - 2,
            length,
            spiral,
        };
        if candidate.spiral > 0 {
            self.use_spiral.store(true, Ordering::Relaxed);
        }
        self.shards.insert(candidate);
    }
}

/// Candidate maps sharded by `start % shard_count`, each behind its own
/// lock. Collisions on the same start keep the wider token.
struct CandidateShards {
    shards: Vec<Mutex<HashMap<u32, Candidate>>>,
}

impl CandidateShards {
    fn new(count: usize) -> Self {
        Self {
            shards: (0..count.max(1)).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn insert(&self, candidate: Candidate) {
        let shard = &self.shards[candidate.start as usize % self.shards.len()];
        let mut map = match shard.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match map.entry(candidate.start) {
            Entry::Occupied(mut e) => {
                if candidate.covered() > e.get().covered() {
                    e.insert(candidate);
                }
            }
            Entry::Vacant(v) => {
                v.insert(candidate);
            }
        }
    }

    fn into_vec(self) -> Vec<Candidate> {
        self.shards
            .into_iter()
            .flat_map(|m| {
                match m.into_inner() {
                    Ok(map) => map,
                    Err(poisoned) => poisoned.into_inner(),
                }
                .into_values()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;
    use crate::progress::NoProgress;

    fn byte_elements(codes: &[u32]) -> Vec<IntervalList> {
        codes
            .iter()
            .map(|&c| IntervalList::single(Interval::new(c, 256)))
            .collect()
    }

    fn run(codes: &[u32], prefix: usize) -> (Vec<Candidate>, bool) {
        let elements = byte_elements(codes);
        let params = FinderParams {
            dict_size: 1 << 22,
            prefix,
        };
        find_candidates(&elements, codes, None, &params, &NoProgress)
    }

    #[test]
    fn periodic_input_yields_a_spiral_candidate() {
        let codes = [1u32, 2, 3, 1, 2, 3, 1, 2, 3];
        let (candidates, use_spiral) = run(&codes, 2);
        assert!(use_spiral);
        let best = candidates
            .iter()
            .find(|c| c.start == 3)
            .expect("expected a candidate at the second period");
        assert_eq!(best.dist, 0);
        assert!(best.spiral > 0);
        assert!(best.covered() >= 6);
    }

    #[test]
    fn constant_run_is_covered_by_one_wide_token() {
        let codes = [7u32; 64];
        let (candidates, use_spiral) = run(&codes, 2);
        assert!(use_spiral);
        let widest = candidates.iter().map(|c| c.covered()).max().unwrap();
        assert!(widest >= 32, "widest token covers only {widest} elements");
    }

    #[test]
    fn unique_input_yields_nothing() {
        let codes: Vec<u32> = (0..200).collect();
        let (candidates, use_spiral) = run(&codes, 2);
        assert!(candidates.is_empty());
        assert!(!use_spiral);
    }

    #[test]
    fn tiny_input_yields_nothing() {
        let (candidates, _) = run(&[1, 2, 1], 2);
        assert!(candidates.is_empty());
    }

    #[test]
    fn secondary_codes_must_also_repeat() {
        // Primary codes alternate throughout; secondary codes flip at
        // the midpoint, so repeats straddling it are not real repeats.
        let codes: Vec<u32> = (0..16).map(|i| 5 + i % 2).collect();
        let secondary: Vec<u32> = (0..16).map(|i| u32::from(i >= 8)).collect();
        let elements = byte_elements(&codes);
        let params = FinderParams {
            dict_size: 1 << 22,
            prefix: 2,
        };
        let (with_secondary, _) =
            find_candidates(&elements, &codes, Some(&secondary), &params, &NoProgress);
        let (without, _) = find_candidates(&elements, &codes, None, &params, &NoProgress);
        // The straddling repeat at the midpoint must disappear.
        assert!(with_secondary.iter().all(|c| c.start != 8));
        assert!(without.iter().any(|c| c.start == 8));
        // Repeats entirely inside one secondary run survive.
        assert!(with_secondary.iter().any(|c| c.start == 2 || c.start == 10));
    }

    #[test]
    fn saturated_length_keeps_a_plain_back_reference() {
        // A period past the 16-bit length cap: the candidate saturates
        // its length, keeps the source one period back through the
        // distance, and must not claim to spiral.
        let period = 65_538u32;
        let n = period as usize * 3 + 8;
        let codes: Vec<u32> = (0..n).map(|i| i as u32 % period).collect();
        let elements: Vec<IntervalList> = codes
            .iter()
            .map(|&c| IntervalList::single(Interval::new(c, period)))
            .collect();
        let params = FinderParams {
            dict_size: 1 << 22,
            prefix: 3,
        };
        let (candidates, use_spiral) =
            find_candidates(&elements, &codes, None, &params, &NoProgress);
        assert!(!use_spiral);
        let c = candidates
            .iter()
            .find(|c| c.start == period)
            .expect("expected a candidate at the second period");
        assert_eq!(c.length, u32::from(u16::MAX));
        assert_eq!(c.spiral, 0);
        assert_eq!(c.dist, period - c.length - 2);
        assert!(candidates.iter().all(|c| c.spiral == 0 || c.dist == 0));
    }

    #[test]
    fn shard_collisions_keep_the_wider_token() {
        let shards = CandidateShards::new(4);
        let narrow = Candidate {
            start: 12,
            dist: 1,
            length: 2,
            spiral: 0,
        };
        let wide = Candidate {
            start: 12,
            dist: 0,
            length: 2,
            spiral: 3,
        };
        shards.insert(narrow);
        shards.insert(wide);
        shards.insert(narrow);
        let all = shards.into_vec();
        assert_eq!(all, vec![wide]);
    }
}
