//! Token rewriting: turns found matches into escape-prefixed tokens.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::finder::{FinderParams, find_candidates};
use super::split::{LzData, SplitPolicy};
use super::{Candidate, LONG_MATCH_BOUND, base_with_buffer, worker_count};
use crate::coder::RangeEncoder;
use crate::error::Result;
use crate::interval::{Interval, IntervalList};
use crate::progress::{NoProgress, ProgressSink};

/// Tuning knobs of the match engine.
#[derive(Debug, Clone, Copy)]
pub struct LzOptions {
    /// Farthest back-reference the finder will consider.
    pub dict_size: u32,
    /// Code prefix length seeding the group search, clamped to 2..=3.
    /// Three suits dense small alphabets such as bytes; two suits
    /// sparse ones.
    pub prefix_len: usize,
}

impl Default for LzOptions {
    fn default() -> Self {
        Self {
            dict_size: 1 << 22,
            prefix_len: 2,
        }
    }
}

/// The rewritten stream plus the parameterization its decoder needs.
///
/// `lz` is `None` when no match paid off and the elements passed
/// through untouched.
#[derive(Debug, Clone)]
pub struct LzOutput {
    /// The surviving elements, tokens included.
    pub elements: Vec<IntervalList>,
    /// The stream parameterization, when matches were written.
    pub lz: Option<LzData>,
}

impl LzOutput {
    /// Writes the matching stream header, dummy or real.
    pub fn write_header(&self, enc: &mut RangeEncoder) -> Result<()> {
        match &self.lz {
            Some(data) => data.write_header(enc),
            None => LzData::write_dummy_header(enc),
        }
    }
}

/// Rewrites an element stream, replacing repeats with back-reference
/// tokens wherever a token codes shorter than the elements it covers.
pub struct LzEncoder {
    options: LzOptions,
    progress: Arc<dyn ProgressSink>,
}

impl LzEncoder {
    /// An encoder with the given options and no progress sink.
    pub fn new(options: LzOptions) -> Self {
        Self {
            options,
            progress: Arc::new(NoProgress),
        }
    }

    /// Attaches a progress sink.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Encodes a stream whose element identity is the full interval
    /// list: equal elements repeat, everything else does not.
    pub fn encode(&self, input: &[IntervalList]) -> LzOutput {
        let mut ids: HashMap<IntervalList, u32> = HashMap::new();
        let codes: Vec<u32> = input
            .iter()
            .map(|el| {
                let next = ids.len() as u32;
                *ids.entry(*el).or_insert(next)
            })
            .collect();
        self.encode_with_codes(input, &codes, None)
    }

    /// Encodes a stream with caller-supplied equality codes.
    ///
    /// `codes[i]` must equal `codes[j]` exactly when `input[i]` and
    /// `input[j]` are interchangeable; `secondary`, when present, adds
    /// a second component to that identity.
    pub fn encode_with_codes(
        &self,
        input: &[IntervalList],
        codes: &[u32],
        secondary: Option<&[u32]>,
    ) -> LzOutput {
        assert_eq!(input.len(), codes.len());
        let n = input.len();
        let prefix = self.options.prefix_len.clamp(2, 3);
        if n < prefix + 2 {
            return pass_through(input);
        }

        let params = FinderParams {
            dict_size: self.options.dict_size,
            prefix,
        };
        let (mut candidates, use_spiral) =
            find_candidates(input, codes, secondary, &params, &*self.progress);
        if candidates.is_empty() {
            return pass_through(input);
        }

        // Widest tokens first; ties in stream order.
        candidates.sort_unstable_by_key(|c| c.start);
        candidates.sort_by(|a, b| b.covered().cmp(&a.covered()));
        let bound = candidates.partition_point(|c| c.covered() >= LONG_MATCH_BOUND);

        let lz_data = derive_policies(&candidates, use_spiral);
        log::debug!(
            "lz encoder: {} candidates ({} long), dist max {}, spiral {}",
            candidates.len(),
            bound,
            lz_data.dist.max,
            use_spiral
        );

        let mut result = input.to_vec();
        let replaced: Vec<AtomicBool> = (0..n).map(|_| AtomicBool::new(false)).collect();
        self.progress.on_stage("rewrite", candidates.len());

        // Long matches may straddle worker blocks, so they go first,
        // sequentially.
        write_matches(
            input,
            &mut result,
            0,
            &candidates[..bound],
            &lz_data,
            &replaced,
            &*self.progress,
        );
        widen_untouched_bases(&mut result, &replaced);

        // Short matches are confined to one worker block each; the
        // straddlers are dropped.
        let block = n.div_ceil(worker_count()).max(1);
        let mut parts: Vec<Vec<Candidate>> = vec![Vec::new(); n.div_ceil(block)];
        for &c in &candidates[bound..] {
            let start = c.start as usize;
            let index = start / block;
            if (start + c.covered() as usize - 1) / block == index {
                parts[index].push(c);
            }
        }
        #[cfg(feature = "parallel")]
        result
            .par_chunks_mut(block)
            .enumerate()
            .for_each(|(index, chunk)| {
                write_matches(
                    input,
                    chunk,
                    index * block,
                    &parts[index],
                    &lz_data,
                    &replaced,
                    &*self.progress,
                );
            });
        #[cfg(not(feature = "parallel"))]
        for (index, chunk) in result.chunks_mut(block).enumerate() {
            write_matches(
                input,
                chunk,
                index * block,
                &parts[index],
                &lz_data,
                &replaced,
                &*self.progress,
            );
        }

        let elements = result
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !replaced[*i].load(Ordering::Relaxed))
            .map(|(_, el)| el)
            .collect();
        LzOutput {
            elements,
            lz: Some(lz_data),
        }
    }
}

fn pass_through(input: &[IntervalList]) -> LzOutput {
    LzOutput {
        elements: input.to_vec(),
        lz: None,
    }
}

fn derive_policies(candidates: &[Candidate], use_spiral: bool) -> LzData {
    let dists: Vec<u32> = candidates.iter().map(|c| c.dist).collect();
    let lengths: Vec<u32> = candidates.iter().map(|c| c.length).collect();
    LzData {
        dist: SplitPolicy::choose(&dists),
        length: SplitPolicy::choose(&lengths),
        use_spiral,
        spiral: if use_spiral {
            let spirals: Vec<u32> = candidates.iter().map(|c| c.spiral).collect();
            SplitPolicy::choose(&spirals)
        } else {
            SplitPolicy::default()
        },
    }
}

/// Writes the tokens for `candidates` into `result`, marking the
/// elements they cover in `replaced`. `result` is the block starting at
/// stream position `offset`; every candidate must start inside it.
#[allow(clippy::too_many_arguments)]
fn write_matches(
    input: &[IntervalList],
    result: &mut [IntervalList],
    offset: usize,
    candidates: &[Candidate],
    lz_data: &LzData,
    replaced: &[AtomicBool],
    progress: &dyn ProgressSink,
) {
    let n = input.len();
    for c in candidates {
        let start = c.start as usize;
        let mut dist = c.dist;
        let mut length = c.length;
        let spiral = c.spiral;
        let mut local_max = (c.covered() - 2) as u32;

        // A previously written token inside the span forces truncation,
        // or, for spirals and near collisions, a skip.
        let window = (local_max as usize + 3).min(n - start);
        if let Some(hit) = (start..start + window).find(|&p| replaced[p].load(Ordering::Relaxed)) {
            if spiral != 0 || hit < start + 3 {
                continue;
            }
            dist += (start + 3 + length as usize - hit) as u32;
            length = (hit - start - 3) as u32;
            local_max = length;
            if dist > lz_data.dist.max {
                continue;
            }
        }

        let old_base = input[start][0].base;
        let new_base = base_with_buffer(old_base);

        // The decoder recomputes the distance bound from its output
        // length, which at this token equals `start`.
        let max_dist = lz_data
            .dist
            .max
            .min((start as u32).saturating_sub(length + 2));
        let dist_policy = SplitPolicy {
            max: max_dist,
            ..lz_data.dist
        };
        let spiral_token = lz_data.use_spiral && length < local_max;

        // Exact trade-off: coded size of the covered elements against
        // the token's, both measured with the widths actually written.
        let mut raw_nats = 0.0f64;
        for el in &input[start..=start + local_max as usize + 1] {
            for iv in el {
                raw_nats += f64::from(iv.base).ln() - f64::from(iv.length).ln();
            }
        }
        let mut token_nats = f64::from(new_base).ln() - f64::from(new_base - old_base).ln();
        token_nats += lz_data.length.cost_nats(length, 0);
        token_nats += if spiral_token {
            sentinel_cost_nats(&dist_policy) + lz_data.spiral.cost_nats(spiral, 0)
        } else {
            dist_policy.cost_nats(dist, u32::from(lz_data.use_spiral))
        };
        if raw_nats <= token_nats {
            continue;
        }

        let mut token = IntervalList::single(Interval::with_length(
            old_base,
            new_base - old_base,
            new_base,
        ));
        lz_data.length.write_value(&mut token, length, 0);
        if !lz_data.use_spiral {
            dist_policy.write_value(&mut token, dist, 0);
        } else if !spiral_token {
            dist_policy.write_value(&mut token, dist, 1);
        } else {
            write_spiral_sentinel(&mut token, &dist_policy);
        }
        if spiral_token {
            lz_data.spiral.write_value(&mut token, spiral, 0);
        }

        result[start - offset] = token;
        for p in &replaced[start + 1..=start + local_max as usize + 1] {
            p.store(true, Ordering::Relaxed);
        }
        progress.on_token();
    }
}

/// Marks the distance field with the reserved slot one past the bound,
/// announcing that a spiral length follows and the distance is zero.
fn write_spiral_sentinel(token: &mut IntervalList, policy: &SplitPolicy) {
    if policy.is_effectively_direct() {
        token.push(Interval::new(policy.max + 1, policy.max + 2));
    } else if policy.mode == super::SplitMode::LowHalf {
        token.push(Interval::new(policy.threshold + 1, policy.threshold + 2));
        token.push(Interval::new(
            policy.max - policy.threshold,
            policy.max - policy.threshold + 1,
        ));
    } else {
        token.push(Interval::new(
            policy.max - policy.threshold + 1,
            policy.max - policy.threshold + 3,
        ));
        token.push(Interval::new(policy.threshold, policy.threshold + 1));
    }
}

/// Coded width of the sentinel written by [`write_spiral_sentinel`],
/// in nats.
fn sentinel_cost_nats(policy: &SplitPolicy) -> f64 {
    if policy.is_effectively_direct() {
        f64::from(policy.max + 2).ln()
    } else if policy.mode == super::SplitMode::LowHalf {
        f64::from(policy.threshold + 2).ln()
            + f64::from(policy.max - policy.threshold + 1).ln()
    } else {
        f64::from(policy.max - policy.threshold + 3).ln()
            + f64::from(policy.threshold + 1).ln()
    }
}

/// Widens the base of every literal that survived the long-match pass,
/// making room for the escape tail. Token positions are recognizable as
/// unreplaced elements whose successor is replaced.
fn widen_untouched_bases(result: &mut [IntervalList], replaced: &[AtomicBool]) {
    let n = result.len();
    let widen = |(i, el): (usize, &mut IntervalList)| {
        let i = i + 2;
        if replaced[i].load(Ordering::Relaxed) {
            return;
        }
        if i + 1 < n && replaced[i + 1].load(Ordering::Relaxed) {
            return;
        }
        if let Some(&first) = el.first() {
            let mut widened = IntervalList::single(Interval::with_length(
                first.lower,
                first.length,
                base_with_buffer(first.base),
            ));
            for &iv in el.iter().skip(1) {
                widened.push(iv);
            }
            *el = widened;
        }
    };
    // The first two elements are always literal and keep their base.
    if n <= 2 {
        return;
    }
    #[cfg(feature = "parallel")]
    result[2..].par_iter_mut().enumerate().for_each(widen);
    #[cfg(not(feature = "parallel"))]
    result[2..].iter_mut().enumerate().for_each(widen);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lz::SplitMode;

    fn byte_elements(codes: &[u32]) -> Vec<IntervalList> {
        codes
            .iter()
            .map(|&c| IntervalList::single(Interval::new(c, 256)))
            .collect()
    }

    fn byte_encoder() -> LzEncoder {
        LzEncoder::new(LzOptions {
            prefix_len: 3,
            ..LzOptions::default()
        })
    }

    #[test]
    fn tiny_input_passes_through() {
        let input = byte_elements(&[1, 2, 3]);
        let out = LzEncoder::new(LzOptions::default()).encode(&input);
        assert!(out.lz.is_none());
        assert_eq!(out.elements, input);
    }

    #[test]
    fn unique_input_passes_through() {
        let codes: Vec<u32> = (0..100).collect();
        let input = byte_elements(&codes);
        let out = byte_encoder().encode_with_codes(&input, &codes, None);
        assert!(out.lz.is_none());
        assert_eq!(out.elements, input);
    }

    #[test]
    fn long_repeat_shrinks_the_stream() {
        let mut codes = vec![9u32, 8, 7, 6, 5, 4, 3, 2];
        for _ in 0..8 {
            codes.extend_from_slice(&[9, 8, 7, 6, 5, 4, 3, 2]);
        }
        let input = byte_elements(&codes);
        let out = byte_encoder().encode_with_codes(&input, &codes, None);
        let data = out.lz.expect("matches expected");
        assert!(out.elements.len() < input.len());
        assert!(data.use_spiral);
        // First two elements pass through unwidened.
        assert_eq!(out.elements[0][0].base, 256);
        assert_eq!(out.elements[1][0].base, 256);
        // Some surviving literal is widened.
        assert!(
            out.elements
                .iter()
                .skip(2)
                .any(|el| el[0].base == 272 && !el[0].is_escape())
        );
        // Some token carries an escape prefix.
        assert!(out.elements.iter().skip(2).any(|el| el[0].is_escape()));
    }

    #[test]
    fn tokens_always_beat_the_literals_they_replace() {
        // The cost rule is strict: a candidate only becomes a token if
        // the literal span codes strictly longer. Re-derive both sides
        // from the final parameters and the written interval widths.
        let mut codes: Vec<u32> = (0..40).collect();
        for _ in 0..6 {
            codes.extend(0..40);
        }
        codes.extend((0..96).map(|i| i % 4));
        let input = byte_elements(&codes);
        let out = byte_encoder().encode_with_codes(&input, &codes, None);
        let data = out.lz.expect("matches expected");
        let decoder = crate::lz::decoder::LzDecoder::new(data);
        let nats = |el: &IntervalList| -> f64 {
            el.iter()
                .map(|iv| f64::from(iv.base).ln() - f64::from(iv.length).ln())
                .sum()
        };
        let mut pos = 0usize;
        let mut tokens = 0usize;
        for (i, el) in out.elements.iter().enumerate() {
            if i < 2 || !el[0].is_escape() {
                pos += 1;
                continue;
            }
            let token = decoder.parse_token(el, pos, i).unwrap();
            let covered =
                (token.length as usize + 2) * (token.spiral as usize + 1);
            let raw: f64 = input[pos..pos + covered].iter().map(&nats).sum();
            assert!(
                nats(el) < raw,
                "token at {i}: {} token nats vs {} raw",
                nats(el),
                raw
            );
            pos += covered;
            tokens += 1;
        }
        assert_eq!(pos, input.len());
        assert!(tokens > 0);
    }

    #[test]
    fn policies_reflect_candidate_statistics() {
        let candidates = [
            Candidate {
                start: 10,
                dist: 0,
                length: 1,
                spiral: 30,
            },
            Candidate {
                start: 40,
                dist: 1,
                length: 1,
                spiral: 28,
            },
            Candidate {
                start: 80,
                dist: 0,
                length: 2,
                spiral: 31,
            },
            Candidate {
                start: 120,
                dist: 0,
                length: 1,
                spiral: 29,
            },
        ];
        let data = derive_policies(&candidates, true);
        assert_eq!(data.dist.max, 1);
        assert_eq!(data.dist.mode, SplitMode::LowHalf);
        assert_eq!(data.length.max, 2);
        assert_eq!(data.spiral.max, 31);
        assert_eq!(data.spiral.mode, SplitMode::HighHalf);
        assert_eq!(data.spiral.threshold, 29);
    }
}
