//! Property-based tests using proptest.
//!
//! These tests verify coding invariants of the rangelz library with
//! randomly generated inputs.

use proptest::prelude::*;

use rangelz::{Interval, IntervalList, RangeDecoder, RangeEncoder, SplitPolicy};

/// Strategy for (value, base) pairs valid for equal-probability coding.
fn equal_symbol_strategy() -> impl Strategy<Value = (u32, u32)> {
    (1u32..100_000).prop_flat_map(|base| (0..base, Just(base)))
}

proptest! {
    /// Any byte buffer survives compress/decompress unchanged.
    #[test]
    fn bytes_round_trip(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let packed = rangelz::bytes::compress(&data).unwrap();
        prop_assert_eq!(rangelz::bytes::decompress(&packed).unwrap(), data);
    }

    /// Buffers drawn from a small alphabet repeat a lot; they must both
    /// round-trip and usually shrink.
    #[test]
    fn small_alphabet_round_trip(data in proptest::collection::vec(0u8..4, 64..2048)) {
        let packed = rangelz::bytes::compress(&data).unwrap();
        prop_assert_eq!(rangelz::bytes::decompress(&packed).unwrap(), data);
    }

    /// A sequence of equal-probability symbols round-trips through the
    /// range coder.
    #[test]
    fn equal_symbols_round_trip(
        symbols in proptest::collection::vec(equal_symbol_strategy(), 1..200)
    ) {
        let mut enc = RangeEncoder::new();
        for &(v, base) in &symbols {
            enc.write_equal(v, base).unwrap();
        }
        let packed = enc.finish();

        let mut dec = RangeDecoder::from_bytes(packed);
        for &(v, base) in &symbols {
            prop_assert_eq!(dec.read_equal(base).unwrap(), v);
        }
    }

    /// The split-exponent count code round-trips over its full domain,
    /// an exponent of at most 30 plus an offset.
    #[test]
    fn count_round_trips(values in proptest::collection::vec(0u32..1 << 31, 1..100)) {
        let mut enc = RangeEncoder::new();
        for &n in &values {
            enc.write_count(n).unwrap();
        }
        let packed = enc.finish();

        let mut dec = RangeDecoder::from_bytes(packed);
        for &n in &values {
            prop_assert_eq!(dec.read_count().unwrap(), n);
        }
    }

    /// The Fibonacci code round-trips for any positive u32.
    #[test]
    fn fibonacci_round_trips(values in proptest::collection::vec(1u32.., 1..100)) {
        let mut enc = RangeEncoder::new();
        for &n in &values {
            enc.write_fibonacci(n).unwrap();
        }
        let packed = enc.finish();

        let mut dec = RangeDecoder::from_bytes(packed);
        for &n in &values {
            prop_assert_eq!(dec.read_fibonacci().unwrap(), n);
        }
    }

    /// Whatever policy `choose` derives from a sample, every sampled
    /// value written under it reads back unchanged, with and without a
    /// reserved extra slot.
    #[test]
    fn split_policy_round_trips(
        sample in proptest::collection::vec(0u32..500, 1..40),
        extra in 0u32..2
    ) {
        let policy = SplitPolicy::choose(&sample);

        let mut enc = RangeEncoder::new();
        for &v in &sample {
            let mut list = IntervalList::new();
            policy.write_value(&mut list, v, extra);
            for part in &list {
                enc.write_part(*part).unwrap();
            }
        }
        let packed = enc.finish();

        let mut dec = RangeDecoder::from_bytes(packed);
        for &v in &sample {
            prop_assert_eq!(policy.read_value(&mut dec, extra).unwrap(), v);
        }
    }

    /// Interval round-trip through the coder: narrowing by an interval
    /// and reading at the same base recovers the lower bound.
    #[test]
    fn interval_parts_round_trip(
        parts in proptest::collection::vec((1u32..1000, 0u32..1000), 1..100)
    ) {
        let parts: Vec<Interval> = parts
            .into_iter()
            .map(|(base, raw)| Interval::new(raw % base, base))
            .collect();

        let mut enc = RangeEncoder::new();
        for part in &parts {
            enc.write_part(*part).unwrap();
        }
        let packed = enc.finish();

        let mut dec = RangeDecoder::from_bytes(packed);
        for part in &parts {
            prop_assert_eq!(dec.read_equal(part.base).unwrap(), part.lower);
        }
    }
}
