//! Whole-buffer byte codec: the match engine and the range coder
//! wired together behind a two-function API.
//!
//! A compressed stream is the element count, the matching stream
//! header, then one field per surviving element. Literal bytes at
//! positions 0 and 1 code at their plain base; every later literal
//! codes at the widened base so the reserved escape slot can announce
//! a back-reference token.

use std::sync::Arc;

use crate::coder::{RangeDecoder, RangeEncoder};
use crate::error::{Error, Result};
use crate::interval::{Interval, IntervalList};
use crate::lz::base_with_buffer;
use crate::lz::decoder::{DistRead, read_token_dist, read_token_length, read_token_spiral};
use crate::lz::encoder::{LzEncoder, LzOptions};
use crate::model::CumulativeMap;
use crate::progress::{NoProgress, ProgressSink};

const BYTE_BASE: u32 = 256;

/// Compresses a byte buffer with the default options.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    compress_with(data, LzOptions::default(), Arc::new(NoProgress))
}

/// Compresses a byte buffer with explicit match-engine options and a
/// progress sink.
pub fn compress_with(
    data: &[u8],
    options: LzOptions,
    progress: Arc<dyn ProgressSink>,
) -> Result<Vec<u8>> {
    if data.len() >= 1 << 31 {
        return Err(Error::InvalidParameters {
            reason: "input longer than the count code can describe",
        });
    }

    let elements: Vec<IntervalList> = data
        .iter()
        .map(|&b| IntervalList::single(Interval::new(u32::from(b), BYTE_BASE)))
        .collect();
    let codes: Vec<u32> = data.iter().map(|&b| u32::from(b)).collect();

    let options = LzOptions {
        prefix_len: 3,
        ..options
    };
    let output = LzEncoder::new(options)
        .with_progress(progress)
        .encode_with_codes(&elements, &codes, None);

    let mut enc = RangeEncoder::new();
    enc.write_count(data.len() as u32)?;
    output.write_header(&mut enc)?;
    for element in &output.elements {
        for part in element {
            enc.write_part(*part)?;
        }
    }
    Ok(enc.finish())
}

/// Decompresses a buffer produced by [`compress`].
pub fn decompress(stream: &[u8]) -> Result<Vec<u8>> {
    let mut dec = RangeDecoder::from_bytes(stream);
    let count = dec.read_count()? as usize;
    let data = crate::lz::LzData::read_header(&mut dec)?;

    // A corrupt count must not drive allocation or looping on its own.
    // The coder reads zero bits past the end forever, so cut it off
    // once the cursor is past everything a valid stream could need.
    let capacity = count.min(1 << 20);
    let bit_limit = stream.len() * 8 + 64;

    let Some(data) = data else {
        // Nothing matched; the stream is count plain literals.
        let mut out = Vec::with_capacity(capacity);
        for _ in 0..count {
            if dec.bit_pos() > bit_limit {
                return Err(Error::corrupt(dec.bit_pos(), "stream exhausted"));
            }
            out.push(dec.read_equal(BYTE_BASE)? as u8);
        }
        return Ok(out);
    };

    let widened = base_with_buffer(BYTE_BASE);
    let mut weights = vec![1u32; BYTE_BASE as usize];
    weights.push(widened - BYTE_BASE);
    let literals = CumulativeMap::from_weights(&weights);

    let mut out: Vec<u8> = Vec::with_capacity(capacity);
    while out.len() < count {
        if dec.bit_pos() > bit_limit {
            return Err(Error::corrupt(dec.bit_pos(), "stream exhausted"));
        }
        if out.len() < 2 {
            out.push(dec.read_equal(BYTE_BASE)? as u8);
            continue;
        }
        let symbol = dec.read_model(&literals)?;
        if symbol < BYTE_BASE as usize {
            out.push(symbol as u8);
            continue;
        }

        let length = read_token_length(&mut dec, &data)?;
        let (dist, spiral) = match read_token_dist(&mut dec, &data, out.len(), length)? {
            DistRead::Plain(dist) => (dist, 0),
            DistRead::Spiral => (0, read_token_spiral(&mut dec, &data)?),
        };

        let chunk = length as usize + 2;
        let total = chunk as u64 * (u64::from(spiral) + 1);
        if out.len() as u64 + total > count as u64 {
            return Err(Error::corrupt(
                dec.bit_pos(),
                "match overruns the declared length",
            ));
        }
        // read_token_dist bounds dist by the decoded prefix, so the
        // source chunk lies fully inside out.
        let start = out.len() - dist as usize - chunk;
        for t in 0..total as usize {
            let b = out[start + t % chunk];
            out.push(b);
        }
    }
    Ok(out)
}
