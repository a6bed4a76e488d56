//! Per-protocol payload codecs (spec.md §4.6's stream-kind table).
//!
//! Each submodule owns the request/response structs for one or two related
//! stream kinds and a pair of free `encode`/`decode` functions, following
//! `jamnp_core::framing::Frame`'s shape rather than a trait: these are pure
//! data, the trait-based dispatch lives in [`crate::handler`].

pub mod assurance;
pub mod audit;
pub mod block;
pub mod judgment;
pub mod preimage;
pub mod shard;
pub mod state;
pub mod ticket;
pub mod up0;
pub mod work_package;
pub mod work_report;

use jamnp_core::error::CodecError;
use jamnp_core::natural;

/// Sequences longer than this are accepted but logged (spec §7 "length
/// field exceeds bound: sanity cap: > 1000 items emits a warning").
pub const SEQUENCE_WARN_THRESHOLD: usize = 1000;

/// Encode `data` as a Gray-Paper natural-number length prefix followed by
/// the bytes themselves (the `len ‖ bytes` shape used throughout §4.6,
/// distinct from `jamnp_core::framing::Frame`'s fixed `u32` stream frames).
pub fn encode_blob(data: &[u8]) -> Vec<u8> {
    let mut out = natural::encode(data.len() as u64);
    out.extend_from_slice(data);
    out
}

/// Decode a natural-length-prefixed blob from the front of `buf`.
pub fn decode_blob(buf: &[u8]) -> Result<(Vec<u8>, usize), CodecError> {
    let (len, offset) = natural::decode(buf)?;
    let len = len as usize;
    if buf.len() < offset + len {
        return Err(CodecError::insufficient(offset + len, buf.len()));
    }
    Ok((buf[offset..offset + len].to_vec(), offset + len))
}

/// Encode a natural-number count followed by each item's own encoding.
pub fn encode_seq<T>(items: &[T], mut encode_item: impl FnMut(&T) -> Vec<u8>) -> Vec<u8> {
    let mut out = natural::encode(items.len() as u64);
    for item in items {
        out.extend(encode_item(item));
    }
    out
}

/// Decode a natural-number count followed by that many items, each decoded
/// by `decode_item` (which returns the item and bytes consumed).
pub fn decode_seq<T>(
    buf: &[u8],
    mut decode_item: impl FnMut(&[u8]) -> Result<(T, usize), CodecError>,
) -> Result<(Vec<T>, usize), CodecError> {
    let (count, mut offset) = natural::decode(buf)?;
    if count as usize > SEQUENCE_WARN_THRESHOLD {
        tracing::warn!(count, "sequence length exceeds sanity threshold of {SEQUENCE_WARN_THRESHOLD}");
    }

    let mut items = Vec::with_capacity((count as usize).min(SEQUENCE_WARN_THRESHOLD));
    for _ in 0..count {
        let (item, consumed) = decode_item(&buf[offset..])?;
        items.push(item);
        offset += consumed;
    }
    Ok((items, offset))
}

/// Slice out exactly `N` bytes from the front of `buf` or report how many
/// more are needed.
pub(crate) fn take_fixed<const N: usize>(buf: &[u8], context: &'static str) -> Result<([u8; N], &[u8]), CodecError> {
    if buf.len() < N {
        return Err(CodecError::insufficient_for(context, N, buf.len()));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[..N]);
    Ok((out, &buf[N..]))
}
