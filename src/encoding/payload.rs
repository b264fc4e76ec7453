//! Payload block framing for the redundancy layer.
//!
//! When payload Reed-Solomon is enabled, each 128-byte block of a ciphertext
//! chunk is written as a 136-byte codeword. A trailing partial block (which
//! can only occur in the final chunk of a stream) is zero-padded to 128
//! bytes, and its true length travels in front of it as a 1-byte value
//! encoded to 3 bytes. The two decode strategies mirror the two decrypt
//! passes: `strip` drops parity without looking at it, `repair` runs full
//! correction on every codeword.

use crate::config::{RS_BLOCK_CODE, RS_BLOCK_DATA};
use crate::encoding::reed_solomon::{RS1, RS128};
use crate::error::{EngineError, Result};

/// On-disk size of the encoded tail length marker.
pub const TAIL_MARKER_LEN: usize = 3;

/// On-disk size of an encoded chunk of `plain_len` ciphertext bytes.
#[must_use]
pub fn encoded_chunk_len(plain_len: usize) -> usize {
    let full = plain_len / RS_BLOCK_DATA;
    let tail = plain_len % RS_BLOCK_DATA;

    full * RS_BLOCK_CODE + if tail == 0 { 0 } else { TAIL_MARKER_LEN + RS_BLOCK_CODE }
}

/// Encodes one ciphertext chunk into its on-disk framing.
///
/// # Errors
/// Propagates codec failures; these indicate programmer error since block
/// sizes are fixed here.
pub fn encode_chunk(plain: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(encoded_chunk_len(plain.len()));

    let mut blocks = plain.chunks_exact(RS_BLOCK_DATA);
    for block in &mut blocks {
        out.extend_from_slice(&RS128.encode(block)?);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        out.extend_from_slice(&RS1.encode(&[tail.len() as u8])?);

        let mut padded = [0u8; RS_BLOCK_DATA];
        padded[..tail.len()].copy_from_slice(tail);
        out.extend_from_slice(&RS128.encode(&padded)?);
    }

    Ok(out)
}

/// Splits an encoded chunk into its full codewords and optional tail.
fn parse_frame(encoded_len: usize) -> Result<(usize, bool)> {
    if encoded_len % RS_BLOCK_CODE == 0 {
        return Ok((encoded_len / RS_BLOCK_CODE, false));
    }

    let tail_overhead = TAIL_MARKER_LEN + RS_BLOCK_CODE;
    if encoded_len >= tail_overhead && (encoded_len - tail_overhead) % RS_BLOCK_CODE == 0 {
        return Ok(((encoded_len - tail_overhead) / RS_BLOCK_CODE, true));
    }

    Err(EngineError::BadSize(format!("{encoded_len} encoded bytes do not fit the redundancy framing")))
}

/// Tail lengths are 1..=127; anything else is corruption.
fn clamp_tail_len(raw: u8) -> usize {
    usize::from(raw).clamp(1, RS_BLOCK_DATA - 1)
}

/// Fast-pass decode: returns the data prefix of every codeword unverified.
///
/// Corruption flows through untouched and is caught by the payload MAC,
/// which authenticates the on-disk bytes. A corrupted tail marker is clamped
/// into range so the pass can finish; the slow pass recovers the real value.
///
/// # Errors
/// Fails with `BadSize` when the chunk length fits no valid framing.
pub fn strip_chunk(encoded: &[u8]) -> Result<Vec<u8>> {
    let (full_blocks, has_tail) = parse_frame(encoded.len())?;

    let mut out = Vec::with_capacity(full_blocks * RS_BLOCK_DATA + RS_BLOCK_DATA);
    for i in 0..full_blocks {
        let codeword = &encoded[i * RS_BLOCK_CODE..(i + 1) * RS_BLOCK_CODE];
        out.extend_from_slice(&codeword[..RS_BLOCK_DATA]);
    }

    if has_tail {
        let rest = &encoded[full_blocks * RS_BLOCK_CODE..];
        let tail_len = clamp_tail_len(rest[0]);
        out.extend_from_slice(&rest[TAIL_MARKER_LEN..TAIL_MARKER_LEN + tail_len]);
    }

    Ok(out)
}

/// Slow-pass decode: runs full correction on every codeword.
///
/// Returns the recovered data and whether every codeword decoded cleanly.
/// Without `force`, the first unrecoverable codeword aborts the chunk. With
/// `force`, the raw data prefix stands in for a lost block and the chunk is
/// flagged as incompletely repaired.
///
/// # Errors
/// Fails with `BadSize` on invalid framing and `Unrecoverable` when a
/// codeword is beyond repair and `force` is not set.
pub fn repair_chunk(encoded: &[u8], force: bool) -> Result<(Vec<u8>, bool)> {
    let (full_blocks, has_tail) = parse_frame(encoded.len())?;

    let mut intact = true;
    let mut out = Vec::with_capacity(full_blocks * RS_BLOCK_DATA + RS_BLOCK_DATA);

    for i in 0..full_blocks {
        let codeword = &encoded[i * RS_BLOCK_CODE..(i + 1) * RS_BLOCK_CODE];
        match RS128.decode(codeword, false) {
            Ok(data) => out.extend_from_slice(&data),
            Err(EngineError::Unrecoverable { .. }) if force => {
                intact = false;
                out.extend_from_slice(&codeword[..RS_BLOCK_DATA]);
            }
            Err(e) => return Err(e),
        }
    }

    if has_tail {
        let rest = &encoded[full_blocks * RS_BLOCK_CODE..];

        let tail_len = match RS1.decode(&rest[..TAIL_MARKER_LEN], false) {
            Ok(marker) if (1..RS_BLOCK_DATA).contains(&usize::from(marker[0])) => usize::from(marker[0]),
            Ok(_) | Err(EngineError::Unrecoverable { .. }) if force => {
                intact = false;
                clamp_tail_len(rest[0])
            }
            Ok(_) => return Err(EngineError::Unrecoverable { kept: false }),
            Err(e) => return Err(e),
        };

        match RS128.decode(&rest[TAIL_MARKER_LEN..], false) {
            Ok(data) => out.extend_from_slice(&data[..tail_len]),
            Err(EngineError::Unrecoverable { .. }) if force => {
                intact = false;
                out.extend_from_slice(&rest[TAIL_MARKER_LEN..TAIL_MARKER_LEN + tail_len]);
            }
            Err(e) => return Err(e),
        }
    }

    Ok((out, intact))
}
