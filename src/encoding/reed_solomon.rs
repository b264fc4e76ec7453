//! Fixed Reed-Solomon codecs over GF(2^8).
//!
//! The volume format uses a small set of shortened RS(255, k) codes, one per
//! field size it ever needs to protect. Header atoms triple in size (parity
//! is twice the data length), while payload blocks get a slimmer 8 parity
//! bytes per 128 data bytes. A codeword with at most ⌊parity/2⌋ corrupted
//! bytes decodes back to the original data; anything worse is reported as
//! unrecoverable rather than silently wrong.

use std::sync::LazyLock;

use reed_solomon::{Decoder, Encoder};

use crate::error::{EngineError, Result};

/// A fixed-geometry Reed-Solomon codec.
///
/// Encoding is systematic: the codeword is the original data followed by
/// parity, so the data bytes can be recovered without decoding when speed
/// matters more than repair (the speculative fast pass).
#[derive(Debug)]
pub struct RsCodec {
    data_len: usize,
    parity_len: usize,
    encoder: Encoder,
    decoder: Decoder,
}

impl RsCodec {
    /// Builds the codec for one of the supported data lengths.
    ///
    /// The parity sizing is fixed by the volume format: parity = 2k for the
    /// header atom codecs (k ≤ 64) and 8 bytes for the 128-byte payload
    /// block codec.
    fn new(data_len: usize, parity_len: usize) -> Self {
        debug_assert!(data_len + parity_len <= 255, "codeword exceeds GF(2^8)");
        Self { data_len, parity_len, encoder: Encoder::new(parity_len), decoder: Decoder::new(parity_len) }
    }

    /// Number of data bytes per codeword.
    #[inline]
    #[must_use]
    pub const fn data_len(&self) -> usize {
        self.data_len
    }

    /// Number of bytes per encoded codeword.
    #[inline]
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        self.data_len + self.parity_len
    }

    /// Maximum number of corrupted bytes a codeword survives.
    #[inline]
    #[must_use]
    pub const fn correctable(&self) -> usize {
        self.parity_len / 2
    }

    /// Encodes exactly `data_len` bytes into a codeword.
    ///
    /// # Errors
    /// Fails with `BadSize` if the input length does not match the codec.
    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() != self.data_len {
            return Err(EngineError::BadSize(format!("codec takes exactly {} bytes, got {}", self.data_len, data.len())));
        }

        Ok(self.encoder.encode(data).to_vec())
    }

    /// Decodes a codeword back to its data bytes.
    ///
    /// With `fast` set the decoder is skipped entirely and the data prefix is
    /// returned as-is; the caller is expected to detect corruption by other
    /// means (the payload MAC). Without `fast`, Berlekamp-Massey correction
    /// runs and corruption beyond [`Self::correctable`] bytes fails with
    /// `Unrecoverable`. The input buffer is never modified.
    ///
    /// # Errors
    /// Fails with `BadSize` on a wrong-length codeword and `Unrecoverable`
    /// when correction capacity is exceeded.
    pub fn decode(&self, codeword: &[u8], fast: bool) -> Result<Vec<u8>> {
        if codeword.len() != self.encoded_len() {
            return Err(EngineError::BadSize(format!("codeword must be {} bytes, got {}", self.encoded_len(), codeword.len())));
        }

        if fast {
            return Ok(codeword[..self.data_len].to_vec());
        }

        let recovered = self.decoder.correct(codeword, None).map_err(|_| EngineError::Unrecoverable { kept: false })?;

        Ok(recovered.data().to_vec())
    }
}

/// Codec for 1-byte fields (comment bytes, the payload tail length marker).
pub static RS1: LazyLock<RsCodec> = LazyLock::new(|| RsCodec::new(1, 2));

/// Codec for 5-byte fields (version tag, comment length, flags).
pub static RS5: LazyLock<RsCodec> = LazyLock::new(|| RsCodec::new(5, 10));

/// Codec for 16-byte fields (salt, subkey seed).
pub static RS16: LazyLock<RsCodec> = LazyLock::new(|| RsCodec::new(16, 32));

/// Codec for 24-byte fields (XChaCha20 nonce).
pub static RS24: LazyLock<RsCodec> = LazyLock::new(|| RsCodec::new(24, 48));

/// Codec for 32-byte fields. Reserved by the format.
pub static RS32: LazyLock<RsCodec> = LazyLock::new(|| RsCodec::new(32, 64));

/// Codec for 64-byte fields (key check, keyfile check, MAC tag).
pub static RS64: LazyLock<RsCodec> = LazyLock::new(|| RsCodec::new(64, 128));

/// Codec for 128-byte payload blocks.
pub static RS128: LazyLock<RsCodec> = LazyLock::new(|| RsCodec::new(128, 8));

/// Looks up the pre-built codec for a data length.
///
/// # Errors
/// Fails with `BadSize` for lengths the format never uses.
pub fn codec_for(data_len: usize) -> Result<&'static RsCodec> {
    match data_len {
        1 => Ok(&RS1),
        5 => Ok(&RS5),
        16 => Ok(&RS16),
        24 => Ok(&RS24),
        32 => Ok(&RS32),
        64 => Ok(&RS64),
        128 => Ok(&RS128),
        other => Err(EngineError::BadSize(format!("no codec for {other}-byte fields"))),
    }
}
