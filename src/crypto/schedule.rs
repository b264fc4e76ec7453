//! The deterministic subkey schedule.
//!
//! Everything keyed in a volume comes out of one expansion stream:
//! HKDF-SHA3-256 over the effective master key, salted by the random seed
//! atom. The draws happen in a fixed order (XChaCha20 key, then Serpent key
//! and IV in paranoid mode, then the MAC key, then the key check value) and
//! each 60 GiB rekey draws a further key + nonce pair. Both sides of a
//! volume replay the identical sequence, so the stream is state the caller
//! carries for the whole call.

use hkdf::Hkdf;
use sha3::Sha3_256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::config::{CHECK_LEN, KEY_LEN, MAC_LEN, MASTER_KEY_LEN, SEED_LEN, SERPENT_IV_LEN};
use crate::error::{EngineError, Result};

/// HKDF-SHA3-256 can expand at most 255 hash blocks.
const MAX_DRAW: usize = 255 * 32;

/// An incremental reader over the HKDF expansion stream.
pub struct SubkeyStream {
    expand: Hkdf<Sha3_256>,
    offset: usize,
}

impl SubkeyStream {
    /// Opens the stream for a master key and seed.
    #[must_use]
    pub fn new(master: &[u8; MASTER_KEY_LEN], seed: &[u8; SEED_LEN]) -> Self {
        Self { expand: Hkdf::new(Some(seed.as_slice()), master), offset: 0 }
    }

    /// Draws the next `out.len()` bytes of the stream.
    ///
    /// # Errors
    /// Fails with `NonceExhaust` once the expansion limit is reached; at one
    /// rekey per 60 GiB that bound sits in the multi-terabyte range for a
    /// single stream.
    pub fn draw(&mut self, out: &mut [u8]) -> Result<()> {
        let end = self.offset.checked_add(out.len()).filter(|&end| end <= MAX_DRAW).ok_or(EngineError::NonceExhaust)?;

        // HKDF-Expand always yields the stream from the beginning, so expand
        // up to the new offset and keep only the tail.
        let mut okm = Zeroizing::new(vec![0u8; end]);
        self.expand.expand(&[], okm.as_mut_slice()).map_err(|_| EngineError::NonceExhaust)?;

        out.copy_from_slice(&okm[self.offset..]);
        self.offset = end;

        Ok(())
    }

    /// Draws a fixed-size array from the stream.
    ///
    /// # Errors
    /// Same conditions as [`Self::draw`].
    pub fn draw_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        self.draw(&mut out)?;
        Ok(out)
    }
}

/// The key material of one encrypt or decrypt call.
///
/// Owned exclusively by the driver and zeroised on every exit path,
/// including panics, via drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    /// XChaCha20 key.
    pub chacha_key: [u8; KEY_LEN],
    /// Serpent key; all zero outside paranoid mode.
    pub serpent_key: [u8; KEY_LEN],
    /// Serpent CTR initialisation vector; all zero outside paranoid mode.
    pub serpent_iv: [u8; SERPENT_IV_LEN],
    /// Payload MAC key.
    pub mac_key: [u8; MAC_LEN],
    /// Fast wrong-password detector, stored in the header in clear.
    pub key_check: [u8; CHECK_LEN],
}

impl KeyMaterial {
    /// Draws the material in schedule order.
    ///
    /// The Serpent draws only happen in paranoid mode, which keeps the
    /// non-paranoid stream layout identical to a volume that never heard of
    /// Serpent.
    ///
    /// # Errors
    /// Propagates stream exhaustion.
    pub fn derive(stream: &mut SubkeyStream, paranoid: bool) -> Result<Self> {
        let chacha_key = stream.draw_array()?;

        let (serpent_key, serpent_iv) = if paranoid {
            (stream.draw_array()?, stream.draw_array()?)
        } else {
            ([0u8; KEY_LEN], [0u8; SERPENT_IV_LEN])
        };

        let mac_key = stream.draw_array()?;
        let key_check = stream.draw_array()?;

        Ok(Self { chacha_key, serpent_key, serpent_iv, mac_key, key_check })
    }
}
