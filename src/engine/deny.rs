//! The deniability wrapper.
//!
//! A deniable volume is an ordinary volume XORed, in its entirety, with a
//! keystream that depends on nothing but the password: the key is Argon2id
//! over a fixed all-zero salt and the starting nonce is the first 24 bytes
//! of SHA3-256 of the password. Nothing about the result is recognisable
//! (no version atom, no structure), and unwrapping with a wrong password
//! produces more apparent garbage rather than an error message admitting a
//! volume exists.
//!
//! The wrap stream rekeys at the same 60 GiB threshold as the inner cipher,
//! but by nonce chaining: nonce' = SHA3-256(nonce)[..24] with the key held
//! fixed. The construction is non-standard and is kept for bit
//! compatibility with existing volumes; new formats should not copy it.

use std::io::{Read, Write};

use chacha20::XChaCha20;
use cipher::{KeyIvInit, StreamCipher};
use sha3::{Digest, Sha3_256};
use zeroize::Zeroizing;

use crate::config::{CHUNK_SIZE, KEY_LEN, NONCE_LEN, REKEY_INTERVAL, SALT_LEN};
use crate::crypto::{KdfCosts, derive_master};
use crate::engine::reporter::Reporter;
use crate::error::{EngineError, Result};

fn chained_nonce(nonce: &[u8; NONCE_LEN]) -> [u8; NONCE_LEN] {
    let digest = Sha3_256::digest(nonce);
    let mut next = [0u8; NONCE_LEN];
    next.copy_from_slice(&digest[..NONCE_LEN]);
    next
}

/// The headerless whole-volume keystream.
pub struct DenyStream {
    cipher: XChaCha20,
    key: Zeroizing<[u8; KEY_LEN]>,
    nonce: [u8; NONCE_LEN],
    since_rekey: u64,
}

impl DenyStream {
    /// Derives the wrap stream for a password.
    ///
    /// Always uses the normal KDF cost row: the paranoid flag lives inside
    /// the wrapped header, unreadable before unwrapping.
    ///
    /// # Errors
    /// Propagates KDF failure.
    pub fn derive(password: &[u8], costs: KdfCosts) -> Result<Self> {
        let salt = [0u8; SALT_LEN];
        let key = Zeroizing::new(derive_master(password, &salt, costs)?);

        let digest = Sha3_256::digest(password);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&digest[..NONCE_LEN]);

        let cipher = XChaCha20::new((&*key).into(), (&nonce).into());

        Ok(Self { cipher, key, nonce, since_rekey: 0 })
    }

    /// XORs the wrap keystream into a buffer.
    ///
    /// The volume length is not chunk-aligned (headers see to that), so the
    /// rekey boundary can fall mid-buffer; the buffer is split there and the
    /// stream rekeyed in place.
    ///
    /// # Errors
    /// Fails with `NonceExhaust` if the keystream somehow outruns the rekey
    /// schedule.
    pub fn apply(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut remaining = buf;
        while !remaining.is_empty() {
            let until_rekey = usize::try_from(REKEY_INTERVAL - self.since_rekey).unwrap_or(usize::MAX);
            let take = remaining.len().min(until_rekey);

            let (head, tail) = remaining.split_at_mut(take);
            self.cipher.try_apply_keystream(head).map_err(|_| EngineError::NonceExhaust)?;
            self.since_rekey += take as u64;

            if self.since_rekey == REKEY_INTERVAL {
                self.rekey();
            }
            remaining = tail;
        }

        Ok(())
    }

    /// Chains the nonce and restarts the keystream.
    pub(crate) fn rekey(&mut self) {
        self.nonce = chained_nonce(&self.nonce);
        self.cipher = XChaCha20::new((&*self.key).into(), (&self.nonce).into());
        self.since_rekey = 0;

        tracing::debug!("deniability stream rekeyed");
    }
}

/// Pumps a whole volume through the wrap stream.
///
/// The same call serves both directions; XOR is its own inverse. Progress
/// and cancellation are observed per buffer.
///
/// # Errors
/// Fails with `Io` on stream errors and `Cancelled` when the reporter asks.
pub fn transfer<R: Read, W: Write>(source: &mut R, sink: &mut W, stream: &mut DenyStream, reporter: &dyn Reporter, total: u64) -> Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut done = 0u64;
    reporter.set_progress(0, total);

    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            break;
        }

        stream.apply(&mut buf[..n])?;
        sink.write_all(&buf[..n])?;

        done += n as u64;
        reporter.set_progress(done, total);
        if reporter.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
    }

    sink.flush()?;
    Ok(done)
}
