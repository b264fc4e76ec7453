//! The volume cipher stack.
//!
//! XChaCha20 is the workhorse: a keystream XOR over every payload byte.
//! Paranoid mode layers Serpent-CTR underneath it, so plaintext passes
//! through Serpent first on encrypt and last on decrypt. The stack rekeys
//! its XChaCha20 stream every [`REKEY_INTERVAL`] bytes by drawing a fresh
//! key and nonce from the subkey schedule; the Serpent stream runs on under
//! its 128-bit counter, far from wrapping at any reachable volume size.

use chacha20::XChaCha20;
use cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use serpent::Serpent;
use zeroize::Zeroize;

use crate::config::{KEY_LEN, NONCE_LEN, REKEY_INTERVAL};
use crate::crypto::schedule::{KeyMaterial, SubkeyStream};
use crate::error::{EngineError, Result};

type SerpentCtr = Ctr128BE<Serpent>;

/// Streaming cipher state for one pass over a payload.
pub struct CipherStack {
    chacha: XChaCha20,
    serpent: Option<SerpentCtr>,
    since_rekey: u64,
}

impl CipherStack {
    /// Builds the stack from derived key material and the header nonce.
    ///
    /// # Errors
    /// Fails with `BadArgument` if the Serpent key or IV is rejected; the
    /// fixed lengths here make that a programmer error.
    pub fn new(material: &KeyMaterial, nonce: &[u8; NONCE_LEN], paranoid: bool) -> Result<Self> {
        let chacha = XChaCha20::new((&material.chacha_key).into(), nonce.into());

        let serpent = if paranoid {
            Some(SerpentCtr::new_from_slices(&material.serpent_key, &material.serpent_iv).map_err(|_| EngineError::BadArgument("invalid serpent key or iv length".to_owned()))?)
        } else {
            None
        };

        Ok(Self { chacha, serpent, since_rekey: 0 })
    }

    /// XORs the keystream into a buffer on the encrypt side.
    ///
    /// Serpent runs first so the on-disk bytes are
    /// `XChaCha20(Serpent(plaintext))`.
    ///
    /// # Errors
    /// Fails with `NonceExhaust` if either keystream runs out, which a
    /// correctly rekeyed stream never does.
    pub fn apply_encrypt(&mut self, buf: &mut [u8]) -> Result<()> {
        if let Some(serpent) = &mut self.serpent {
            serpent.try_apply_keystream(buf).map_err(|_| EngineError::NonceExhaust)?;
        }
        self.chacha.try_apply_keystream(buf).map_err(|_| EngineError::NonceExhaust)?;

        self.since_rekey += buf.len() as u64;
        Ok(())
    }

    /// XORs the keystream into a buffer on the decrypt side (reverse order).
    ///
    /// # Errors
    /// Same conditions as [`Self::apply_encrypt`].
    pub fn apply_decrypt(&mut self, buf: &mut [u8]) -> Result<()> {
        self.chacha.try_apply_keystream(buf).map_err(|_| EngineError::NonceExhaust)?;
        if let Some(serpent) = &mut self.serpent {
            serpent.try_apply_keystream(buf).map_err(|_| EngineError::NonceExhaust)?;
        }

        self.since_rekey += buf.len() as u64;
        Ok(())
    }

    /// True once the stream has carried [`REKEY_INTERVAL`] bytes.
    ///
    /// The driver checks between chunks; the interval is an exact multiple
    /// of the chunk size, so the boundary always lands here.
    #[inline]
    #[must_use]
    pub fn needs_rekey(&self) -> bool {
        self.since_rekey >= REKEY_INTERVAL
    }

    /// Replaces the XChaCha20 key and nonce with fresh draws.
    ///
    /// # Errors
    /// Propagates schedule exhaustion.
    pub fn rekey_from(&mut self, stream: &mut SubkeyStream) -> Result<()> {
        let mut key: [u8; KEY_LEN] = stream.draw_array()?;
        let nonce: [u8; NONCE_LEN] = stream.draw_array()?;

        self.chacha = XChaCha20::new((&key).into(), (&nonce).into());
        key.zeroize();
        self.since_rekey = 0;

        tracing::debug!("cipher stream rekeyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MASTER_KEY_LEN, SEED_LEN};

    fn material(paranoid: bool) -> KeyMaterial {
        let mut stream = SubkeyStream::new(&[0x42u8; MASTER_KEY_LEN], &[0x07u8; SEED_LEN]);
        KeyMaterial::derive(&mut stream, paranoid).unwrap()
    }

    #[test]
    fn test_roundtrip_normal() {
        let keys = material(false);
        let nonce = [9u8; NONCE_LEN];

        let mut buf = b"attack at dawn".to_vec();
        CipherStack::new(&keys, &nonce, false).unwrap().apply_encrypt(&mut buf).unwrap();
        assert_ne!(buf, b"attack at dawn");

        CipherStack::new(&keys, &nonce, false).unwrap().apply_decrypt(&mut buf).unwrap();
        assert_eq!(buf, b"attack at dawn");
    }

    #[test]
    fn test_roundtrip_paranoid() {
        let keys = material(true);
        let nonce = [9u8; NONCE_LEN];

        let mut buf = vec![0x55u8; 1000];
        CipherStack::new(&keys, &nonce, true).unwrap().apply_encrypt(&mut buf).unwrap();

        CipherStack::new(&keys, &nonce, true).unwrap().apply_decrypt(&mut buf).unwrap();
        assert_eq!(buf, vec![0x55u8; 1000]);
    }

    #[test]
    fn test_paranoid_layer_changes_ciphertext() {
        let keys = material(true);
        let nonce = [9u8; NONCE_LEN];

        let mut plain_stack = vec![0u8; 64];
        CipherStack::new(&keys, &nonce, false).unwrap().apply_encrypt(&mut plain_stack).unwrap();

        let mut paranoid_stack = vec![0u8; 64];
        CipherStack::new(&keys, &nonce, true).unwrap().apply_encrypt(&mut paranoid_stack).unwrap();

        assert_ne!(plain_stack, paranoid_stack);
    }

    #[test]
    fn test_split_applications_match_one_application() {
        let keys = material(false);
        let nonce = [1u8; NONCE_LEN];

        let mut whole = vec![0u8; 96];
        CipherStack::new(&keys, &nonce, false).unwrap().apply_encrypt(&mut whole).unwrap();

        let mut split = vec![0u8; 96];
        let mut stack = CipherStack::new(&keys, &nonce, false).unwrap();
        let (head, tail) = split.split_at_mut(33);
        stack.apply_encrypt(head).unwrap();
        stack.apply_encrypt(tail).unwrap();

        assert_eq!(whole, split);
    }

    #[test]
    fn test_rekey_replays_deterministically() {
        let keys = material(false);
        let nonce = [2u8; NONCE_LEN];

        let run = || {
            let mut schedule = SubkeyStream::new(&[0x42u8; MASTER_KEY_LEN], &[0x07u8; SEED_LEN]);
            let _ = KeyMaterial::derive(&mut schedule, false).unwrap();

            let mut stack = CipherStack::new(&keys, &nonce, false).unwrap();
            let mut buf = vec![0u8; 128];
            stack.apply_encrypt(&mut buf).unwrap();
            stack.rekey_from(&mut schedule).unwrap();
            let mut after = vec![0u8; 128];
            stack.apply_encrypt(&mut after).unwrap();
            (buf, after)
        };

        let (first_a, first_b) = run();
        let (second_a, second_b) = run();
        assert_eq!(first_a, second_a);
        assert_eq!(first_b, second_b);
        assert_ne!(first_a, first_b, "rekey must change the keystream");
    }
}
