//! Payload authentication.
//!
//! The MAC always authenticates the on-disk payload bytes: post-redundancy
//! on encrypt, pre-correction on decrypt. Normal mode uses keyed
//! BLAKE2b-512; paranoid mode switches to HMAC-SHA3-512. Both yield a
//! 64-byte tag that lives in the header and is compared in constant time.

use blake2::Blake2bMac512;
use hmac::{Hmac, Mac as _};
use sha3::Sha3_512;
use subtle::ConstantTimeEq;

use crate::config::MAC_LEN;
use crate::error::{EngineError, Result};

enum Inner {
    Blake(Box<Blake2bMac512>),
    Sha3(Box<Hmac<Sha3_512>>),
}

/// Incremental MAC over a payload stream.
pub struct PayloadMac {
    inner: Inner,
}

impl PayloadMac {
    /// Keys a MAC for one pass over a payload.
    ///
    /// # Errors
    /// Fails with `BadArgument` if the key is rejected; the fixed 64-byte
    /// key makes that a programmer error.
    pub fn new(key: &[u8; MAC_LEN], paranoid: bool) -> Result<Self> {
        let inner = if paranoid {
            Inner::Sha3(Box::new(Hmac::new_from_slice(key).map_err(|_| EngineError::BadArgument("invalid hmac key length".to_owned()))?))
        } else {
            Inner::Blake(Box::new(Blake2bMac512::new_from_slice(key).map_err(|_| EngineError::BadArgument("invalid blake2b key length".to_owned()))?))
        };

        Ok(Self { inner })
    }

    /// Absorbs the next run of on-disk payload bytes.
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.inner {
            Inner::Blake(mac) => mac.update(data),
            Inner::Sha3(mac) => mac.update(data),
        }
    }

    /// Finishes the pass and returns the tag.
    #[must_use]
    pub fn finalize(self) -> [u8; MAC_LEN] {
        let bytes = match self.inner {
            Inner::Blake(mac) => mac.finalize().into_bytes(),
            Inner::Sha3(mac) => mac.finalize().into_bytes(),
        };

        let mut tag = [0u8; MAC_LEN];
        tag.copy_from_slice(&bytes);
        tag
    }

    /// Finishes the pass and compares against an expected tag in constant
    /// time.
    #[must_use]
    pub fn matches(self, expected: &[u8; MAC_LEN]) -> bool {
        bool::from(self.finalize().ct_eq(expected))
    }
}
