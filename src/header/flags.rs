//! The header flags bitfield.
//!
//! Five bytes, one flag each, strictly 0 or 1. The strict parse matters:
//! a flag byte that decodes to anything else means the header survived
//! Reed-Solomon but still carries values this version never wrote, and
//! guessing at their meaning could silently decrypt a volume wrongly.

use crate::config::FLAGS_LEN;
use crate::error::{EngineError, Result};

/// Volume feature flags, stored in the header in clear.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags {
    /// Serpent-CTR cipher layer and HMAC-SHA3-512 MAC.
    pub paranoid: bool,
    /// Payload Reed-Solomon redundancy.
    pub reed_solomon: bool,
    /// The key was mixed with one or more keyfiles.
    pub keyfile_used: bool,
    /// The keyfile mix is order-sensitive.
    pub keyfile_ordered: bool,
    /// The volume was written for deniability wrapping.
    pub deniability: bool,
}

impl Flags {
    /// Serialises into the fixed byte layout.
    #[must_use]
    pub fn to_bytes(self) -> [u8; FLAGS_LEN] {
        [
            u8::from(self.paranoid),
            u8::from(self.reed_solomon),
            u8::from(self.keyfile_used),
            u8::from(self.keyfile_ordered),
            u8::from(self.deniability),
        ]
    }

    /// Parses the fixed byte layout, rejecting unknown values.
    ///
    /// # Errors
    /// Fails with `HeaderCorrupt` when any byte is neither 0 nor 1.
    pub fn from_bytes(raw: &[u8; FLAGS_LEN]) -> Result<Self> {
        if raw.iter().any(|&b| b > 1) {
            return Err(EngineError::HeaderCorrupt("unknown flag values".to_owned()));
        }

        Ok(Self {
            paranoid: raw[0] == 1,
            reed_solomon: raw[1] == 1,
            keyfile_used: raw[2] == 1,
            keyfile_ordered: raw[3] == 1,
            deniability: raw[4] == 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_roundtrip() {
        let flags = Flags { paranoid: true, reed_solomon: false, keyfile_used: true, keyfile_ordered: false, deniability: true };
        assert_eq!(Flags::from_bytes(&flags.to_bytes()).unwrap(), flags);
    }

    #[test]
    fn test_default_is_all_clear() {
        assert_eq!(Flags::default().to_bytes(), [0u8; FLAGS_LEN]);
    }

    #[test]
    fn test_unknown_values_rejected() {
        let err = Flags::from_bytes(&[0, 0, 2, 0, 0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HeaderCorrupt);

        let err = Flags::from_bytes(&[0xFF, 0, 0, 0, 0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HeaderCorrupt);
    }
}
