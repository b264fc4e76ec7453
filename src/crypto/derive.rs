//! Master-key derivation with Argon2id.
//!
//! Argon2id is the only expensive step of an encrypt or decrypt call. The
//! memory-hard computation resists GPU/ASIC cracking, the salt defeats
//! precomputation, and the paranoid cost row doubles the pass count for
//! volumes that opt in.

use argon2::Algorithm::Argon2id;
use argon2::Version::V0x13;
use argon2::{Argon2, Params};
use rand::rand_core::TryRng;
use rand::rngs::SysRng;

use crate::config::{ARGON_LANES, ARGON_MEMORY, ARGON_TIME, ARGON_TIME_PARANOID, MASTER_KEY_LEN, SALT_LEN};
use crate::error::{EngineError, Result};

/// One Argon2id cost row.
///
/// The engine carries its cost table in configuration rather than as global
/// state, so tests and embedders can trade derivation time for memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KdfCosts {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub time: u32,
    /// Parallelism (lanes).
    pub lanes: u32,
}

impl KdfCosts {
    /// The normal-mode cost row: 1 GiB, 4 passes, 4 lanes.
    #[must_use]
    pub const fn normal() -> Self {
        Self { memory_kib: ARGON_MEMORY, time: ARGON_TIME, lanes: ARGON_LANES }
    }

    /// The paranoid-mode cost row: same memory, twice the passes.
    #[must_use]
    pub const fn paranoid() -> Self {
        Self { memory_kib: ARGON_MEMORY, time: ARGON_TIME_PARANOID, lanes: ARGON_LANES }
    }
}

/// Derives the 32-byte master key from a password and salt.
///
/// The password may be empty; a volume protected only by keyfiles still runs
/// the full derivation so that the subsequent keyfile mix is the sole secret.
///
/// # Errors
/// Fails with `Kdf` when the parameters are rejected or the derivation
/// cannot complete (typically memory exhaustion).
pub fn derive_master(password: &[u8], salt: &[u8; SALT_LEN], costs: KdfCosts) -> Result<[u8; MASTER_KEY_LEN]> {
    let params = Params::new(costs.memory_kib, costs.time, costs.lanes, Some(MASTER_KEY_LEN)).map_err(|e| EngineError::Kdf(format!("invalid argon2 parameters: {e}")))?;

    let argon2 = Argon2::new(Argon2id, V0x13, params);

    let mut key = [0u8; MASTER_KEY_LEN];
    argon2.hash_password_into(password, salt, &mut key).map_err(|e| EngineError::Kdf(format!("argon2 failed: {e}")))?;

    Ok(key)
}

/// Generates cryptographically secure random bytes from the OS generator.
///
/// # Errors
/// Fails when the operating system's generator is unavailable.
pub fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    SysRng.try_fill_bytes(&mut bytes).map_err(|e| EngineError::Kdf(format!("rng failed: {e}")))?;

    Ok(bytes)
}
