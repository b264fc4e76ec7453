//! Keyfile mixing.
//!
//! Zero or more keyfiles fold into a single 32-byte value that is XORed into
//! the Argon2id output. Each keyfile is streamed through BLAKE2b-256 so
//! arbitrarily large files cost one pass of hashing and no memory. The
//! unordered mix XORs the digests (any ordering of the same files unlocks
//! the volume); the ordered mix hashes the digest concatenation, making the
//! order part of the credential.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use blake2::digest::consts::U32;
use blake2::{Blake2b, Blake2b512, Digest};

use crate::config::{CHECK_LEN, KEYFILE_DIGEST_LEN, MASTER_KEY_LEN};
use crate::error::Result;

type Blake2b256 = Blake2b<U32>;

/// Streams one keyfile through BLAKE2b-256.
fn digest_keyfile(path: &Path) -> Result<[u8; KEYFILE_DIGEST_LEN]> {
    let file = File::open(path).map_err(|e| io::Error::new(e.kind(), format!("keyfile {}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Blake2b256::new();

    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize().into())
}

/// Mixes the given keyfiles into a 32-byte value.
///
/// An empty list yields all zeroes, which leaves the master key untouched
/// when applied.
///
/// # Errors
/// Fails with `Io` when a keyfile cannot be read.
pub fn mix_keyfiles(paths: &[PathBuf], ordered: bool) -> Result<[u8; KEYFILE_DIGEST_LEN]> {
    if paths.is_empty() {
        return Ok([0u8; KEYFILE_DIGEST_LEN]);
    }

    if ordered {
        let mut outer = Blake2b256::new();
        for path in paths {
            outer.update(digest_keyfile(path)?);
        }
        return Ok(outer.finalize().into());
    }

    let mut mix = [0u8; KEYFILE_DIGEST_LEN];
    for path in paths {
        let digest = digest_keyfile(path)?;
        for (byte, fold) in mix.iter_mut().zip(digest) {
            *byte ^= fold;
        }
    }

    Ok(mix)
}

/// Folds the keyfile mix into the master key in place.
pub fn apply_mix(master: &mut [u8; MASTER_KEY_LEN], mix: &[u8; KEYFILE_DIGEST_LEN]) {
    for (byte, fold) in master.iter_mut().zip(mix) {
        *byte ^= fold;
    }
}

/// The header check value for a keyfile mix.
///
/// Stored in clear so decrypt can tell wrong keyfiles apart from a wrong
/// password before any MAC work starts.
#[must_use]
pub fn check_value(mix: &[u8; KEYFILE_DIGEST_LEN]) -> [u8; CHECK_LEN] {
    let digest = Blake2b512::digest(mix);

    let mut check = [0u8; CHECK_LEN];
    check.copy_from_slice(&digest);
    check
}
