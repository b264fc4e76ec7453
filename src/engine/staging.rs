//! Ephemeral-encrypted staging files.
//!
//! Deniability needs a complete volume on disk before the outer wrap can
//! run, and unwrapping needs somewhere to put the inner volume before the
//! real decrypt starts. Those intermediates go through a staging file that
//! is XChaCha20-encrypted under a random key living only in this process,
//! deleted when the handle drops, and swept on the next start if a crash
//! ever leaves one behind.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::time::Duration;
use std::{env, fs};

use chacha20::XChaCha20;
use cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use tempfile::{Builder, NamedTempFile};
use zeroize::Zeroizing;

use crate::config::{KEY_LEN, NONCE_LEN, STAGE_PREFIX};
use crate::crypto::random_bytes;
use crate::error::Result;

/// Leftover staging files older than this are fair game for the sweeper.
const SWEEP_AGE: Duration = Duration::from_secs(60 * 60);

fn keystream(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN]) -> XChaCha20 {
    XChaCha20::new(key.into(), nonce.into())
}

fn exhausted() -> io::Error {
    io::Error::other("staging keystream exhausted")
}

/// Write side of a staging file.
pub struct StagingFile {
    file: NamedTempFile,
    cipher: XChaCha20,
    key: Zeroizing<[u8; KEY_LEN]>,
    nonce: [u8; NONCE_LEN],
}

impl StagingFile {
    /// Creates an empty staging file under a fresh ephemeral key.
    ///
    /// # Errors
    /// Fails when the temp directory is unusable or the RNG is unavailable.
    pub fn create() -> Result<Self> {
        let file = Builder::new().prefix(STAGE_PREFIX).tempfile()?;
        let key = Zeroizing::new(random_bytes::<KEY_LEN>()?);
        let nonce = random_bytes::<NONCE_LEN>()?;
        let cipher = keystream(&key, &nonce);

        Ok(Self { file, cipher, key, nonce })
    }

    /// Bytes written so far.
    ///
    /// # Errors
    /// Fails with `Io` when the metadata cannot be read.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.as_file().metadata()?.len())
    }

    /// Flips the handle into its read side, rewound to the start.
    ///
    /// # Errors
    /// Fails with `Io` on seek errors.
    pub fn into_reader(mut self) -> Result<StagingReader> {
        self.file.as_file_mut().seek(SeekFrom::Start(0))?;
        let cipher = keystream(&self.key, &self.nonce);

        Ok(StagingReader { file: self.file, cipher, key: self.key, nonce: self.nonce })
    }
}

impl Write for StagingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut scratch = buf.to_vec();
        self.cipher.try_apply_keystream(&mut scratch).map_err(|_| exhausted())?;
        self.file.as_file_mut().write_all(&scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.as_file_mut().flush()
    }
}

impl Seek for StagingFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let at = self.file.as_file_mut().seek(pos)?;
        self.cipher.try_seek(at).map_err(|_| exhausted())?;
        Ok(at)
    }
}

/// Read side of a staging file. The backing file is deleted on drop.
pub struct StagingReader {
    file: NamedTempFile,
    cipher: XChaCha20,
    key: Zeroizing<[u8; KEY_LEN]>,
    nonce: [u8; NONCE_LEN],
}

impl Read for StagingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.file.as_file_mut().read(buf)?;
        self.cipher.try_apply_keystream(&mut buf[..n]).map_err(|_| exhausted())?;
        Ok(n)
    }
}

impl Seek for StagingReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let at = self.file.as_file_mut().seek(pos)?;
        // A fresh keystream seeks forward cheaply, so re-derive instead of
        // tracking direction.
        self.cipher = keystream(&self.key, &self.nonce);
        self.cipher.try_seek(at).map_err(|_| exhausted())?;
        Ok(at)
    }
}

/// Removes staging files a crashed run left in the temp directory.
///
/// Only touches files carrying our prefix that have not been modified for
/// [`SWEEP_AGE`], so concurrent instances keep theirs. Returns how many were
/// removed.
pub fn sweep() -> usize {
    let Ok(entries) = fs::read_dir(env::temp_dir()) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(STAGE_PREFIX) {
            continue;
        }

        let stale = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age >= SWEEP_AGE);

        if stale && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }

    if removed > 0 {
        tracing::warn!(removed, "removed leftover staging files");
    }
    removed
}
