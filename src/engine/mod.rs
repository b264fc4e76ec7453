//! The volume engine.
//!
//! Front-ends talk to the engine through plain request structs and a
//! [`Reporter`] capability; everything else (key derivation, header codec,
//! cipher pipeline, redundancy, deniability) happens behind
//! [`Engine::encrypt`] and [`Engine::decrypt`]. The engine runs synchronously
//! on the caller's thread and spawns no workers; concurrent calls on
//! disjoint files are safe.

mod driver;

pub mod deny;
pub mod reporter;
pub mod staging;

use std::path::{Path, PathBuf};

use crate::crypto::KdfCosts;
use crate::error::Result;
use crate::secret::Password;

pub use reporter::{Reporter, SilentReporter};

/// Engine-level configuration.
///
/// Deliberately a value passed in rather than process-global state: tests
/// and embedders shrink the KDF cost table without affecting anyone else.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Argon2id cost row for normal volumes.
    pub kdf_normal: KdfCosts,
    /// Argon2id cost row for paranoid volumes.
    pub kdf_paranoid: KdfCosts,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { kdf_normal: KdfCosts::normal(), kdf_paranoid: KdfCosts::paranoid() }
    }
}

impl EngineConfig {
    pub(crate) fn kdf_costs(&self, paranoid: bool) -> KdfCosts {
        if paranoid { self.kdf_paranoid } else { self.kdf_normal }
    }
}

/// Everything an encryption needs.
pub struct EncryptRequest {
    /// Plaintext source.
    pub input: PathBuf,
    /// Volume destination; truncated on start, removed again on failure.
    pub output: PathBuf,
    /// May be empty when at least one keyfile is given.
    pub password: Password,
    /// Keyfiles mixed into the key.
    pub keyfiles: Vec<PathBuf>,
    /// Makes the keyfile mix order-sensitive.
    pub keyfile_ordered: bool,
    /// ASCII comments embedded **in clear** in the header. Readable by
    /// anyone holding the volume; never put secrets here.
    pub comments: String,
    /// Serpent layer, HMAC-SHA3-512 MAC, doubled KDF passes.
    pub paranoid: bool,
    /// Payload Reed-Solomon redundancy.
    pub reed_solomon: bool,
    /// Wrap the finished volume into headerless noise.
    pub deniability: bool,
}

/// Everything a decryption needs.
pub struct DecryptRequest {
    /// Volume source.
    pub input: PathBuf,
    /// Plaintext destination; removed on every failure except `kept` ones.
    pub output: PathBuf,
    pub password: Password,
    pub keyfiles: Vec<PathBuf>,
    /// Keep going after authentication failure and retain the plaintext.
    pub force_decrypt: bool,
    /// Run a write-nothing MAC pass before producing any plaintext.
    pub verify_first: bool,
    /// Skip the header probe and treat the input as deniability-wrapped.
    pub deniability_hint: bool,
}

/// What a successful decryption reports back.
#[derive(Debug)]
pub struct DecryptSummary {
    /// The volume's plaintext comments.
    pub comments: String,
    /// True when plaintext was retained despite a failed authentication;
    /// on a fully successful decrypt this is always false. The same marker
    /// travels on the error for `force_decrypt` outcomes.
    pub kept: bool,
}

/// The volume engine. Cheap to construct, stateless between calls.
pub struct Engine {
    config: EngineConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with the standard cost table.
    #[must_use]
    pub fn new() -> Self {
        Self { config: EngineConfig::default() }
    }

    /// An engine with a custom cost table.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Encrypts one file into a self-contained volume.
    ///
    /// # Errors
    /// Any [`crate::error::EngineError`]; on every failure the partial
    /// output file and any staging files are removed and key material is
    /// zeroised.
    pub fn encrypt(&self, req: &EncryptRequest, reporter: &dyn Reporter) -> Result<()> {
        driver::encrypt(&self.config, req, reporter)
    }

    /// Decrypts a volume back into plaintext.
    ///
    /// # Errors
    /// Any [`crate::error::EngineError`]. `MacMismatch` and `Unrecoverable`
    /// carry `kept = true` when `force_decrypt` retained damaged plaintext;
    /// such results have [`crate::error::Severity::Warning`] and the output
    /// file survives.
    pub fn decrypt(&self, req: &DecryptRequest, reporter: &dyn Reporter) -> Result<DecryptSummary> {
        driver::decrypt(&self.config, req, reporter)
    }

    /// True when the file does not open with a readable version atom.
    ///
    /// A deniable volume is indistinguishable from random bytes, so this
    /// reports "not recognisably a volume" rather than "definitely wrapped".
    ///
    /// # Errors
    /// Fails with `Io` when the file cannot be read at all.
    pub fn is_deniable(path: &Path) -> Result<bool> {
        driver::probe_deniable(path)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicU64, Ordering};

    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::config::{CHUNK_SIZE, HEADER_BASE_LEN};
    use crate::error::{ErrorKind, Severity};

    fn test_engine() -> Engine {
        let costs = KdfCosts { memory_kib: 1024, time: 1, lanes: 1 };
        Engine::with_config(EngineConfig { kdf_normal: costs, kdf_paranoid: KdfCosts { time: 2, ..costs } })
    }

    fn enc_request(dir: &TempDir, password: &str) -> EncryptRequest {
        EncryptRequest {
            input: dir.path().join("plain.bin"),
            output: dir.path().join("volume.pcv"),
            password: Password::from_slice(password.as_bytes()),
            keyfiles: Vec::new(),
            keyfile_ordered: false,
            comments: String::new(),
            paranoid: false,
            reed_solomon: false,
            deniability: false,
        }
    }

    fn dec_request(dir: &TempDir, password: &str) -> DecryptRequest {
        DecryptRequest {
            input: dir.path().join("volume.pcv"),
            output: dir.path().join("restored.bin"),
            password: Password::from_slice(password.as_bytes()),
            keyfiles: Vec::new(),
            force_decrypt: false,
            verify_first: false,
            deniability_hint: false,
        }
    }

    fn roundtrip(req: &EncryptRequest, dec: &DecryptRequest, plaintext: &[u8]) -> DecryptSummary {
        fs::write(&req.input, plaintext).unwrap();
        let engine = test_engine();
        engine.encrypt(req, &SilentReporter).unwrap();
        let summary = engine.decrypt(dec, &SilentReporter).unwrap();
        assert_eq!(fs::read(&dec.output).unwrap(), plaintext);
        summary
    }

    struct CancelAfter {
        progress_calls: AtomicU64,
        after: u64,
    }

    impl CancelAfter {
        fn new(after: u64) -> Self {
            Self { progress_calls: AtomicU64::new(0), after }
        }
    }

    impl Reporter for CancelAfter {
        fn set_progress(&self, _done: u64, _total: u64) {
            self.progress_calls.fetch_add(1, Ordering::Relaxed);
        }

        fn is_cancelled(&self) -> bool {
            self.progress_calls.load(Ordering::Relaxed) > self.after
        }
    }

    fn flip_byte(path: &Path, offset: usize) {
        let mut bytes = fs::read(path).unwrap();
        bytes[offset] ^= 0xFF;
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_basic_roundtrip() {
        let dir = tempdir().unwrap();
        let req = enc_request(&dir, "hello");
        let dec = dec_request(&dir, "hello");

        let plaintext = b"The quick brown fox\n";
        let summary = roundtrip(&req, &dec, plaintext);
        assert!(!summary.kept);

        // Without redundancy the volume is exactly header + plaintext bytes.
        let volume_len = fs::metadata(&req.output).unwrap().len();
        assert_eq!(volume_len, (HEADER_BASE_LEN + plaintext.len()) as u64);
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let dir = tempdir().unwrap();
        let req = enc_request(&dir, "pw");
        let dec = dec_request(&dir, "pw");

        roundtrip(&req, &dec, b"");
        assert_eq!(fs::metadata(&req.output).unwrap().len(), HEADER_BASE_LEN as u64);
    }

    #[test]
    fn test_multi_chunk_roundtrip() {
        let dir = tempdir().unwrap();
        let req = enc_request(&dir, "chunky");
        let dec = dec_request(&dir, "chunky");

        let plaintext: Vec<u8> = (0..CHUNK_SIZE * 2 + 300).map(|i| (i % 251) as u8).collect();
        roundtrip(&req, &dec, &plaintext);
    }

    #[test]
    fn test_comments_roundtrip_in_clear() {
        let dir = tempdir().unwrap();
        let mut req = enc_request(&dir, "pw");
        req.comments = "quarterly backup".to_owned();
        let dec = dec_request(&dir, "pw");

        let summary = roundtrip(&req, &dec, b"data");
        assert_eq!(summary.comments, "quarterly backup");
    }

    #[test]
    fn test_paranoid_roundtrip() {
        let dir = tempdir().unwrap();
        let mut req = enc_request(&dir, "p@ss");
        req.paranoid = true;
        let dec = dec_request(&dir, "p@ss");

        roundtrip(&req, &dec, &vec![0xAAu8; 4096]);
    }

    #[test]
    fn test_wrong_password_rejected_before_plaintext() {
        let dir = tempdir().unwrap();
        let req = enc_request(&dir, "correct");
        fs::write(&req.input, b"secret data").unwrap();

        let engine = test_engine();
        engine.encrypt(&req, &SilentReporter).unwrap();

        let dec = dec_request(&dir, "cOrrect");
        let err = engine.decrypt(&dec, &SilentReporter).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongCredentials);
        assert!(!dec.output.exists(), "no plaintext may be written on wrong credentials");
    }

    #[test]
    fn test_tamper_detection() {
        let dir = tempdir().unwrap();
        let req = enc_request(&dir, "pw");
        fs::write(&req.input, vec![0x42u8; 5000]).unwrap();

        let engine = test_engine();
        engine.encrypt(&req, &SilentReporter).unwrap();
        flip_byte(&req.output, HEADER_BASE_LEN + 2500);

        let dec = dec_request(&dir, "pw");
        let err = engine.decrypt(&dec, &SilentReporter).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MacMismatch);
        assert_eq!(err.severity(), Severity::Hard);
        assert!(!dec.output.exists(), "partial plaintext must be removed");
    }

    #[test]
    fn test_force_decrypt_keeps_damaged_plaintext() {
        let dir = tempdir().unwrap();
        let req = enc_request(&dir, "hello");
        let plaintext = b"The quick brown fox\n";
        fs::write(&req.input, plaintext).unwrap();

        let engine = test_engine();
        engine.encrypt(&req, &SilentReporter).unwrap();
        // Flip the last payload byte.
        flip_byte(&req.output, HEADER_BASE_LEN + plaintext.len() - 1);

        let mut dec = dec_request(&dir, "hello");
        dec.force_decrypt = true;
        let err = engine.decrypt(&dec, &SilentReporter).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MacMismatch);
        assert!(err.kept());
        assert_eq!(err.severity(), Severity::Warning);

        let restored = fs::read(&dec.output).unwrap();
        assert_eq!(restored.len(), plaintext.len());
        assert_eq!(&restored[..19], &plaintext[..19], "all but the damaged byte must survive");
        assert_ne!(restored[19], plaintext[19]);
    }

    #[test]
    fn test_reed_solomon_self_heal() {
        let dir = tempdir().unwrap();
        let mut req = enc_request(&dir, "p@ss");
        req.paranoid = true;
        req.reed_solomon = true;
        let plaintext = vec![0xAAu8; 4096];
        fs::write(&req.input, &plaintext).unwrap();

        let engine = test_engine();
        engine.encrypt(&req, &SilentReporter).unwrap();

        // Three corrupted bytes inside the first 136-byte codeword: the fast
        // pass fails its MAC, the slow pass repairs and succeeds.
        for offset in [10usize, 20, 30] {
            flip_byte(&req.output, HEADER_BASE_LEN + offset);
        }

        let dec = dec_request(&dir, "p@ss");
        engine.decrypt(&dec, &SilentReporter).unwrap();
        assert_eq!(fs::read(&dec.output).unwrap(), plaintext);
    }

    #[test]
    fn test_reed_solomon_beyond_capacity() {
        let dir = tempdir().unwrap();
        let mut req = enc_request(&dir, "pw");
        req.reed_solomon = true;
        let plaintext = vec![0x11u8; 1024];
        fs::write(&req.input, &plaintext).unwrap();

        let engine = test_engine();
        engine.encrypt(&req, &SilentReporter).unwrap();

        // Five errors in one codeword exceed the 4-byte capacity. The slow
        // pass either reports the block unrecoverable or miscorrects it;
        // it can never silently return the original plaintext.
        for offset in 0..5 {
            flip_byte(&req.output, HEADER_BASE_LEN + offset);
        }

        let dec = dec_request(&dir, "pw");
        match engine.decrypt(&dec, &SilentReporter) {
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::Unrecoverable);
                assert!(!dec.output.exists());
            }
            Ok(_) => assert_ne!(fs::read(&dec.output).unwrap(), plaintext),
        }
    }

    #[test]
    fn test_reed_solomon_roundtrip_with_tail() {
        let dir = tempdir().unwrap();
        let mut req = enc_request(&dir, "pw");
        req.reed_solomon = true;
        let dec = dec_request(&dir, "pw");

        // 300 bytes: two full blocks plus a 44-byte tail.
        let plaintext: Vec<u8> = (0..300).map(|i| (i * 7) as u8).collect();
        roundtrip(&req, &dec, &plaintext);
    }

    #[test]
    fn test_keyfiles_ordered() {
        let dir = tempdir().unwrap();
        let kf1 = dir.path().join("kf1");
        let kf2 = dir.path().join("kf2");
        fs::write(&kf1, [0x01u8; 32]).unwrap();
        fs::write(&kf2, [0x02u8; 32]).unwrap();

        let mut req = enc_request(&dir, "");
        req.keyfiles = vec![kf1.clone(), kf2.clone()];
        req.keyfile_ordered = true;
        fs::write(&req.input, b"guarded by keyfiles").unwrap();

        let engine = test_engine();
        engine.encrypt(&req, &SilentReporter).unwrap();

        // Swapped order must be rejected as wrong credentials.
        let mut dec = dec_request(&dir, "");
        dec.keyfiles = vec![kf2.clone(), kf1.clone()];
        let err = engine.decrypt(&dec, &SilentReporter).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongCredentials);

        // Correct order unlocks.
        dec.keyfiles = vec![kf1, kf2];
        engine.decrypt(&dec, &SilentReporter).unwrap();
        assert_eq!(fs::read(&dec.output).unwrap(), b"guarded by keyfiles");
    }

    #[test]
    fn test_keyfiles_unordered_commute() {
        let dir = tempdir().unwrap();
        let kf1 = dir.path().join("kf1");
        let kf2 = dir.path().join("kf2");
        fs::write(&kf1, b"first keyfile").unwrap();
        fs::write(&kf2, b"second keyfile").unwrap();

        let mut req = enc_request(&dir, "pw");
        req.keyfiles = vec![kf1.clone(), kf2.clone()];
        fs::write(&req.input, b"data").unwrap();

        let engine = test_engine();
        engine.encrypt(&req, &SilentReporter).unwrap();

        let mut dec = dec_request(&dir, "pw");
        dec.keyfiles = vec![kf2, kf1];
        engine.decrypt(&dec, &SilentReporter).unwrap();
        assert_eq!(fs::read(&dec.output).unwrap(), b"data");
    }

    #[test]
    fn test_missing_keyfiles_detected() {
        let dir = tempdir().unwrap();
        let kf = dir.path().join("kf");
        fs::write(&kf, b"keyfile").unwrap();

        let mut req = enc_request(&dir, "pw");
        req.keyfiles = vec![kf];
        fs::write(&req.input, b"data").unwrap();

        let engine = test_engine();
        engine.encrypt(&req, &SilentReporter).unwrap();

        let dec = dec_request(&dir, "pw");
        let err = engine.decrypt(&dec, &SilentReporter).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongCredentials);
    }

    #[test]
    fn test_deniability() {
        let dir = tempdir().unwrap();
        let mut req = enc_request(&dir, "deny");
        req.deniability = true;
        fs::write(&req.input, b"secret").unwrap();

        let engine = test_engine();
        engine.encrypt(&req, &SilentReporter).unwrap();

        // The wrap is length-preserving and leaves no readable version atom.
        assert_eq!(fs::metadata(&req.output).unwrap().len(), (HEADER_BASE_LEN + 6) as u64);
        assert!(Engine::is_deniable(&req.output).unwrap());

        // Structural uniformity: the opening bytes must not collapse into
        // the handful of values a real header starts with.
        let opening = &fs::read(&req.output).unwrap()[..64];
        let distinct = opening.iter().collect::<std::collections::HashSet<_>>().len();
        assert!(distinct >= 16, "wrapped header looks structured: {distinct} distinct bytes");

        // A wrong password surfaces as wrong credentials, never as a
        // statement about whether this is a volume at all.
        let wrong = dec_request(&dir, "wrong");
        let err = engine.decrypt(&wrong, &SilentReporter).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongCredentials);

        let dec = dec_request(&dir, "deny");
        engine.decrypt(&dec, &SilentReporter).unwrap();
        assert_eq!(fs::read(&dec.output).unwrap(), b"secret");
    }

    #[test]
    fn test_deniability_hint_skips_probe() {
        let dir = tempdir().unwrap();
        let mut req = enc_request(&dir, "deny");
        req.deniability = true;
        req.reed_solomon = true;
        fs::write(&req.input, b"wrapped and redundant").unwrap();

        let engine = test_engine();
        engine.encrypt(&req, &SilentReporter).unwrap();

        let mut dec = dec_request(&dir, "deny");
        dec.deniability_hint = true;
        engine.decrypt(&dec, &SilentReporter).unwrap();
        assert_eq!(fs::read(&dec.output).unwrap(), b"wrapped and redundant");
    }

    #[test]
    fn test_is_deniable_on_normal_volume() {
        let dir = tempdir().unwrap();
        let req = enc_request(&dir, "pw");
        fs::write(&req.input, b"visible volume").unwrap();
        test_engine().encrypt(&req, &SilentReporter).unwrap();

        assert!(!Engine::is_deniable(&req.output).unwrap());
    }

    #[test]
    fn test_cancel_removes_output() {
        let dir = tempdir().unwrap();
        let req = enc_request(&dir, "pw");
        fs::write(&req.input, vec![0u8; CHUNK_SIZE * 4]).unwrap();

        // One progress call for the initial zero, one after the first chunk.
        let reporter = CancelAfter::new(1);
        let err = test_engine().encrypt(&req, &reporter).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(!req.output.exists(), "cancelled output must not survive");
    }

    #[test]
    fn test_verify_first_writes_nothing_on_tamper() {
        let dir = tempdir().unwrap();
        let req = enc_request(&dir, "pw");
        fs::write(&req.input, vec![0x33u8; 2048]).unwrap();

        let engine = test_engine();
        engine.encrypt(&req, &SilentReporter).unwrap();
        flip_byte(&req.output, HEADER_BASE_LEN + 100);

        let mut dec = dec_request(&dir, "pw");
        dec.verify_first = true;
        let err = engine.decrypt(&dec, &SilentReporter).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MacMismatch);
        assert!(!dec.output.exists(), "verify-first must not create the output at all");
    }

    #[test]
    fn test_verify_first_clean_volume() {
        let dir = tempdir().unwrap();
        let req = enc_request(&dir, "pw");
        let mut dec = dec_request(&dir, "pw");
        dec.verify_first = true;

        fs::write(&req.input, b"verified first").unwrap();
        let engine = test_engine();
        engine.encrypt(&req, &SilentReporter).unwrap();
        engine.decrypt(&dec, &SilentReporter).unwrap();
        assert_eq!(fs::read(&dec.output).unwrap(), b"verified first");
    }

    #[test]
    fn test_empty_credentials_rejected() {
        let dir = tempdir().unwrap();
        let req = enc_request(&dir, "");
        fs::write(&req.input, b"data").unwrap();

        let err = test_engine().encrypt(&req, &SilentReporter).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadArgument);
    }

    #[test]
    fn test_encrypt_is_randomised() {
        // Same request twice gives different volumes (fresh salt and nonce).
        let dir = tempdir().unwrap();
        let req = enc_request(&dir, "pw");
        fs::write(&req.input, b"same plaintext").unwrap();

        let engine = test_engine();
        engine.encrypt(&req, &SilentReporter).unwrap();
        let first = fs::read(&req.output).unwrap();
        engine.encrypt(&req, &SilentReporter).unwrap();
        let second = fs::read(&req.output).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_garbage_file_never_admits_format() {
        let dir = tempdir().unwrap();
        let garbage = dir.path().join("garbage.bin");
        fs::write(&garbage, vec![0xC3u8; 4096]).unwrap();

        let mut dec = dec_request(&dir, "whatever");
        dec.input = garbage;
        let err = test_engine().decrypt(&dec, &SilentReporter).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongCredentials);
    }
}
