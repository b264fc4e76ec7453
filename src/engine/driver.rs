//! The streaming state machine.
//!
//! One encrypt or decrypt call walks INIT → HEADER → KDF → CHECKS → STREAM →
//! FINALIZE on the caller's thread, observing the reporter between header
//! phases and at every 1 MiB chunk. The driver owns all key material for the
//! duration of the call and guarantees that partial output disappears on
//! every exit path except a `kept` force-decrypt result.
//!
//! Decryption is one pass in the common case. With payload redundancy
//! enabled it is speculative: the fast pass strips parity without decoding
//! and trusts the MAC to notice damage; only on a MAC mismatch does the
//! slow pass rerun the stream with full Reed-Solomon correction per block.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::config::{CHUNK_SIZE, MAC_LEN, MASTER_KEY_LEN, MAX_COMMENT_LEN, NONCE_LEN, RS_BLOCK_CODE, RS_BLOCK_DATA, SALT_LEN, SEED_LEN};
use crate::crypto::{CipherStack, KeyMaterial, PayloadMac, SubkeyStream, derive_master, keyfile, random_bytes};
use crate::encoding::payload;
use crate::encoding::reed_solomon::RS5;
use crate::engine::deny::{self, DenyStream};
use crate::engine::reporter::Reporter;
use crate::engine::staging::StagingFile;
use crate::engine::{DecryptRequest, DecryptSummary, EncryptRequest, EngineConfig};
use crate::error::{EngineError, Result};
use crate::header::flags::Flags;
use crate::header::{Header, version_is_plausible};

/// On-disk size of a full encoded chunk when payload redundancy is on.
const ENC_CHUNK: usize = CHUNK_SIZE / RS_BLOCK_DATA * RS_BLOCK_CODE;

/// Removes the output file unless the call reached a state worth keeping.
struct OutputGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> OutputGuard<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: false }
    }

    /// Creates (or truncates) the output file and arms the guard.
    fn create(&mut self) -> Result<BufWriter<File>> {
        let file = File::create(self.path)?;
        self.armed = true;
        Ok(BufWriter::new(file))
    }

    /// The output survives the call.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for OutputGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(self.path);
        }
    }
}

fn check_cancel(reporter: &dyn Reporter) -> Result<()> {
    if reporter.is_cancelled() { Err(EngineError::Cancelled) } else { Ok(()) }
}

/// Reads until the buffer is full or the source ends.
fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    bool::from(a.ct_eq(b))
}

// ---------------------------------------------------------------- encrypt --

fn validate_encrypt(req: &EncryptRequest) -> Result<()> {
    if req.password.is_empty() && req.keyfiles.is_empty() {
        return Err(EngineError::BadArgument("a password or at least one keyfile is required".to_owned()));
    }
    if !req.comments.is_ascii() {
        return Err(EngineError::BadArgument("comments must be ascii".to_owned()));
    }
    if req.comments.len() > MAX_COMMENT_LEN {
        return Err(EngineError::BadArgument(format!("comments exceed {MAX_COMMENT_LEN} bytes")));
    }
    Ok(())
}

pub(super) fn encrypt(config: &EngineConfig, req: &EncryptRequest, reporter: &dyn Reporter) -> Result<()> {
    validate_encrypt(req)?;

    let mut input = BufReader::new(File::open(&req.input)?);
    let total = input.get_ref().metadata()?.len();
    reporter.set_can_cancel(true);

    let salt: [u8; SALT_LEN] = random_bytes()?;
    let seed: [u8; SEED_LEN] = random_bytes()?;
    let nonce: [u8; NONCE_LEN] = random_bytes()?;

    let mix = keyfile::mix_keyfiles(&req.keyfiles, req.keyfile_ordered)?;

    reporter.set_status("Deriving key");
    check_cancel(reporter)?;
    let mut master = Zeroizing::new(derive_master(req.password.expose(), &salt, config.kdf_costs(req.paranoid))?);
    check_cancel(reporter)?;
    keyfile::apply_mix(&mut master, &mix);

    let mut schedule = SubkeyStream::new(&master, &seed);
    let material = KeyMaterial::derive(&mut schedule, req.paranoid)?;

    let header = Header {
        flags: Flags {
            paranoid: req.paranoid,
            reed_solomon: req.reed_solomon,
            keyfile_used: !req.keyfiles.is_empty(),
            keyfile_ordered: req.keyfile_ordered && !req.keyfiles.is_empty(),
            deniability: req.deniability,
        },
        comments: req.comments.clone(),
        salt,
        seed,
        nonce,
        key_check: material.key_check,
        keyfile_check: keyfile::check_value(&mix),
        mac: [0u8; MAC_LEN],
    };

    let mut guard = OutputGuard::new(&req.output);
    reporter.set_status("Encrypting");

    if req.deniability {
        let mut stage = StagingFile::create()?;
        write_volume(&header, &material, &mut schedule, &mut input, &mut stage, total, reporter)?;

        reporter.set_status("Hiding volume");
        check_cancel(reporter)?;
        let mut deny = DenyStream::derive(req.password.expose(), config.kdf_costs(false))?;
        check_cancel(reporter)?;

        let wrapped_len = stage.len()?;
        let mut inner = stage.into_reader()?;
        let mut out = guard.create()?;
        deny::transfer(&mut inner, &mut out, &mut deny, reporter, wrapped_len)?;
    } else {
        let mut out = guard.create()?;
        write_volume(&header, &material, &mut schedule, &mut input, &mut out, total, reporter)?;
    }

    guard.disarm();
    Ok(())
}

/// Writes header and payload to a seekable sink, back-patching the MAC atom.
fn write_volume<R: Read, W: Write + Seek>(
    header: &Header,
    material: &KeyMaterial,
    schedule: &mut SubkeyStream,
    input: &mut R,
    out: &mut W,
    total: u64,
    reporter: &dyn Reporter,
) -> Result<()> {
    header.write_to(out)?;

    let mut cipher = CipherStack::new(material, &header.nonce, header.flags.paranoid)?;
    let mut mac = PayloadMac::new(&material.mac_key, header.flags.paranoid)?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut done = 0u64;
    reporter.set_progress(0, total);

    loop {
        let n = read_full(input, &mut buf)?;
        if n == 0 {
            break;
        }

        let chunk = &mut buf[..n];
        cipher.apply_encrypt(chunk)?;

        if header.flags.reed_solomon {
            let encoded = payload::encode_chunk(chunk)?;
            mac.update(&encoded);
            out.write_all(&encoded)?;
        } else {
            mac.update(chunk);
            out.write_all(chunk)?;
        }

        if cipher.needs_rekey() {
            cipher.rekey_from(schedule)?;
        }

        done += n as u64;
        reporter.set_progress(done, total);
        check_cancel(reporter)?;
    }

    let tag = mac.finalize();
    Header::patch_mac(out, header.mac_offset(), &tag)?;
    out.flush()?;

    Ok(())
}

// ---------------------------------------------------------------- decrypt --

fn validate_decrypt(req: &DecryptRequest) -> Result<()> {
    if req.password.is_empty() && req.keyfiles.is_empty() {
        return Err(EngineError::BadArgument("a password or at least one keyfile is required".to_owned()));
    }
    Ok(())
}

pub(super) fn decrypt(config: &EngineConfig, req: &DecryptRequest, reporter: &dyn Reporter) -> Result<DecryptSummary> {
    validate_decrypt(req)?;

    let mut input = BufReader::new(File::open(&req.input)?);
    let total = input.get_ref().metadata()?.len();
    reporter.set_can_cancel(true);

    if req.deniability_hint {
        return decrypt_deniable(config, req, reporter, &mut input, total);
    }

    match Header::read_from(&mut input)? {
        Some(header) => decrypt_volume(config, req, reporter, &mut input, total, &header),
        None => decrypt_deniable(config, req, reporter, &mut input, total),
    }
}

/// Unwraps a headerless volume into staging, then recurses into the normal
/// path. On this path a garbage header means a wrong password, never a
/// format error: a deniable volume must not admit it exists.
fn decrypt_deniable(config: &EngineConfig, req: &DecryptRequest, reporter: &dyn Reporter, input: &mut BufReader<File>, total: u64) -> Result<DecryptSummary> {
    tracing::debug!("no readable version atom, trying the deniability path");

    reporter.set_status("Deriving key");
    check_cancel(reporter)?;
    let mut deny = DenyStream::derive(req.password.expose(), config.kdf_costs(false))?;
    check_cancel(reporter)?;

    reporter.set_status("Unwrapping");
    input.seek(SeekFrom::Start(0))?;
    let mut stage = StagingFile::create()?;
    deny::transfer(input, &mut stage, &mut deny, reporter, total)?;

    let mut inner = stage.into_reader()?;
    match Header::read_from(&mut inner)? {
        Some(header) => decrypt_volume(config, req, reporter, &mut inner, total, &header),
        None => Err(EngineError::WrongCredentials),
    }
}

fn decrypt_volume<R: Read + Seek>(
    config: &EngineConfig,
    req: &DecryptRequest,
    reporter: &dyn Reporter,
    input: &mut R,
    total_len: u64,
    header: &Header,
) -> Result<DecryptSummary> {
    let flags = header.flags;

    if flags.keyfile_used && req.keyfiles.is_empty() {
        return Err(EngineError::WrongCredentials);
    }
    if !flags.keyfile_used && !req.keyfiles.is_empty() {
        return Err(EngineError::BadArgument("this volume does not use keyfiles".to_owned()));
    }

    let payload_start = header.encoded_len();
    let payload_len = total_len.checked_sub(payload_start).ok_or_else(|| EngineError::HeaderCorrupt("file ends inside the header".to_owned()))?;

    // The keyfile check runs before the expensive KDF so wrong keyfiles are
    // diagnosed instantly and separately from a wrong password.
    let mix = keyfile::mix_keyfiles(&req.keyfiles, flags.keyfile_ordered)?;
    if flags.keyfile_used && !ct_eq(&keyfile::check_value(&mix), &header.keyfile_check) {
        return Err(EngineError::WrongCredentials);
    }

    reporter.set_status("Deriving key");
    check_cancel(reporter)?;
    let mut master = Zeroizing::new(derive_master(req.password.expose(), &header.salt, config.kdf_costs(flags.paranoid))?);
    check_cancel(reporter)?;
    keyfile::apply_mix(&mut master, &mix);

    {
        let mut probe = SubkeyStream::new(&master, &header.seed);
        let material = KeyMaterial::derive(&mut probe, flags.paranoid)?;
        if !ct_eq(&material.key_check, &header.key_check) {
            return Err(EngineError::WrongCredentials);
        }
    }

    let summary = DecryptSummary { comments: header.comments.clone(), kept: false };
    let mut guard = OutputGuard::new(&req.output);

    if req.verify_first {
        reporter.set_status("Verifying");
        let outcome = run_payload_pass(input, payload_start, payload_len, header, &master, None, false, false, reporter)?;

        if !outcome.mac_ok {
            if flags.reed_solomon {
                return slow_decrypt(req, reporter, input, payload_start, payload_len, header, &master, &mut guard, summary);
            }
            if req.force_decrypt {
                reporter.set_status("Decrypting");
                let mut out = guard.create()?;
                run_payload_pass(input, payload_start, payload_len, header, &master, Some(&mut out), false, false, reporter)?;
                guard.disarm();
                return Err(EngineError::MacMismatch { kept: true });
            }
            return Err(EngineError::MacMismatch { kept: false });
        }

        reporter.set_status("Decrypting");
        let mut out = guard.create()?;
        run_payload_pass(input, payload_start, payload_len, header, &master, Some(&mut out), false, false, reporter)?;
        guard.disarm();
        return Ok(summary);
    }

    reporter.set_status("Decrypting");
    let mut out = guard.create()?;
    let outcome = run_payload_pass(input, payload_start, payload_len, header, &master, Some(&mut out), false, false, reporter)?;
    drop(out);

    if outcome.mac_ok {
        guard.disarm();
        return Ok(summary);
    }

    if flags.reed_solomon {
        return slow_decrypt(req, reporter, input, payload_start, payload_len, header, &master, &mut guard, summary);
    }

    if req.force_decrypt {
        guard.disarm();
        return Err(EngineError::MacMismatch { kept: true });
    }
    Err(EngineError::MacMismatch { kept: false })
}

/// The second, corrective pass. Truncates whatever the fast pass wrote and
/// re-decrypts with per-block Reed-Solomon correction.
#[allow(clippy::too_many_arguments)]
fn slow_decrypt<R: Read + Seek>(
    req: &DecryptRequest,
    reporter: &dyn Reporter,
    input: &mut R,
    payload_start: u64,
    payload_len: u64,
    header: &Header,
    master: &[u8; MASTER_KEY_LEN],
    guard: &mut OutputGuard<'_>,
    summary: DecryptSummary,
) -> Result<DecryptSummary> {
    tracing::warn!("authentication failed, rerunning with full error correction");
    reporter.set_status("Repairing");

    let mut out = guard.create()?;
    let outcome = run_payload_pass(input, payload_start, payload_len, header, master, Some(&mut out), true, req.force_decrypt, reporter)?;
    drop(out);

    if outcome.fully_repaired {
        tracing::warn!("payload recovered through Reed-Solomon redundancy");
        guard.disarm();
        return Ok(summary);
    }

    // Only reachable under force_decrypt; without it the unrecoverable
    // block already failed the pass.
    guard.disarm();
    Err(EngineError::Unrecoverable { kept: true })
}

struct PassOutcome {
    mac_ok: bool,
    fully_repaired: bool,
}

/// Picks how many on-disk bytes the next chunk read takes.
///
/// Without redundancy, chunks are plain 1 MiB slices. With it, full chunks
/// are [`ENC_CHUNK`] bytes; the final chunk is whatever remains, except that
/// a remainder of exactly `ENC_CHUNK + 3` is one oversized final chunk
/// (8191 full codewords plus a tail marker and codeword), not a full chunk
/// with 3 stray bytes.
fn next_read_len(remaining: u64, redundant: bool) -> Result<usize> {
    if !redundant {
        return Ok(remaining.min(CHUNK_SIZE as u64) as usize);
    }

    let enc = ENC_CHUNK as u64;
    let overhang = payload::TAIL_MARKER_LEN as u64;

    if remaining > enc + overhang {
        Ok(ENC_CHUNK)
    } else if remaining <= enc || remaining == enc + overhang {
        Ok(remaining as usize)
    } else {
        Err(EngineError::BadSize(format!("{remaining} payload bytes do not fit the redundancy framing")))
    }
}

/// One full sweep over the payload.
///
/// Replays the subkey schedule from the top so every pass sees the same
/// rekey sequence. `output` of `None` verifies without writing a byte; the
/// MAC always covers the raw on-disk bytes.
#[allow(clippy::too_many_arguments)]
fn run_payload_pass<R: Read + Seek>(
    input: &mut R,
    payload_start: u64,
    payload_len: u64,
    header: &Header,
    master: &[u8; MASTER_KEY_LEN],
    mut output: Option<&mut BufWriter<File>>,
    slow: bool,
    force: bool,
    reporter: &dyn Reporter,
) -> Result<PassOutcome> {
    let flags = header.flags;

    let mut schedule = SubkeyStream::new(master, &header.seed);
    let material = KeyMaterial::derive(&mut schedule, flags.paranoid)?;
    let mut cipher = CipherStack::new(&material, &header.nonce, flags.paranoid)?;
    let mut mac = PayloadMac::new(&material.mac_key, flags.paranoid)?;
    drop(material);

    input.seek(SeekFrom::Start(payload_start))?;

    let mut buf = vec![0u8; ENC_CHUNK + payload::TAIL_MARKER_LEN];
    let mut remaining = payload_len;
    let mut done = 0u64;
    let mut fully_repaired = true;
    reporter.set_progress(0, payload_len);

    while remaining > 0 {
        let want = next_read_len(remaining, flags.reed_solomon)?;
        let chunk = &mut buf[..want];
        input.read_exact(chunk)?;
        mac.update(chunk);

        let mut plain = if flags.reed_solomon {
            if slow {
                let (data, intact) = payload::repair_chunk(chunk, force)?;
                fully_repaired &= intact;
                data
            } else {
                payload::strip_chunk(chunk)?
            }
        } else {
            chunk.to_vec()
        };

        cipher.apply_decrypt(&mut plain)?;
        if let Some(out) = output.as_mut() {
            out.write_all(&plain)?;
        }
        if cipher.needs_rekey() {
            cipher.rekey_from(&mut schedule)?;
        }

        remaining -= want as u64;
        done += want as u64;
        reporter.set_progress(done, payload_len);
        check_cancel(reporter)?;
    }

    if let Some(out) = output.as_mut() {
        out.flush()?;
    }

    Ok(PassOutcome { mac_ok: mac.matches(&header.mac), fully_repaired })
}

// ------------------------------------------------------------------ probe --

/// Peeks at the first atom of a file without touching any key material.
pub(super) fn probe_deniable(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;

    let mut code = vec![0u8; RS5.encoded_len()];
    match file.read_exact(&mut code) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(true),
        Err(e) => return Err(e.into()),
    }

    Ok(match RS5.decode(&code, false) {
        Ok(tag) => !version_is_plausible(&tag),
        Err(_) => true,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::engine::reporter::SilentReporter;

    fn fixed_header(reed_solomon: bool) -> Header {
        Header {
            flags: Flags { reed_solomon, ..Flags::default() },
            comments: String::new(),
            salt: [1u8; SALT_LEN],
            seed: [2u8; SEED_LEN],
            nonce: [3u8; NONCE_LEN],
            key_check: [4u8; 64],
            keyfile_check: [5u8; 64],
            mac: [0u8; MAC_LEN],
        }
    }

    #[test]
    fn test_write_volume_is_deterministic() {
        let header = fixed_header(true);
        let master = [9u8; MASTER_KEY_LEN];

        let run = || {
            let mut schedule = SubkeyStream::new(&master, &header.seed);
            let material = KeyMaterial::derive(&mut schedule, false).unwrap();
            let mut out = Cursor::new(Vec::new());
            write_volume(&header, &material, &mut schedule, &mut Cursor::new(vec![0x77u8; 5000]), &mut out, 5000, &SilentReporter).unwrap();
            out.into_inner()
        };

        let first = run();
        let second = run();
        assert_eq!(first, second, "fixed salt/seed/nonce must give identical volumes");
        assert_eq!(first.len() as u64, header.encoded_len() + payload::encoded_chunk_len(5000) as u64);
    }

    #[test]
    fn test_next_read_len_plain() {
        assert_eq!(next_read_len(10, false).unwrap(), 10);
        assert_eq!(next_read_len(CHUNK_SIZE as u64 + 1, false).unwrap(), CHUNK_SIZE);
    }

    #[test]
    fn test_next_read_len_redundant() {
        let enc = ENC_CHUNK as u64;

        // A full chunk with more to come.
        assert_eq!(next_read_len(enc + 139, true).unwrap(), ENC_CHUNK);
        // Exactly one full chunk left.
        assert_eq!(next_read_len(enc, true).unwrap(), ENC_CHUNK);
        // The oversized final chunk: 8191 codewords plus a tail.
        assert_eq!(next_read_len(enc + 3, true).unwrap(), ENC_CHUNK + 3);
        // A small final chunk.
        assert_eq!(next_read_len(139, true).unwrap(), 139);
        // Impossible remainders.
        assert!(next_read_len(enc + 1, true).is_err());
        assert!(next_read_len(enc + 2, true).is_err());
    }

    #[test]
    fn test_read_full_short_source() {
        let mut source = Cursor::new(vec![1u8; 10]);
        let mut buf = [0u8; 64];
        assert_eq!(read_full(&mut source, &mut buf).unwrap(), 10);
        assert_eq!(&buf[..10], &[1u8; 10]);
    }
}
