//! Volume header codec.
//!
//! The header is a sequence of fixed-order atoms, each one a small plaintext
//! field emitted as its own Reed-Solomon codeword so limited corruption in
//! any field self-repairs on read:
//!
//! ```text
//! [version   5 -> 15]
//! [commentLen 5 -> 15]
//! [comment bytes, 1 -> 3 each]
//! [flags     5 -> 15]
//! [salt     16 -> 48]
//! [seed     16 -> 48]
//! [nonce    24 -> 72]
//! [keyCheck 64 -> 192]
//! [kfCheck  64 -> 192]
//! [mac      64 -> 192]
//! ```
//!
//! The MAC atom is written as zeroes when encryption starts and back-patched
//! once the payload tag is known. Atoms are always decoded with full error
//! correction; the speculative fast path exists only for payload blocks.
//!
//! The version atom doubles as the deniability detector: a first atom that
//! does not decode to a plausible `vX.YZ` tag is not an error but a signal
//! that the whole file may be a wrapped volume.

pub mod flags;

use std::io::{Read, Seek, SeekFrom, Write};

use crate::config::{CHECK_LEN, COMMENT_LEN_DIGITS, FLAGS_LEN, HEADER_BASE_LEN, MAC_LEN, MAX_COMMENT_LEN, NONCE_LEN, SALT_LEN, SEED_LEN, VERSION_LEN, VERSION_TAG};
use crate::encoding::reed_solomon::{RS1, RS5, RS16, RS24, RS64, RsCodec};
use crate::error::{EngineError, Result};
use crate::header::flags::Flags;

/// The parsed (or to-be-written) header of a volume.
#[derive(Clone, Debug)]
pub struct Header {
    pub flags: Flags,
    /// Free-form ASCII comments. Stored **in clear** by design: they are
    /// readable without the password and must never contain secrets.
    pub comments: String,
    pub salt: [u8; SALT_LEN],
    pub seed: [u8; SEED_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub key_check: [u8; CHECK_LEN],
    pub keyfile_check: [u8; CHECK_LEN],
    /// Payload MAC tag; zero until back-patched at encrypt end.
    pub mac: [u8; MAC_LEN],
}

/// True when five decoded bytes look like a `vX.YZ` version tag.
#[must_use]
pub fn version_is_plausible(tag: &[u8]) -> bool {
    tag.len() == VERSION_LEN && tag[0] == b'v' && tag[1].is_ascii_digit() && tag[2] == b'.' && tag[3].is_ascii_digit() && tag[4].is_ascii_digit()
}

fn write_atom<W: Write>(sink: &mut W, codec: &RsCodec, data: &[u8]) -> Result<()> {
    sink.write_all(&codec.encode(data)?)?;
    Ok(())
}

fn read_atom<R: Read>(source: &mut R, codec: &RsCodec, what: &str) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; codec.encoded_len()];
    source.read_exact(&mut buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => EngineError::HeaderCorrupt(format!("file ends inside the {what} atom")),
        _ => EngineError::Io(e),
    })?;

    codec.decode(&buf, false).map_err(|_| EngineError::HeaderCorrupt(format!("{what} atom damaged beyond repair")))
}

fn fixed<const N: usize>(bytes: Vec<u8>, what: &str) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| EngineError::HeaderCorrupt(format!("{what} atom has the wrong size")))
}

impl Header {
    /// Size of the encoded header in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        (HEADER_BASE_LEN + 3 * self.comments.len()) as u64
    }

    /// Offset of the MAC atom from the start of the volume.
    #[must_use]
    pub fn mac_offset(&self) -> u64 {
        self.encoded_len() - RS64.encoded_len() as u64
    }

    /// Emits every atom in order.
    ///
    /// # Errors
    /// Fails with `BadArgument` on non-ASCII or oversized comments, `Io` on
    /// sink errors.
    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<()> {
        if !self.comments.is_ascii() {
            return Err(EngineError::BadArgument("comments must be ascii".to_owned()));
        }
        if self.comments.len() > MAX_COMMENT_LEN {
            return Err(EngineError::BadArgument(format!("comments exceed {MAX_COMMENT_LEN} bytes")));
        }

        write_atom(sink, &RS5, VERSION_TAG)?;

        let comment_len = format!("{:0width$}", self.comments.len(), width = COMMENT_LEN_DIGITS);
        write_atom(sink, &RS5, comment_len.as_bytes())?;

        for byte in self.comments.bytes() {
            write_atom(sink, &RS1, &[byte])?;
        }

        write_atom(sink, &RS5, &self.flags.to_bytes())?;
        write_atom(sink, &RS16, &self.salt)?;
        write_atom(sink, &RS16, &self.seed)?;
        write_atom(sink, &RS24, &self.nonce)?;
        write_atom(sink, &RS64, &self.key_check)?;
        write_atom(sink, &RS64, &self.keyfile_check)?;
        write_atom(sink, &RS64, &self.mac)?;

        Ok(())
    }

    /// Parses a header from the start of a volume.
    ///
    /// Returns `None` when the version atom does not decode to a plausible
    /// tag; the caller decides whether that means a deniability-wrapped
    /// volume or garbage. Every other atom failure is `HeaderCorrupt`.
    ///
    /// # Errors
    /// Fails with `HeaderCorrupt` on atom damage past the version atom and
    /// `Io` on source errors.
    pub fn read_from<R: Read>(source: &mut R) -> Result<Option<Self>> {
        let mut version_code = vec![0u8; RS5.encoded_len()];
        match source.read_exact(&mut version_code) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        match RS5.decode(&version_code, false) {
            Ok(tag) if version_is_plausible(&tag) => {}
            _ => return Ok(None),
        }

        let comment_len_digits = read_atom(source, &RS5, "comment length")?;
        let comment_len: usize = std::str::from_utf8(&comment_len_digits)
            .ok()
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| EngineError::HeaderCorrupt("comment length is not a number".to_owned()))?;
        if comment_len > MAX_COMMENT_LEN {
            return Err(EngineError::HeaderCorrupt("comment length out of range".to_owned()));
        }

        let mut comment_bytes = Vec::with_capacity(comment_len);
        for _ in 0..comment_len {
            comment_bytes.push(read_atom(source, &RS1, "comment")?[0]);
        }
        let comments = String::from_utf8(comment_bytes).map_err(|_| EngineError::HeaderCorrupt("comment bytes are not valid text".to_owned()))?;

        let flag_bytes: [u8; FLAGS_LEN] = fixed(read_atom(source, &RS5, "flags")?, "flags")?;
        let flags = Flags::from_bytes(&flag_bytes)?;

        Ok(Some(Self {
            flags,
            comments,
            salt: fixed(read_atom(source, &RS16, "salt")?, "salt")?,
            seed: fixed(read_atom(source, &RS16, "seed")?, "seed")?,
            nonce: fixed(read_atom(source, &RS24, "nonce")?, "nonce")?,
            key_check: fixed(read_atom(source, &RS64, "key check")?, "key check")?,
            keyfile_check: fixed(read_atom(source, &RS64, "keyfile check")?, "keyfile check")?,
            mac: fixed(read_atom(source, &RS64, "mac")?, "mac")?,
        }))
    }

    /// Back-patches the MAC atom once the payload tag is known.
    ///
    /// Leaves the sink positioned at the end of the MAC atom; the caller is
    /// done writing by then.
    ///
    /// # Errors
    /// Fails with `Io` on seek or write errors.
    pub fn patch_mac<W: Write + Seek>(sink: &mut W, mac_offset: u64, tag: &[u8; MAC_LEN]) -> Result<()> {
        sink.seek(SeekFrom::Start(mac_offset))?;
        write_atom(sink, &RS64, tag)?;
        Ok(())
    }
}
