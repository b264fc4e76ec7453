//! Volume format and cryptographic constants.
//!
//! This module defines the core constants used throughout the application:
//! - Container format parameters (atom sizes, chunk size, block sizes)
//! - Key derivation cost rows (normal and paranoid)
//! - Cipher and MAC dimensions
//!
//! These constants are the single source of truth for the volume format.
//! Changing any of them changes the on-disk layout and breaks compatibility
//! with existing volumes.

/// The application name used in user-facing output and prompts.
pub const APP_NAME: &str = "Picovault";

/// The default file extension appended to encrypted volumes.
pub const FILE_EXTENSION: &str = ".pcv";

/// Length of the version tag in bytes.
pub const VERSION_LEN: usize = 5;

/// The version tag embedded as the first header atom.
///
/// Always exactly five ASCII bytes matching the `vX.YZ` pattern. A volume
/// whose version atom does not decode to this shape is treated as a
/// deniability candidate rather than rejected outright.
pub const VERSION_TAG: &[u8; VERSION_LEN] = b"v1.48";

/// Size of one plaintext streaming chunk in bytes.
///
/// 1 MiB is the unit across which progress reporting and cancellation are
/// observable. It is an exact multiple of [`RS_BLOCK_DATA`], so only the
/// final chunk of a stream can carry a partial redundancy block.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Number of data bytes per payload Reed-Solomon block.
pub const RS_BLOCK_DATA: usize = 128;

/// Number of bytes a payload block occupies on disk once encoded.
///
/// 128 data bytes plus 8 parity bytes. The parity allows up to 4 arbitrary
/// byte errors per block to be corrected in the slow decrypt pass.
pub const RS_BLOCK_CODE: usize = 136;

/// Cipher rekey threshold in bytes.
///
/// XChaCha20 is rekeyed after this many bytes of keystream to keep a single
/// (key, nonce) pair far away from its counter limit on very large streams.
/// 60 GiB is an exact multiple of [`CHUNK_SIZE`], so the rekey point always
/// falls on a chunk boundary.
pub const REKEY_INTERVAL: u64 = 60 * 1024 * 1024 * 1024;

/// Argon2id memory cost in KiB (1 GiB).
///
/// The memory hardness makes ASIC/FPGA attacks expensive by requiring
/// dedicated RAM per candidate password tested.
pub const ARGON_MEMORY: u32 = 1024 * 1024;

/// Argon2id time cost (number of passes) in normal mode.
pub const ARGON_TIME: u32 = 4;

/// Argon2id time cost in paranoid mode.
pub const ARGON_TIME_PARANOID: u32 = 8;

/// Argon2id parallelism (lanes).
pub const ARGON_LANES: u32 = 4;

/// Length of the Argon2id output and of the effective master key in bytes.
pub const MASTER_KEY_LEN: usize = 32;

/// Length of a cipher key (XChaCha20 or Serpent) in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the Serpent CTR initialisation vector in bytes.
pub const SERPENT_IV_LEN: usize = 16;

/// Length of the random key-derivation salt in bytes.
pub const SALT_LEN: usize = 16;

/// Length of the random seed salting the subkey expansion stream in bytes.
pub const SEED_LEN: usize = 16;

/// Length of the XChaCha20 nonce in bytes.
///
/// The 192-bit extended nonce lets every volume carry a random nonce with no
/// realistic risk of collision.
pub const NONCE_LEN: usize = 24;

/// Length of the payload authentication tag in bytes.
///
/// Both BLAKE2b-512 and HMAC-SHA3-512 produce 64-byte tags.
pub const MAC_LEN: usize = 64;

/// Length of the key check and keyfile check header values in bytes.
pub const CHECK_LEN: usize = 64;

/// Length of a single keyfile digest and of the keyfile mix in bytes.
pub const KEYFILE_DIGEST_LEN: usize = 32;

/// Length of the flags bitfield in bytes, one byte per flag.
pub const FLAGS_LEN: usize = 5;

/// Number of decimal digits used to record the comment length.
pub const COMMENT_LEN_DIGITS: usize = 5;

/// Maximum comment length in bytes (the largest five-digit number).
pub const MAX_COMMENT_LEN: usize = 99_999;

/// Size of the encoded header in bytes, excluding the comment atoms.
///
/// version (15) + comment length (15) + flags (15) + salt (48) + seed (48)
/// + nonce (72) + key check (192) + keyfile check (192) + MAC (192).
/// Every comment byte adds 3 more.
pub const HEADER_BASE_LEN: usize = 789;

/// Filename prefix for ephemeral staging files in the system temp directory.
pub const STAGE_PREFIX: &str = "picovault-stage-";
