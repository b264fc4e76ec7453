//! Engine error taxonomy.
//!
//! Every failure the engine can surface is one of a fixed set of kinds so
//! that callers can branch on [`EngineError::kind`] without parsing messages.
//! Two of the kinds carry a `kept` marker: when `force_decrypt` retains
//! damaged plaintext, the failure downgrades to [`Severity::Warning`] and the
//! output file is left in place instead of being removed.

use std::io;

use thiserror::Error;

/// Programmatic classification of an [`EngineError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Underlying read/write failure.
    Io,
    /// A buffer or field had the wrong length. Programmer error.
    BadSize,
    /// A request parameter was rejected before any work started.
    BadArgument,
    /// Argon2id could not run to completion.
    Kdf,
    /// A header atom was damaged beyond Reed-Solomon repair.
    HeaderCorrupt,
    /// Password or keyfiles do not match the volume.
    WrongCredentials,
    /// The payload authentication tag did not match.
    MacMismatch,
    /// Payload corruption exceeded the Reed-Solomon correction capacity.
    Unrecoverable,
    /// A cipher or subkey stream ran out before it could be rekeyed.
    NonceExhaust,
    /// The reporter requested cancellation. Not a failure.
    Cancelled,
}

/// How severe a failure is from the caller's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// The operation failed and any partial output was removed.
    Hard,
    /// The operation failed but `force_decrypt` retained the plaintext.
    Warning,
}

/// The one error type crossing the engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),

    #[error("bad size: {0}")]
    BadSize(String),

    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("header corrupt: {0}")]
    HeaderCorrupt(String),

    #[error("incorrect password or keyfiles")]
    WrongCredentials,

    #[error("authentication failed: the volume does not match its MAC")]
    MacMismatch {
        /// True when damaged plaintext was retained under `force_decrypt`.
        kept: bool,
    },

    #[error("corruption exceeds the Reed-Solomon correction capacity")]
    Unrecoverable {
        /// True when partially repaired plaintext was retained.
        kept: bool,
    },

    #[error("cipher stream exhausted before rekey")]
    NonceExhaust,

    #[error("operation cancelled")]
    Cancelled,
}

impl EngineError {
    /// Returns the programmatic kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::BadSize(_) => ErrorKind::BadSize,
            Self::BadArgument(_) => ErrorKind::BadArgument,
            Self::Kdf(_) => ErrorKind::Kdf,
            Self::HeaderCorrupt(_) => ErrorKind::HeaderCorrupt,
            Self::WrongCredentials => ErrorKind::WrongCredentials,
            Self::MacMismatch { .. } => ErrorKind::MacMismatch,
            Self::Unrecoverable { .. } => ErrorKind::Unrecoverable,
            Self::NonceExhaust => ErrorKind::NonceExhaust,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// True when plaintext was retained despite the failure.
    #[must_use]
    pub fn kept(&self) -> bool {
        matches!(self, Self::MacMismatch { kept: true } | Self::Unrecoverable { kept: true })
    }

    /// Returns the severity of this error.
    ///
    /// Only `kept` outcomes are warnings; everything else, including
    /// cancellation, removes partial output and is hard.
    #[must_use]
    pub fn severity(&self) -> Severity {
        if self.kept() { Severity::Warning } else { Severity::Hard }
    }
}

/// Engine-wide result alias.
pub type Result<T> = std::result::Result<T, EngineError>;
