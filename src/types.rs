//! Common type definitions.
//!
//! Provides the mode enum shared by the CLI, the file helpers, and the
//! terminal output layer.

use std::fmt::{Display, Formatter, Result};

/// Represents the type of operation the front-end asked for.
///
/// Used to derive output paths and label user-facing output.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ProcessorMode {
    /// Encrypt the file, producing a `.pcv` volume.
    Encrypt,

    /// Decrypt a volume, removing the `.pcv` extension.
    Decrypt,
}

impl ProcessorMode {
    /// Returns a human-readable label for the mode.
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Encrypt => "Encrypt",
            Self::Decrypt => "Decrypt",
        }
    }
}

impl Display for ProcessorMode {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str(self.label())
    }
}
