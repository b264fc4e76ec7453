//! Interactive password entry.
//!
//! Passwords are collected without echo through `inquire`. Encryption asks
//! twice: a typo in an encryption password is permanent data loss, while a
//! typo on decryption just fails the key check.

use anyhow::{Context, Result};
use inquire::PasswordDisplayMode;

use crate::secret::Password;

/// Prompts for a new password, with confirmation.
pub fn encryption_password() -> Result<Password> {
    let entered = inquire::Password::new("Password:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .with_custom_confirmation_message("Confirm password:")
        .with_custom_confirmation_error_message("The passwords do not match.")
        .prompt()
        .context("password entry aborted")?;

    Ok(Password::from_string(entered))
}

/// Prompts for an existing password, no confirmation.
pub fn decryption_password() -> Result<Password> {
    let entered = inquire::Password::new("Password:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("password entry aborted")?;

    Ok(Password::from_string(entered))
}
