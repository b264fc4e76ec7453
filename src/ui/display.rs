//! Display functions for terminal output.
//!
//! Success lines, volume comments, and the force-decrypt warning.

use std::path::Path;

use bytesize::ByteSize;

use crate::types::ProcessorMode;

/// Displays a success message after an operation completes.
pub fn show_success(mode: ProcessorMode, path: &Path, size: u64) {
    let action = match mode {
        ProcessorMode::Encrypt => "encrypted",
        ProcessorMode::Decrypt => "decrypted",
    };

    let filename = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_else(|| path.display().to_string().into());
    println!("{} {}", console::style("✔").green().bright(), console::style(format!("File {action} successfully: {filename} ({})", ByteSize(size))).white().bright());
}

/// Displays the volume's plaintext comments, when present.
///
/// Comments are stored in clear; showing them needs no password and leaks
/// nothing the volume itself does not already leak.
pub fn show_comments(comments: &str) {
    if comments.is_empty() {
        return;
    }
    println!("{} {}", console::style("🗨").cyan(), console::style(format!("Comments: {comments}")).white());
}

/// Displays a low-key advisory note before an operation runs.
pub fn show_note(message: &str) {
    println!("{} {}", console::style("ℹ").yellow(), console::style(message).yellow().dim());
}

/// Warns that plaintext was kept despite failed authentication.
pub fn show_kept_warning(path: &Path) {
    println!(
        "{} {}",
        console::style("⚠").yellow().bright(),
        console::style(format!("Authentication failed; damaged plaintext was kept at {}", path.display())).yellow()
    );
}
