//! CLI commands and argument parsing.
//!
//! A thin shell over the engine: flags map one-to-one onto the request
//! structs, passwords come from `-p` or an interactive prompt, and progress
//! goes through the terminal reporter.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::engine::{DecryptRequest, EncryptRequest, Engine, staging};
use crate::error::Severity;
use crate::file::{is_volume, output_path};
use crate::secret::Password;
use crate::types::ProcessorMode;
use crate::ui;
use crate::ui::TermReporter;

#[derive(Subcommand)]
pub enum Commands {
    /// Encrypt a file into a self-contained volume.
    Encrypt {
        /// Input file path.
        #[arg(short, long)]
        input: PathBuf,

        /// Output volume path (defaults to input + .pcv).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Password (prompted interactively when omitted).
        #[arg(short, long)]
        password: Option<String>,

        /// Keyfile to mix into the key; repeatable.
        #[arg(short = 'k', long = "keyfile")]
        keyfiles: Vec<PathBuf>,

        /// Make the keyfile order part of the credential.
        #[arg(long)]
        ordered: bool,

        /// Comments embedded in the header IN CLEAR, readable without the
        /// password.
        #[arg(short, long, default_value = "")]
        comments: String,

        /// Serpent cipher layer, SHA3 MAC, doubled KDF passes.
        #[arg(long)]
        paranoid: bool,

        /// Payload Reed-Solomon redundancy (self-healing volumes).
        #[arg(long = "rs")]
        reed_solomon: bool,

        /// Wrap the volume into headerless, deniable noise.
        #[arg(long)]
        deny: bool,
    },

    /// Decrypt a volume.
    Decrypt {
        /// Input volume path.
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (defaults to input without .pcv).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Password (prompted interactively when omitted).
        #[arg(short, long)]
        password: Option<String>,

        /// Keyfile used at encryption time; repeatable, order matters for
        /// ordered volumes.
        #[arg(short = 'k', long = "keyfile")]
        keyfiles: Vec<PathBuf>,

        /// Keep the plaintext even when authentication fails.
        #[arg(long)]
        force: bool,

        /// Verify the whole volume before writing any plaintext.
        #[arg(long)]
        verify_first: bool,

        /// Treat the input as deniability-wrapped without probing.
        #[arg(long)]
        deny_hint: bool,
    },

    /// Report whether a file opens as a recognisable volume.
    Probe {
        /// File to inspect.
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Parser)]
#[command(name = "picovault", version, about = "Encrypt files into self-contained, self-healing, optionally deniable volumes.")]
pub struct App {
    #[command(subcommand)]
    command: Commands,
}

impl App {
    /// Initialises logging, sweeps stale staging files, parses arguments.
    ///
    /// # Errors
    /// Fails when the tracing subscriber cannot be installed.
    pub fn init() -> Result<Self> {
        let subscriber = tracing_subscriber::fmt().with_file(true).with_line_number(true).finish();
        tracing::subscriber::set_global_default(subscriber)?;
        staging::sweep();
        Ok(Self::parse())
    }

    /// Runs the parsed command.
    ///
    /// # Errors
    /// Propagates engine and prompt failures with path context.
    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Encrypt { input, output, password, keyfiles, ordered, comments, paranoid, reed_solomon, deny } => {
                if is_volume(&input) {
                    ui::show_note("input already carries the volume extension; encrypting it again");
                }

                let output = output.unwrap_or_else(|| output_path(&input, ProcessorMode::Encrypt));
                let password = match password {
                    Some(given) => Password::from_string(given),
                    None => ui::prompt::encryption_password()?,
                };

                let request = EncryptRequest {
                    input,
                    output: output.clone(),
                    password,
                    keyfiles,
                    keyfile_ordered: ordered,
                    comments,
                    paranoid,
                    reed_solomon,
                    deniability: deny,
                };

                let reporter = TermReporter::new()?;
                let result = Engine::new().encrypt(&request, &reporter);
                reporter.finish();
                result.with_context(|| format!("encryption failed for {}", request.input.display()))?;

                ui::show_success(ProcessorMode::Encrypt, &output, fs::metadata(&output)?.len());
                Ok(())
            }

            Commands::Decrypt { input, output, password, keyfiles, force, verify_first, deny_hint } => {
                if !is_volume(&input) {
                    ui::show_note("input does not carry the volume extension; attempting anyway");
                }

                let output = output.unwrap_or_else(|| output_path(&input, ProcessorMode::Decrypt));
                let password = match password {
                    Some(given) => Password::from_string(given),
                    None => ui::prompt::decryption_password()?,
                };

                let request = DecryptRequest {
                    input,
                    output: output.clone(),
                    password,
                    keyfiles,
                    force_decrypt: force,
                    verify_first,
                    deniability_hint: deny_hint,
                };

                let reporter = TermReporter::new()?;
                let result = Engine::new().decrypt(&request, &reporter);
                reporter.finish();

                match result {
                    Ok(summary) => {
                        ui::show_comments(&summary.comments);
                        ui::show_success(ProcessorMode::Decrypt, &output, fs::metadata(&output)?.len());
                        Ok(())
                    }
                    // Force-decrypt kept damaged plaintext: warn, keep the
                    // file, exit cleanly.
                    Err(err) if err.severity() == Severity::Warning => {
                        ui::show_kept_warning(&output);
                        Ok(())
                    }
                    Err(err) => Err(err).with_context(|| format!("decryption failed for {}", request.input.display())),
                }
            }

            Commands::Probe { input } => {
                if Engine::is_deniable(&input)? {
                    println!("{}: no recognisable volume header (deniable volume, or not a volume)", input.display());
                } else {
                    println!("{}: recognisable volume", input.display());
                }
                Ok(())
            }
        }
    }
}
