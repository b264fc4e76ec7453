// Picovault - encrypted volume tool
//
// Encryption: XChaCha20 (+ Serpent-CTR in paranoid mode)
// Key Derivation: Argon2id, optionally mixed with keyfiles
// File Format: Reed-Solomon protected header atoms + encrypted payload chunks

use std::process;

use picovault::app::App;

fn run() -> anyhow::Result<()> {
    App::init()?.execute()
}

/// Entry point for the Picovault encryption tool.
///
/// # Exit Codes
/// * 0 - Success (including force-decrypt warnings)
/// * 1 - Error (message printed to stderr)
fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:?}");
        process::exit(1);
    }
}
