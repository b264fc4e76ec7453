//! Cryptographic building blocks of the volume engine.

pub mod cipher;
pub mod derive;
pub mod keyfile;
pub mod mac;
pub mod schedule;

pub use cipher::CipherStack;
pub use derive::{KdfCosts, derive_master, random_bytes};
pub use mac::PayloadMac;
pub use schedule::{KeyMaterial, SubkeyStream};
