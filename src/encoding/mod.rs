//! Reed-Solomon redundancy for headers and payload.

pub mod payload;
pub mod reed_solomon;

pub use reed_solomon::RsCodec;
