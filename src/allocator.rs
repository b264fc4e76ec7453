//! Global memory allocator configuration.
//!
//! We use `mimalloc` instead of the system allocator. Encryption churns
//! through a steady stream of chunk-sized buffers, and mimalloc's low
//! fragmentation keeps that allocation pattern cheap.

use mimalloc::MiMalloc;

/// The global allocator instance.
///
/// Registered as the `#[global_allocator]`, replacing the standard
/// library's default system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;
