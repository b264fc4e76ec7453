//! The progress and cancellation capability.
//!
//! The engine never owns a terminal or an event loop. Front-ends hand in a
//! reporter and the driver calls it between header phases and at every chunk
//! boundary. Cancellation is cooperative: once `is_cancelled` returns true
//! the driver stops reading, removes partial output, zeroises keys, and
//! returns `Cancelled`.

/// Capability handed to every engine call.
pub trait Reporter {
    /// Names the phase currently running ("Deriving key", "Encrypting", ...).
    fn set_status(&self, _status: &str) {}

    /// Reports bytes done out of bytes total for the current phase.
    fn set_progress(&self, _done: u64, _total: u64) {}

    /// Tells the front-end whether cancelling is currently honoured.
    fn set_can_cancel(&self, _can: bool) {}

    /// Polled between chunks; `true` aborts the call.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A reporter that ignores everything. Useful for tests and embedders that
/// do not surface progress.
pub struct SilentReporter;

impl Reporter for SilentReporter {}
