//! Terminal front-end pieces: prompts, progress, result display.

pub mod display;
pub mod progress;
pub mod prompt;

pub use display::{show_comments, show_kept_warning, show_note, show_success};
pub use progress::TermReporter;
