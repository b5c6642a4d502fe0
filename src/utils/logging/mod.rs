//! Logging and progress helpers
//!
//! Operation messages go through the `log` facade; progress bars use
//! indicatif and are only created when the run asks for them.

pub mod log;
pub mod progress;

pub use self::log::{log_operation_complete, log_operation_start, log_warning};
pub use progress::{create_group_progress_bar, create_spinner, finish_progress_bar};
