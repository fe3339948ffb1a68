//! Line source: follows the server log across appends, truncation and rotation.

mod check;
mod error;
mod tail;
#[cfg(test)]
mod tests;

pub use check::check_log_file;
pub use error::SourceError;
pub use tail::{LogTail, StartPosition, TailOptions};
