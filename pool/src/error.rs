//! Error types for pool and buffer operations.

use thiserror::Error;

/// Error type for pool and buffer operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("allocation of {0} bytes failed")]
    AllocationFailed(usize),
    #[error("unknown format directive: %{0}")]
    InvalidDirective(char),
    #[error("format string ends inside a directive")]
    TruncatedFormat,
    #[error("argument kind does not match %{0}")]
    ArgumentMismatch(char),
    #[error("missing argument for %{0}")]
    MissingArgument(char),
}
