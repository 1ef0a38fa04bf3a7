//! Top-level launcher error

use crate::env::HeaderInvariantViolation;
use crate::launch::LaunchError;
use crate::proxy::AcquireError;
use crate::report::ReportError;

/// Any failure that stops the command from being launched
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Header(#[from] AcquireError),

    #[error(transparent)]
    HeaderInvariant(#[from] HeaderInvariantViolation),

    #[error(transparent)]
    Report(#[from] ReportError),
}

impl Error {
    /// Process exit status for this failure. Usage errors never get here;
    /// the argument parser exits with status 2 itself.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

pub type Result<T> = std::result::Result<T, Error>;
