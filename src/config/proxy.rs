//! PROXY Protocol Configuration
//!
//! Settings for reading the PROXY header off standard input.

use std::time::Duration;

/// Default time allowed for the full header to arrive
pub const DEFAULT_HEADER_TIMEOUT: Duration = Duration::from_secs(10);

/// Header acquisition configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderConfig {
    /// Deadline for reading a complete PROXY header.
    /// Default: 10 seconds
    pub timeout: Duration,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HEADER_TIMEOUT,
        }
    }
}
