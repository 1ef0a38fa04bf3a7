//! Launcher Configuration
//!
//! Built once from the command line and passed by reference to each stage.

mod env;
mod proxy;

pub use env::EnvConfig;
pub use proxy::{HeaderConfig, DEFAULT_HEADER_TIMEOUT};

use tracing::level_filters::LevelFilter;

/// How much the launcher reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Nothing, not even fatal errors
    Silent,
    /// Fatal errors only
    #[default]
    ErrorsOnly,
    /// Fatal errors and the header summary
    Verbose,
}

impl Verbosity {
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Silent => LevelFilter::OFF,
            Verbosity::ErrorsOnly => LevelFilter::ERROR,
            Verbosity::Verbose => LevelFilter::INFO,
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportTarget {
    /// `name: message` lines on stderr
    #[default]
    Stderr,
    /// Local syslog daemon
    Syslog,
    /// `<priority>message` lines on stderr, for systemd-journald
    Journal,
}

/// Complete launcher configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub verbosity: Verbosity,
    pub report_target: ReportTarget,
    pub header: HeaderConfig,
    pub env: EnvConfig,
}
