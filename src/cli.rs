//! Command-line interface.
//!
//! Options follow getopt conventions: they come before the command, and the
//! first positional argument starts the command line, which is passed on
//! verbatim. Of `-v`, `-Q` and `-q` the last one given wins, as does the
//! last of `-s` and `-j`.

use std::ffi::OsString;
use std::time::Duration;

use clap::Parser;

use crate::config::{Config, EnvConfig, HeaderConfig, ReportTarget, Verbosity};

const AFTER_HELP: &str = "\
The header is read from standard input. For proxied TCP connections the
command runs with TCPLOCALIP, TCPLOCALPORT, TCPREMOTEIP and TCPREMOTEPORT
set from the header's destination (local) and source (remote). LOCAL and
unknown-family connections leave the environment as it is.";

/// Read a PROXY protocol header from stdin, then exec a command with the
/// client address in its environment
#[derive(Debug, Parser)]
#[command(
    name = "proxy-exec",
    version,
    after_help = AFTER_HELP,
    args_override_self = true
)]
pub struct Cli {
    /// Show all available messages
    #[arg(short = 'v', overrides_with_all = ["errors_only", "quiet"])]
    pub verbose: bool,

    /// Show only error messages (default)
    #[arg(short = 'Q', overrides_with_all = ["verbose", "quiet"])]
    pub errors_only: bool,

    /// No messages at all
    #[arg(short = 'q', overrides_with_all = ["verbose", "errors_only"])]
    pub quiet: bool,

    /// Log to syslog
    #[arg(short = 's', overrides_with = "journal")]
    pub syslog: bool,

    /// Log to stderr in systemd-journald format
    #[arg(short = 'j', overrides_with = "syslog")]
    pub journal: bool,

    /// Spawn the command in a clean environment (only TCPLOCAL/REMOTE IP and
    /// PORT are kept for LOCAL connections)
    #[arg(short = 'X')]
    pub clean_env: bool,

    /// Remove VARNAME from the environment before spawning the command
    #[arg(short = 'x', value_name = "VARNAME")]
    pub exclude: Vec<String>,

    /// Timeout for the proxy header, e.g. 10s, 500ms, 1m 30s. Units must be
    /// whole numbers: write 1500ms, not 1.5s
    #[arg(
        short = 't',
        value_name = "DURATION",
        value_parser = humantime::parse_duration,
        default_value = "10s"
    )]
    pub timeout: Duration,

    /// Command to run, followed by its arguments
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<OsString>,
}

impl Cli {
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Silent
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::ErrorsOnly
        }
    }

    pub fn report_target(&self) -> ReportTarget {
        if self.syslog {
            ReportTarget::Syslog
        } else if self.journal {
            ReportTarget::Journal
        } else {
            ReportTarget::Stderr
        }
    }

    /// Split into the launcher configuration and the command line
    pub fn into_parts(self) -> (Config, Vec<OsString>) {
        let config = Config {
            verbosity: self.verbosity(),
            report_target: self.report_target(),
            header: HeaderConfig {
                timeout: self.timeout,
            },
            env: EnvConfig {
                exclude: self.exclude,
                clean: self.clean_env,
            },
        };
        (config, self.command)
    }
}
