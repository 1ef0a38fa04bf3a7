//! proxy-exec
//!
//! Launches a command behind a load balancer that speaks the PROXY
//! protocol. One header is read from standard input within a deadline, the
//! connection's addresses are exposed to the command as `TCPLOCALIP`,
//! `TCPLOCALPORT`, `TCPREMOTEIP` and `TCPREMOTEPORT`, and the process image
//! is replaced by the command. Everything after the header stays on
//! standard input for the command to read.

pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod launch;
pub mod proxy;
pub mod report;

use std::convert::Infallible;
use std::ffi::OsString;

pub use config::Config;
pub use error::{Error, Result};

/// Resolve `command`, read the PROXY header, rebuild the environment and
/// exec. Only returns on failure; nothing has been executed in that case.
pub async fn run(config: &Config, command: Vec<OsString>) -> Result<Infallible> {
    let inherited = env::current_environment();

    let name = command.first().ok_or(launch::LaunchError::MissingCommand)?;
    let program = launch::resolve_command(name, std::env::var_os("PATH").as_deref())?;

    let stdin = proxy::raw_stdin().map_err(|e| proxy::AcquireError::Decode(e.into()))?;
    let header = proxy::acquire_header(stdin, config.header.timeout).await?;

    let environment = env::build_environment(&inherited, &header, &config.env)?;

    Err(launch::exec(&program, &command, &environment).into())
}
