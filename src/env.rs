//! Environment reconstruction for the launched command.
//!
//! The PROXY header decides which variables the command sees:
//!
//! - LOCAL or unknown-family connections carry no client address. The
//!   inherited environment passes through untouched, or in clean mode only
//!   the four inherited `TCP*` address variables survive.
//! - Proxied connections get fresh `TCPLOCALIP`, `TCPLOCALPORT`,
//!   `TCPREMOTEIP` and `TCPREMOTEPORT` values appended after stale copies
//!   and excluded names have been removed. "Local" is the header's
//!   destination, "remote" its source.

use std::ffi::{OsStr, OsString};
use std::net::SocketAddr;
use std::os::unix::ffi::OsStrExt;

use crate::config::EnvConfig;
use crate::proxy::ProxyHeader;

pub const TCP_LOCAL_IP: &str = "TCPLOCALIP";
pub const TCP_LOCAL_PORT: &str = "TCPLOCALPORT";
pub const TCP_REMOTE_IP: &str = "TCPREMOTEIP";
pub const TCP_REMOTE_PORT: &str = "TCPREMOTEPORT";

/// Variables describing the connection, in the order they are appended
pub const ADDRESS_VARS: [&str; 4] = [TCP_LOCAL_IP, TCP_LOCAL_PORT, TCP_REMOTE_IP, TCP_REMOTE_PORT];

/// Host name variables set by other UCSPI tools; stale once the address
/// changes, so they are dropped alongside the address variables
const LEGACY_HOST_VARS: [&str; 2] = ["TCPLOCALHOST", "TCPREMOTEHOST"];

/// The header claims a proxied connection but lacks an address.
#[derive(Debug, thiserror::Error)]
#[error(
    "proxied header is missing its source or destination address (source={source_addr:?}, destination={destination_addr:?})"
)]
pub struct HeaderInvariantViolation {
    pub source_addr: Option<SocketAddr>,
    pub destination_addr: Option<SocketAddr>,
}

/// What the header lets us say about the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposure {
    /// LOCAL command or unsupported family: no client address exists
    Passthrough,
    /// Proxied TCP connection
    Proxied {
        local: SocketAddr,
        remote: SocketAddr,
    },
}

impl Exposure {
    pub fn of(header: &ProxyHeader) -> Result<Self, HeaderInvariantViolation> {
        if header.local || !header.unknown.is_empty() {
            return Ok(Exposure::Passthrough);
        }
        match (header.source, header.destination) {
            (Some(remote), Some(local)) => Ok(Exposure::Proxied { local, remote }),
            (source_addr, destination_addr) => Err(HeaderInvariantViolation {
                source_addr,
                destination_addr,
            }),
        }
    }
}

/// Build the complete environment for the launched command.
///
/// `current` is the inherited environment as `NAME=value` entries. The
/// result is a new list; `current` is not modified.
pub fn build_environment(
    current: &[OsString],
    header: &ProxyHeader,
    config: &EnvConfig,
) -> Result<Vec<OsString>, HeaderInvariantViolation> {
    let env = match Exposure::of(header)? {
        Exposure::Passthrough if config.clean => ADDRESS_VARS
            .iter()
            .map(|name| entry(name, lookup(current, name).unwrap_or_default()))
            .collect(),
        Exposure::Passthrough => current.to_vec(),
        Exposure::Proxied { local, remote } => {
            let inherited: &[OsString] = if config.clean { &[] } else { current };

            let mut env: Vec<OsString> = inherited
                .iter()
                .filter(|e| !is_address_var(e.as_bytes()))
                .filter(|e| !config.is_excluded(e.as_bytes()))
                .cloned()
                .collect();

            env.reserve(ADDRESS_VARS.len());
            env.push(entry(TCP_LOCAL_IP, local.ip().to_string()));
            env.push(entry(TCP_LOCAL_PORT, local.port().to_string()));
            env.push(entry(TCP_REMOTE_IP, remote.ip().to_string()));
            env.push(entry(TCP_REMOTE_PORT, remote.port().to_string()));
            env
        }
    };

    Ok(env)
}

/// The inherited environment in `NAME=value` form
pub fn current_environment() -> Vec<OsString> {
    std::env::vars_os()
        .map(|(name, value)| {
            let mut e = name;
            e.push("=");
            e.push(value);
            e
        })
        .collect()
}

/// Split `NAME=value` at the first `=`
pub fn split_entry(e: &OsStr) -> (&OsStr, &OsStr) {
    let bytes = e.as_bytes();
    match bytes.iter().position(|&b| b == b'=') {
        Some(i) => (OsStr::from_bytes(&bytes[..i]), OsStr::from_bytes(&bytes[i + 1..])),
        None => (e, OsStr::new("")),
    }
}

fn entry(name: &str, value: impl Into<OsString>) -> OsString {
    let mut e = OsString::from(name);
    e.push("=");
    e.push(value.into());
    e
}

/// Value of the last `name` entry, which is the one a program would see
fn lookup(env: &[OsString], name: &str) -> Option<OsString> {
    env.iter().rev().find_map(|e| {
        let (n, value) = split_entry(e);
        (n.as_bytes() == name.as_bytes()).then(|| value.to_os_string())
    })
}

fn is_address_var(e: &[u8]) -> bool {
    ADDRESS_VARS
        .iter()
        .chain(LEGACY_HOST_VARS.iter())
        .any(|name| e.len() > name.len() && e.starts_with(name.as_bytes()) && e[name.len()] == b'=')
}
