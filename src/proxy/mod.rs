//! PROXY Protocol Module
//!
//! Reads the HAProxy PROXY protocol v1/v2 header that precedes the client
//! stream on standard input, within a deadline.

mod acquire;
mod parser;

pub use acquire::{acquire_header, raw_stdin, AcquireError};
pub use parser::{read_proxy_header, ProxyError, ProxyHeader, ProxyVersion};
