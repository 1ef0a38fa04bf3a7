//! Deadline-bounded header acquisition.
//!
//! The blocking read runs on a worker thread and reports through a one-shot
//! channel; the caller waits for whichever of that channel or the deadline
//! resolves first. A read that loses the race is abandoned, not cancelled:
//! it may still be pending against the stream, but its result is dropped.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::AsFd;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::info;

use super::parser::{read_proxy_header, ProxyError, ProxyHeader};

/// Errors from [`acquire_header`]
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("timeout reading proxy protocol header after {0:?}")]
    Timeout(Duration),

    #[error("error reading proxy protocol header: {0}")]
    Decode(#[from] ProxyError),

    #[error("proxy protocol header reader terminated without a result")]
    ReaderLost,
}

/// Unbuffered handle on standard input.
///
/// `std::io::stdin()` reads ahead into its own buffer; bytes consumed that
/// way would never reach the launched command, so the header is read from a
/// duplicate of the descriptor instead.
pub fn raw_stdin() -> io::Result<File> {
    io::stdin().as_fd().try_clone_to_owned().map(File::from)
}

/// Read one PROXY header from `reader`, giving up after `timeout`.
pub async fn acquire_header<R>(reader: R, timeout: Duration) -> Result<ProxyHeader, AcquireError>
where
    R: Read + Send + 'static,
{
    let (done_tx, done_rx) = oneshot::channel();

    tokio::task::spawn_blocking(move || {
        let mut reader = reader;
        // The receiver is gone once the deadline has passed
        let _ = done_tx.send(read_proxy_header(&mut reader));
    });

    let header = tokio::select! {
        result = done_rx => match result {
            Ok(decoded) => decoded?,
            Err(_) => return Err(AcquireError::ReaderLost),
        },
        _ = tokio::time::sleep(timeout) => return Err(AcquireError::Timeout(timeout)),
    };

    info!("{}", header);
    Ok(header)
}
