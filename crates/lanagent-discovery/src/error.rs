//! Discovery error taxonomy

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("no usable non-loopback IPv4 interface")]
    NoInterface,
    #[error("no neighbor-table command for platform '{os}'")]
    UnsupportedPlatform { os: String },
    #[error("'{command}' did not finish within {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },
    #[error("'{command}' failed: {reason}")]
    CommandFailed { command: String, reason: String },
}
