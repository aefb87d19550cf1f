//! Error taxonomy for the discovery/wake core.
//!
//! Every variant is `Clone` so scan outcomes can be fanned out to all the
//! callers sharing a single in-flight scan.

use thiserror::Error;

/// Core error type.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A discovery subprocess failed (non-zero exit, I/O error, timeout).
    #[error("cannot scan devices: {0}")]
    Scan(String),

    /// A liveness probe produced no usable result.
    #[error("cannot ping device: {0}")]
    Probe(String),

    /// A single line of OS command output did not match the expected shape.
    /// Usually means the output format drifted; never swallowed silently.
    #[error("unparsable {what} line: {line:?}")]
    Parse { what: &'static str, line: String },

    /// A hardware address did not decompose into six hex byte pairs.
    #[error("malformed hardware address {0:?}")]
    MalformedMac(String),

    /// The magic packet could not be sent.
    #[error("cannot send magic packet: {0}")]
    Wake(String),

    /// A device id or name that matches nothing in the registry.
    #[error("no such device: {0}")]
    NotFound(String),

    /// The configuration file or device list is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;
