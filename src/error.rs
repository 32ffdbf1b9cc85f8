//! Error taxonomy for the multicast core.
//!
//! Propagation policy: transport- and codec-level errors are isolated per
//! peer and never escape the engine. Programmer errors ([`Error::NotStarted`],
//! [`Error::BadArgument`]) surface immediately to the caller. Validator
//! errors are consumed internally (logged, then treated as a failed
//! validation) and never reach this type's callers.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A public API call was made before `start` or after `stop`.
    #[error("multicast engine is not started")]
    NotStarted,

    /// Attempted to write to a peer whose send channel is absent.
    #[error("peer has no writable connection")]
    NoWritableConnection,

    /// Decode/encode failure on a stream. Always scoped to a single
    /// connection by the caller; never surfaces from the engine's public
    /// API.
    #[error("codec error: {0}")]
    Codec(#[from] io::Error),

    /// `publish`/`subscribe` called with malformed arguments.
    #[error("bad argument: {0}")]
    BadArgument(&'static str),
}
