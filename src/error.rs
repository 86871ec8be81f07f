use std::io;

use thiserror::Error;

/// Errors returned by the spindle engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Configuration value out of range.
    #[error("config: {0}")]
    Config(String),
    /// Transfer submitted after the engine was shut down.
    #[error("engine is shut down")]
    EngineShutdown,
    /// Transfer requests zero bytes.
    #[error("transfer requests zero bytes")]
    EmptyTransfer,
    /// Buffer cannot hold the requested transfer.
    #[error("buffer too small: {needed} bytes needed, {available} available")]
    BufferTooSmall { needed: u64, available: u64 },
}
