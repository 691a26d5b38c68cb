//! Error types for bytepool
//!
//! Only configuration problems are recoverable. Misuse of a pool or handle
//! (double free, stale handle, use after close) panics instead, since carrying
//! on would risk a double free at the raw-memory layer.

use std::fmt;

pub type Result<T> = std::result::Result<T, PoolError>;

#[derive(Debug)]
pub enum PoolError {
    /// A size class declaration with zero size or zero capacity
    InvalidClass {
        index: usize,
        capacity: usize,
        size: usize,
    },
    /// Configuration could not be read or parsed
    Config { message: String },
    /// Handle was never issued or has been retired
    UnknownHandle { handle: u64 },
    /// Handle is still registered but its pool has been dropped
    PoolDropped { handle: u64 },
    Io(std::io::Error),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidClass { index, capacity, size } => write!(
                f,
                "invalid size class #{}: capacity {} and size {} must both be non-zero",
                index, capacity, size
            ),
            Self::Config { message } => write!(f, "invalid configuration: {}", message),
            Self::UnknownHandle { handle } => {
                write!(f, "unknown or retired pool handle {:#x}", handle)
            }
            Self::PoolDropped { handle } => {
                write!(f, "pool behind handle {:#x} has been dropped", handle)
            }
            Self::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PoolError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for PoolError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config {
            message: e.to_string(),
        }
    }
}
