// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result type.
pub type SimResult<T> = Result<T, SimError>;

/// Error kinds surfaced by the simulation core.
///
/// All of these are unrecoverable at the point they occur: the driver
/// aborts the run and hands the error to its caller. The only silent
/// fallback in the crate is zero-filling absent optional input arrays,
/// which is a policy rather than a failure.
#[derive(Debug, Error)]
pub enum SimError {
    /// Missing or inconsistent configuration (paths, geometry, mode).
    #[error("configuration error: {message}")]
    Config { message: String },

    /// A vector whose length does not match the grid point count.
    #[error("size mismatch for '{name}': expected {expected}, got {actual}")]
    DataMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Malformed dataset contents.
    #[error("dataset error in {path}: {message}")]
    Dataset { path: PathBuf, message: String },

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Linear solver breakdown or non-convergence.
    #[error("linear solver failed: {message}")]
    Solver { message: String },

    /// Coupling channel protocol violation or peer loss.
    #[error("coupling error: {message}")]
    Coupling { message: String },
}

impl SimError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn dataset(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Dataset {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn solver(message: impl Into<String>) -> Self {
        Self::Solver {
            message: message.into(),
        }
    }

    pub fn coupling(message: impl Into<String>) -> Self {
        Self::Coupling {
            message: message.into(),
        }
    }

    /// Check that a vector length matches the expected point count.
    #[inline]
    pub fn check_len(name: &str, expected: usize, actual: usize) -> SimResult<()> {
        if expected != actual {
            Err(Self::DataMismatch {
                name: name.to_string(),
                expected,
                actual,
            })
        } else {
            Ok(())
        }
    }
}
