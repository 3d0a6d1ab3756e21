// SPDX-License-Identifier: MIT
//! Errors raised while building an image

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while selecting, encoding or writing entries
#[derive(Debug, Error)]
pub enum PackError {
    #[error("Not a directory: {}", .0.display())]
    InvalidRoot(PathBuf),

    #[error("Cannot read {}", path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path is not ASCII: {0}")]
    NonEncodablePath(String),

    #[error("Name of {path} needs {length} bytes, more than the 16-bit name field allows")]
    NameTooLong { path: String, length: usize },

    #[error("Entry {path} is {size} bytes, more than a 32-bit size field allows")]
    PayloadTooLarge { path: String, size: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: expected {expected} bytes written, sink received {actual}")]
    InvariantViolation { expected: u64, actual: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            PackError::InvalidRoot(_) => 1,
            PackError::UnreadableFile { .. } => 3,
            PackError::NonEncodablePath(_)
            | PackError::NameTooLong { .. }
            | PackError::PayloadTooLarge { .. } => 4,
            PackError::InvalidConfig(_) => 64,
            PackError::InvariantViolation { .. } => 70,
            PackError::Io(_) => 74,
        }
    }
}

pub type PackResult<T> = Result<T, PackError>;
