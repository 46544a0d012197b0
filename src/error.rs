//! Error types shared by every mutator.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that can occur while probing or mutating the workstation.
#[derive(Error, Debug)]
pub enum Error {
    /// The process token could not be queried for elevation.
    #[error("privilege query failed: {0}")]
    PrivilegeQuery(String),

    /// The OS refused to start an elevated instance.
    #[error("elevation request failed: {0}")]
    ElevationRequest(String),

    /// A path, file or environment variable the operation needs is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// The display driver rejected a mode change.
    #[error("display mode change rejected: {0}")]
    OsRejection(String),

    /// Opening, reading or writing a registry key failed.
    #[error("registry access failed for '{key}': {reason}")]
    RegistryAccess { key: String, reason: String },

    /// The settings file is not valid JSON, or not a JSON object.
    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PrivilegeQuery(_) => ErrorKind::PrivilegeQuery,
            Error::ElevationRequest(_) => ErrorKind::ElevationRequest,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::OsRejection(_) => ErrorKind::OsRejection,
            Error::RegistryAccess { .. } => ErrorKind::RegistryAccess,
            Error::Parse { .. } => ErrorKind::Parse,
            Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn registry(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::RegistryAccess {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PrivilegeQuery,
    ElevationRequest,
    NotFound,
    OsRejection,
    RegistryAccess,
    Parse,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::PrivilegeQuery => "PRIVILEGE_QUERY",
            ErrorKind::ElevationRequest => "ELEVATION_REQUEST",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::OsRejection => "OS_REJECTION",
            ErrorKind::RegistryAccess => "REGISTRY_ACCESS",
            ErrorKind::Parse => "PARSE",
            ErrorKind::Io => "IO",
        };
        f.write_str(name)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
