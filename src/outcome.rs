//! The uniform result every mutator hands back to its caller.

use std::fmt;

use crate::error::{Error, ErrorKind, Result};

/// Success flag plus optional error detail.
///
/// Mutators never return `Err` across their public boundary; whatever went
/// wrong inside is captured here instead.
#[derive(Debug)]
#[must_use]
pub struct Outcome {
    pub success: bool,
    pub error: Option<Error>,
}

impl Outcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: Error) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(Error::kind)
    }

    pub fn into_result(self) -> Result<()> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl From<Result<()>> for Outcome {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Outcome::ok(),
            Err(e) => Outcome::failed(e),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            None => write!(f, "ok"),
            Some(e) => write!(f, "failed [{}]: {}", e.kind(), e),
        }
    }
}
