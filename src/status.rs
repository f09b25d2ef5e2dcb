//! gRPC-shaped status values shared by call results and arbitration responses.
//!
//! A [`Status`] is both the error type of every fallible operation in this
//! crate and the standing triple embedded in a successful arbitration
//! response, where `Code::Ok` is a legal value.

use thiserror::Error;

/// Canonical status codes used across the P4Runtime surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Code {
    #[default]
    Ok,
    Unknown,
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    FailedPrecondition,
    Unimplemented,
}

/// A status code paired with a human-readable message.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{code:?}: {message}")]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl Status {
    /// Builds a failing (or standing) status with the given code.
    pub fn fail_with_code(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Builds an `Ok`-coded status carrying a message.
    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self::fail_with_code(Code::Ok, message)
    }

    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }
}
