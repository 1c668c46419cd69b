// Copyright 2022-2023 Debox Network
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//
use std::io;

use http::StatusCode;
use thiserror::Error;

/// Result alias used by every request-path operation.
pub type DavResult<T> = Result<T, DavError>;

/// Failures surfaced to the transport layer.
///
/// Messages never contain physical paths.
#[derive(Error, Debug)]
pub enum DavError {
    #[error("unknown drive: {0}")]
    UnknownDrive(String),

    #[error("path escapes the drive root")]
    PathTraversal,

    #[error("resource not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("resource is locked")]
    Locked,

    #[error("lock token does not match")]
    TokenMismatch,

    #[error("storage failure: {0}")]
    IoFailure(io::Error),
}

impl DavError {
    pub(crate) fn conflict(reason: impl Into<String>) -> Self {
        DavError::Conflict(reason.into())
    }

    /// Status code the transport should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            DavError::UnknownDrive(_) => StatusCode::NOT_FOUND,
            DavError::PathTraversal => StatusCode::FORBIDDEN,
            DavError::NotFound => StatusCode::NOT_FOUND,
            DavError::Conflict(_) => StatusCode::CONFLICT,
            DavError::Locked => StatusCode::LOCKED,
            DavError::TokenMismatch => StatusCode::PRECONDITION_FAILED,
            DavError::IoFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<io::Error> for DavError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => DavError::NotFound,
            _ => DavError::IoFailure(e),
        }
    }
}

/// Fatal configuration problems detected at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no drives configured")]
    NoDrives,

    #[error("invalid drive name: {0:?}")]
    InvalidDrive(String),

    #[error("drive {drive:?} root is unusable: {reason}")]
    DriveRoot { drive: String, reason: String },

    #[error("invalid recycler configuration: {0}")]
    InvalidRecycler(String),

    #[error("invalid lock timeout: {0}")]
    InvalidLockTimeout(String),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read configuration: {0}")]
    Read(#[from] io::Error),
}
