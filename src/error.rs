// SPDX-FileCopyrightText: GoCortexIO
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

/// Status code FortiManager returns when the session token is no longer valid.
pub const SESSION_EXPIRED_CODE: i64 = -11;

#[derive(Debug, Error)]
pub enum FmError {
    /// Network, HTTP status or body decoding failure. Never retried.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote reported an expired session (status -11).
    #[error("Session expired: {0}")]
    AuthExpired(String),

    /// Any other non-zero RPC status. Displays the remote message verbatim.
    #[error("{message}")]
    Rpc { code: i64, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Session store error: {0}")]
    Store(String),
}

impl FmError {
    /// Collapse an expiry into a plain RPC failure once no retry is left.
    pub fn into_terminal(self) -> Self {
        match self {
            FmError::AuthExpired(message) => FmError::Rpc {
                code: SESSION_EXPIRED_CODE,
                message,
            },
            other => other,
        }
    }
}

pub type FmResult<T> = Result<T, FmError>;

impl From<reqwest::Error> for FmError {
    fn from(err: reqwest::Error) -> Self {
        FmError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for FmError {
    fn from(err: std::io::Error) -> Self {
        FmError::Store(err.to_string())
    }
}
