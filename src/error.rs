// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error types shared by the registry protocol and the local API.
//!
//! [`VaultError`] is the protocol taxonomy. Every failure is recovered at the
//! flow boundary (store / reveal) and reported with a reason; none of them
//! leaves the decrypted view or the ledger in a partially written state.

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// External collaborator that failed to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Confidential-compute relayer (ciphertext issuance, user decryption).
    Compute,
    /// Wallet / signing provider.
    Signer,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Compute => write!(f, "confidential-compute network"),
            Service::Signer => write!(f, "signing provider"),
        }
    }
}

/// Registry protocol errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VaultError {
    /// Caller must supply something before proceeding. Never retried automatically.
    #[error("Invalid input: {0}")]
    Input(String),

    /// Service unreachable. Retry the whole failed step.
    #[error("{service} unavailable: {message}")]
    ServiceUnavailable { service: Service, message: String },

    /// Signature refused or grant expired. A fresh handshake is required.
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// Decrypted value outside the key range. Treated as a forged or corrupted handle.
    #[error("Decrypted value for handle {handle} is not a valid key: {value}")]
    RangeViolation { handle: String, value: String },

    /// Ledger write reverted or ledger read failed. No partial record exists.
    #[error("Ledger failure: {0}")]
    LedgerFailure(String),

    /// A stored record could not be decoded.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// A reveal for this record index is already outstanding.
    #[error("Reveal already in progress for record {0}")]
    RevealInProgress(u64),

    /// The attempt was abandoned before it completed.
    #[error("Operation cancelled")]
    Cancelled,
}

impl VaultError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    pub fn compute_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            service: Service::Compute,
            message: message.into(),
        }
    }

    pub fn signer_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            service: Service::Signer,
            message: message.into(),
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self::AuthorizationDenied(message.into())
    }

    pub fn ledger(message: impl Into<String>) -> Self {
        Self::LedgerFailure(message.into())
    }

    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            VaultError::Input(_) => "input_error",
            VaultError::ServiceUnavailable { .. } => "service_unavailable",
            VaultError::AuthorizationDenied(_) => "authorization_denied",
            VaultError::RangeViolation { .. } => "range_violation",
            VaultError::LedgerFailure(_) => "ledger_failure",
            VaultError::MalformedRecord(_) => "malformed_record",
            VaultError::RevealInProgress(_) => "reveal_in_progress",
            VaultError::Cancelled => "cancelled",
        }
    }

    /// Whether re-invoking the same action can succeed without new input.
    ///
    /// `AuthorizationDenied` is not retryable as-is: the caller has to run a
    /// new handshake, which the next reveal does anyway.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VaultError::ServiceUnavailable { .. }
                | VaultError::LedgerFailure(_)
                | VaultError::RevealInProgress(_)
                | VaultError::Cancelled
        )
    }

    /// HTTP status for the local API.
    pub fn status_code(&self) -> StatusCode {
        match self {
            VaultError::Input(_) | VaultError::Cancelled => StatusCode::BAD_REQUEST,
            VaultError::AuthorizationDenied(_) => StatusCode::FORBIDDEN,
            VaultError::RevealInProgress(_) => StatusCode::CONFLICT,
            VaultError::RangeViolation { .. } | VaultError::MalformedRecord(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            VaultError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            VaultError::LedgerFailure(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub error_code: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error_code: "error",
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            error_code: "not_found",
            ..Self::new(StatusCode::NOT_FOUND, message)
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            error_code: "input_error",
            ..Self::new(StatusCode::BAD_REQUEST, message)
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        Self {
            status: err.status_code(),
            message: err.to_string(),
            error_code: err.error_code(),
        }
    }
}

impl From<crate::handshake::RevealError> for ApiError {
    fn from(err: crate::handshake::RevealError) -> Self {
        Self {
            status: err.error.status_code(),
            error_code: err.error.error_code(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.error_code.to_string(),
        });
        (self.status, body).into_response()
    }
}
