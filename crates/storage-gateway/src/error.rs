use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::backend::StorageError;
use crate::request::BackendKind;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// A required parameter was missing or empty; no backend call was made.
    #[error("{message}")]
    Validation {
        kind: BackendKind,
        message: &'static str,
    },

    /// The storage backend failed.
    #[error("{kind} backend failed: {source}")]
    Upstream {
        kind: BackendKind,
        #[source]
        source: StorageError,
    },
}

impl GatewayError {
    pub fn validation(kind: BackendKind) -> Self {
        Self::Validation {
            kind,
            message: kind.validation_message(),
        }
    }

    pub fn upstream(kind: BackendKind, source: StorageError) -> Self {
        Self::Upstream { kind, source }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Validation { kind, .. } | Self::Upstream { kind, .. } => *kind,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            GatewayError::Validation { message, .. } => {
                warn!("Rejected {} request: {}", self.kind(), message);
                (*message).to_string()
            }
            // Backend details stay in the log.
            GatewayError::Upstream { kind, source } => {
                error!("{} backend failed: {}", kind, source);
                format!("{kind} storage operation failed")
            }
        };

        (status, body).into_response()
    }
}
