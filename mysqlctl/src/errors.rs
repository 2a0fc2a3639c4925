use crate::db::errors::DbError;
use crate::types::Resource;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested record not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: Resource, id: String },

    /// Server selection found no candidates at all
    #[error("No available server found (zone: {})", zone.as_deref().unwrap_or("any"))]
    NoAvailableServer { zone: Option<String> },

    /// The server record exists but its workload has not reported an endpoint yet
    #[error("Server {id} is not running")]
    ServerNotReady { id: String },

    /// Conflict error, e.g. a name that is already taken on a server
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// A statement against a managed server or a cluster API call failed
    #[error("Failed to {operation}: {source:#}")]
    PhysicalExecution {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// Record store operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(resource: Resource, id: impl ToString) -> Self {
        Error::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn physical(operation: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Error::PhysicalExecution {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::NoAvailableServer { .. } => StatusCode::NOT_FOUND,
            Error::ServerNotReady { .. } => StatusCode::CONFLICT,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::PhysicalExecution { .. } => StatusCode::BAD_GATEWAY,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code included in JSON error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Error::BadRequest { .. } => "BAD_REQUEST",
            Error::NotFound { resource, .. } => match resource {
                Resource::Server => "SERVER_NOT_FOUND",
                Resource::Database => "DATABASE_NOT_FOUND",
                Resource::User => "USER_NOT_FOUND",
                Resource::Provision => "PROVISION_NOT_FOUND",
                Resource::Cluster => "CLUSTER_NOT_FOUND",
            },
            Error::NoAvailableServer { .. } => "NO_AVAILABLE_SERVER_FOUND",
            Error::ServerNotReady { .. } => "SERVER_NOT_READY",
            Error::Conflict { .. } => "CONFLICT",
            Error::PhysicalExecution { .. } => "PHYSICAL_EXECUTION_FAILED",
            Error::Database(DbError::NotFound) => "NOT_FOUND",
            Error::Database(DbError::UniqueViolation { .. }) => "CONFLICT",
            Error::Database(DbError::Other(_)) | Error::Other(_) => "INTERNAL",
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::NoAvailableServer { .. } => "No available server found".to_string(),
            Error::ServerNotReady { id } => format!("Server {id} is not running"),
            Error::Conflict { message } => message.clone(),
            // The operation names the failing step; the driver error stays in the logs
            Error::PhysicalExecution { operation, .. } => format!("Failed to {operation}"),
            Error::Database(DbError::NotFound) => "Resource not found".to_string(),
            Error::Database(DbError::UniqueViolation { .. }) => "Resource already exists".to_string(),
            Error::Database(DbError::Other(_)) | Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::PhysicalExecution { .. } => {
                tracing::error!("Physical execution error: {:#}", self);
            }
            Error::Database(_) | Error::Conflict { .. } | Error::ServerNotReady { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
            Error::BadRequest { .. } | Error::NotFound { .. } | Error::NoAvailableServer { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let mut body = json!({
            "code": self.code(),
            "message": self.user_message(),
        });
        if let Error::NotFound { id, .. } = &self {
            body["id"] = json!(id);
        }

        (status, axum::response::Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
