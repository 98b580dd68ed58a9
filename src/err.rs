use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

use serde::Serialize;

pub async fn handler404(path: Uri) -> (StatusCode, Json<Error>) {
    (
        StatusCode::NOT_FOUND,
        Json(Error::NotFound {
            message: format!("Invalid path: {}", path),
        }),
    )
}

/// Envelope for every successful response body: `{"success": true, ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct Success<V> {
    success: bool,
    #[serde(flatten)]
    value: V,
}

impl<V: Serialize> Success<V> {
    pub fn of(value: V) -> Self {
        Self {
            success: true,
            value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "error")]
pub enum Error {
    NotFound { message: String },
    DuplicateId { message: String },
    DuplicateCode { message: String },
    AuthenticationFailure { message: String },
    Unauthorized { message: String },
    AlreadyEnrolled { message: String },
    NotEnrolled { message: String },
    InvalidPayload { message: String },
    StorageFailure { message: String },
    InternalError { kind: &'static str, message: String },
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::DuplicateId { .. }
            | Error::DuplicateCode { .. }
            | Error::AlreadyEnrolled { .. }
            | Error::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            Error::AuthenticationFailure { .. } | Error::Unauthorized { .. } => {
                StatusCode::UNAUTHORIZED
            }
            Error::NotEnrolled { .. } => StatusCode::FORBIDDEN,
            Error::StorageFailure { .. } | Error::InternalError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Error {
        Error::NotFound {
            message: msg.into(),
        }
    }

    pub fn invalid<S: Into<String>>(msg: S) -> Error {
        Error::InvalidPayload {
            message: msg.into(),
        }
    }

    /// Identical body for unknown id and wrong secret, so callers cannot
    /// probe which ids exist.
    pub fn bad_credentials() -> Error {
        Error::AuthenticationFailure {
            message: "Invalid id or password".to_string(),
        }
    }

    pub fn unauthorized() -> Error {
        Error::Unauthorized {
            message: "Admin authentication required".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::StorageFailure {
            message: err.to_string(),
        }
    }
}

impl From<uuid::Error> for Error {
    fn from(id: uuid::Error) -> Self {
        Self::InvalidPayload {
            message: format!("Malformed id: {}", id),
        }
    }
}

impl From<pbkdf2::password_hash::Error> for Error {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        Self::InternalError {
            kind: "PasswordHashError",
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError {
            kind: "Unknown",
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes_follow_taxonomy() {
        assert_eq!(Error::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::DuplicateId {
                message: "x".into()
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::DuplicateCode {
                message: "x".into()
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::bad_credentials().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::unauthorized().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::AlreadyEnrolled {
                message: "x".into()
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::NotEnrolled {
                message: "x".into()
            }
            .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::StorageFailure {
                message: "x".into()
            }
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn errors_serialize_with_tag() {
        let body = serde_json::to_value(Error::bad_credentials()).unwrap();
        assert_eq!(body["error"], "AuthenticationFailure");
        assert_eq!(body["message"], "Invalid id or password");
    }

    #[test]
    fn success_envelope_flattens_value() {
        #[derive(Serialize)]
        struct V {
            count: u32,
        }
        let body = serde_json::to_value(Success::of(V { count: 3 })).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 3);
    }

    #[test]
    fn unknown_id_and_wrong_secret_are_indistinguishable() {
        let a = serde_json::to_value(Error::bad_credentials()).unwrap();
        let b = serde_json::to_value(Error::bad_credentials()).unwrap();
        assert_eq!(a, b);
    }
}
