use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use diesel::r2d2::PoolError;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

/// Failure kinds surfaced by the store. Success is plain `Ok`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum StoreError {
    /// Constraint violation, empty or invalid input, unknown foreign key.
    #[error("{0}")]
    InvalidArgument(String),

    /// A point lookup matched no row.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl StoreError {
    pub(crate) fn is_constraint_violation(&self) -> bool {
        matches!(self, StoreError::InvalidArgument(_))
    }
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        match &err {
            DieselError::DatabaseError(kind, info) => match kind {
                DatabaseErrorKind::UniqueViolation | DatabaseErrorKind::ForeignKeyViolation => {
                    StoreError::InvalidArgument(info.message().to_string())
                }
                // NOT NULL and CHECK failures only carry the sqlite message.
                _ if info.message().contains("constraint failed") => {
                    StoreError::InvalidArgument(info.message().to_string())
                }
                _ => StoreError::Internal(err.to_string()),
            },
            DieselError::NotFound => StoreError::NotFound(err.to_string()),
            _ => StoreError::Internal(err.to_string()),
        }
    }
}

impl From<PoolError> for StoreError {
    fn from(err: PoolError) -> Self {
        StoreError::Internal(format!("store connection unavailable: {err}"))
    }
}

impl ResponseError for StoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            StoreError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("text/plain; charset=utf-8")
            .body(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diesel_errors_map_to_store_kinds() {
        assert!(matches!(
            StoreError::from(DieselError::NotFound),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            StoreError::from(DieselError::RollbackTransaction),
            StoreError::Internal(_)
        ));
    }

    #[test]
    fn store_errors_map_to_http_statuses() {
        let cases = [
            (StoreError::InvalidArgument("dup".into()), StatusCode::BAD_REQUEST),
            (StoreError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (StoreError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{err:?}");
            assert_eq!(err.error_response().status(), status);
        }
    }
}
