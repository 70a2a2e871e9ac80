//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ErrorKind};
use projections::ProjectionError;
use settlement::{SettlementError, StockError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Settlement, stock or payment error.
    Settlement(SettlementError),
    /// Read side failed to catch up.
    Projection(ProjectionError),
}

impl ApiError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ApiError::BadRequest(_) => None,
            ApiError::Domain(e) => Some(e.kind()),
            ApiError::Settlement(e) => Some(e.kind()),
            ApiError::Projection(e) => Some(e.kind()),
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Domain(e) => e.to_string(),
            ApiError::Settlement(e) => e.to_string(),
            ApiError::Projection(e) => e.to_string(),
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidTransition
        | ErrorKind::AlreadySettled
        | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidOperation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.message();
        let status = self.kind().map_or(StatusCode::BAD_REQUEST, status_for);

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<SettlementError> for ApiError {
    fn from(err: SettlementError) -> Self {
        ApiError::Settlement(err)
    }
}

impl From<StockError> for ApiError {
    fn from(err: StockError) -> Self {
        ApiError::Settlement(err.into())
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Projection(err)
    }
}

#[cfg(test)]
mod tests {
    use common::AggregateId;
    use domain::CartError;

    use super::*;

    #[test]
    fn test_kinds_map_to_statuses() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::InvalidTransition), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::InvalidOperation),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(ErrorKind::AlreadySettled), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::Internal),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_response_status_follows_error_kind() {
        let settled = ApiError::from(SettlementError::AlreadySettled {
            cart_id: AggregateId::new(),
            billing_id: None,
        });
        assert_eq!(settled.into_response().status(), StatusCode::CONFLICT);

        let paid = ApiError::from(DomainError::from(CartError::AlreadyPaid { billing_id: None }));
        assert_eq!(
            paid.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );

        let missing = ApiError::from(DomainError::not_found("Cart", AggregateId::new()));
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let bad = ApiError::BadRequest("Invalid ID format".to_string());
        assert_eq!(bad.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
