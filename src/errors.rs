use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use thiserror::Error;

use crate::domain::errors::{DomainError, FieldError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound(what) => AppError::NotFound(what),
            DomainError::OutOfStock(_) | DomainError::AlreadyInCart(_) => {
                AppError::Conflict(e.to_string())
            }
            DomainError::Validation(fields) => AppError::Validation(fields),
            DomainError::InvalidInput(msg) => AppError::BadRequest(msg),
            DomainError::TransactionAborted(msg) => AppError::Unavailable(msg),
            DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        match self {
            AppError::Validation(fields) => builder.json(serde_json::json!({
                "error": self.to_string(),
                "fields": fields
            })),
            AppError::Unavailable(_) => builder.json(serde_json::json!({
                "error": "Request could not be completed, please retry",
                "retryable": true
            })),
            AppError::Internal(detail) => {
                log::error!("internal error: {}", detail);
                builder.json(serde_json::json!({
                    "error": "Internal server error"
                }))
            }
            _ => builder.json(serde_json::json!({
                "error": self.to_string()
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::variant::{Size, VariantKey};
    use actix_web::ResponseError;

    #[test]
    fn not_found_returns_404() {
        let resp = AppError::NotFound("order".to_string()).error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_error_returns_500() {
        let err = AppError::Internal("something went wrong".to_string());
        assert_eq!(err.error_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_returns_422() {
        let err = AppError::Validation(vec![FieldError::new("name", "bad")]);
        assert_eq!(err.error_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn out_of_stock_maps_to_conflict() {
        let key = VariantKey::new(4, Size::sized("48"));
        let app_err: AppError = DomainError::OutOfStock(key).into();
        assert!(matches!(app_err, AppError::Conflict(_)));
        assert_eq!(app_err.to_string(), "Conflict: Out of stock: product 4 (size 48)");
    }

    #[test]
    fn aborted_transaction_is_retryable_503() {
        let app_err: AppError = DomainError::TransactionAborted("timeout".to_string()).into();
        assert_eq!(app_err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn domain_invalid_input_maps_to_bad_request() {
        let app_err: AppError = DomainError::InvalidInput("bad value".to_string()).into();
        assert!(matches!(app_err, AppError::BadRequest(_)));
    }

    #[test]
    fn not_found_display() {
        let app_err: AppError = DomainError::not_found("cart line").into();
        assert_eq!(app_err.to_string(), "Not found: cart line");
    }
}
