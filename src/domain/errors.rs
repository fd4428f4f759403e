use serde::Serialize;
use thiserror::Error;

use super::variant::VariantKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Out of stock: {0}")]
    OutOfStock(VariantKey),
    #[error("Already in cart: {0}")]
    AlreadyInCart(VariantKey),
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(what: impl Into<String>) -> Self {
        DomainError::NotFound(what.into())
    }
}
