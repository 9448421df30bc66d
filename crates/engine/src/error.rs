//! The module contains the errors the engine can return.
//!
//! The errors are:
//!
//! - [`Validation`] returned when an input (enum tag, filter, date, amount,
//!   name) is malformed. Carries the offending field.
//! - [`DuplicatePayment`] returned when an occurrence is already settled.
//! - [`NotFound`] returned when an item is absent or not owned by the caller.
//! - [`Ledger`] returned when a storage step fails. The enclosing transaction
//!   is rolled back and the storage detail is only kept as the error source.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`DuplicatePayment`]: EngineError::DuplicatePayment
//!  [`NotFound`]: EngineError::NotFound
//!  [`Ledger`]: EngineError::Ledger
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },
    #[error("payment already recorded: {0}")]
    DuplicatePayment(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("ledger operation failed")]
    Ledger(#[from] DbErr),
}

impl EngineError {
    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Validation {
                    field: fa,
                    message: ma,
                },
                Self::Validation {
                    field: fb,
                    message: mb,
                },
            ) => fa == fb && ma == mb,
            (Self::DuplicatePayment(a), Self::DuplicatePayment(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Ledger(a), Self::Ledger(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
