// errors.rs
use contact_core::StoreError;
use thiserror::Error;

/// Error del dominio de contactos
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Tipo de teléfono desconocido: {0}")]
    UnknownPhoneType(String),

    #[error("Error de validación: {0}")]
    ValidationError(String),

    #[error("Error de almacenamiento: {0}")]
    StoreError(String),
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        DomainError::StoreError(e.to_string())
    }
}
