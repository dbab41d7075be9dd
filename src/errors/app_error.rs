use contact_core::StoreError;
use contact_domain::DomainError;
use contact_persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Error de almacenamiento: {0}")]
    Store(#[from] StoreError),
    #[error("Error de persistencia: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Error de dominio: {0}")]
    Domain(#[from] DomainError),
    #[error("Uso inválido: {0}")]
    Usage(String),
}

impl AppError {
    /// Código de salida del binario.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Usage(_) | AppError::Domain(_) => 2,
            AppError::Store(_) | AppError::Persistence(_) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_variant_format() {
        let err = AppError::Usage("falta nombre".into());
        assert_eq!(err.to_string(), "Uso inválido: falta nombre");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_store_variant_from() {
        let err: AppError = StoreError::Backend("down".into()).into();
        assert_eq!(err.to_string(), "Error de almacenamiento: error del backend de almacenamiento: down");
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_domain_variant_from() {
        let err: AppError = DomainError::UnknownPhoneType("fax".into()).into();
        assert_eq!(err.to_string(), "Error de dominio: Tipo de teléfono desconocido: fax");
    }
}
