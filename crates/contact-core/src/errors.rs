//! Errores del núcleo de persistencia.
//!
//! Los handles obsoletos no son errores (las operaciones los tratan como
//! no-op) y el uso indebido del contrato de mapeo aborta con `panic!`; aquí
//! sólo viven los fallos que el llamador puede decidir reportar o reintentar.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique violation: {entity} con state_id {state_id} ya existe")]
    UniqueViolation { entity: String, state_id: Uuid },
    #[error("campo desconocido '{field}' para {entity}")]
    UnknownField { entity: String, field: String },
    #[error("error de serialización: {0}")]
    Serialization(String),
    #[error("error del backend de almacenamiento: {0}")]
    Backend(String),
    #[error("tarea de almacenamiento interrumpida: {0}")]
    Task(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
