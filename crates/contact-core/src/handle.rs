//! Referencia opaca a una fila persistida.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle asignado por el motor de almacenamiento a un registro concreto.
///
/// No es el `state_id` del registro: el `state_id` correlaciona valor en
/// memoria y registro entre ciclos de guardado, mientras que el handle sólo
/// identifica la fila dentro del motor. Los llamadores lo reciben de
/// `fetch_identifier` y lo devuelven tal cual a `update`/`delete`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageHandle {
    entity: String,
    row: i64,
}

impl StorageHandle {
    /// Construye un handle a partir de sus partes. Uso reservado a motores y
    /// backends que rehidratan filas ya asignadas.
    pub fn from_parts(entity: impl Into<String>, row: i64) -> Self {
        Self { entity: entity.into(), row }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn row(&self) -> i64 {
        self.row
    }
}

impl fmt::Display for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity, self.row)
    }
}
