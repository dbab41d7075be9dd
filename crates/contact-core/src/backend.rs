//! Backend durable del motor: dónde terminan las filas confirmadas.
//!
//! El motor mantiene en memoria el estado confirmado y delega la durabilidad
//! a un `StorageBackend`. `save()` persiste primero el `ChangeSet` en el
//! backend y sólo si tiene éxito lo aplica en memoria.

use serde_json::Value;
use uuid::Uuid;

use crate::errors::StoreError;
use crate::handle::StorageHandle;

/// Fila tal como la ve el backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRecord {
    pub handle: StorageHandle,
    pub state_id: Uuid,
    pub payload: Value,
}

/// Cambios confirmados por un `save()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Altas y modificaciones (la fila completa).
    pub upserts: Vec<RowRecord>,
    pub deletes: Vec<StorageHandle>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// Contenido completo del backend al abrir un contenedor.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub rows: Vec<RowRecord>,
}

pub trait StorageBackend: Send + Sync + 'static {
    /// Lee todas las filas persistidas.
    fn load(&self) -> Result<Snapshot, StoreError>;
    /// Persiste un conjunto de cambios de forma atómica.
    fn persist(&self, changes: &ChangeSet) -> Result<(), StoreError>;
}

/// Backend sin durabilidad: el contenedor vive sólo en memoria.
#[derive(Debug, Default, Clone, Copy)]
pub struct InMemoryBackend;

impl StorageBackend for InMemoryBackend {
    fn load(&self) -> Result<Snapshot, StoreError> {
        Ok(Snapshot::default())
    }

    fn persist(&self, _changes: &ChangeSet) -> Result<(), StoreError> {
        Ok(())
    }
}
