//! Registros persistidos (`Model`) e identidad de los valores en memoria.

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::context::ModelContext;
use crate::errors::StoreError;
use crate::handle::StorageHandle;

/// Valor en memoria con identificador estable.
pub trait Identifiable {
    fn id(&self) -> Uuid;
}

/// Registro durable de una entidad.
///
/// La fila se guarda como el JSON que produce `serde`; `FIELDS` enumera los
/// campos de ese JSON sobre los que se puede filtrar u ordenar. El
/// `state_id` debe ser único por entidad.
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Nombre estable de la tabla lógica.
    const ENTITY: &'static str;
    /// Campos consultables del payload.
    const FIELDS: &'static [&'static str];

    fn state_id(&self) -> Uuid;

    /// Carga las relaciones tras leer la fila. Sin relaciones por defecto.
    fn resolve_relationships(&mut self, _ctx: &ModelContext) -> Result<(), StoreError> {
        Ok(())
    }

    /// Inserta en cascada los hijos aún no persistidos antes de escribir la
    /// fila del padre.
    fn persist_relationships(&mut self, _ctx: &mut ModelContext) -> Result<(), StoreError> {
        Ok(())
    }

    /// Filas que se eliminan junto con este registro.
    fn owned_handles(&self) -> Vec<StorageHandle> {
        Vec::new()
    }
}

/// Registro junto al handle de su fila.
#[derive(Debug, Clone)]
pub struct Managed<R> {
    pub handle: StorageHandle,
    pub model: R,
}
