//! Relación padre → hijos (to-many) propiedad del padre.
//!
//! En la fila del padre sólo se serializan los handles de los hijos; los
//! registros hijos se cargan al leer (`resolve`) y, si se crearon desligados
//! con `detached`, se insertan en cascada al escribir el padre.

use serde::{Deserialize, Serialize};

use crate::context::ModelContext;
use crate::errors::StoreError;
use crate::handle::StorageHandle;
use crate::model::{Managed, Model};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ToMany<C> {
    handles: Vec<StorageHandle>,
    // models[..handles.len()] están cargados; el resto está pendiente de insertar.
    #[serde(skip)]
    models: Vec<C>,
}

impl<C> Default for ToMany<C> {
    fn default() -> Self {
        Self { handles: Vec::new(), models: Vec::new() }
    }
}

impl<C: Model> ToMany<C> {
    /// Hijos nuevos, sin fila todavía.
    pub fn detached(models: Vec<C>) -> Self {
        Self { handles: Vec::new(), models }
    }

    /// Hijos ya persistidos, en el orden dado.
    pub fn from_managed(children: Vec<Managed<C>>) -> Self {
        let (handles, models) = children.into_iter().map(|m| (m.handle, m.model)).unzip();
        Self { handles, models }
    }

    pub fn handles(&self) -> &[StorageHandle] {
        &self.handles
    }

    pub fn models(&self) -> &[C] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.handles.len().max(self.models.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Carga los registros hijos; los handles que ya no resuelven se
    /// descartan de la relación.
    pub fn resolve(&mut self, ctx: &ModelContext) -> Result<(), StoreError> {
        let mut handles = Vec::with_capacity(self.handles.len());
        let mut models = Vec::with_capacity(self.handles.len());
        for handle in &self.handles {
            if let Some(child) = ctx.model::<C>(handle)? {
                handles.push(handle.clone());
                models.push(child);
            }
        }
        self.handles = handles;
        self.models = models;
        Ok(())
    }

    /// Inserta los hijos pendientes y registra sus handles.
    pub fn persist_pending(&mut self, ctx: &mut ModelContext) -> Result<(), StoreError> {
        let pending: Vec<C> = self.models.iter().skip(self.handles.len()).cloned().collect();
        for child in pending {
            let handle = ctx.insert(child)?;
            self.handles.push(handle);
        }
        Ok(())
    }
}
