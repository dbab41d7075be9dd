//! Contexto de trabajo (unit of work) sobre un `StoreEngine`.
//!
//! Las escrituras quedan pendientes en el contexto hasta `save()`. Las
//! lecturas superponen esos cambios pendientes al estado confirmado, de modo
//! que un contexto siempre ve sus propias escrituras; otros contextos sólo
//! las ven después del `save()`.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use crate::engine::{Pending, StoreEngine, StoredRow};
use crate::errors::StoreError;
use crate::handle::StorageHandle;
use crate::model::{Managed, Model};
use crate::query::FetchDescriptor;

/// Cambios pendientes de un contexto en un momento dado.
pub struct Savepoint(BTreeMap<StorageHandle, Pending>);

pub struct ModelContext {
    engine: Arc<StoreEngine>,
    pending: BTreeMap<StorageHandle, Pending>,
}

impl ModelContext {
    pub fn new(engine: Arc<StoreEngine>) -> Self {
        Self { engine, pending: BTreeMap::new() }
    }

    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Descarta los cambios pendientes.
    pub fn rollback(&mut self) {
        self.pending.clear();
    }

    pub fn savepoint(&self) -> Savepoint {
        Savepoint(self.pending.clone())
    }

    /// Vuelve a los cambios pendientes de `savepoint`, descartando los
    /// posteriores.
    pub fn rollback_to(&mut self, savepoint: Savepoint) {
        self.pending = savepoint.0;
    }

    fn row(&self, handle: &StorageHandle) -> Option<StoredRow> {
        match self.pending.get(handle) {
            Some(Pending::Insert(row)) | Some(Pending::Update(row)) => Some(row.clone()),
            Some(Pending::Delete) => None,
            None => self.engine.row(handle),
        }
    }

    /// Filas visibles de una entidad, en orden de handle.
    fn visible_rows(&self, entity: &str) -> BTreeMap<i64, StoredRow> {
        let mut rows = self.engine.rows(entity);
        for (handle, change) in self.pending.iter().filter(|(h, _)| h.entity() == entity) {
            match change {
                Pending::Insert(row) | Pending::Update(row) => {
                    rows.insert(handle.row(), row.clone());
                }
                Pending::Delete => {
                    rows.remove(&handle.row());
                }
            }
        }
        rows
    }

    /// Fila visible que ocupa `state_id`, si existe.
    fn holder_of(&self, entity: &str, state_id: uuid::Uuid) -> Option<StorageHandle> {
        let pending_holder = self.pending.iter().find_map(|(h, change)| match change {
                                                    Pending::Insert(row) | Pending::Update(row)
                                                        if h.entity() == entity && row.state_id == state_id =>
                                                    {
                                                        Some(h.clone())
                                                    }
                                                    _ => None,
                                                });
        if pending_holder.is_some() {
            return pending_holder;
        }
        let row = self.engine.row_for_state_id(entity, state_id)?;
        let handle = StorageHandle::from_parts(entity, row);
        // La fila confirmada sólo sigue ocupando el id si este contexto no la
        // borró ni le cambió el state_id.
        match self.pending.get(&handle) {
            Some(Pending::Delete) => None,
            Some(Pending::Insert(r)) | Some(Pending::Update(r)) if r.state_id != state_id => None,
            _ => Some(handle),
        }
    }

    fn managed_rows<R: Model>(&self, descriptor: &FetchDescriptor) -> Result<Vec<(StorageHandle, StoredRow)>, StoreError> {
        descriptor.validate(R::ENTITY, R::FIELDS)?;
        let mut rows: Vec<(StorageHandle, StoredRow)> =
            self.visible_rows(R::ENTITY)
                .into_iter()
                .filter(|(_, row)| descriptor.matches(&row.payload))
                .map(|(r, row)| (StorageHandle::from_parts(R::ENTITY, r), row))
                .collect();
        rows.sort_by(|(_, a), (_, b)| descriptor.ordering(&a.payload, &b.payload));
        if let Some(limit) = descriptor.fetch_limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    fn decode<R: Model>(&self, row: StoredRow) -> Result<R, StoreError> {
        let mut model: R = serde_json::from_value(row.payload)?;
        model.resolve_relationships(self)?;
        Ok(model)
    }

    /// Registros (con sus handles) que cumplen el descriptor.
    pub fn fetch_managed<R: Model>(&self, descriptor: &FetchDescriptor) -> Result<Vec<Managed<R>>, StoreError> {
        self.managed_rows::<R>(descriptor)?
            .into_iter()
            .map(|(handle, row)| Ok(Managed { handle, model: self.decode(row)? }))
            .collect()
    }

    pub fn fetch<R: Model>(&self, descriptor: &FetchDescriptor) -> Result<Vec<R>, StoreError> {
        Ok(self.fetch_managed::<R>(descriptor)?.into_iter().map(|m| m.model).collect())
    }

    pub fn fetch_identifiers<R: Model>(&self, descriptor: &FetchDescriptor) -> Result<Vec<StorageHandle>, StoreError> {
        Ok(self.managed_rows::<R>(descriptor)?.into_iter().map(|(h, _)| h).collect())
    }

    pub fn fetch_count<R: Model>(&self, descriptor: &FetchDescriptor) -> Result<usize, StoreError> {
        Ok(self.managed_rows::<R>(descriptor)?.len())
    }

    /// Registro apuntado por el handle; `None` si el handle es obsoleto o de
    /// otra entidad.
    pub fn model<R: Model>(&self, handle: &StorageHandle) -> Result<Option<R>, StoreError> {
        if handle.entity() != R::ENTITY {
            return Ok(None);
        }
        self.row(handle).map(|row| self.decode(row)).transpose()
    }

    /// Registra un registro nuevo (y sus hijos pendientes) en el contexto.
    pub fn insert<R: Model>(&mut self, mut model: R) -> Result<StorageHandle, StoreError> {
        let state_id = model.state_id();
        if self.holder_of(R::ENTITY, state_id).is_some() {
            return Err(StoreError::UniqueViolation { entity: R::ENTITY.to_string(), state_id });
        }
        model.persist_relationships(self)?;
        let payload = serde_json::to_value(&model)?;
        let handle = self.engine.allocate(R::ENTITY);
        debug!("context:insert handle={handle} state_id={state_id}");
        self.pending.insert(handle.clone(), Pending::Insert(StoredRow { state_id, payload }));
        Ok(handle)
    }

    /// Reescribe en sitio la fila de `handle` con el registro dado. Devuelve
    /// `false` sin tocar nada si el handle es obsoleto.
    pub fn put<R: Model>(&mut self, handle: &StorageHandle, mut model: R) -> Result<bool, StoreError> {
        if handle.entity() != R::ENTITY || self.row(handle).is_none() {
            return Ok(false);
        }
        let state_id = model.state_id();
        if self.holder_of(R::ENTITY, state_id).is_some_and(|h| &h != handle) {
            return Err(StoreError::UniqueViolation { entity: R::ENTITY.to_string(), state_id });
        }
        model.persist_relationships(self)?;
        let payload = serde_json::to_value(&model)?;
        let row = StoredRow { state_id, payload };
        let change = match self.pending.get(handle) {
            Some(Pending::Insert(_)) => Pending::Insert(row),
            _ => Pending::Update(row),
        };
        self.pending.insert(handle.clone(), change);
        Ok(true)
    }

    /// Elimina la fila y, en cascada, las filas que posee. Devuelve `false`
    /// si el handle es obsoleto.
    pub fn delete<R: Model>(&mut self, handle: &StorageHandle) -> Result<bool, StoreError> {
        let Some(model) = self.model::<R>(handle)? else {
            return Ok(false);
        };
        for owned in model.owned_handles() {
            self.remove_row(&owned);
        }
        self.remove_row(handle);
        Ok(true)
    }

    fn remove_row(&mut self, handle: &StorageHandle) {
        match self.pending.get(handle) {
            Some(Pending::Insert(_)) => {
                self.pending.remove(handle);
            }
            Some(Pending::Delete) => {}
            _ => {
                if self.engine.row(handle).is_some() {
                    self.pending.insert(handle.clone(), Pending::Delete);
                }
            }
        }
    }

    /// Elimina todas las filas que cumplen el descriptor; devuelve cuántas.
    pub fn delete_all<R: Model>(&mut self, descriptor: &FetchDescriptor) -> Result<usize, StoreError> {
        let handles = self.fetch_identifiers::<R>(descriptor)?;
        let mut removed = 0;
        for handle in &handles {
            if self.delete::<R>(handle)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Confirma los cambios pendientes en el motor (y su backend) de forma
    /// atómica. Si falla, los cambios siguen pendientes.
    pub fn save(&mut self) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let changes = self.engine.commit(&self.pending)?;
        debug!("context:save upserts={} deletes={}", changes.upserts.len(), changes.deletes.len());
        self.pending.clear();
        Ok(())
    }
}
