//! Motor de almacenamiento compartido por todos los contextos de un
//! contenedor.
//!
//! Guarda el estado confirmado (filas por entidad + índice único por
//! `state_id`) y asigna handles. Los contextos leen de aquí superponiendo sus
//! cambios pendientes y confirman con `commit`. Los commits se serializan
//! entre sí; el lock de escritura de las tablas sólo se toma para aplicar
//! los cambios ya persistidos, así que las lecturas no esperan al backend.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use uuid::Uuid;

use crate::backend::{ChangeSet, RowRecord, Snapshot, StorageBackend};
use crate::errors::StoreError;
use crate::handle::StorageHandle;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StoredRow {
    pub state_id: Uuid,
    pub payload: Value,
}

/// Cambio pendiente de un contexto sobre una fila.
#[derive(Debug, Clone)]
pub(crate) enum Pending {
    Insert(StoredRow),
    Update(StoredRow),
    Delete,
}

#[derive(Default)]
struct Table {
    rows: BTreeMap<i64, StoredRow>,
    index: HashMap<Uuid, i64>,
}

pub struct StoreEngine {
    tables: RwLock<HashMap<String, Table>>,
    commit_lock: Mutex<()>,
    next_row: AtomicI64,
    backend: Arc<dyn StorageBackend>,
}

impl StoreEngine {
    /// Abre el motor cargando el snapshot del backend.
    pub fn open(backend: Arc<dyn StorageBackend>) -> Result<Self, StoreError> {
        let snapshot = backend.load()?;
        Ok(Self::from_snapshot(backend, snapshot))
    }

    pub fn from_snapshot(backend: Arc<dyn StorageBackend>, snapshot: Snapshot) -> Self {
        let mut tables: HashMap<String, Table> = HashMap::new();
        let mut max_row = 0;
        for rec in snapshot.rows {
            let table = tables.entry(rec.handle.entity().to_string()).or_default();
            table.index.insert(rec.state_id, rec.handle.row());
            table.rows.insert(rec.handle.row(), StoredRow { state_id: rec.state_id, payload: rec.payload });
            max_row = max_row.max(rec.handle.row());
        }
        debug!("engine:open tables={} next_row={}", tables.len(), max_row + 1);
        Self { tables: RwLock::new(tables),
               commit_lock: Mutex::new(()),
               next_row: AtomicI64::new(max_row + 1),
               backend }
    }

    pub(crate) fn allocate(&self, entity: &str) -> StorageHandle {
        let row = self.next_row.fetch_add(1, Ordering::SeqCst);
        StorageHandle::from_parts(entity, row)
    }

    pub(crate) fn row(&self, handle: &StorageHandle) -> Option<StoredRow> {
        self.tables.read().get(handle.entity()).and_then(|t| t.rows.get(&handle.row()).cloned())
    }

    pub(crate) fn rows(&self, entity: &str) -> BTreeMap<i64, StoredRow> {
        self.tables.read().get(entity).map(|t| t.rows.clone()).unwrap_or_default()
    }

    pub(crate) fn row_for_state_id(&self, entity: &str, state_id: Uuid) -> Option<i64> {
        self.tables.read().get(entity).and_then(|t| t.index.get(&state_id).copied())
    }

    /// Confirma los cambios pendientes de un contexto.
    ///
    /// Las modificaciones de filas que otro contexto ya eliminó se descartan.
    /// Si la validación o el backend fallan no se aplica nada.
    pub(crate) fn commit(&self, pending: &BTreeMap<StorageHandle, Pending>) -> Result<ChangeSet, StoreError> {
        // Sólo un commit modifica las tablas, así que lo validado sigue
        // valiendo hasta aplicar.
        let _serial = self.commit_lock.lock();
        let changes = self.prepare(pending)?;
        if changes.is_empty() {
            return Ok(changes);
        }
        self.backend.persist(&changes)?;

        let mut tables = self.tables.write();
        // Primero se liberan las entradas del índice de todas las filas tocadas
        // para admitir intercambios de state_id dentro del mismo commit.
        let touched = changes.deletes.iter().chain(changes.upserts.iter().map(|r| &r.handle));
        for handle in touched {
            if let Some(table) = tables.get_mut(handle.entity()) {
                if let Some(old) = table.rows.get(&handle.row()).map(|r| r.state_id) {
                    if table.index.get(&old) == Some(&handle.row()) {
                        table.index.remove(&old);
                    }
                }
            }
        }
        for handle in &changes.deletes {
            if let Some(table) = tables.get_mut(handle.entity()) {
                table.rows.remove(&handle.row());
            }
        }
        for rec in &changes.upserts {
            let table = tables.entry(rec.handle.entity().to_string()).or_default();
            table.index.insert(rec.state_id, rec.handle.row());
            table.rows.insert(rec.handle.row(), StoredRow { state_id: rec.state_id, payload: rec.payload.clone() });
        }
        debug!("commit:done upserts={} deletes={}", changes.upserts.len(), changes.deletes.len());
        Ok(changes)
    }

    /// Construye el `ChangeSet` de `pending` y comprueba la unicidad de
    /// `state_id` contra el estado confirmado.
    fn prepare(&self, pending: &BTreeMap<StorageHandle, Pending>) -> Result<ChangeSet, StoreError> {
        let tables = self.tables.read();
        let exists = |h: &StorageHandle| tables.get(h.entity()).map(|t| t.rows.contains_key(&h.row())).unwrap_or(false);

        let mut changes = ChangeSet::default();
        for (handle, change) in pending {
            match change {
                Pending::Delete => {
                    if exists(handle) {
                        changes.deletes.push(handle.clone());
                    }
                }
                Pending::Insert(row) => changes.upserts.push(RowRecord { handle: handle.clone(),
                                                                         state_id: row.state_id,
                                                                         payload: row.payload.clone() }),
                Pending::Update(row) => {
                    if !exists(handle) {
                        warn!("commit: descartando update sobre fila eliminada handle={handle}");
                        continue;
                    }
                    changes.upserts.push(RowRecord { handle: handle.clone(),
                                                     state_id: row.state_id,
                                                     payload: row.payload.clone() });
                }
            }
        }

        let mut claimed: HashSet<(String, Uuid)> = HashSet::new();
        for rec in &changes.upserts {
            let entity = rec.handle.entity();
            let violation = || StoreError::UniqueViolation { entity: entity.to_string(), state_id: rec.state_id };
            if !claimed.insert((entity.to_string(), rec.state_id)) {
                return Err(violation());
            }
            let holder = tables.get(entity).and_then(|t| t.index.get(&rec.state_id)).copied();
            if let Some(row) = holder.filter(|r| *r != rec.handle.row()) {
                let freed = match pending.get(&StorageHandle::from_parts(entity, row)) {
                    Some(Pending::Delete) => true,
                    Some(Pending::Insert(r)) | Some(Pending::Update(r)) => r.state_id != rec.state_id,
                    None => false,
                };
                if !freed {
                    return Err(violation());
                }
            }
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use serde_json::json;

    fn row(id: Uuid) -> StoredRow {
        StoredRow { state_id: id, payload: json!({ "state_id": id }) }
    }

    #[test]
    fn open_resumes_row_allocation_after_snapshot() {
        struct Fixed;
        impl StorageBackend for Fixed {
            fn load(&self) -> Result<Snapshot, StoreError> {
                Ok(Snapshot { rows: vec![RowRecord { handle: StorageHandle::from_parts("contact", 41),
                                                     state_id: Uuid::nil(),
                                                     payload: json!({}) }] })
            }
            fn persist(&self, _changes: &ChangeSet) -> Result<(), StoreError> {
                Ok(())
            }
        }
        let engine = StoreEngine::open(Arc::new(Fixed)).unwrap();
        assert_eq!(engine.allocate("contact").row(), 42);
        assert_eq!(engine.row_for_state_id("contact", Uuid::nil()), Some(41));
    }

    #[test]
    fn commit_allows_swapping_state_ids() {
        let engine = StoreEngine::open(Arc::new(InMemoryBackend)).unwrap();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let ha = engine.allocate("x");
        let hb = engine.allocate("x");
        let mut pending = BTreeMap::new();
        pending.insert(ha.clone(), Pending::Insert(row(a)));
        pending.insert(hb.clone(), Pending::Insert(row(b)));
        engine.commit(&pending).unwrap();

        let mut swap = BTreeMap::new();
        swap.insert(ha.clone(), Pending::Update(row(b)));
        swap.insert(hb.clone(), Pending::Update(row(a)));
        engine.commit(&swap).unwrap();
        assert_eq!(engine.row_for_state_id("x", a), Some(hb.row()));
        assert_eq!(engine.row_for_state_id("x", b), Some(ha.row()));
    }

    #[test]
    fn commit_rejects_duplicate_and_applies_nothing() {
        let engine = StoreEngine::open(Arc::new(InMemoryBackend)).unwrap();
        let id = Uuid::new_v4();
        let mut pending = BTreeMap::new();
        pending.insert(engine.allocate("x"), Pending::Insert(row(Uuid::new_v4())));
        pending.insert(engine.allocate("x"), Pending::Insert(row(id)));
        pending.insert(engine.allocate("x"), Pending::Insert(row(id)));
        let err = engine.commit(&pending).unwrap_err();
        assert_eq!(err, StoreError::UniqueViolation { entity: "x".into(), state_id: id });
        assert!(engine.rows("x").is_empty());
    }

    #[test]
    fn reads_do_not_wait_for_backend_persist() {
        use std::sync::mpsc;

        struct Gated {
            entered: Mutex<mpsc::Sender<()>>,
            release: Mutex<mpsc::Receiver<()>>,
        }
        impl StorageBackend for Gated {
            fn load(&self) -> Result<Snapshot, StoreError> {
                Ok(Snapshot::default())
            }
            fn persist(&self, _changes: &ChangeSet) -> Result<(), StoreError> {
                self.entered.lock().send(()).map_err(|e| StoreError::Backend(e.to_string()))?;
                self.release.lock().recv().map_err(|e| StoreError::Backend(e.to_string()))
            }
        }

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let backend = Gated { entered: Mutex::new(entered_tx), release: Mutex::new(release_rx) };
        let engine = Arc::new(StoreEngine::open(Arc::new(backend)).unwrap());
        let id = Uuid::new_v4();
        let h = engine.allocate("x");

        let writer = {
            let engine = engine.clone();
            let h = h.clone();
            std::thread::spawn(move || {
                let mut pending = BTreeMap::new();
                pending.insert(h, Pending::Insert(row(id)));
                engine.commit(&pending).map(|_| ())
            })
        };
        entered_rx.recv().unwrap();
        // El backend está ocupado: la lectura ve el estado anterior sin bloquear.
        assert!(engine.rows("x").is_empty());
        assert_eq!(engine.row_for_state_id("x", id), None);
        release_tx.send(()).unwrap();
        writer.join().unwrap().unwrap();
        assert_eq!(engine.row_for_state_id("x", id), Some(h.row()));
    }
}
