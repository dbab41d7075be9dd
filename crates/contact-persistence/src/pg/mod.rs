//! Backend Postgres (Diesel) del motor de almacenamiento.
//!
//! - Una fila de `persistent_records` por registro: `(entity, row_id)` es el
//!   handle asignado por el motor, `payload` el JSON completo del registro.
//! - `load` lee la tabla entera al abrir el contenedor.
//! - `persist` aplica el `ChangeSet` de un `save()` en una única transacción;
//!   la unicidad de `(entity, state_id)` se comprueba al commit.
//! - Errores transitorios se reintentan con backoff corto.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use diesel::upsert::excluded;
use log::{debug, error, warn};
use serde_json::Value;
use uuid::Uuid;

use contact_core::{ChangeSet, RowRecord, Snapshot, StorageBackend, StorageHandle, StoreError};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::persistent_records;

/// Pool r2d2 de conexiones Postgres. Al construirlo se corren las
/// migraciones pendientes.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Permite inyectar un pool real o un proveedor de test sin acoplar el
/// backend a r2d2. Debe devolver una conexión válida o
/// `PersistenceError::TransientIo`.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

/// `ConnectionProvider` respaldado por un `PgPool`.
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Fila leída de `persistent_records`.
#[derive(Queryable, Debug)]
pub struct RecordRow {
    pub entity: String,
    pub row_id: i64,
    pub state_id: Uuid,
    pub payload: Value,
    pub updated_at: DateTime<Utc>,
}

/// Fila para insertar o reescribir en `persistent_records`.
#[derive(Insertable, Debug)]
#[diesel(table_name = persistent_records)]
pub struct NewRecordRow<'a> {
    pub entity: &'a str,
    pub row_id: i64,
    pub state_id: &'a Uuid,
    pub payload: &'a Value,
}

impl<'a> From<&'a RowRecord> for NewRecordRow<'a> {
    fn from(rec: &'a RowRecord) -> Self {
        Self { entity: rec.handle.entity(),
               row_id: rec.handle.row(),
               state_id: &rec.state_id,
               payload: &rec.payload }
    }
}

impl From<RecordRow> for RowRecord {
    fn from(row: RecordRow) -> Self {
        RowRecord { handle: StorageHandle::from_parts(row.entity, row.row_id),
                    state_id: row.state_id,
                    payload: row.payload }
    }
}

/// Retry con backoff corto (hasta 3 reintentos: 15ms, 30ms, 45ms). Emite
/// `warn!` por intento.
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if e.is_retryable() && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms", attempts + 1, e, delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

/// Backend durable sobre Postgres.
pub struct PgBackend<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgBackend<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Borra todas las filas de una entidad. Pensado para tests y
    /// mantenimiento; no pasa por ningún contexto abierto.
    pub fn delete_entity(&self, entity: &str) -> Result<usize, PersistenceError> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::delete(persistent_records::table.filter(persistent_records::entity.eq(entity)))
                .execute(&mut conn)
                .map_err(PersistenceError::from)
        })
    }

    fn load_rows(&self) -> Result<Vec<RecordRow>, PersistenceError> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            persistent_records::table.order((persistent_records::entity.asc(), persistent_records::row_id.asc()))
                                     .load::<RecordRow>(&mut conn)
                                     .map_err(PersistenceError::from)
        })
    }

    fn persist_changes(&self, changes: &ChangeSet) -> Result<(), PersistenceError> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run(|tx_conn| {
                    for handle in &changes.deletes {
                        diesel::delete(persistent_records::table.filter(persistent_records::entity.eq(handle.entity()))
                                                                .filter(persistent_records::row_id.eq(handle.row())))
                            .execute(tx_conn)?;
                    }
                    for rec in &changes.upserts {
                        diesel::insert_into(persistent_records::table)
                            .values(NewRecordRow::from(rec))
                            .on_conflict((persistent_records::entity, persistent_records::row_id))
                            .do_update()
                            .set((persistent_records::state_id.eq(excluded(persistent_records::state_id)),
                                  persistent_records::payload.eq(excluded(persistent_records::payload)),
                                  persistent_records::updated_at.eq(diesel::dsl::now)))
                            .execute(tx_conn)?;
                    }
                    Ok::<(), diesel::result::Error>(())
                })
                .map_err(PersistenceError::from)
        })
    }
}

impl PgBackend<PoolProvider> {
    pub fn from_pool(pool: PgPool) -> Self {
        Self::new(PoolProvider { pool })
    }
}

impl<P: ConnectionProvider> StorageBackend for PgBackend<P> {
    fn load(&self) -> Result<Snapshot, StoreError> {
        let rows = self.load_rows().map_err(|e| {
                                       error!("pg:load fallido: {e}");
                                       e
                                   })?;
        debug!("pg:load rows={}", rows.len());
        Ok(Snapshot { rows: rows.into_iter().map(RowRecord::from).collect() })
    }

    fn persist(&self, changes: &ChangeSet) -> Result<(), StoreError> {
        debug!("pg:persist upserts={} deletes={}", changes.upserts.len(), changes.deletes.len());
        self.persist_changes(changes).map_err(|e| {
                                         error!("pg:persist fallido: {e}");
                                         StoreError::from(e)
                                     })
    }
}

/// Construye un pool r2d2 y corre las migraciones pendientes.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = min_size.max(1);
    let validated_max = max_size.max(1);
    if validated_min > validated_max {
        warn!("min_size > max_size ({validated_min} > {validated_max}), ajustando min=max");
    }
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(validated_min.min(validated_max)))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Helper de desarrollo: carga `.env`, lee la configuración y construye un
/// pool ya migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
