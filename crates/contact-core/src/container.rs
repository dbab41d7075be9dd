//! Contenedor: motor compartido + contexto principal (foreground).

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::backend::{InMemoryBackend, Snapshot, StorageBackend};
use crate::context::ModelContext;
use crate::engine::StoreEngine;
use crate::errors::StoreError;

/// Punto de acceso al almacenamiento de una aplicación.
///
/// Todos los actores creados sobre el mismo contenedor comparten un único
/// contexto principal; el mutex asíncrono que lo guarda es el dominio de
/// ejecución serializado (FIFO) de las operaciones foreground. Los contextos
/// de background se crean nuevos en cada llamada y no comparten lock.
#[derive(Clone)]
pub struct ModelContainer {
    engine: Arc<StoreEngine>,
    main: Arc<Mutex<ModelContext>>,
}

impl ModelContainer {
    /// Contenedor sin durabilidad.
    pub fn in_memory() -> Self {
        let backend: Arc<dyn StorageBackend> = Arc::new(InMemoryBackend);
        Self::from_engine(StoreEngine::from_snapshot(backend, Snapshot::default()))
    }

    /// Abre un contenedor cargando el estado persistido por `backend`.
    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Result<Self, StoreError> {
        Ok(Self::from_engine(StoreEngine::open(backend)?))
    }

    fn from_engine(engine: StoreEngine) -> Self {
        let engine = Arc::new(engine);
        let main = Arc::new(Mutex::new(ModelContext::new(engine.clone())));
        Self { engine, main }
    }

    pub fn engine(&self) -> &Arc<StoreEngine> {
        &self.engine
    }

    pub fn main_context(&self) -> Arc<Mutex<ModelContext>> {
        self.main.clone()
    }

    pub fn new_background_context(&self) -> ModelContext {
        ModelContext::new(self.engine.clone())
    }
}
