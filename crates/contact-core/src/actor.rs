//! Actor de acceso por tabla.
//!
//! Cada operación se ejecuta sobre un contexto: el principal del contenedor
//! (foreground, serializado en orden de emisión) o uno nuevo por llamada
//! (background, sin sincronización con nadie). El trabajo sobre el contexto
//! corre en el pool bloqueante de tokio para que la E/S del backend no
//! bloquee al ejecutor.

use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, warn};

use crate::container::ModelContainer;
use crate::context::ModelContext;
use crate::errors::StoreError;
use crate::handle::StorageHandle;
use crate::mapping::Extractable;
use crate::query::FetchDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Foreground,
    Background,
}

pub struct TableActor<R> {
    container: ModelContainer,
    mode: ExecutionMode,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for TableActor<R> {
    fn clone(&self) -> Self {
        Self { container: self.container.clone(), mode: self.mode, _record: PhantomData }
    }
}

/// Guarda si se pidió. Si el guardado falla los cambios siguen pendientes;
/// `run_atomically` decide qué se descarta.
pub(crate) fn finish(ctx: &mut ModelContext, force_save: bool) -> Result<(), StoreError> {
    if !force_save {
        return Ok(());
    }
    ctx.save().map_err(|e| {
                   warn!("actor: save fallido: {e}");
                   e
               })
}

/// Ejecuta `f` como una sola operación: si devuelve error o entra en pánico,
/// el contexto vuelve a los cambios pendientes que tenía antes de `f`.
fn run_atomically<T, F>(ctx: &mut ModelContext, f: F) -> Result<T, StoreError>
    where F: FnOnce(&mut ModelContext) -> Result<T, StoreError>
{
    let savepoint = ctx.savepoint();
    match panic::catch_unwind(AssertUnwindSafe(|| f(&mut *ctx))) {
        Ok(Ok(out)) => Ok(out),
        Ok(Err(e)) => {
            debug!("actor: operación fallida, vuelta al savepoint: {e}");
            ctx.rollback_to(savepoint);
            Err(e)
        }
        Err(payload) => {
            ctx.rollback_to(savepoint);
            panic::resume_unwind(payload)
        }
    }
}

impl<R: Extractable> TableActor<R> {
    pub fn new(container: ModelContainer) -> Self {
        Self { container, mode: ExecutionMode::Foreground, _record: PhantomData }
    }

    /// El mismo actor, ejecutando cada operación en un contexto nuevo.
    pub fn background(&self) -> Self {
        Self { mode: ExecutionMode::Background, ..self.clone() }
    }

    pub fn foreground(&self) -> Self {
        Self { mode: ExecutionMode::Foreground, ..self.clone() }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn container(&self) -> &ModelContainer {
        &self.container
    }

    /// Ejecuta `f` sobre el contexto que corresponde al modo del actor. Una
    /// operación fallida no deja cambios a medias en el contexto.
    ///
    /// Un pánico dentro de `f` (uso indebido del contrato de mapeo) se
    /// relanza en el llamador.
    pub(crate) async fn perform<T, F>(&self, f: F) -> Result<T, StoreError>
        where T: Send + 'static,
              F: FnOnce(&mut ModelContext) -> Result<T, StoreError> + Send + 'static
    {
        let task = match self.mode {
            ExecutionMode::Foreground => {
                let mut guard = self.container.main_context().lock_owned().await;
                tokio::task::spawn_blocking(move || run_atomically(&mut guard, f))
            }
            ExecutionMode::Background => {
                let mut ctx = self.container.new_background_context();
                tokio::task::spawn_blocking(move || {
                    let out = run_atomically(&mut ctx, f);
                    if ctx.has_changes() {
                        warn!("actor:{} contexto background descartado con cambios sin guardar", R::ENTITY);
                    }
                    out
                })
            }
        };
        match task.await {
            Ok(out) => out,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(StoreError::Task(e.to_string())),
        }
    }

    /// Handle del primer registro que cumple el descriptor.
    pub async fn fetch_identifier(&self, descriptor: FetchDescriptor) -> Result<Option<StorageHandle>, StoreError> {
        self.perform(move |ctx| Ok(ctx.fetch_identifiers::<R>(&descriptor)?.into_iter().next()))
            .await
    }

    pub async fn fetch(&self, descriptor: FetchDescriptor) -> Result<Vec<R::Value>, StoreError> {
        self.perform(move |ctx| {
                let records = ctx.fetch::<R>(&descriptor)?;
                debug!("actor:{} fetch n={}", R::ENTITY, records.len());
                Ok(records.iter().map(R::extract).collect())
            })
            .await
    }

    pub async fn fetch_count(&self, descriptor: FetchDescriptor) -> Result<usize, StoreError> {
        self.perform(move |ctx| ctx.fetch_count::<R>(&descriptor)).await
    }

    /// Crea un registro nuevo a partir del valor.
    pub async fn insert(&self, value: R::Value, force_save: bool) -> Result<StorageHandle, StoreError> {
        self.perform(move |ctx| {
                let handle = ctx.insert(R::create_from(&value))?;
                debug!("actor:{} insert handle={handle} force_save={force_save}", R::ENTITY);
                finish(ctx, force_save)?;
                Ok(handle)
            })
            .await
    }

    /// Actualiza en sitio el registro del handle. Handle obsoleto: no-op.
    pub async fn update(&self, handle: StorageHandle, value: R::Value, force_save: bool) -> Result<(), StoreError> {
        self.perform(move |ctx| {
                let Some(mut record) = ctx.model::<R>(&handle)? else {
                    debug!("actor:{} update ignorado, handle obsoleto {handle}", R::ENTITY);
                    return Ok(());
                };
                record.update_from(&value);
                ctx.put(&handle, record)?;
                finish(ctx, force_save)
            })
            .await
    }

    /// Actualiza el primer registro que cumple el descriptor o inserta uno
    /// nuevo si no hay ninguno. Devuelve el handle afectado.
    pub async fn upsert(&self, descriptor: FetchDescriptor, value: R::Value, force_save: bool) -> Result<StorageHandle, StoreError> {
        self.perform(move |ctx| {
                let handle = match ctx.fetch_managed::<R>(&descriptor)?.into_iter().next() {
                    Some(mut found) => {
                        found.model.update_from(&value);
                        ctx.put(&found.handle, found.model)?;
                        debug!("actor:{} upsert actualiza {}", R::ENTITY, found.handle);
                        found.handle
                    }
                    None => {
                        let handle = ctx.insert(R::create_from(&value))?;
                        debug!("actor:{} upsert inserta {handle}", R::ENTITY);
                        handle
                    }
                };
                finish(ctx, force_save)?;
                Ok(handle)
            })
            .await
    }

    /// Elimina el registro (y sus hijos). Handle obsoleto: no-op.
    pub async fn delete(&self, handle: StorageHandle, force_save: bool) -> Result<(), StoreError> {
        self.perform(move |ctx| {
                if !ctx.delete::<R>(&handle)? {
                    debug!("actor:{} delete ignorado, handle obsoleto {handle}", R::ENTITY);
                    return Ok(());
                }
                finish(ctx, force_save)
            })
            .await
    }

    pub async fn delete_all(&self, descriptor: FetchDescriptor, force_save: bool) -> Result<usize, StoreError> {
        self.perform(move |ctx| {
                let removed = ctx.delete_all::<R>(&descriptor)?;
                debug!("actor:{} delete_all n={removed}", R::ENTITY);
                finish(ctx, force_save)?;
                Ok(removed)
            })
            .await
    }

    /// Confirma los cambios pendientes del contexto.
    pub async fn save(&self) -> Result<(), StoreError> {
        self.perform(|ctx| ctx.save()).await
    }

    /// Descarta los cambios pendientes del contexto, p. ej. una escritura en
    /// conflicto que impide los guardados siguientes.
    pub async fn rollback(&self) -> Result<(), StoreError> {
        self.perform(|ctx| {
                ctx.rollback();
                Ok(())
            })
            .await
    }
}
