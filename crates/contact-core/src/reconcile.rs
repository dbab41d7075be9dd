//! Reconciliación de la colección de hijos de un padre.
//!
//! Empareja cada hijo en memoria con el hijo persistido del mismo
//! identificador (actualización en sitio) o crea uno nuevo, elimina los hijos
//! que el padre tenía y que ya no están en la lista, y reasigna la relación
//! del padre. Ambas fases quedan en el mismo contexto, así que con
//! `force_save` se confirman en un único guardado atómico.

use std::collections::{HashMap, HashSet};

use log::debug;
use uuid::Uuid;

use crate::actor::{finish, TableActor};
use crate::context::ModelContext;
use crate::errors::StoreError;
use crate::handle::StorageHandle;
use crate::mapping::{Extractable, ParentExtractable};
use crate::model::{Identifiable, Managed, Model};
use crate::query::FetchDescriptor;
use crate::relationship::ToMany;

/// Resultado de reconciliar un padre.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub updated: usize,
    pub inserted: usize,
    pub removed: usize,
}

/// Reconciliación sobre un contexto. Devuelve `None` si el handle del padre
/// es obsoleto.
pub fn reconcile_children<R: ParentExtractable>(ctx: &mut ModelContext,
                                                handle: &StorageHandle,
                                                value: &R::Value)
                                                -> Result<Option<ReconcileReport>, StoreError> {
    let Some(mut parent) = ctx.model::<R>(handle)? else {
        return Ok(None);
    };

    // Índice id → hijo persistido sobre toda la tabla de hijos.
    let mut persisted: HashMap<Uuid, Managed<R::Child>> =
        ctx.fetch_managed::<R::Child>(&FetchDescriptor::all())?
           .into_iter()
           .map(|m| (m.model.state_id(), m))
           .collect();

    let mut report = ReconcileReport::default();
    let mut collected = Vec::new();
    for child_value in R::child_values(value) {
        match persisted.remove(&child_value.id()) {
            Some(Managed { handle: child_handle, model: mut child }) => {
                child.update_from(child_value);
                ctx.put(&child_handle, child.clone())?;
                report.updated += 1;
                collected.push(Managed { handle: child_handle, model: child });
            }
            None => {
                let child = <R::Child as Extractable>::create_from(child_value);
                let child_handle = ctx.insert(child.clone())?;
                report.inserted += 1;
                collected.push(Managed { handle: child_handle, model: child });
            }
        }
    }

    let kept: HashSet<&StorageHandle> = collected.iter().map(|m| &m.handle).collect();
    let orphans: Vec<StorageHandle> =
        parent.children().handles().iter().filter(|h| !kept.contains(h)).cloned().collect();
    for orphan in &orphans {
        if ctx.delete::<R::Child>(orphan)? {
            report.removed += 1;
        }
    }

    parent.replace_children(ToMany::from_managed(collected));
    parent.update_fields_from(value);
    ctx.put(handle, parent)?;
    Ok(Some(report))
}

impl<R: ParentExtractable> TableActor<R> {
    /// Persiste un padre junto con su lista de hijos mutada. Handle
    /// obsoleto: no-op.
    pub async fn update_with_child(&self,
                                   handle: StorageHandle,
                                   value: R::Value,
                                   force_save: bool)
                                   -> Result<(), StoreError> {
        self.perform(move |ctx| {
                match reconcile_children::<R>(ctx, &handle, &value)? {
                    Some(report) => debug!("actor:{} update_with_child {handle} {report:?}", R::ENTITY),
                    None => {
                        debug!("actor:{} update_with_child ignorado, handle obsoleto {handle}", R::ENTITY);
                        return Ok(());
                    }
                }
                finish(ctx, force_save)
            })
            .await
    }
}
