//! Cliente de datos de la aplicación: un actor por tabla sobre un único
//! contenedor, más los flujos de alta, edición y borrado de contactos.

use std::sync::Arc;

use contact_core::{FetchDescriptor, ModelContainer, Predicate, SortDescriptor, TableActor};
use contact_domain::{next_sequence_no, Contact, PersistentContact, PersistentPhoneNumber};
use contact_persistence::{build_pool, PgBackend};
use log::{debug, info};
use uuid::Uuid;

use crate::config::{AppConfig, CONFIG};
use crate::errors::AppError;

/// Crea el contenedor: en memoria, o respaldado por Postgres con la
/// configuración dada.
pub fn create_model_container(config: &AppConfig) -> Result<ModelContainer, AppError> {
    match (&config.database, config.use_in_memory()) {
        (Some(db), false) => {
            let pool = build_pool(&db.url, db.min_connections, db.max_connections)?;
            info!("contenedor sobre Postgres (max_connections={})", db.max_connections);
            Ok(ModelContainer::with_backend(Arc::new(PgBackend::from_pool(pool)))?)
        }
        _ => {
            info!("contenedor en memoria");
            Ok(ModelContainer::in_memory())
        }
    }
}

#[derive(Clone)]
pub struct DataClient {
    pub contacts: TableActor<PersistentContact>,
    pub phone_numbers: TableActor<PersistentPhoneNumber>,
}

fn by_id(id: Uuid) -> FetchDescriptor {
    FetchDescriptor::filtered(Predicate::eq("state_id", id))
}

impl DataClient {
    pub fn new(container: ModelContainer) -> Self {
        Self { contacts: TableActor::new(container.clone()), phone_numbers: TableActor::new(container) }
    }

    /// Cliente según la configuración global (`CONFIG`).
    pub fn live() -> Result<Self, AppError> {
        Ok(Self::new(create_model_container(&CONFIG)?))
    }

    /// Cliente sobre un contenedor nuevo en memoria.
    pub fn test() -> Self {
        Self::new(ModelContainer::in_memory())
    }

    /// Todos los contactos, en orden de `sequence_no`.
    pub async fn load_contacts(&self) -> Result<Vec<Contact>, AppError> {
        let descriptor = FetchDescriptor::all().sorted_by(SortDescriptor::forward("sequence_no"));
        Ok(self.contacts.fetch(descriptor).await?)
    }

    pub async fn find_contact(&self, id: Uuid) -> Result<Option<Contact>, AppError> {
        Ok(self.contacts.fetch(by_id(id)).await?.into_iter().next())
    }

    pub async fn next_sequence_no(&self) -> Result<i64, AppError> {
        let contacts = self.load_contacts().await?;
        Ok(next_sequence_no(contacts.iter().map(|c| c.sequence_no)))
    }

    pub async fn add_contact(&self, contact: Contact) -> Result<(), AppError> {
        self.contacts.insert(contact, true).await?;
        Ok(())
    }

    /// Guarda un contacto editado (nombre y teléfonos). `false` si ya no
    /// existe.
    pub async fn edit_contact(&self, contact: Contact) -> Result<bool, AppError> {
        let Some(handle) = self.contacts.fetch_identifier(by_id(contact.id)).await? else {
            debug!("edit_contact: {} no encontrado", contact.id);
            return Ok(false);
        };
        self.contacts.update_with_child(handle, contact, true).await?;
        Ok(true)
    }

    /// Borra un contacto y sus teléfonos. `false` si no existe.
    pub async fn delete_contact(&self, id: Uuid) -> Result<bool, AppError> {
        let Some(handle) = self.contacts.fetch_identifier(by_id(id)).await? else {
            debug!("delete_contact: {id} no encontrado");
            return Ok(false);
        };
        self.contacts.delete(handle, true).await?;
        Ok(true)
    }
}
