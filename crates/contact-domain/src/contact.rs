// contact.rs
use contact_core::{Extractable, Identifiable, Model, ModelContext, ParentExtractable, StorageHandle, StoreError,
                   ToMany};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::phone_number::{PersistentPhoneNumber, PhoneNumber};

/// Contacto en memoria con sus números de teléfono (en el orden del
/// llamador).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub id: Uuid,
    pub name: String,
    pub sequence_no: i64,
    pub phone_numbers: Vec<PhoneNumber>,
}

impl Contact {
    pub fn new(name: impl Into<String>, sequence_no: i64) -> Self {
        Self { id: Uuid::new_v4(), name: name.into(), sequence_no, phone_numbers: Vec::new() }
    }

    pub fn with_phone_numbers(mut self, phone_numbers: Vec<PhoneNumber>) -> Self {
        self.phone_numbers = phone_numbers;
        self
    }
}

impl Identifiable for Contact {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Registro persistido de un contacto. Posee sus números de teléfono: se
/// insertan y eliminan en cascada con él.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentContact {
    pub state_id: Uuid,
    pub name: String,
    pub sequence_no: i64,
    #[serde(default)]
    pub phone_numbers: ToMany<PersistentPhoneNumber>,
}

impl PersistentContact {
    pub fn new(id: Uuid, name: impl Into<String>, sequence_no: i64) -> Self {
        Self { state_id: id, name: name.into(), sequence_no, phone_numbers: ToMany::default() }
    }
}

impl Model for PersistentContact {
    const ENTITY: &'static str = "contact";
    const FIELDS: &'static [&'static str] = &["state_id", "name", "sequence_no"];

    fn state_id(&self) -> Uuid {
        self.state_id
    }

    fn resolve_relationships(&mut self, ctx: &ModelContext) -> Result<(), StoreError> {
        self.phone_numbers.resolve(ctx)
    }

    fn persist_relationships(&mut self, ctx: &mut ModelContext) -> Result<(), StoreError> {
        self.phone_numbers.persist_pending(ctx)
    }

    fn owned_handles(&self) -> Vec<StorageHandle> {
        self.phone_numbers.handles().to_vec()
    }
}

impl Extractable for PersistentContact {
    type Value = Contact;

    fn extract(&self) -> Contact {
        Contact { id: self.state_id,
                  name: self.name.clone(),
                  sequence_no: self.sequence_no,
                  phone_numbers: self.phone_numbers.models().iter().map(PersistentPhoneNumber::extract).collect() }
    }

    /// Sólo válido para contactos sin teléfonos; con hijos hay que usar
    /// `update_with_child`.
    fn update_from(&mut self, value: &Contact) {
        if !self.phone_numbers.is_empty() || !value.phone_numbers.is_empty() {
            panic!("PersistentContact::update_from no reconcilia teléfonos: usar update_with_child (contact {})",
                   self.state_id);
        }
        self.update_fields_from(value);
    }

    fn create_from(value: &Contact) -> Self {
        let children = value.phone_numbers.iter().map(PersistentPhoneNumber::create_from).collect();
        Self { state_id: value.id,
               name: value.name.clone(),
               sequence_no: value.sequence_no,
               phone_numbers: ToMany::detached(children) }
    }
}

impl ParentExtractable for PersistentContact {
    type Child = PersistentPhoneNumber;

    fn child_values(value: &Contact) -> &[PhoneNumber] {
        &value.phone_numbers
    }

    fn children(&self) -> &ToMany<PersistentPhoneNumber> {
        &self.phone_numbers
    }

    fn replace_children(&mut self, children: ToMany<PersistentPhoneNumber>) {
        self.phone_numbers = children;
    }

    fn update_fields_from(&mut self, value: &Contact) {
        self.name = value.name.clone();
        self.sequence_no = value.sequence_no;
    }
}
