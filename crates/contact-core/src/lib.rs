//! contact-core: capa genérica de mapeo de persistencia.
//!
//! Contrato de mapeo (`Extractable`), contexto de almacenamiento
//! (`ModelContainer` / `ModelContext`), actor de acceso por tabla
//! (`TableActor`) y reconciliación de colecciones de hijos.

pub mod actor;
pub mod backend;
pub mod container;
pub mod context;
pub mod engine;
pub mod errors;
pub mod handle;
pub mod mapping;
pub mod model;
pub mod query;
pub mod reconcile;
pub mod relationship;

pub use actor::{ExecutionMode, TableActor};
pub use backend::{ChangeSet, InMemoryBackend, RowRecord, Snapshot, StorageBackend};
pub use container::ModelContainer;
pub use context::{ModelContext, Savepoint};
pub use engine::StoreEngine;
pub use errors::StoreError;
pub use handle::StorageHandle;
pub use mapping::{Extractable, ParentExtractable};
pub use model::{Identifiable, Managed, Model};
pub use query::{CompareOp, FetchDescriptor, FieldValue, Predicate, SortDescriptor, SortOrder};
pub use reconcile::{reconcile_children, ReconcileReport};
pub use relationship::ToMany;
