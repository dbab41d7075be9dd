//! contact-persistence
//!
//! Backend Postgres (Diesel + r2d2) para el motor de `contact-core`.
//!
//! Módulos:
//! - `pg`: `PgBackend` (implementa `StorageBackend`), pool y proveedor de
//!   conexiones.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde .env.
//! - `schema`: tabla Diesel declarada para compilar queries.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgBackend, PgPool, PoolProvider};
