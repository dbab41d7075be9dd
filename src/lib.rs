//! contactflow
//!
//! Aplicación de contactos sobre la capa de mapeo de `contact-core`:
//! - `config`: configuración desde entorno (`CONFIG`).
//! - `client`: `DataClient` (actores de contactos y teléfonos) y creación del
//!   contenedor (memoria o Postgres).
//! - `cli`: interpretación y ejecución de comandos.
//! - `errors`: `AppError`.

pub mod cli;
pub mod client;
pub mod config;
pub mod errors;

pub use client::{create_model_container, DataClient};
pub use config::{AppConfig, CONFIG};
pub use errors::AppError;
