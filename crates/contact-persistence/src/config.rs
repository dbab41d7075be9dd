//! Configuración de conexión desde variables de entorno.
//! Convención `DATABASE_URL` más parámetros opcionales del pool.

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

use crate::error::PersistenceError;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, PersistenceError> {
        init_dotenv();
        let url = env::var("DATABASE_URL").map_err(|_| PersistenceError::MissingConfig("DATABASE_URL".into()))?;
        Ok(Self { url,
                  min_connections: pool_size("DATABASE_MIN_CONNECTIONS", 2),
                  max_connections: pool_size("DATABASE_MAX_CONNECTIONS", 16) })
    }

    /// `None` si no hay `DATABASE_URL` (p. ej. entorno sin base de datos).
    pub fn from_env_opt() -> Option<Self> {
        Self::from_env().ok()
    }
}

fn pool_size(var: &str, default: u32) -> u32 {
    env::var(var).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
