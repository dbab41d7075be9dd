//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) y expone una estructura inmutable (`CONFIG`).

use std::env;

use contact_persistence::DbConfig;
use once_cell::sync::Lazy;

/// Configuración global de la aplicación.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Contenedor sólo en memoria (`CONTACTS_IN_MEMORY=1|true`).
    pub in_memory_only: bool,
    /// Base de datos, si hay `DATABASE_URL`.
    pub database: Option<DbConfig>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        contact_persistence::init_dotenv();
        Self { in_memory_only: env::var("CONTACTS_IN_MEMORY").map(|v| parse_flag(&v)).unwrap_or(false),
               database: DbConfig::from_env_opt() }
    }

    /// Sin base de datos configurada el contenedor es siempre en memoria.
    pub fn use_in_memory(&self) -> bool {
        self.in_memory_only || self.database.is_none()
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

/// Instancia global perezosa de configuración, evaluada una sola vez.
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);
