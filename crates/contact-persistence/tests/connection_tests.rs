//! Pruebas básicas de configuración y pool (requiere DATABASE_URL válido en entorno).

use contact_persistence::{build_pool, DbConfig};
use diesel::connection::SimpleConnection;

#[test]
fn create_pool_from_env() {
    let Some(cfg) = DbConfig::from_env_opt() else {
        eprintln!("skip (no DATABASE_URL)");
        return;
    };
    let pool = build_pool(&cfg.url, cfg.min_connections, cfg.max_connections).expect("pool");
    let mut conn = pool.get().expect("conn");
    conn.batch_execute("SELECT 1;").expect("select 1");
}
