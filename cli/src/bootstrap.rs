use std::sync::Arc;
use tracing::info;

use warpstore_adapters::outgoing::{
    mysql_sqlx::data_connection_mysql::MysqlDataConnection,
    sqlite_sqlx::data_connection_sqlite::SqliteDataConnection,
};
use warpstore_application::{
    error::AppResult,
    infrastructure_config::{StorageBackend, StorageConfig},
    ports::outgoing::data_connection::{DataConnection, DynDataConnection},
};

/// Opens `backend` without touching its schema beyond what the backend does
/// on its own.
pub async fn open_connection(
    storage: &StorageConfig,
    backend: StorageBackend,
) -> AppResult<DynDataConnection> {
    match backend {
        StorageBackend::Sqlite => {
            info!(path = %storage.sqlite.path.display(), "Opening SQLite warp storage");
            let conn =
                SqliteDataConnection::open(&storage.sqlite, storage.query_timeout_secs).await?;
            Ok(Arc::new(conn))
        }
        StorageBackend::Mysql => {
            let conn = MysqlDataConnection::new(&storage.mysql, storage.query_timeout_secs)?;
            Ok(Arc::new(conn))
        }
    }
}

/// Startup schema handling: the MySQL flags decide whether the table may be
/// created or upgraded, an unmanaged SQLite file is only verified.
pub async fn prepare_schema(
    conn: &dyn DataConnection,
    storage: &StorageConfig,
    backend: StorageBackend,
) -> AppResult<()> {
    match backend {
        StorageBackend::Sqlite if storage.sqlite.manage_schema => Ok(()),
        StorageBackend::Sqlite => {
            conn.check_schema(false).await?;
            conn.migrate_schema(false).await
        }
        StorageBackend::Mysql => {
            conn.check_schema(storage.mysql.create_if_missing).await?;
            conn.migrate_schema(storage.mysql.update_if_necessary).await
        }
    }
}
