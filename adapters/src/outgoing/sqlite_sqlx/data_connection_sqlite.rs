use std::{
    collections::{BTreeSet, HashMap},
    future::Future,
    path::PathBuf,
    pin::Pin,
    task::{Context, Poll},
};

use futures::future::BoxFuture;
use sqlx::{
    Connection, Row,
    migrate::{Migrate, MigrateError, Migration, Migrator},
    query::Query,
    sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteRow},
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

use domain::{
    ids::{GroupName, PlayerId, WarpId, WorldId},
    location::{Position, Rotation},
    warp::{Warp, WarpType},
};
use warpstore_application::{
    error::{AppError, AppResult},
    infrastructure_config::SqliteConfig,
    ports::outgoing::data_connection::{DataConnection, require_id},
};

use super::legacy::LegacyLayout;
use crate::outgoing::sql_common::{
    executor::{StatementExecutor, map_sqlx_error},
    record::{WarpRecord, collect_warps},
    statements::{SqlValue, Statement, TableName, WarpStatements},
};

/// Table created by the embedded migrations.
pub const WARP_TABLE: &str = "warpTable";

static MIGRATOR: Migrator = sqlx::migrate!("./migrations/sqlite");

type Job = Box<dyn for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, ()> + Send>;

enum Message {
    Run(Job),
    Close(oneshot::Sender<AppResult<()>>),
}

fn job<F>(f: F) -> Job
where
    F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, ()> + Send + 'static,
{
    Box::new(f)
}

/// Embedded single-file backend.
///
/// One worker task owns the only connection to the file and runs every
/// operation in the order it was submitted. Handles are cheap to clone and
/// all of them talk to the same worker.
#[derive(Clone)]
pub struct SqliteDataConnection {
    sender: mpsc::UnboundedSender<Message>,
    statements: WarpStatements,
    executor: StatementExecutor,
}

/// Resolves once the worker has connected and, when schema management is
/// enabled, brought the file up to the latest migration.
pub struct PendingConnection {
    ready: oneshot::Receiver<AppResult<SqliteDataConnection>>,
}

impl Future for PendingConnection {
    type Output = AppResult<SqliteDataConnection>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.ready).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(AppError::ConnectionFailure {
                    message: "SQLite worker stopped before the connection was ready".to_string(),
                })
            })
        })
    }
}

impl SqliteDataConnection {
    /// Spawns the worker on the current tokio runtime.
    pub fn open(config: &SqliteConfig, query_timeout_secs: Option<u64>) -> PendingConnection {
        let (ready, pending) = oneshot::channel();
        let pending = PendingConnection { ready: pending };

        let statements = match TableName::new(WARP_TABLE) {
            Ok(table) => WarpStatements::new(table),
            Err(e) => {
                if ready.send(Err(e)).is_err() {
                    debug!("SQLite open abandoned before it started");
                }
                return pending;
            }
        };

        let path = config.path.clone();
        let manage_schema = config.manage_schema;
        let executor = StatementExecutor::new(query_timeout_secs);

        tokio::spawn(async move {
            let conn = match connect(path, manage_schema).await {
                Ok(conn) => conn,
                Err(e) => {
                    if ready.send(Err(e)).is_err() {
                        debug!("SQLite open abandoned by caller");
                    }
                    return;
                }
            };

            let (sender, inbox) = mpsc::unbounded_channel();
            let handle = Self {
                sender,
                statements,
                executor,
            };
            if ready.send(Ok(handle)).is_err() {
                debug!("SQLite open abandoned by caller");
            }

            serve(conn, inbox).await;
        });

        pending
    }

    /// Ships `operation` to the worker and waits for its answer.
    async fn run<T, F>(&self, context: &str, operation: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, AppResult<T>> + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let work = job(move |conn| {
            Box::pin(async move {
                let result = operation(conn).await;
                if reply.send(result).is_err() {
                    debug!("SQLite caller went away before the result was ready");
                }
            })
        });

        self.sender
            .send(Message::Run(work))
            .map_err(|_| worker_gone(context))?;

        response.await.map_err(|_| worker_gone(context))?
    }

    async fn execute(&self, statement: Statement, context: String) -> AppResult<u64> {
        let executor = self.executor;
        let failure = context.clone();
        self.run(&failure, move |conn| {
            Box::pin(async move {
                let query = bind_values(sqlx::query(&statement.sql), statement.values);
                executor
                    .execute_with_timeout(query.execute(&mut *conn), &context)
                    .await
                    .map(|done| done.rows_affected())
            })
        })
        .await
    }

    async fn table_exists(&self) -> AppResult<bool> {
        let table = self.statements.table().to_string();
        let executor = self.executor;
        self.run("Failed to inspect SQLite schema", move |conn| {
            Box::pin(async move {
                executor
                    .execute_with_timeout(
                        sqlx::query("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")
                            .bind(table)
                            .fetch_optional(&mut *conn),
                        "Failed to inspect SQLite schema",
                    )
                    .await
                    .map(|row| row.is_some())
            })
        })
        .await
    }

    async fn pending_migrations(&self) -> AppResult<Vec<String>> {
        self.run("Failed to read SQLite migration history", |conn| {
            Box::pin(async move {
                conn.ensure_migrations_table()
                    .await
                    .map_err(|e| migration_error("Failed to read SQLite migration history", &e))?;
                let adoptable = untracked_version(conn).await?;
                let applied = conn
                    .list_applied_migrations()
                    .await
                    .map_err(|e| migration_error("Failed to read SQLite migration history", &e))?;

                Ok(MIGRATOR
                    .iter()
                    .filter(|m| !m.migration_type.is_down_migration())
                    .filter(|m| !applied.iter().any(|a| a.version == m.version))
                    .filter(|m| adoptable.is_none_or(|version| m.version > version))
                    .map(|m| format!("{} {}", m.version, m.description))
                    .collect())
            })
        })
        .await
    }

    async fn apply_migrations(&self) -> AppResult<()> {
        self.run("Failed to migrate SQLite schema", |conn| {
            Box::pin(async move {
                adopt_untracked_table(conn).await?;
                MIGRATOR
                    .run_direct(&mut *conn)
                    .await
                    .map_err(|e| migration_error("Failed to migrate SQLite schema", &e))
            })
        })
        .await
    }
}

async fn connect(path: PathBuf, manage_schema: bool) -> AppResult<SqliteConnection> {
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);

    let mut conn = SqliteConnection::connect_with(&options)
        .await
        .map_err(|e| AppError::ConnectionFailure {
            message: format!("Failed to open SQLite database {}: {e}", path.display()),
        })?;

    if manage_schema {
        adopt_untracked_table(&mut conn).await?;
        MIGRATOR
            .run_direct(&mut conn)
            .await
            .map_err(|e| migration_error("Failed to migrate SQLite schema", &e))?;
        info!(path = %path.display(), "SQLite schema is up to date");
    }

    Ok(conn)
}

/// Highest migration an existing `warpTable` already matches when the file
/// carries no migration history. `None` for tracked files and empty ones.
async fn untracked_version(conn: &mut SqliteConnection) -> AppResult<Option<i64>> {
    const CONTEXT: &str = "Failed to inspect existing SQLite warp table";

    conn.ensure_migrations_table()
        .await
        .map_err(|e| migration_error(CONTEXT, &e))?;
    let applied = conn
        .list_applied_migrations()
        .await
        .map_err(|e| migration_error(CONTEXT, &e))?;
    if !applied.is_empty() {
        return Ok(None);
    }

    let create_sql: Option<String> = sqlx::query_scalar(
        "SELECT COALESCE(sql, '') FROM sqlite_master WHERE type = 'table' AND name = ?",
    )
    .bind(WARP_TABLE)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error(e, CONTEXT))?;
    let Some(create_sql) = create_sql else {
        return Ok(None);
    };

    let columns: Vec<(String, String)> =
        sqlx::query_as("SELECT name, type FROM pragma_table_info(?)")
            .bind(WARP_TABLE)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error(e, CONTEXT))?;

    LegacyLayout::new(columns, &create_sql)
        .matched_version()
        .map(Some)
        .map_err(|reason| AppError::StorageError {
            message: format!("Existing {WARP_TABLE} table has an unrecognized layout: {reason}"),
        })
}

/// Records the migrations an untracked `warpTable` already satisfies, so the
/// migrator only runs the ones after it instead of rebuilding from scratch.
async fn adopt_untracked_table(conn: &mut SqliteConnection) -> AppResult<()> {
    const CONTEXT: &str = "Failed to record existing SQLite schema";

    let Some(version) = untracked_version(conn).await? else {
        return Ok(());
    };

    let mut tx = conn.begin().await.map_err(|e| map_sqlx_error(e, CONTEXT))?;
    for migration in migrations_up_to(version) {
        sqlx::query(
            r"
            INSERT INTO _sqlx_migrations (version, description, success, checksum, execution_time)
            VALUES (?, ?, 1, ?, 0)
            ",
        )
        .bind(migration.version)
        .bind(&*migration.description)
        .bind(&*migration.checksum)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(e, CONTEXT))?;
    }
    tx.commit().await.map_err(|e| map_sqlx_error(e, CONTEXT))?;

    info!(version, "Adopted existing SQLite warp table");
    Ok(())
}

fn migrations_up_to(version: i64) -> impl Iterator<Item = &'static Migration> {
    MIGRATOR
        .iter()
        .filter(move |m| !m.migration_type.is_down_migration() && m.version <= version)
}

async fn serve(mut conn: SqliteConnection, mut inbox: mpsc::UnboundedReceiver<Message>) {
    while let Some(message) = inbox.recv().await {
        match message {
            Message::Run(work) => work(&mut conn).await,
            Message::Close(reply) => {
                let closed = conn.close().await.map_err(|e| AppError::StorageError {
                    message: format!("Failed to close SQLite connection: {e}"),
                });
                if reply.send(closed).is_err() {
                    debug!("SQLite close requested by a dropped caller");
                }
                return;
            }
        }
    }

    if let Err(e) = conn.close().await {
        warn!(error = %e, "Failed to close SQLite connection after last handle was dropped");
    }
}

fn bind_values<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: Vec<SqlValue>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    values.into_iter().fold(query, |query, value| match value {
        SqlValue::Int(v) => query.bind(v),
        SqlValue::Real(v) => query.bind(v),
        SqlValue::Text(v) => query.bind(v),
        SqlValue::Bool(v) => query.bind(v),
    })
}

fn record_from_row(row: &SqliteRow) -> Result<WarpRecord, sqlx::Error> {
    Ok(WarpRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        creator: row
            .try_get::<Option<String>, _>("creator")?
            .unwrap_or_default(),
        world: row.try_get::<Option<String>, _>("world")?.unwrap_or_default(),
        x: row.try_get("x")?,
        y: row.try_get("y")?,
        z: row.try_get("z")?,
        yaw: row.try_get("yaw")?,
        pitch: row.try_get("pitch")?,
        public_all: row.try_get("publicAll")?,
        permissions: row.try_get("permissions")?,
        group_permissions: row.try_get("groupPermissions")?,
        welcome_message: row
            .try_get::<Option<String>, _>("welcomeMessage")?
            .unwrap_or_default(),
        visits: row.try_get("visits")?,
        creation_date: row.try_get("creationDate")?,
    })
}

fn worker_gone(context: &str) -> AppError {
    AppError::ConnectionFailure {
        message: format!("{context}: SQLite connection is closed"),
    }
}

fn migration_error(context: &str, error: &MigrateError) -> AppError {
    AppError::StorageError {
        message: format!("{context}: {error}"),
    }
}

#[async_trait::async_trait]
impl DataConnection for SqliteDataConnection {
    #[instrument(skip(self))]
    async fn check_schema(&self, create_if_missing: bool) -> AppResult<()> {
        if self.table_exists().await? {
            return Ok(());
        }
        if !create_if_missing {
            return Err(AppError::SchemaMissing {
                table: self.statements.table().to_string(),
            });
        }

        self.apply_migrations().await?;
        info!(table = %self.statements.table(), "Created SQLite warp table");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn migrate_schema(&self, apply_if_necessary: bool) -> AppResult<()> {
        let pending = self.pending_migrations().await?;
        if pending.is_empty() {
            return Ok(());
        }
        if !apply_if_necessary {
            return Err(AppError::SchemaOutdated { pending });
        }

        self.apply_migrations().await?;
        info!(applied = ?pending, "Applied SQLite migrations");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_all(&self) -> AppResult<HashMap<String, Warp>> {
        let sql = self.statements.select_all();
        let executor = self.executor;
        let records = self
            .run("Failed to load warps", move |conn| {
                Box::pin(async move {
                    let rows = executor
                        .execute_with_timeout(
                            sqlx::query(&sql).fetch_all(&mut *conn),
                            "Failed to load warps",
                        )
                        .await?;
                    Ok(rows.iter().map(record_from_row).collect::<Vec<_>>())
                })
            })
            .await?;

        let warps = collect_warps(records);
        debug!(count = warps.len(), "Loaded warps from SQLite");
        Ok(warps)
    }

    #[instrument(skip(self, warp), fields(warp = %warp.name()))]
    async fn create(&self, warp: Warp) -> AppResult<Warp> {
        let statement = self.statements.insert(&WarpRecord::from_warp(&warp));
        let executor = self.executor;
        let context = format!("Failed to create warp '{}'", warp.name());
        let failure = context.clone();

        let id = self
            .run(&failure, move |conn| {
                Box::pin(async move {
                    let query = bind_values(sqlx::query(&statement.sql), statement.values);
                    executor
                        .execute_with_timeout(query.execute(&mut *conn), &context)
                        .await
                        .map(|done| done.last_insert_rowid())
                })
            })
            .await?;

        let warp = warp.with_id(WarpId::new(id));
        debug!(id, "Created warp");
        Ok(warp)
    }

    #[instrument(skip(self, warp), fields(warp = %warp.name()))]
    async fn delete(&self, warp: &Warp) -> AppResult<()> {
        let id = require_id(warp)?;
        let removed = self
            .execute(
                self.statements.delete(id),
                format!("Failed to delete warp '{}'", warp.name()),
            )
            .await?;
        debug!(removed, "Deleted warp");
        Ok(())
    }

    #[instrument(skip(self, warp), fields(warp = %warp.name()))]
    async fn update_visibility(&self, warp: &Warp, warp_type: WarpType) -> AppResult<()> {
        let id = require_id(warp)?;
        self.execute(
            self.statements.update_visibility(id, warp_type),
            format!("Failed to update visibility of warp '{}'", warp.name()),
        )
        .await?;
        debug!(?warp_type, "Updated warp visibility");
        Ok(())
    }

    #[instrument(skip(self, warp), fields(warp = %warp.name()))]
    async fn update_creator(&self, warp: &Warp, creator: &PlayerId) -> AppResult<()> {
        let id = require_id(warp)?;
        self.execute(
            self.statements.update_creator(id, creator),
            format!("Failed to update creator of warp '{}'", warp.name()),
        )
        .await?;
        debug!(%creator, "Updated warp creator");
        Ok(())
    }

    #[instrument(skip(self, warp), fields(warp = %warp.name()))]
    async fn update_location(
        &self,
        warp: &Warp,
        world: &WorldId,
        position: Position,
        rotation: Rotation,
    ) -> AppResult<()> {
        let id = require_id(warp)?;
        self.execute(
            self.statements
                .update_location(id, world, position, rotation),
            format!("Failed to update location of warp '{}'", warp.name()),
        )
        .await?;
        debug!(%world, %position, "Updated warp location");
        Ok(())
    }

    #[instrument(skip(self, warp, players), fields(warp = %warp.name()))]
    async fn update_permissions(
        &self,
        warp: &Warp,
        players: &BTreeSet<PlayerId>,
    ) -> AppResult<()> {
        let id = require_id(warp)?;
        self.execute(
            self.statements.update_permissions(id, players),
            format!("Failed to update invited players of warp '{}'", warp.name()),
        )
        .await?;
        debug!(count = players.len(), "Updated invited players");
        Ok(())
    }

    #[instrument(skip(self, warp, groups), fields(warp = %warp.name()))]
    async fn update_group_permissions(
        &self,
        warp: &Warp,
        groups: &BTreeSet<GroupName>,
    ) -> AppResult<()> {
        let id = require_id(warp)?;
        self.execute(
            self.statements.update_group_permissions(id, groups),
            format!("Failed to update invited groups of warp '{}'", warp.name()),
        )
        .await?;
        debug!(count = groups.len(), "Updated invited groups");
        Ok(())
    }

    #[instrument(skip(self, warp), fields(warp = %warp.name()))]
    async fn update_visits(&self, warp: &Warp, visits: u32) -> AppResult<()> {
        let id = require_id(warp)?;
        let changed = self
            .execute(
                self.statements.update_visits(id, visits),
                format!("Failed to update visits of warp '{}'", warp.name()),
            )
            .await?;
        debug!(visits, changed, "Updated warp visits");
        Ok(())
    }

    #[instrument(skip(self, warp, message), fields(warp = %warp.name()))]
    async fn update_welcome_message(&self, warp: &Warp, message: &str) -> AppResult<()> {
        let id = require_id(warp)?;
        self.execute(
            self.statements.update_welcome_message(id, message),
            format!("Failed to update welcome message of warp '{}'", warp.name()),
        )
        .await?;
        debug!("Updated welcome message");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn close(&self) -> AppResult<()> {
        let (reply, response) = oneshot::channel();
        if self.sender.send(Message::Close(reply)).is_err() {
            return Ok(());
        }
        // A dropped reply means another close got there first.
        response.await.unwrap_or(Ok(()))
    }
}
