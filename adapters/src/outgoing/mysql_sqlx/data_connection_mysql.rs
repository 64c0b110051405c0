use std::{
    collections::{BTreeSet, HashMap},
    str::FromStr,
};

use sqlx::{
    Executor, MySqlPool, Row,
    mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlPoolOptions, MySqlRow},
    pool::PoolConnection,
    query::Query,
};
use tracing::{debug, info, instrument};

use domain::{
    ids::{GroupName, PlayerId, WarpId, WorldId},
    location::{Position, Rotation},
    warp::{Warp, WarpType},
};
use warpstore_application::{
    error::{AppError, AppResult},
    infrastructure_config::MysqlConfig,
    ports::outgoing::data_connection::{DataConnection, require_id},
};

use super::schema::{TableLayout, create_table, pending_steps};
use crate::outgoing::sql_common::{
    executor::StatementExecutor,
    record::{WarpRecord, collect_warps},
    statements::{SqlValue, Statement, TableName, WarpStatements},
};

/// Networked backend. Every operation borrows a pooled connection for a
/// single statement; the connection goes back to the pool when the guard
/// drops, whichever way the operation ends.
pub struct MysqlDataConnection {
    pool: MySqlPool,
    statements: WarpStatements,
    executor: StatementExecutor,
}

impl MysqlDataConnection {
    /// Builds the pool without connecting. The first operation opens the
    /// first connection.
    pub fn new(config: &MysqlConfig, query_timeout_secs: Option<u64>) -> AppResult<Self> {
        let table = TableName::new(config.table.clone())?;

        let mut options = MySqlConnectOptions::from_str(config.dsn.trim_start_matches("jdbc:"))
            .map_err(|e| AppError::ConfigError {
                message: format!("Invalid MySQL DSN {}: {e}", config.redacted_dsn()),
            })?;
        if !config.user.is_empty() {
            options = options.username(&config.user);
        }
        if !config.password().is_empty() {
            options = options.password(config.password());
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(config.pool_size)
            .connect_lazy_with(options);

        info!(
            dsn = %config.redacted_dsn(),
            table = %table,
            pool_size = config.pool_size,
            "Configured MySQL warp storage"
        );

        Ok(Self {
            pool,
            statements: WarpStatements::new(table),
            executor: StatementExecutor::new(query_timeout_secs),
        })
    }

    async fn acquire(&self, context: &str) -> AppResult<PoolConnection<MySql>> {
        self.executor
            .execute_with_timeout(self.pool.acquire(), context)
            .await
    }

    async fn execute(&self, statement: Statement, context: &str) -> AppResult<u64> {
        let mut conn = self.acquire(context).await?;
        let query = bind_values(sqlx::query(&statement.sql), statement.values);
        self.executor
            .execute_with_timeout(query.execute(&mut *conn), context)
            .await
            .map(|done| done.rows_affected())
    }

    async fn table_exists(&self) -> AppResult<bool> {
        let context = "Failed to inspect MySQL schema";
        let mut conn = self.acquire(context).await?;
        let row = self
            .executor
            .execute_with_timeout(
                sqlx::query(
                    r"
                    SELECT 1
                    FROM information_schema.tables
                    WHERE table_schema = DATABASE() AND table_name = ?
                    ",
                )
                .bind(self.statements.table().as_str())
                .fetch_optional(&mut *conn),
                context,
            )
            .await?;
        Ok(row.is_some())
    }

    async fn table_layout(&self) -> AppResult<TableLayout> {
        let context = "Failed to inspect MySQL columns";
        let mut conn = self.acquire(context).await?;
        let rows = self
            .executor
            .execute_with_timeout(
                sqlx::query(
                    r"
                    SELECT CAST(COLUMN_NAME AS CHAR) AS column_name,
                           CAST(DATA_TYPE AS CHAR) AS data_type
                    FROM information_schema.columns
                    WHERE table_schema = DATABASE() AND table_name = ?
                    ",
                )
                .bind(self.statements.table().as_str())
                .fetch_all(&mut *conn),
                context,
            )
            .await?;

        let columns = rows
            .iter()
            .map(|row| {
                Ok((
                    row.try_get::<String, _>("column_name")?,
                    row.try_get::<String, _>("data_type")?,
                ))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| AppError::StorageError {
                message: format!("{context}: {e}"),
            })?;

        Ok(TableLayout::new(columns))
    }

    async fn execute_ddl(&self, sql: String, context: &str) -> AppResult<()> {
        let mut conn = self.acquire(context).await?;
        self.executor
            .execute_with_timeout((&mut *conn).execute(sqlx::raw_sql(&sql)), context)
            .await?;
        Ok(())
    }
}

fn bind_values<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    values: Vec<SqlValue>,
) -> Query<'q, MySql, MySqlArguments> {
    values.into_iter().fold(query, |query, value| match value {
        SqlValue::Int(v) => query.bind(v),
        SqlValue::Real(v) => query.bind(v),
        SqlValue::Text(v) => query.bind(v),
        SqlValue::Bool(v) => query.bind(v),
    })
}

fn record_from_row(row: &MySqlRow) -> Result<WarpRecord, sqlx::Error> {
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

#[async_trait::async_trait]
impl DataConnection for MysqlDataConnection {
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

        self.execute_ddl(
            create_table(self.statements.table()),
            "Failed to create MySQL warp table",
        )
        .await?;
        info!(table = %self.statements.table(), "Created MySQL warp table");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn migrate_schema(&self, apply_if_necessary: bool) -> AppResult<()> {
        if !self.table_exists().await? {
            return Err(AppError::SchemaMissing {
                table: self.statements.table().to_string(),
            });
        }

        let steps = pending_steps(&self.table_layout().await?);
        if steps.is_empty() {
            return Ok(());
        }
        if !apply_if_necessary {
            return Err(AppError::SchemaOutdated {
                pending: steps
                    .iter()
                    .map(|step| step.description().to_string())
                    .collect(),
            });
        }

        for step in steps {
            let context = format!("Failed to {}", step.description());
            for sql in step.statements(self.statements.table()) {
                self.execute_ddl(sql, &context).await?;
            }
            info!(step = step.description(), "Applied MySQL schema change");
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_all(&self) -> AppResult<HashMap<String, Warp>> {
        let context = "Failed to load warps";
        let sql = self.statements.select_all();
        let mut conn = self.acquire(context).await?;
        let rows = self
            .executor
            .execute_with_timeout(sqlx::query(&sql).fetch_all(&mut *conn), context)
            .await?;
        drop(conn);

        let warps = collect_warps(rows.iter().map(record_from_row));
        debug!(count = warps.len(), "Loaded warps from MySQL");
        Ok(warps)
    }

    #[instrument(skip(self, warp), fields(warp = %warp.name()))]
    async fn create(&self, warp: Warp) -> AppResult<Warp> {
        let context = format!("Failed to create warp '{}'", warp.name());
        let statement = self.statements.insert(&WarpRecord::from_warp(&warp));

        let mut conn = self.acquire(&context).await?;
        let query = bind_values(sqlx::query(&statement.sql), statement.values);
        let done = self
            .executor
            .execute_with_timeout(query.execute(&mut *conn), &context)
            .await?;

        let id = i64::try_from(done.last_insert_id()).map_err(|e| AppError::StorageError {
            message: format!("{context}: generated id out of range: {e}"),
        })?;
        debug!(id, "Created warp");
        Ok(warp.with_id(WarpId::new(id)))
    }

    #[instrument(skip(self, warp), fields(warp = %warp.name()))]
    async fn delete(&self, warp: &Warp) -> AppResult<()> {
        let id = require_id(warp)?;
        let removed = self
            .execute(
                self.statements.delete(id),
                &format!("Failed to delete warp '{}'", warp.name()),
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
            &format!("Failed to update visibility of warp '{}'", warp.name()),
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
            &format!("Failed to update creator of warp '{}'", warp.name()),
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
            &format!("Failed to update location of warp '{}'", warp.name()),
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
            &format!("Failed to update invited players of warp '{}'", warp.name()),
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
            &format!("Failed to update invited groups of warp '{}'", warp.name()),
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
                &format!("Failed to update visits of warp '{}'", warp.name()),
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
            &format!("Failed to update welcome message of warp '{}'", warp.name()),
        )
        .await?;
        debug!("Updated welcome message");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn close(&self) -> AppResult<()> {
        self.pool.close().await;
        Ok(())
    }
}
