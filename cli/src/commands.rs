use serde::Serialize;
use std::fmt::{self, Write as _};
use time::format_description::well_known::Rfc3339;
use tracing::{info, instrument, warn};

use domain::{
    ids::{GroupName, PlayerId},
    warp::{Warp, WarpType},
};
use warpstore_application::{
    authorization::resolver::InvitationAuthorizationResolver,
    error::{AppError, AppResult},
    info::printer::InfoPrinter,
    infrastructure_config::{Config, StorageBackend},
    ports::outgoing::{
        collaborators::LocaleManager,
        data_connection::{DataConnection, DynDataConnection},
    },
};

use crate::{
    args::Command,
    bootstrap::{open_connection, prepare_schema},
    console::{ConsoleActor, EnvironmentLocale, OfflineGame},
};

/// What a command prints, and whether it counts as success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub message: String,
    pub success: bool,
}

impl Outcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
        }
    }
}

/// Work that runs against a single configured backend.
enum Maintenance {
    CheckSchema { create: bool },
    Migrate { apply: bool },
    List { json: bool },
    Info { name: String },
}

/// Opens the needed connections, runs `command` and closes them again.
pub async fn run(command: Command, config: &Config, backend: StorageBackend) -> AppResult<Outcome> {
    let maintenance = match command {
        Command::Import { from, to } => {
            return import_between(config, from.into(), to.into()).await;
        }
        Command::CheckSchema { create } => Maintenance::CheckSchema { create },
        Command::Migrate { apply } => Maintenance::Migrate { apply },
        Command::List { json } => Maintenance::List { json },
        Command::Info { name } => Maintenance::Info { name },
    };

    let conn = open_connection(&config.storage, backend).await?;
    let result = execute(maintenance, conn.as_ref(), config, backend).await;
    close_quietly(&conn).await;
    result
}

async fn import_between(
    config: &Config,
    from: StorageBackend,
    to: StorageBackend,
) -> AppResult<Outcome> {
    if from == to {
        return Err(AppError::ConfigError {
            message: "import needs two different backends".to_string(),
        });
    }

    let source = open_connection(&config.storage, from).await?;
    let target = match open_connection(&config.storage, to).await {
        Ok(target) => target,
        Err(e) => {
            close_quietly(&source).await;
            return Err(e);
        }
    };

    let result = prepare_and_import(&source, &target, config, from, to).await;

    close_quietly(&source).await;
    close_quietly(&target).await;
    result.map(|report| Outcome::ok(report.to_string()))
}

async fn prepare_and_import(
    source: &DynDataConnection,
    target: &DynDataConnection,
    config: &Config,
    from: StorageBackend,
    to: StorageBackend,
) -> AppResult<ImportReport> {
    prepare_schema(source.as_ref(), &config.storage, from).await?;
    prepare_schema(target.as_ref(), &config.storage, to).await?;
    import(source.as_ref(), target.as_ref()).await
}

async fn execute(
    maintenance: Maintenance,
    conn: &dyn DataConnection,
    config: &Config,
    backend: StorageBackend,
) -> AppResult<Outcome> {
    match maintenance {
        Maintenance::CheckSchema { create } => check_schema(conn, create).await,
        Maintenance::Migrate { apply } => migrate(conn, apply).await,
        Maintenance::List { json } => {
            prepare_schema(conn, &config.storage, backend).await?;
            list(conn, json).await.map(Outcome::ok)
        }
        Maintenance::Info { name } => {
            prepare_schema(conn, &config.storage, backend).await?;
            info_text(conn, &name, &EnvironmentLocale).await.map(Outcome::ok)
        }
    }
}

async fn close_quietly(conn: &DynDataConnection) {
    if let Err(e) = conn.close().await {
        warn!(error = %e, "Failed to close warp storage");
    }
}

#[instrument(skip(conn))]
pub async fn check_schema(conn: &dyn DataConnection, create: bool) -> AppResult<Outcome> {
    match conn.check_schema(create).await {
        Ok(()) => Ok(Outcome::ok("Warp table is present.")),
        Err(AppError::SchemaMissing { table }) => Ok(Outcome::failed(format!(
            "Warp table '{table}' does not exist. Run with --create to create it."
        ))),
        Err(e) => Err(e),
    }
}

#[instrument(skip(conn))]
pub async fn migrate(conn: &dyn DataConnection, apply: bool) -> AppResult<Outcome> {
    match conn.migrate_schema(apply).await {
        Ok(()) if apply => Ok(Outcome::ok("Schema is up to date.")),
        Ok(()) => Ok(Outcome::ok("No schema changes pending.")),
        Err(AppError::SchemaOutdated { pending }) => {
            let mut message = String::from("Pending schema changes:");
            for change in &pending {
                write!(message, "\n  - {change}").ok();
            }
            message.push_str("\nRun with --apply to apply them.");
            Ok(Outcome::failed(message))
        }
        Err(e) => Err(e),
    }
}

/// Serialized form of a warp for `list --json`.
#[derive(Debug, Serialize)]
pub struct WarpSummary {
    pub id: Option<i64>,
    pub name: String,
    pub creator: String,
    pub world: String,
    pub x: f64,
    pub y: i16,
    pub z: f64,
    pub yaw: i16,
    pub pitch: i16,
    pub visibility: WarpType,
    pub invited_players: Vec<String>,
    pub invited_groups: Vec<String>,
    pub creation_date: String,
    pub visits: u32,
    pub welcome_message: String,
}

impl From<&Warp> for WarpSummary {
    fn from(warp: &Warp) -> Self {
        let position = warp.position();
        let rotation = warp.rotation();
        Self {
            id: warp.id().map(|id| id.value()),
            name: warp.name().to_string(),
            creator: warp.creator().to_string(),
            world: warp.world().to_string(),
            x: position.x,
            y: position.y,
            z: position.z,
            yaw: rotation.yaw,
            pitch: rotation.pitch,
            visibility: warp.warp_type(),
            invited_players: warp
                .invited_players()
                .iter()
                .map(PlayerId::to_string)
                .collect(),
            invited_groups: warp
                .invited_groups()
                .iter()
                .map(GroupName::to_string)
                .collect(),
            creation_date: warp
                .creation_date()
                .format(&Rfc3339)
                .unwrap_or_else(|_| warp.creation_millis().to_string()),
            visits: warp.visits(),
            welcome_message: warp.welcome_message().to_string(),
        }
    }
}

#[instrument(skip(conn))]
pub async fn list(conn: &dyn DataConnection, json: bool) -> AppResult<String> {
    let warps = conn.load_all().await?;
    let mut warps: Vec<&Warp> = warps.values().collect();
    warps.sort_by(|a, b| a.name().cmp(b.name()));

    if json {
        let summaries: Vec<WarpSummary> = warps.into_iter().map(WarpSummary::from).collect();
        return Ok(serde_json::to_string_pretty(&summaries)?);
    }

    if warps.is_empty() {
        return Ok("No warps stored.".to_string());
    }

    let mut text = String::new();
    for warp in warps {
        writeln!(
            text,
            "{} [{}] by {} in {} at {} ({} visits)",
            warp.name(),
            warp.warp_type(),
            warp.creator(),
            warp.world(),
            warp.position(),
            warp.visits()
        )
        .ok();
    }
    Ok(text.trim_end().to_string())
}

#[instrument(skip(conn, locale))]
pub async fn info_text(
    conn: &dyn DataConnection,
    name: &str,
    locale: &dyn LocaleManager,
) -> AppResult<String> {
    let warps = conn.load_all().await?;
    let warp = warps.get(name).ok_or_else(|| AppError::UnknownWarp {
        name: name.to_string(),
    })?;

    let resolver = InvitationAuthorizationResolver::new();
    let printer = InfoPrinter::new(warp, &resolver, &OfflineGame, &OfflineGame, locale);
    Ok(printer.text(&ConsoleActor))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub copied: usize,
    pub skipped: Vec<String>,
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Imported {} warps.", self.copied)?;
        if !self.skipped.is_empty() {
            write!(
                f,
                " Skipped {} already present: {}.",
                self.skipped.len(),
                self.skipped.join(", ")
            )?;
        }
        Ok(())
    }
}

/// Copies every warp of `source` into `target`. Names already present in
/// `target` are left alone.
#[instrument(skip(source, target))]
pub async fn import(
    source: &dyn DataConnection,
    target: &dyn DataConnection,
) -> AppResult<ImportReport> {
    let existing = target.load_all().await?;
    let mut warps: Vec<Warp> = source.load_all().await?.into_values().collect();
    warps.sort_by(|a, b| a.name().cmp(b.name()));

    let mut report = ImportReport::default();
    for warp in warps {
        if existing.contains_key(warp.name()) {
            report.skipped.push(warp.name().to_string());
            continue;
        }
        target.create(warp).await?;
        report.copied += 1;
    }

    info!(copied = report.copied, skipped = report.skipped.len(), "Imported warps");
    Ok(report)
}
