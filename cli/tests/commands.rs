use tempfile::TempDir;
use time::macros::datetime;

use domain::{
    builder::WarpBuilder,
    ids::{GroupName, PlayerId, WorldId},
    location::{Position, Rotation},
    warp::{Warp, WarpType},
};
use warpstore_adapters::outgoing::sqlite_sqlx::data_connection_sqlite::SqliteDataConnection;
use warpstore_application::{
    error::AppError,
    infrastructure_config::{Config, SqliteConfig, StorageBackend},
    ports::outgoing::{collaborators::LocaleManager, data_connection::DataConnection},
};
use warpstore_cli::{
    args::{BackendArg, Command},
    commands::{self, ImportReport},
};

struct FixedLocale;

impl LocaleManager for FixedLocale {
    fn locale(&self) -> String {
        "en-US".to_string()
    }
}

async fn open(dir: &TempDir, file: &str, manage_schema: bool) -> SqliteDataConnection {
    let config = SqliteConfig {
        path: dir.path().join(file),
        manage_schema,
    };
    SqliteDataConnection::open(&config, None)
        .await
        .expect("sqlite connection opens")
}

fn warp(name: &str) -> Warp {
    WarpBuilder::new(
        name,
        PlayerId::new("uuid-notch").expect("valid player id"),
        WorldId::new("overworld").expect("valid world id"),
        Position::new(10.5, 64, -3.5),
        Rotation::new(90, 0),
    )
    .warp_type(WarpType::Private)
    .add_invited_group(GroupName::new("vip").expect("valid group"))
    .creation_date(datetime!(2024-03-05 14:07 UTC))
    .visits(4)
    .build()
    .expect("warp builds")
}

#[tokio::test]
async fn check_schema_reports_missing_table_without_failing_the_call() {
    let dir = TempDir::new().expect("tempdir");
    let conn = open(&dir, "warps.db", false).await;

    let outcome = commands::check_schema(&conn, false).await.expect("check runs");
    assert!(!outcome.success);
    assert!(outcome.message.contains("--create"));

    let outcome = commands::check_schema(&conn, true).await.expect("check runs");
    assert!(outcome.success);

    let outcome = commands::migrate(&conn, false).await.expect("migrate runs");
    assert_eq!(outcome.message, "No schema changes pending.");
}

#[tokio::test]
async fn list_renders_text_and_json() {
    let dir = TempDir::new().expect("tempdir");
    let conn = open(&dir, "warps.db", true).await;
    conn.create(warp("mall")).await.expect("create");
    conn.create(warp("arena")).await.expect("create");

    let text = commands::list(&conn, false).await.expect("list");
    assert_eq!(
        text,
        "arena [private] by uuid-notch in overworld at (10, 64, -4) (4 visits)\n\
         mall [private] by uuid-notch in overworld at (10, 64, -4) (4 visits)"
    );

    let json = commands::list(&conn, true).await.expect("list");
    let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    assert_eq!(parsed[0]["name"], "arena");
    assert_eq!(parsed[0]["visibility"], "private");
    assert_eq!(parsed[0]["invited_groups"][0], "vip");
    assert_eq!(parsed[0]["creation_date"], "2024-03-05T14:07:00Z");
}

#[tokio::test]
async fn info_prints_the_full_summary_for_the_console() {
    let dir = TempDir::new().expect("tempdir");
    let conn = open(&dir, "warps.db", true).await;
    conn.create(warp("mall")).await.expect("create");

    let text = commands::info_text(&conn, "mall", &FixedLocale)
        .await
        .expect("info");
    assert!(text.starts_with("Information about 'mall':\nCreated by: uuid-notch\n"));
    assert!(text.contains("Invited groups: vip"));
    assert!(text.contains("Creation date: 3/5/24, 2:07 PM"));

    let missing = commands::info_text(&conn, "nowhere", &FixedLocale).await;
    assert!(matches!(missing, Err(AppError::UnknownWarp { name }) if name == "nowhere"));
}

#[tokio::test]
async fn import_skips_names_already_present() {
    let dir = TempDir::new().expect("tempdir");
    let source = open(&dir, "source.db", true).await;
    let target = open(&dir, "target.db", true).await;

    source.create(warp("arena")).await.expect("create");
    source.create(warp("mall")).await.expect("create");
    target.create(warp("mall")).await.expect("create");

    let report = commands::import(&source, &target).await.expect("import");

    assert_eq!(
        report,
        ImportReport {
            copied: 1,
            skipped: vec!["mall".to_string()],
        }
    );
    let stored = target.load_all().await.expect("load");
    assert_eq!(stored.len(), 2);
    assert_eq!(
        stored.get("arena").map(Warp::invited_groups),
        Some(warp("arena").invited_groups())
    );
}

#[tokio::test]
async fn run_opens_and_closes_the_configured_backend() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = Config::default();
    config.storage.sqlite.path = dir.path().join("warps.db");

    let outcome = commands::run(Command::List { json: false }, &config, StorageBackend::Sqlite)
        .await
        .expect("list runs");
    assert_eq!(outcome.message, "No warps stored.");

    let conn = open(&dir, "warps.db", true).await;
    assert!(conn.load_all().await.expect("load").is_empty());
}

#[tokio::test]
async fn import_refuses_identical_backends() {
    let config = Config::default();
    let command = Command::Import {
        from: BackendArg::Sqlite,
        to: BackendArg::Sqlite,
    };

    let result = commands::run(command, &config, StorageBackend::Sqlite).await;

    assert!(matches!(result, Err(AppError::ConfigError { .. })));
}

#[tokio::test]
async fn run_dispatches_single_backend_commands() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = Config::default();
    config.storage.sqlite.path = dir.path().join("warps.db");

    let checked = commands::run(Command::CheckSchema { create: true }, &config, StorageBackend::Sqlite)
        .await
        .expect("check runs");
    assert!(checked.success);

    let migrated = commands::run(Command::Migrate { apply: false }, &config, StorageBackend::Sqlite)
        .await
        .expect("migrate runs");
    assert_eq!(migrated.message, "No schema changes pending.");

    let info = commands::run(
        Command::Info {
            name: "nowhere".to_string(),
        },
        &config,
        StorageBackend::Sqlite,
    )
    .await;
    assert!(matches!(info, Err(AppError::UnknownWarp { name }) if name == "nowhere"));
}
