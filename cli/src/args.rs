use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use warpstore_application::infrastructure_config::StorageBackend;

#[derive(Debug, Parser)]
#[command(name = "warpstore")]
#[command(about = "Inspect, migrate and copy warp storage")]
pub struct Cli {
    /// Config file to use instead of `warpstore.toml` / `warpstore.json`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend to operate on; defaults to `storage.backend`.
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendArg>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Verify that the warp table exists.
    CheckSchema {
        #[arg(long)]
        create: bool,
    },
    /// Report or apply pending schema changes.
    Migrate {
        #[arg(long)]
        apply: bool,
    },
    /// List every stored warp.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show the details of one warp.
    Info { name: String },
    /// Copy every warp from one backend to the other.
    Import {
        #[arg(long, value_enum)]
        from: BackendArg,
        #[arg(long, value_enum)]
        to: BackendArg,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Sqlite,
    Mysql,
}

impl From<BackendArg> for StorageBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Sqlite => Self::Sqlite,
            BackendArg::Mysql => Self::Mysql,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_import_between_backends() {
        let cli = Cli::try_parse_from(["warpstore", "import", "--from", "sqlite", "--to", "mysql"])
            .expect("arguments parse");

        match cli.command {
            Command::Import { from, to } => {
                assert_eq!(StorageBackend::from(from), StorageBackend::Sqlite);
                assert_eq!(StorageBackend::from(to), StorageBackend::Mysql);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["warpstore", "list", "--json", "--backend", "mysql"])
            .expect("arguments parse");

        assert_eq!(cli.backend, Some(BackendArg::Mysql));
        assert!(matches!(cli.command, Command::List { json: true }));
    }
}
