use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml},
};
use std::path::Path;

use warpstore_application::error::{AppError, AppResult};
use warpstore_application::infrastructure_config::Config;

const TOML_FILE: &str = "warpstore.toml";
const JSON_FILE: &str = "warpstore.json";
const ENV_PREFIX: &str = "WARPSTORE_";

/// Layers defaults, the optional config files and `WARPSTORE_` variables,
/// in that order. An explicit `path` replaces the file lookup.
pub fn load_config(path: Option<&Path>) -> AppResult<Config> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    match path {
        Some(path) => {
            if !path.exists() {
                return Err(AppError::ConfigError {
                    message: format!("Config file {} does not exist", path.display()),
                });
            }
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("json") => figment.merge(Json::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }
        None => {
            if Path::new(TOML_FILE).exists() {
                figment = figment.merge(Toml::file(TOML_FILE));
            }
            if Path::new(JSON_FILE).exists() {
                figment = figment.merge(Json::file(JSON_FILE));
            }
        }
    }

    let config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| AppError::ConfigError {
            message: format!("Failed to load configuration: {e}"),
        })?;

    config.validate()?;
    Ok(config)
}
