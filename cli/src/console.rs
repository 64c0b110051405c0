use std::{
    env,
    io::{Write, stdout},
};

use domain::ids::{PlayerId, WorldId};
use warpstore_application::ports::outgoing::collaborators::{
    Actor, Game, LocaleManager, PlayerNameResolver,
};

/// Outside a running game there are no loaded worlds or known player
/// names, so identifiers are shown as stored.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineGame;

impl Game for OfflineGame {
    fn world_name(&self, _world: &WorldId) -> Option<String> {
        None
    }
}

impl PlayerNameResolver for OfflineGame {
    fn name_of(&self, _player: &PlayerId) -> Option<String> {
        None
    }
}

/// Locale taken from `LC_ALL`, `LC_TIME` or `LANG`, e.g. `de_DE.UTF-8`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvironmentLocale;

impl LocaleManager for EnvironmentLocale {
    fn locale(&self) -> String {
        ["LC_ALL", "LC_TIME", "LANG"]
            .into_iter()
            .filter_map(|var| env::var(var).ok())
            .find(|value| !value.is_empty() && value != "C" && value != "POSIX")
            .map_or_else(|| "en".to_string(), |value| parse_locale(&value))
    }
}

fn parse_locale(value: &str) -> String {
    value
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .to_string()
}

/// The operator at the terminal. Holds every permission and writes
/// messages to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleActor;

impl Actor for ConsoleActor {
    fn send_message(&self, message: &str) {
        writeln!(stdout().lock(), "{message}").ok();
    }

    fn has_permission(&self, _node: &str) -> bool {
        true
    }

    fn player_id(&self) -> Option<&PlayerId> {
        None
    }

    fn is_in_group(&self, _group: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_encoding_and_modifier() {
        assert_eq!(parse_locale("de_DE.UTF-8"), "de_DE");
        assert_eq!(parse_locale("sr_RS@latin"), "sr_RS");
        assert_eq!(parse_locale("en"), "en");
    }
}
