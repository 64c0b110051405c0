//! Host-side collaborators the core talks to but does not implement.

use domain::ids::{PlayerId, WorldId};

pub trait Game: Send + Sync {
    /// Display name of a loaded world, if the game knows it.
    fn world_name(&self, world: &WorldId) -> Option<String>;
}

pub trait PlayerNameResolver: Send + Sync {
    fn name_of(&self, player: &PlayerId) -> Option<String>;
}

/// Something that can receive messages and hold permissions, a player or
/// the console.
pub trait Actor: Send + Sync {
    fn send_message(&self, message: &str);

    fn has_permission(&self, node: &str) -> bool;

    /// `None` for actors that are not players.
    fn player_id(&self) -> Option<&PlayerId>;

    fn is_in_group(&self, group: &str) -> bool;
}

pub trait LocaleManager: Send + Sync {
    /// BCP 47 style tag such as `en-US` or `de-DE`.
    fn locale(&self) -> String;
}
