use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use time::{Duration, OffsetDateTime};

use crate::error::{DomainError, DomainResult};
use crate::ids::{GroupName, PlayerId, WarpId, WarpName, WorldId};
use crate::location::{Position, Rotation};

/// Welcome message used when none is configured for a warp.
pub const DEFAULT_WELCOME_MESSAGE: &str = "Welcome to '%warp%'!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WarpType {
    #[default]
    #[serde(rename = "public")]
    Public,
    #[serde(rename = "private")]
    Private,
}

impl WarpType {
    #[must_use]
    pub fn from_public_flag(public_all: bool) -> Self {
        if public_all { Self::Public } else { Self::Private }
    }

    #[must_use]
    pub fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }
}

impl fmt::Display for WarpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Private => f.write_str("private"),
        }
    }
}

/// A named, owned, location-bound record with visibility and invitation
/// metadata.
///
/// Values are immutable once built. Changes are issued as field-scoped
/// updates against storage and picked up again on the next load.
#[derive(Debug, Clone, PartialEq)]
pub struct Warp {
    pub(crate) id: Option<WarpId>,
    pub(crate) name: WarpName,
    pub(crate) creator: PlayerId,
    pub(crate) world: WorldId,
    pub(crate) position: Position,
    pub(crate) rotation: Rotation,
    pub(crate) warp_type: WarpType,
    pub(crate) invited_players: BTreeSet<PlayerId>,
    pub(crate) invited_groups: BTreeSet<GroupName>,
    pub(crate) creation_date: OffsetDateTime,
    pub(crate) visits: u32,
    pub(crate) welcome_message: String,
}

impl Warp {
    #[must_use]
    pub fn with_id(mut self, id: WarpId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn id(&self) -> Option<WarpId> {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    #[must_use]
    pub fn creator(&self) -> &PlayerId {
        &self.creator
    }

    #[must_use]
    pub fn world(&self) -> &WorldId {
        &self.world
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    #[must_use]
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    #[must_use]
    pub fn warp_type(&self) -> WarpType {
        self.warp_type
    }

    #[must_use]
    pub fn invited_players(&self) -> &BTreeSet<PlayerId> {
        &self.invited_players
    }

    #[must_use]
    pub fn invited_groups(&self) -> &BTreeSet<GroupName> {
        &self.invited_groups
    }

    #[must_use]
    pub fn creation_date(&self) -> OffsetDateTime {
        self.creation_date
    }

    #[must_use]
    pub fn visits(&self) -> u32 {
        self.visits
    }

    #[must_use]
    pub fn welcome_message(&self) -> &str {
        &self.welcome_message
    }

    #[must_use]
    pub fn is_public(&self) -> bool {
        self.warp_type.is_public()
    }

    #[must_use]
    pub fn is_creator(&self, player: &PlayerId) -> bool {
        &self.creator == player
    }

    #[must_use]
    pub fn is_player_invited(&self, player: &PlayerId) -> bool {
        self.invited_players.contains(player)
    }

    #[must_use]
    pub fn is_group_invited(&self, group: &str) -> bool {
        self.invited_groups.iter().any(|g| g.as_str() == group)
    }

    /// Average visits per day since creation. Warps younger than a day
    /// report their raw visit count.
    #[must_use]
    pub fn visits_per_day(&self, now: OffsetDateTime) -> f64 {
        let age = now - self.creation_date;
        let days = age.as_seconds_f64() / Duration::DAY.as_seconds_f64();
        if days < 1.0 {
            return f64::from(self.visits);
        }
        f64::from(self.visits) / days
    }

    /// Replaces `%warp%`, `%player%` and `%visits%` in the welcome message.
    #[must_use]
    pub fn render_welcome_message(&self, player_name: &str) -> String {
        self.welcome_message
            .replace("%warp%", self.name())
            .replace("%player%", player_name)
            .replace("%visits%", &self.visits.to_string())
    }

    /// Creation date as unix milliseconds, the persisted representation.
    #[must_use]
    pub fn creation_millis(&self) -> i64 {
        to_unix_millis(self.creation_date)
    }
}

impl fmt::Display for Warp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[must_use]
pub fn to_unix_millis(timestamp: OffsetDateTime) -> i64 {
    (timestamp.unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn from_unix_millis(millis: i64) -> DomainResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|e| DomainError::InvalidTimestamp(format!("{millis}: {e}")))
}

/// Drops sub-millisecond precision so values survive a storage round trip.
#[must_use]
pub fn truncate_to_millis(timestamp: OffsetDateTime) -> OffsetDateTime {
    from_unix_millis(to_unix_millis(timestamp)).unwrap_or(timestamp)
}
