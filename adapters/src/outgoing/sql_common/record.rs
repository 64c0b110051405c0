use std::collections::{BTreeSet, HashMap};
use tracing::warn;

use domain::{
    builder::WarpBuilder,
    error::DomainResult,
    ids::{GroupName, LIST_SEPARATOR, PlayerId, WarpId, WorldId},
    location::{Position, Rotation},
    warp::{Warp, WarpType, from_unix_millis},
};
use warpstore_application::error::{AppError, AppResult};

/// Column values of one warp row, before any domain validation.
#[derive(Debug, Clone, PartialEq)]
pub struct WarpRecord {
    pub id: i64,
    pub name: String,
    pub creator: String,
    pub world: String,
    pub x: f64,
    pub y: i64,
    pub z: f64,
    pub yaw: i64,
    pub pitch: i64,
    pub public_all: bool,
    pub permissions: Option<String>,
    pub group_permissions: Option<String>,
    pub welcome_message: String,
    pub visits: Option<i64>,
    pub creation_date: i64,
}

impl WarpRecord {
    /// `id` is `0` for warps that have not been stored yet.
    #[must_use]
    pub fn from_warp(warp: &Warp) -> Self {
        let position = warp.position();
        let rotation = warp.rotation();
        Self {
            id: warp.id().map_or(0, |id| id.value()),
            name: warp.name().to_string(),
            creator: warp.creator().to_string(),
            world: warp.world().to_string(),
            x: position.x,
            y: i64::from(position.y),
            z: position.z,
            yaw: i64::from(rotation.yaw),
            pitch: i64::from(rotation.pitch),
            public_all: warp.is_public(),
            permissions: Some(encode_players(warp.invited_players())),
            group_permissions: Some(encode_groups(warp.invited_groups())),
            welcome_message: warp.welcome_message().to_string(),
            visits: Some(i64::from(warp.visits())),
            creation_date: warp.creation_millis(),
        }
    }

    pub fn into_warp(self) -> AppResult<Warp> {
        let id = self.id;
        self.try_into_warp().map_err(|message| AppError::DecodeError {
            message: format!("row {id}: {message}"),
        })
    }

    fn try_into_warp(self) -> Result<Warp, String> {
        let y = narrow("y", self.y)?;
        let yaw = narrow("yaw", self.yaw)?;
        let pitch = narrow("pitch", self.pitch)?;
        let visits = u32::try_from(self.visits.unwrap_or(0))
            .map_err(|_| format!("visits {} out of range", self.visits.unwrap_or(0)))?;

        let creator = PlayerId::new(self.creator).map_err(|e| e.to_string())?;
        let world = WorldId::new(self.world).map_err(|e| e.to_string())?;
        let players = decode_list(self.permissions.as_deref(), PlayerId::new)
            .map_err(|e| e.to_string())?;
        let groups = decode_list(self.group_permissions.as_deref(), GroupName::new)
            .map_err(|e| e.to_string())?;
        let creation_date = from_unix_millis(self.creation_date).map_err(|e| e.to_string())?;

        WarpBuilder::new(
            self.name,
            creator,
            world,
            Position::new(self.x, y, self.z),
            Rotation::new(yaw, pitch),
        )
        .warp_type(WarpType::from_public_flag(self.public_all))
        .add_invited_players(players)
        .add_invited_groups(groups)
        .creation_date(creation_date)
        .visits(visits)
        .welcome_message(self.welcome_message)
        .build()
        .map(|warp| warp.with_id(WarpId::new(self.id)))
        .map_err(|e| e.to_string())
    }
}

fn narrow(column: &str, value: i64) -> Result<i16, String> {
    i16::try_from(value).map_err(|_| format!("{column} {value} out of range"))
}

#[must_use]
pub fn encode_players(players: &BTreeSet<PlayerId>) -> String {
    join(players.iter().map(PlayerId::as_str))
}

#[must_use]
pub fn encode_groups(groups: &BTreeSet<GroupName>) -> String {
    join(groups.iter().map(GroupName::as_str))
}

fn join<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.collect::<Vec<_>>().join(&LIST_SEPARATOR.to_string())
}

/// Splits a stored list column. Blank segments are ignored so that `""`,
/// `NULL` and trailing separators all decode cleanly.
pub fn decode_list<T>(
    raw: Option<&str>,
    parse: impl Fn(String) -> DomainResult<T>,
) -> DomainResult<Vec<T>> {
    raw.unwrap_or_default()
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| parse(segment.to_string()))
        .collect()
}

/// Turns raw rows into the name-keyed warp map. Rows that fail to decode
/// are logged and skipped.
pub fn collect_warps<I>(rows: I) -> HashMap<String, Warp>
where
    I: IntoIterator<Item = Result<WarpRecord, sqlx::Error>>,
{
    let mut warps = HashMap::new();
    let mut skipped = 0usize;

    for row in rows {
        let decoded = row
            .map_err(|e| AppError::DecodeError {
                message: e.to_string(),
            })
            .and_then(WarpRecord::into_warp);

        match decoded {
            Ok(warp) => {
                warps.insert(warp.name().to_string(), warp);
            }
            Err(e) => {
                skipped += 1;
                warn!(error = %e, "Skipping warp row that could not be decoded");
            }
        }
    }

    if skipped > 0 {
        warn!(loaded = warps.len(), skipped, "Loaded warps with undecodable rows");
    }

    warps
}
