use std::collections::BTreeSet;
use time::OffsetDateTime;

use crate::error::DomainResult;
use crate::ids::{GroupName, PlayerId, WarpName, WorldId};
use crate::location::{Position, Rotation};
use crate::warp::{DEFAULT_WELCOME_MESSAGE, Warp, WarpType, truncate_to_millis};

/// Builds [`Warp`]s.
///
/// The required values are taken by [`WarpBuilder::new`]. Every optional
/// value has a default that [`WarpBuilder::build`] applies when unset:
///
/// | value           | default                     |
/// |-----------------|-----------------------------|
/// | creation date   | now, millisecond precision  |
/// | type            | [`WarpType::Public`]        |
/// | visits          | `0`                         |
/// | welcome message | [`DEFAULT_WELCOME_MESSAGE`] |
/// | invitations     | none                        |
#[derive(Debug, Clone)]
#[must_use]
pub struct WarpBuilder {
    name: String,
    creator: PlayerId,
    world: WorldId,
    position: Position,
    rotation: Rotation,
    invited_players: BTreeSet<PlayerId>,
    invited_groups: BTreeSet<GroupName>,
    creation_date: Option<OffsetDateTime>,
    warp_type: WarpType,
    visits: u32,
    welcome_message: Option<String>,
}

impl WarpBuilder {
    pub fn new(
        name: impl Into<String>,
        creator: PlayerId,
        world: WorldId,
        position: Position,
        rotation: Rotation,
    ) -> Self {
        Self {
            name: name.into(),
            creator,
            world,
            position,
            rotation,
            invited_players: BTreeSet::new(),
            invited_groups: BTreeSet::new(),
            creation_date: None,
            warp_type: WarpType::Public,
            visits: 0,
            welcome_message: None,
        }
    }

    pub fn creation_date(mut self, creation_date: OffsetDateTime) -> Self {
        self.creation_date = Some(creation_date);
        self
    }

    pub fn add_invited_player(mut self, player: PlayerId) -> Self {
        self.invited_players.insert(player);
        self
    }

    pub fn add_invited_players(mut self, players: impl IntoIterator<Item = PlayerId>) -> Self {
        self.invited_players.extend(players);
        self
    }

    pub fn add_invited_group(mut self, group: GroupName) -> Self {
        self.invited_groups.insert(group);
        self
    }

    pub fn add_invited_groups(mut self, groups: impl IntoIterator<Item = GroupName>) -> Self {
        self.invited_groups.extend(groups);
        self
    }

    pub fn warp_type(mut self, warp_type: WarpType) -> Self {
        self.warp_type = warp_type;
        self
    }

    pub fn visits(mut self, visits: u32) -> Self {
        self.visits = visits;
        self
    }

    pub fn welcome_message(mut self, welcome_message: impl Into<String>) -> Self {
        self.welcome_message = Some(welcome_message.into());
        self
    }

    pub fn build(self) -> DomainResult<Warp> {
        let name = WarpName::new(self.name)?;
        let creation_date =
            truncate_to_millis(self.creation_date.unwrap_or_else(OffsetDateTime::now_utc));

        Ok(Warp {
            id: None,
            name,
            creator: self.creator,
            world: self.world,
            position: self.position,
            rotation: self.rotation,
            warp_type: self.warp_type,
            invited_players: self.invited_players,
            invited_groups: self.invited_groups,
            creation_date,
            visits: self.visits,
            welcome_message: self
                .welcome_message
                .unwrap_or_else(|| DEFAULT_WELCOME_MESSAGE.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;
    use crate::ids::WarpId;
    use time::Duration;

    fn player(id: &str) -> PlayerId {
        PlayerId::new(id).expect("valid player id")
    }

    fn spawn_builder() -> WarpBuilder {
        WarpBuilder::new(
            "spawn",
            player("notch"),
            WorldId::new("overworld").expect("valid world id"),
            Position::new(0.0, 64, 0.0),
            Rotation::new(0, 0),
        )
    }

    #[test]
    fn build_applies_defaults() {
        let before = OffsetDateTime::now_utc() - Duration::seconds(1);
        let warp = spawn_builder().build().expect("warp builds");
        let after = OffsetDateTime::now_utc() + Duration::seconds(1);

        assert_eq!(warp.id(), None);
        assert_eq!(warp.visits(), 0);
        assert_eq!(warp.warp_type(), WarpType::Public);
        assert_eq!(warp.welcome_message(), DEFAULT_WELCOME_MESSAGE);
        assert!(warp.invited_players().is_empty());
        assert!(warp.invited_groups().is_empty());
        assert!(warp.creation_date() >= before && warp.creation_date() <= after);
        assert_eq!(warp.creation_date().nanosecond() % 1_000_000, 0);
    }

    #[test]
    fn inviting_the_same_player_twice_keeps_one_entry() {
        let warp = spawn_builder()
            .add_invited_player(player("alex"))
            .add_invited_player(player("alex"))
            .build()
            .expect("warp builds");

        assert_eq!(warp.invited_players().len(), 1);
        assert!(warp.is_player_invited(&player("alex")));
    }

    #[test]
    fn bulk_invitations_merge_with_single_ones() {
        let warp = spawn_builder()
            .add_invited_player(player("alex"))
            .add_invited_players([player("steve"), player("alex")])
            .add_invited_group(GroupName::new("mods").expect("valid group"))
            .add_invited_groups([
                GroupName::new("mods").expect("valid group"),
                GroupName::new("vip").expect("valid group"),
            ])
            .build()
            .expect("warp builds");

        assert_eq!(warp.invited_players().len(), 2);
        assert_eq!(warp.invited_groups().len(), 2);
        assert!(warp.is_group_invited("vip"));
        assert!(!warp.is_group_invited("guests"));
    }

    #[test]
    fn optional_values_override_defaults() {
        let created = OffsetDateTime::from_unix_timestamp(1_400_000_000).expect("valid timestamp");
        let warp = spawn_builder()
            .creation_date(created)
            .warp_type(WarpType::Private)
            .visits(12)
            .welcome_message("Hi %player%, this is %warp%")
            .build()
            .expect("warp builds");

        assert_eq!(warp.creation_date(), created);
        assert!(!warp.is_public());
        assert_eq!(warp.visits(), 12);
        assert_eq!(warp.render_welcome_message("alex"), "Hi alex, this is spawn");
    }

    #[test]
    fn empty_name_is_rejected() {
        let result = WarpBuilder::new(
            "",
            player("notch"),
            WorldId::new("overworld").expect("valid world id"),
            Position::new(0.0, 0, 0.0),
            Rotation::default(),
        )
        .build();

        assert!(matches!(result, Err(DomainError::InvalidName(_))));
    }

    #[test]
    fn visits_per_day_uses_raw_count_for_young_warps() {
        let now = OffsetDateTime::now_utc();
        let young = spawn_builder()
            .creation_date(now - Duration::hours(3))
            .visits(7)
            .build()
            .expect("warp builds");
        let old = spawn_builder()
            .creation_date(now - Duration::days(4))
            .visits(8)
            .build()
            .expect("warp builds");

        assert!((young.visits_per_day(now) - 7.0).abs() < f64::EPSILON);
        assert!((old.visits_per_day(now) - 2.0).abs() < 0.001);
    }

    #[test]
    fn with_id_keeps_every_other_field() {
        let warp = spawn_builder().visits(3).build().expect("warp builds");
        let stored = warp.clone().with_id(WarpId::new(42));

        assert_eq!(stored.id(), Some(WarpId::new(42)));
        assert_eq!(stored.clone().with_id(WarpId::new(1)).visits(), 3);
        assert_eq!(Warp { id: None, ..stored }, warp);
    }
}
