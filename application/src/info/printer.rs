use std::fmt::Write as _;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::authorization::AuthorizationResolver;
use crate::ports::outgoing::collaborators::{Actor, Game, LocaleManager, PlayerNameResolver};
use domain::{ids::PlayerId, warp::Warp};

const US_DATE_TIME: &[BorrowedFormatItem<'static>] = format_description!(
    "[month padding:none]/[day padding:none]/[year repr:last_two], [hour repr:12 padding:none]:[minute] [period]"
);
const DAY_FIRST_DATE_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[day]/[month]/[year repr:last_two] [hour]:[minute]");
const DOTTED_DATE_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[day].[month].[year repr:last_two] [hour]:[minute]");
const ISO_DATE_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

/// Renders the human readable summary of a single warp.
///
/// Invitation lists are only included when the receiver may modify the
/// warp.
pub struct InfoPrinter<'a> {
    warp: &'a Warp,
    resolver: &'a dyn AuthorizationResolver,
    game: &'a dyn Game,
    names: &'a dyn PlayerNameResolver,
    locale: &'a dyn LocaleManager,
}

impl<'a> InfoPrinter<'a> {
    pub fn new(
        warp: &'a Warp,
        resolver: &'a dyn AuthorizationResolver,
        game: &'a dyn Game,
        names: &'a dyn PlayerNameResolver,
        locale: &'a dyn LocaleManager,
    ) -> Self {
        Self {
            warp,
            resolver,
            game,
            names,
            locale,
        }
    }

    pub fn print(&self, receiver: &dyn Actor) {
        receiver.send_message(&self.text(receiver));
    }

    #[must_use]
    pub fn text(&self, receiver: &dyn Actor) -> String {
        self.text_at(receiver, OffsetDateTime::now_utc())
    }

    #[must_use]
    pub fn text_at(&self, receiver: &dyn Actor, now: OffsetDateTime) -> String {
        let warp = self.warp;
        let mut info = String::new();

        writeln!(info, "Information about '{}':", warp.name()).ok();

        write!(info, "Created by: {}", self.player_name(warp.creator())).ok();
        if receiver
            .player_id()
            .is_some_and(|player| warp.is_creator(player))
        {
            info.push_str(" (you)");
        }
        info.push('\n');

        let position = warp.position();
        writeln!(
            info,
            "Location: {}, {}, {} in '{}'",
            position.floor_x(),
            position.y,
            position.floor_z(),
            self.world_name(warp)
        )
        .ok();

        if self.resolver.is_modifiable(warp, receiver) {
            let players: Vec<String> = warp
                .invited_players()
                .iter()
                .map(|player| self.player_name(player))
                .collect();
            writeln!(info, "Invited players: {}", join_or_dash(players)).ok();

            let groups: Vec<String> = warp
                .invited_groups()
                .iter()
                .map(ToString::to_string)
                .collect();
            writeln!(info, "Invited groups: {}", join_or_dash(groups)).ok();
        }

        writeln!(
            info,
            "Creation date: {}",
            format_creation_date(warp.creation_date(), &self.locale.locale())
        )
        .ok();

        write!(
            info,
            "Visits: {} times ({:.2} per day)",
            warp.visits(),
            warp.visits_per_day(now)
        )
        .ok();

        info
    }

    fn player_name(&self, player: &PlayerId) -> String {
        self.names
            .name_of(player)
            .unwrap_or_else(|| player.to_string())
    }

    fn world_name(&self, warp: &Warp) -> String {
        self.game
            .world_name(warp.world())
            .unwrap_or_else(|| warp.world().to_string())
    }
}

fn join_or_dash(mut values: Vec<String>) -> String {
    if values.is_empty() {
        return "-".to_string();
    }
    values.sort();
    values.join(", ")
}

/// Formats `date` in the short date-time style of `locale`. Dates are
/// rendered in UTC.
#[must_use]
pub fn format_creation_date(date: OffsetDateTime, locale: &str) -> String {
    let mut parts = locale.split(['-', '_']);
    let language = parts.next().unwrap_or_default().to_ascii_lowercase();
    let region = parts.next().unwrap_or_default().to_ascii_uppercase();

    let format = match (language.as_str(), region.as_str()) {
        ("en", "" | "US") => US_DATE_TIME,
        ("en" | "fr" | "es" | "it" | "pt", _) => DAY_FIRST_DATE_TIME,
        ("de" | "ru" | "pl" | "cs" | "fi" | "nb", _) => DOTTED_DATE_TIME,
        _ => ISO_DATE_TIME,
    };

    date.format(format)
        .unwrap_or_else(|_| date.unix_timestamp().to_string())
}
