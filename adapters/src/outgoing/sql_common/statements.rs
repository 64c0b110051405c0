use std::{collections::BTreeSet, fmt};

use domain::{
    ids::{GroupName, PlayerId, WarpId, WorldId},
    location::{Position, Rotation},
    warp::WarpType,
};
use warpstore_application::{
    error::{AppError, AppResult},
    infrastructure_config::{MAX_TABLE_NAME_LENGTH, is_valid_table_name},
};

use super::record::{WarpRecord, encode_groups, encode_players};

/// Column list shared by every select and insert, in bind order.
pub const WARP_COLUMNS: [&str; 15] = [
    "id",
    "name",
    "creator",
    "world",
    "x",
    "y",
    "z",
    "yaw",
    "pitch",
    "publicAll",
    "permissions",
    "groupPermissions",
    "welcomeMessage",
    "visits",
    "creationDate",
];

/// A table name that is safe to splice into SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> AppResult<Self> {
        let name = name.into();
        if !is_valid_table_name(&name) {
            return Err(AppError::ConfigError {
                message: format!(
                    "table name '{name}' must be 1-{MAX_TABLE_NAME_LENGTH} ASCII letters, digits or '_'"
                ),
            });
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bindable column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Real(f64),
    Text(String),
    Bool(bool),
}

/// SQL text together with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// SQL understood by both the SQLite and the MySQL driver: `?`
/// placeholders and backtick quoted identifiers.
#[derive(Debug, Clone)]
pub struct WarpStatements {
    table: TableName,
}

impl WarpStatements {
    pub fn new(table: TableName) -> Self {
        Self { table }
    }

    #[must_use]
    pub fn table(&self) -> &TableName {
        &self.table
    }

    #[must_use]
    pub fn select_all(&self) -> String {
        format!("SELECT {} FROM `{}`", quoted(&WARP_COLUMNS), self.table)
    }

    /// Inserts every column except the identity, which the backend assigns.
    #[must_use]
    pub fn insert(&self, record: &WarpRecord) -> Statement {
        let columns = WARP_COLUMNS.get(1..).unwrap_or_default();
        let placeholders = vec!["?"; columns.len()].join(", ");
        Statement {
            sql: format!(
                "INSERT INTO `{}` ({}) VALUES ({placeholders})",
                self.table,
                quoted(columns)
            ),
            values: vec![
                SqlValue::Text(record.name.clone()),
                SqlValue::Text(record.creator.clone()),
                SqlValue::Text(record.world.clone()),
                SqlValue::Real(record.x),
                SqlValue::Int(record.y),
                SqlValue::Real(record.z),
                SqlValue::Int(record.yaw),
                SqlValue::Int(record.pitch),
                SqlValue::Bool(record.public_all),
                SqlValue::Text(record.permissions.clone().unwrap_or_default()),
                SqlValue::Text(record.group_permissions.clone().unwrap_or_default()),
                SqlValue::Text(record.welcome_message.clone()),
                SqlValue::Int(record.visits.unwrap_or_default()),
                SqlValue::Int(record.creation_date),
            ],
        }
    }

    #[must_use]
    pub fn delete(&self, id: WarpId) -> Statement {
        Statement {
            sql: format!("DELETE FROM `{}` WHERE `id` = ?", self.table),
            values: vec![SqlValue::Int(id.value())],
        }
    }

    #[must_use]
    pub fn update_visibility(&self, id: WarpId, warp_type: WarpType) -> Statement {
        self.update(id, &["publicAll"], vec![SqlValue::Bool(warp_type.is_public())])
    }

    #[must_use]
    pub fn update_creator(&self, id: WarpId, creator: &PlayerId) -> Statement {
        self.update(id, &["creator"], vec![SqlValue::Text(creator.to_string())])
    }

    #[must_use]
    pub fn update_location(
        &self,
        id: WarpId,
        world: &WorldId,
        position: Position,
        rotation: Rotation,
    ) -> Statement {
        self.update(
            id,
            &["world", "x", "y", "z", "yaw", "pitch"],
            vec![
                SqlValue::Text(world.to_string()),
                SqlValue::Real(position.x),
                SqlValue::Int(i64::from(position.y)),
                SqlValue::Real(position.z),
                SqlValue::Int(i64::from(rotation.yaw)),
                SqlValue::Int(i64::from(rotation.pitch)),
            ],
        )
    }

    #[must_use]
    pub fn update_permissions(&self, id: WarpId, players: &BTreeSet<PlayerId>) -> Statement {
        self.update(
            id,
            &["permissions"],
            vec![SqlValue::Text(encode_players(players))],
        )
    }

    #[must_use]
    pub fn update_group_permissions(&self, id: WarpId, groups: &BTreeSet<GroupName>) -> Statement {
        self.update(
            id,
            &["groupPermissions"],
            vec![SqlValue::Text(encode_groups(groups))],
        )
    }

    /// Rows already holding a higher count are left untouched.
    #[must_use]
    pub fn update_visits(&self, id: WarpId, visits: u32) -> Statement {
        let visits = i64::from(visits);
        Statement {
            sql: format!(
                "UPDATE `{}` SET `visits` = ? WHERE `id` = ? AND (`visits` IS NULL OR `visits` <= ?)",
                self.table
            ),
            values: vec![
                SqlValue::Int(visits),
                SqlValue::Int(id.value()),
                SqlValue::Int(visits),
            ],
        }
    }

    #[must_use]
    pub fn update_welcome_message(&self, id: WarpId, message: &str) -> Statement {
        self.update(
            id,
            &["welcomeMessage"],
            vec![SqlValue::Text(message.to_string())],
        )
    }

    fn update(&self, id: WarpId, columns: &[&str], mut values: Vec<SqlValue>) -> Statement {
        let assignments = columns
            .iter()
            .map(|c| format!("`{c}` = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        values.push(SqlValue::Int(id.value()));
        Statement {
            sql: format!("UPDATE `{}` SET {assignments} WHERE `id` = ?", self.table),
            values,
        }
    }
}

fn quoted(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("`{c}`"))
        .collect::<Vec<_>>()
        .join(", ")
}
