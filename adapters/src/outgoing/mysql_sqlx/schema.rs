use std::collections::HashMap;

use crate::outgoing::sql_common::statements::TableName;

/// Column name to lower-cased data type, as reported by
/// `information_schema.columns`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableLayout {
    columns: HashMap<String, String>,
}

impl TableLayout {
    pub fn new(columns: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, data_type)| (name, data_type.to_ascii_lowercase()))
                .collect(),
        }
    }

    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    #[must_use]
    pub fn data_type(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }
}

const NARROW_INTEGER_TYPES: [&str; 3] = ["tinyint", "smallint", "mediumint"];

/// The changes earlier releases left behind. Each step decides for itself
/// whether it is still needed, so they may be evaluated in any order and
/// re-run safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStep {
    NarrowY,
    AddGroupPermissions,
    AddVisits,
    WidenVisits,
    AddCreationDate,
}

impl SchemaStep {
    pub const ALL: [Self; 5] = [
        Self::NarrowY,
        Self::AddGroupPermissions,
        Self::AddVisits,
        Self::WidenVisits,
        Self::AddCreationDate,
    ];

    #[must_use]
    pub fn is_pending(self, layout: &TableLayout) -> bool {
        match self {
            Self::NarrowY => layout
                .data_type("y")
                .is_some_and(|data_type| data_type != "smallint"),
            Self::AddGroupPermissions => !layout.has_column("groupPermissions"),
            Self::AddVisits => !layout.has_column("visits"),
            Self::WidenVisits => layout
                .data_type("visits")
                .is_some_and(|data_type| NARROW_INTEGER_TYPES.contains(&data_type)),
            Self::AddCreationDate => !layout.has_column("creationDate"),
        }
    }

    #[must_use]
    pub fn statements(self, table: &TableName) -> Vec<String> {
        match self {
            Self::NarrowY => vec![format!(
                "ALTER TABLE `{table}` MODIFY `y` smallint NOT NULL DEFAULT 0"
            )],
            Self::AddGroupPermissions => vec![format!(
                "ALTER TABLE `{table}` ADD COLUMN `groupPermissions` text NOT NULL"
            )],
            Self::AddVisits => vec![format!(
                "ALTER TABLE `{table}` ADD COLUMN `visits` int NOT NULL DEFAULT 0"
            )],
            Self::WidenVisits => vec![format!(
                "ALTER TABLE `{table}` MODIFY `visits` int DEFAULT 0"
            )],
            Self::AddCreationDate => vec![
                format!(
                    "ALTER TABLE `{table}` ADD COLUMN `creationDate` BIGINT NOT NULL DEFAULT 0"
                ),
                format!(
                    "UPDATE `{table}` SET `creationDate` = UNIX_TIMESTAMP() * 1000 WHERE `creationDate` = 0"
                ),
            ],
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::NarrowY => "narrow y to smallint",
            Self::AddGroupPermissions => "add groupPermissions",
            Self::AddVisits => "add visits",
            Self::WidenVisits => "widen visits to int",
            Self::AddCreationDate => "add creationDate",
        }
    }
}

#[must_use]
pub fn pending_steps(layout: &TableLayout) -> Vec<SchemaStep> {
    SchemaStep::ALL
        .into_iter()
        .filter(|step| step.is_pending(layout))
        .collect()
}

#[must_use]
pub fn create_table(table: &TableName) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS `{table}` (\
         `id` INTEGER NOT NULL AUTO_INCREMENT PRIMARY KEY, \
         `name` varchar(32) NOT NULL DEFAULT 'warp', \
         `creator` varchar(36), \
         `world` varchar(36), \
         `x` DOUBLE, \
         `y` smallint, \
         `z` DOUBLE, \
         `yaw` smallint, \
         `pitch` smallint, \
         `publicAll` boolean NOT NULL DEFAULT 1, \
         `permissions` text, \
         `groupPermissions` text NOT NULL, \
         `welcomeMessage` varchar(100) NOT NULL DEFAULT '', \
         `visits` int NOT NULL DEFAULT 0, \
         `creationDate` BIGINT NOT NULL DEFAULT 0, \
         UNIQUE KEY `name` (`name`))"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(columns: &[(&str, &str)]) -> TableLayout {
        TableLayout::new(
            columns
                .iter()
                .map(|(name, data_type)| ((*name).to_string(), (*data_type).to_string())),
        )
    }

    fn current() -> Vec<(&'static str, &'static str)> {
        vec![
            ("id", "int"),
            ("name", "varchar"),
            ("y", "smallint"),
            ("groupPermissions", "text"),
            ("visits", "int"),
            ("creationDate", "bigint"),
        ]
    }

    #[test]
    fn current_layout_needs_nothing() {
        assert!(pending_steps(&layout(&current())).is_empty());
    }

    #[test]
    fn baseline_layout_needs_every_addition() {
        let baseline = layout(&[("id", "int"), ("name", "varchar"), ("y", "INT")]);

        assert_eq!(
            pending_steps(&baseline),
            vec![
                SchemaStep::NarrowY,
                SchemaStep::AddGroupPermissions,
                SchemaStep::AddVisits,
                SchemaStep::AddCreationDate,
            ]
        );
    }

    #[test]
    fn steps_are_judged_independently() {
        let mut columns = current();
        columns.retain(|(name, _)| *name != "groupPermissions");
        columns.push(("visits", "tinyint"));

        assert_eq!(
            pending_steps(&layout(&columns)),
            vec![SchemaStep::AddGroupPermissions, SchemaStep::WidenVisits]
        );
    }

    #[test]
    fn widen_visits_is_not_pending_without_the_column() {
        let columns = layout(&[("y", "smallint")]);

        assert!(!SchemaStep::WidenVisits.is_pending(&columns));
        assert!(SchemaStep::AddVisits.is_pending(&columns));
    }

    #[test]
    fn creation_date_step_backfills_existing_rows() {
        let table = TableName::new("warpTable").expect("valid table name");
        let statements = SchemaStep::AddCreationDate.statements(&table);

        assert_eq!(statements.len(), 2);
        assert!(statements.iter().any(|s| s.contains("UNIX_TIMESTAMP() * 1000")));
    }

    #[test]
    fn create_table_declares_identity_and_unique_name() {
        let sql = create_table(&TableName::new("mywarp_warps").expect("valid table name"));

        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS `mywarp_warps`"));
        assert!(sql.contains("AUTO_INCREMENT PRIMARY KEY"));
        assert!(sql.contains("UNIQUE KEY `name` (`name`)"));
    }
}
