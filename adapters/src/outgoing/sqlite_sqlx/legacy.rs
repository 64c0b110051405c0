use std::collections::HashMap;

const BASELINE_COLUMNS: [&str; 12] = [
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
    "welcomeMessage",
];

/// Columns added by migrations 3, 4 and 5, keyed by the version that added them.
const ADDED_COLUMNS: [(i64, &str); 3] = [(3, "groupPermissions"), (4, "visits"), (5, "creationDate")];

const SEQUENCED_VERSION: i64 = 6;

/// Shape of a `warpTable` that exists without any migration history, as
/// reported by `pragma_table_info` and the table's `CREATE` text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyLayout {
    columns: HashMap<String, String>,
    sequenced: bool,
}

impl LegacyLayout {
    pub fn new(columns: impl IntoIterator<Item = (String, String)>, create_sql: &str) -> Self {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, declared)| (name, declared.to_ascii_uppercase()))
                .collect(),
            sequenced: create_sql.to_ascii_uppercase().contains("AUTOINCREMENT"),
        }
    }

    fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Highest migration version this layout already satisfies.
    ///
    /// Layouts no release ever produced are rejected so they are never
    /// rebuilt from the wrong column set.
    pub fn matched_version(&self) -> Result<i64, String> {
        if let Some(missing) = BASELINE_COLUMNS.iter().find(|c| !self.has_column(c)) {
            return Err(format!("column '{missing}' is missing"));
        }

        let narrowed = self.columns.get("y").is_some_and(|t| t == "SMALLINT");
        let mut version = if narrowed { 2 } else { 1 };

        for (added_in, column) in ADDED_COLUMNS {
            if !self.has_column(column) {
                continue;
            }
            if version != added_in - 1 {
                return Err(format!(
                    "column '{column}' is present without the changes that precede it"
                ));
            }
            version = added_in;
        }

        if self.sequenced {
            if version != SEQUENCED_VERSION - 1 {
                return Err("ids are sequenced but columns are missing".to_string());
            }
            version = SEQUENCED_VERSION;
        }

        Ok(version)
    }
}
