use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DomainError, DomainResult};

/// Separator used when identifier sets are stored as a single column.
pub const LIST_SEPARATOR: char = ',';

/// Storage identity of a persisted warp, assigned by the backend on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WarpId(pub i64);

impl WarpId {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for WarpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WarpName(String);

impl WarpName {
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::InvalidName(
                "warp names must not be empty".to_string(),
            ));
        }
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WarpName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_list_member(kind: &'static str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::InvalidIdentifier {
            kind,
            value: value.to_string(),
            reason: "must not be empty",
        });
    }
    if value.contains(LIST_SEPARATOR) {
        return Err(DomainError::InvalidIdentifier {
            kind,
            value: value.to_string(),
            reason: "must not contain ','",
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        validate_list_member("player", &id)?;
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupName(String);

impl GroupName {
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        validate_list_member("group", &name)?;
        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of the game world a warp is located in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorldId(String);

impl WorldId {
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidIdentifier {
                kind: "world",
                value: id,
                reason: "must not be empty",
            });
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_names() {
        assert!(WarpName::new("").is_err());
        assert!(WarpName::new("   ").is_err());
        assert_eq!(WarpName::new("spawn").map(|n| n.to_string()), Ok("spawn".to_string()));
    }

    #[test]
    fn list_members_cannot_contain_separator() {
        assert!(PlayerId::new("alice,bob").is_err());
        assert!(GroupName::new("mods,admins").is_err());
        assert!(PlayerId::new("").is_err());
        assert!(GroupName::new("builders").is_ok());
    }

    #[test]
    fn world_ids_are_opaque_but_not_empty() {
        assert!(WorldId::new("").is_err());
        assert_eq!(
            WorldId::new("7d1c2b6e-world").map(|w| w.as_str().to_string()),
            Ok("7d1c2b6e-world".to_string())
        );
    }
}
