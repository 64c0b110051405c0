use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use domain::{
    ids::{GroupName, PlayerId, WarpId, WorldId},
    location::{Position, Rotation},
    warp::{Warp, WarpType},
};

/// Storage contract shared by every backend.
///
/// Writes are field scoped: each update touches one group of columns of the
/// row identified by the warp's storage identity. None of them check
/// business rules, callers are expected to have done that already.
#[async_trait::async_trait]
pub trait DataConnection: Send + Sync {
    /// Fails with [`AppError::SchemaMissing`] when the table is absent and
    /// `create_if_missing` is false.
    async fn check_schema(&self, create_if_missing: bool) -> AppResult<()>;

    /// Fails with [`AppError::SchemaOutdated`] when changes are pending and
    /// `apply_if_necessary` is false.
    async fn migrate_schema(&self, apply_if_necessary: bool) -> AppResult<()>;

    /// Reads every row, keyed by warp name. Rows that cannot be decoded are
    /// logged and skipped.
    async fn load_all(&self) -> AppResult<HashMap<String, Warp>>;

    /// Inserts the warp and returns it carrying its new storage identity.
    async fn create(&self, warp: Warp) -> AppResult<Warp>;

    /// Removes the row. Deleting a row that is already gone succeeds.
    async fn delete(&self, warp: &Warp) -> AppResult<()>;

    async fn update_visibility(&self, warp: &Warp, warp_type: WarpType) -> AppResult<()>;

    async fn update_creator(&self, warp: &Warp, creator: &PlayerId) -> AppResult<()>;

    async fn update_location(
        &self,
        warp: &Warp,
        world: &WorldId,
        position: Position,
        rotation: Rotation,
    ) -> AppResult<()>;

    async fn update_permissions(&self, warp: &Warp, players: &BTreeSet<PlayerId>)
    -> AppResult<()>;

    async fn update_group_permissions(
        &self,
        warp: &Warp,
        groups: &BTreeSet<GroupName>,
    ) -> AppResult<()>;

    /// Never lowers the persisted count.
    async fn update_visits(&self, warp: &Warp, visits: u32) -> AppResult<()>;

    async fn update_welcome_message(&self, warp: &Warp, message: &str) -> AppResult<()>;

    /// Releases held resources. Safe to call more than once.
    async fn close(&self) -> AppResult<()>;
}

pub type DynDataConnection = Arc<dyn DataConnection>;

pub fn require_id(warp: &Warp) -> AppResult<WarpId> {
    warp.id().ok_or_else(|| AppError::NotPersisted {
        name: warp.name().to_string(),
    })
}
