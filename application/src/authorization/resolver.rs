use crate::authorization::AuthorizationResolver;
use crate::ports::outgoing::collaborators::Actor;
use domain::warp::Warp;

pub const MODIFY_OVERRIDE_PERMISSION: &str = "mywarp.override.modify";
pub const USE_OVERRIDE_PERMISSION: &str = "mywarp.override.use";

/// Grants access from the warp's creator, type and invitations, with
/// permission nodes that override both checks.
#[derive(Debug, Default, Clone, Copy)]
pub struct InvitationAuthorizationResolver;

impl InvitationAuthorizationResolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl AuthorizationResolver for InvitationAuthorizationResolver {
    fn is_modifiable(&self, warp: &Warp, actor: &dyn Actor) -> bool {
        if actor.has_permission(MODIFY_OVERRIDE_PERMISSION) {
            return true;
        }
        actor.player_id().is_some_and(|player| warp.is_creator(player))
    }

    fn is_usable(&self, warp: &Warp, actor: &dyn Actor) -> bool {
        if warp.is_public() || actor.has_permission(USE_OVERRIDE_PERMISSION) {
            return true;
        }
        if let Some(player) = actor.player_id() {
            if warp.is_creator(player) || warp.is_player_invited(player) {
                return true;
            }
        }
        warp.invited_groups()
            .iter()
            .any(|group| actor.is_in_group(group.as_str()))
    }
}
