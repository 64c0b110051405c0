pub mod resolver;

use crate::ports::outgoing::collaborators::Actor;
use domain::warp::Warp;

/// Decides who may see, use and change a warp from its ownership and
/// invitation data.
pub trait AuthorizationResolver: Send + Sync {
    fn is_modifiable(&self, warp: &Warp, actor: &dyn Actor) -> bool;

    fn is_usable(&self, warp: &Warp, actor: &dyn Actor) -> bool;
}
