pub mod builder;
pub mod error;
pub mod ids;
pub mod location;
pub mod warp;
