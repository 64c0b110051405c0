#[cfg(any(feature = "adapters", feature = "sqlx", feature = "tokio"))]
compile_error!("application must not depend on adapters/framework crates");

pub mod authorization;
pub mod error;
pub mod info;
pub mod infrastructure_config;
pub mod ports;
