pub mod executor;
pub mod record;
pub mod statements;
