pub mod args;
pub mod bootstrap;
pub mod commands;
pub mod config_loader;
pub mod console;
pub mod observability;
