pub mod collaborators;
pub mod data_connection;
