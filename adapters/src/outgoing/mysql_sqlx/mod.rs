pub mod data_connection_mysql;
pub mod schema;
