pub mod data_connection_sqlite;
pub mod legacy;
