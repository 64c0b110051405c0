pub mod mysql_sqlx;
pub mod sql_common;
pub mod sqlite_sqlx;
