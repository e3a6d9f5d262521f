//! Database access layer: initialization, schema and row models

pub mod init;
pub mod models;

pub use init::{ensure_setting, get_setting_i64, init_database};
