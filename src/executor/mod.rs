//! Database Executor Module
//!
//! Executes statements against MariaDB databases.

mod mariadb;

pub use mariadb::{JsonRow, MariaDbExecutor};
