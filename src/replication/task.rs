//! Replication Tasks
//!
//! One variant per operation kind, each carrying exactly the fields that
//! operation needs. `values`, `set`, `where` and `schema` are SQL fragments
//! passed through verbatim; database and table names are quoted as identifiers.

use crate::error::{Error, Result};

/// Kind of a replicated operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    CreateDatabase,
    DropDatabase,
    CreateTable,
    Insert,
    Update,
    Delete,
}

impl OperationKind {
    /// Verb phrase used in local failure messages ("Failed to <action>: ...")
    pub fn action(&self) -> &'static str {
        match self {
            OperationKind::CreateDatabase => "create database",
            OperationKind::DropDatabase => "drop database",
            OperationKind::CreateTable => "create table",
            OperationKind::Insert => "insert record",
            OperationKind::Update => "update record",
            OperationKind::Delete => "delete record",
        }
    }

    /// Message returned to the client after a successful local write
    pub fn success_message(&self) -> &'static str {
        match self {
            OperationKind::CreateDatabase => "Database created successfully",
            OperationKind::DropDatabase => "Database dropped successfully",
            OperationKind::CreateTable => "Table created successfully",
            OperationKind::Insert => "Record inserted successfully",
            OperationKind::Update => "Record updated successfully",
            OperationKind::Delete => "Record deleted successfully",
        }
    }

    /// Message a replica returns after applying the operation
    pub fn replicated_message(&self) -> &'static str {
        match self {
            OperationKind::CreateDatabase => "Database replicated successfully",
            OperationKind::CreateTable => "Table replicated successfully",
            other => other.success_message(),
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::CreateDatabase => write!(f, "createdb"),
            OperationKind::DropDatabase => write!(f, "dropdb"),
            OperationKind::CreateTable => write!(f, "createtable"),
            OperationKind::Insert => write!(f, "insert"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// A single unit of replicated work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationTask {
    CreateDatabase {
        name: String,
    },
    DropDatabase {
        name: String,
    },
    CreateTable {
        dbname: String,
        table: String,
        schema: String,
    },
    Insert {
        dbname: String,
        table: String,
        values: String,
    },
    Update {
        dbname: String,
        table: String,
        set: String,
        where_clause: String,
    },
    Delete {
        dbname: String,
        table: String,
        where_clause: String,
    },
}

impl ReplicationTask {
    /// Get the operation kind
    pub fn kind(&self) -> OperationKind {
        match self {
            ReplicationTask::CreateDatabase { .. } => OperationKind::CreateDatabase,
            ReplicationTask::DropDatabase { .. } => OperationKind::DropDatabase,
            ReplicationTask::CreateTable { .. } => OperationKind::CreateTable,
            ReplicationTask::Insert { .. } => OperationKind::Insert,
            ReplicationTask::Update { .. } => OperationKind::Update,
            ReplicationTask::Delete { .. } => OperationKind::Delete,
        }
    }

    /// Database the task touches
    pub fn database(&self) -> &str {
        match self {
            ReplicationTask::CreateDatabase { name } | ReplicationTask::DropDatabase { name } => name,
            ReplicationTask::CreateTable { dbname, .. }
            | ReplicationTask::Insert { dbname, .. }
            | ReplicationTask::Update { dbname, .. }
            | ReplicationTask::Delete { dbname, .. } => dbname,
        }
    }

    /// Reject tasks with an empty required field
    pub fn validate(&self) -> Result<()> {
        let complete = match self {
            ReplicationTask::CreateDatabase { name } | ReplicationTask::DropDatabase { name } => {
                !name.is_empty()
            }
            ReplicationTask::CreateTable { dbname, table, schema } => {
                !dbname.is_empty() && !table.is_empty() && !schema.is_empty()
            }
            ReplicationTask::Insert { dbname, table, values } => {
                !dbname.is_empty() && !table.is_empty() && !values.is_empty()
            }
            ReplicationTask::Update { dbname, table, set, where_clause } => {
                !dbname.is_empty() && !table.is_empty() && !set.is_empty() && !where_clause.is_empty()
            }
            ReplicationTask::Delete { dbname, table, where_clause } => {
                !dbname.is_empty() && !table.is_empty() && !where_clause.is_empty()
            }
        };

        if complete {
            return Ok(());
        }

        let message = match self.kind() {
            OperationKind::CreateDatabase | OperationKind::DropDatabase => {
                "Database name is required"
            }
            OperationKind::CreateTable => "All parameters (dbname, table, schema) are required",
            OperationKind::Insert => "All fields (dbname, table, values) are required",
            OperationKind::Update => "All fields (dbname, table, set, where) are required",
            OperationKind::Delete => "All fields (dbname, table, where) are required",
        };
        Err(Error::Validation(message.to_string()))
    }

    /// Render the statement executed against the engine
    pub fn to_sql(&self) -> String {
        match self {
            ReplicationTask::CreateDatabase { name } => {
                format!("CREATE DATABASE IF NOT EXISTS {}", quote_ident(name))
            }
            ReplicationTask::DropDatabase { name } => {
                format!("DROP DATABASE IF EXISTS {}", quote_ident(name))
            }
            ReplicationTask::CreateTable { dbname, table, schema } => format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                qualified(dbname, table),
                schema
            ),
            ReplicationTask::Insert { dbname, table, values } => {
                format!("INSERT INTO {} VALUES ({})", qualified(dbname, table), values)
            }
            ReplicationTask::Update { dbname, table, set, where_clause } => format!(
                "UPDATE {} SET {} WHERE {}",
                qualified(dbname, table),
                set,
                where_clause
            ),
            ReplicationTask::Delete { dbname, table, where_clause } => {
                format!("DELETE FROM {} WHERE {}", qualified(dbname, table), where_clause)
            }
        }
    }
}

/// Quote an identifier with backticks, doubling embedded backticks
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// `db`.`table`
pub fn qualified(dbname: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(dbname), quote_ident(table))
}
