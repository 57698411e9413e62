//! Replication Wire Protocol
//!
//! Query and body shapes shared by the primary-side API, the replica-side
//! API, and the client that delivers tasks to replicas.

use serde::{Deserialize, Serialize};

use super::task::{OperationKind, ReplicationTask};

/// Liveness probe path
pub const PING_PATH: &str = "/ping";

/// Replica self-registration path on the primary
pub const REGISTER_PATH: &str = "/register-slave";

/// `?name=` for database operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseParams {
    #[serde(default)]
    pub name: String,
}

impl DatabaseParams {
    pub fn into_create(self) -> ReplicationTask {
        ReplicationTask::CreateDatabase { name: self.name }
    }

    pub fn into_drop(self) -> ReplicationTask {
        ReplicationTask::DropDatabase { name: self.name }
    }
}

/// `?dbname=&table=&schema=` for table creation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableParams {
    #[serde(default)]
    pub dbname: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub schema: String,
}

impl From<TableParams> for ReplicationTask {
    fn from(p: TableParams) -> Self {
        ReplicationTask::CreateTable {
            dbname: p.dbname,
            table: p.table,
            schema: p.schema,
        }
    }
}

/// `?dbname=&table=` for reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectParams {
    #[serde(default)]
    pub dbname: String,
    #[serde(default)]
    pub table: String,
}

/// `?address=` for registration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterParams {
    #[serde(default)]
    pub address: String,
}

/// Insert body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertBody {
    #[serde(default)]
    pub dbname: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub values: String,
}

impl From<InsertBody> for ReplicationTask {
    fn from(b: InsertBody) -> Self {
        ReplicationTask::Insert {
            dbname: b.dbname,
            table: b.table,
            values: b.values,
        }
    }
}

/// Update body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBody {
    #[serde(default)]
    pub dbname: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub set: String,
    #[serde(default, rename = "where")]
    pub where_clause: String,
}

impl From<UpdateBody> for ReplicationTask {
    fn from(b: UpdateBody) -> Self {
        ReplicationTask::Update {
            dbname: b.dbname,
            table: b.table,
            set: b.set,
            where_clause: b.where_clause,
        }
    }
}

/// Delete body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteBody {
    #[serde(default)]
    pub dbname: String,
    #[serde(default)]
    pub table: String,
    #[serde(default, rename = "where")]
    pub where_clause: String,
}

impl From<DeleteBody> for ReplicationTask {
    fn from(b: DeleteBody) -> Self {
        ReplicationTask::Delete {
            dbname: b.dbname,
            table: b.table,
            where_clause: b.where_clause,
        }
    }
}

/// JSON body of a row-level replica RPC
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RowBody {
    Insert(InsertBody),
    Update(UpdateBody),
    Delete(DeleteBody),
}

/// Request a replica receives for one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaRequest {
    /// Schema operations travel as query strings
    Get {
        path: &'static str,
        query: Vec<(&'static str, String)>,
    },
    /// Row operations travel as JSON bodies
    Post { path: &'static str, body: RowBody },
}

impl ReplicaRequest {
    /// Select the wire shape for a task
    pub fn for_task(task: &ReplicationTask) -> Self {
        match task.clone() {
            ReplicationTask::CreateDatabase { name } => ReplicaRequest::Get {
                path: replica_path(OperationKind::CreateDatabase),
                query: vec![("name", name)],
            },
            ReplicationTask::DropDatabase { name } => ReplicaRequest::Get {
                path: replica_path(OperationKind::DropDatabase),
                query: vec![("name", name)],
            },
            ReplicationTask::CreateTable { dbname, table, schema } => ReplicaRequest::Get {
                path: replica_path(OperationKind::CreateTable),
                query: vec![("dbname", dbname), ("table", table), ("schema", schema)],
            },
            ReplicationTask::Insert { dbname, table, values } => ReplicaRequest::Post {
                path: replica_path(OperationKind::Insert),
                body: RowBody::Insert(InsertBody { dbname, table, values }),
            },
            ReplicationTask::Update { dbname, table, set, where_clause } => ReplicaRequest::Post {
                path: replica_path(OperationKind::Update),
                body: RowBody::Update(UpdateBody { dbname, table, set, where_clause }),
            },
            ReplicationTask::Delete { dbname, table, where_clause } => ReplicaRequest::Post {
                path: replica_path(OperationKind::Delete),
                body: RowBody::Delete(DeleteBody { dbname, table, where_clause }),
            },
        }
    }

    /// Path component of the request
    pub fn path(&self) -> &'static str {
        match self {
            ReplicaRequest::Get { path, .. } | ReplicaRequest::Post { path, .. } => path,
        }
    }
}

/// Replica endpoint for an operation kind
pub fn replica_path(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::CreateDatabase => "/replicate/db",
        OperationKind::DropDatabase => "/replicate/dropdb",
        OperationKind::CreateTable => "/replicate/table",
        OperationKind::Insert => "/replicate/insert",
        OperationKind::Update => "/replicate/update",
        OperationKind::Delete => "/replicate/delete",
    }
}

/// Body every replica response carries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaAck {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, rename = "rowsAffected", skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
}

impl ReplicaAck {
    /// Build the acknowledgement for an applied task
    pub fn for_task(task: &ReplicationTask, rows_affected: u64) -> Self {
        let message = task.kind().replicated_message().to_string();
        match task {
            ReplicationTask::CreateDatabase { name } | ReplicationTask::DropDatabase { name } => Self {
                message,
                dbname: Some(name.clone()),
                ..Default::default()
            },
            ReplicationTask::CreateTable { dbname, table, .. } => Self {
                message,
                dbname: Some(dbname.clone()),
                table: Some(table.clone()),
                ..Default::default()
            },
            _ => Self {
                message,
                rows_affected: Some(rows_affected),
                ..Default::default()
            },
        }
    }
}
