//! # Repository Port
//!
//! The only boundary the core touches. A backend implements [`Repository`]
//! (and its transaction handle) over whatever datastore it likes; the core
//! hands it already-validated filters, orderings, windows and write
//! payloads. Write payloads are plain rows where an absent key means
//! "leave untouched", preserving the absent / DbNull / JsonNull tri-state.

pub mod memory;

use crate::aggregate::{AggregateRow, AggregateSpec, GroupBySpec, GroupRow};
use crate::error::Result;
use crate::filter::{FieldValue, Filter};
use crate::pagination::CursorKey;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One stored row: field name to value. Relational NULL is
/// `FieldValue::Null`; a stored JSON literal null is
/// `FieldValue::Json(Value::Null)`.
pub type Row = BTreeMap<String, FieldValue>;

/// Lazy, finite, non-restartable sequence of rows from a read.
pub type RowStream = BoxStream<'static, Result<Row>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortOrder,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortOrder::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortOrder::Desc,
        }
    }
}

/// Offset or cursor windowing. The two modes are never mixed in one
/// request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WindowMode {
    Offset {
        limit: Option<u64>,
        offset: u64,
    },
    Cursor {
        cursor: CursorKey,
        take: i64,
        skip: u64,
    },
}

/// Read window plus scalar-field dedup. `distinct` keeps the first row of
/// each distinct field-tuple in query order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Window {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<WindowMode>,
    #[serde(default)]
    pub distinct: Vec<String>,
}

impl Window {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn offset(limit: Option<u64>, offset: u64) -> Self {
        Self {
            mode: Some(WindowMode::Offset { limit, offset }),
            distinct: Vec::new(),
        }
    }

    pub fn cursor(cursor: CursorKey, take: i64, skip: u64) -> Self {
        Self {
            mode: Some(WindowMode::Cursor { cursor, take, skip }),
            distinct: Vec::new(),
        }
    }

    pub fn with_distinct(mut self, fields: &[&str]) -> Self {
        self.distinct = fields.iter().map(|f| (*f).to_string()).collect();
        self
    }
}

/// Transaction isolation levels a backend must support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ReadUncommitted => "read_uncommitted",
            Self::ReadCommitted => "read_committed",
            Self::RepeatableRead => "repeatable_read",
            Self::Serializable => "serializable",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for IsolationLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "read_uncommitted" => Ok(Self::ReadUncommitted),
            "read_committed" => Ok(Self::ReadCommitted),
            "repeatable_read" => Ok(Self::RepeatableRead),
            "serializable" => Ok(Self::Serializable),
            _ => Err(format!("invalid isolation level: {s}")),
        }
    }
}

/// A write operation. Uniqueness checks (including compound keys) happen
/// atomically with the mutation; `CreateMany` is all-or-nothing unless
/// `skip_duplicates` is set, which silently drops violating rows instead.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Create {
        data: Row,
    },
    CreateMany {
        data: Vec<Row>,
        skip_duplicates: bool,
    },
    Update {
        filter: Filter,
        data: Row,
    },
    Upsert {
        unique: Filter,
        create: Row,
        update: Row,
    },
    Delete {
        filter: Filter,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteResult {
    Row(Row),
    Count(u64),
}

impl WriteResult {
    pub fn into_row(self) -> Option<Row> {
        match self {
            Self::Row(row) => Some(row),
            Self::Count(_) => None,
        }
    }

    pub fn count(&self) -> u64 {
        match self {
            Self::Row(_) => 1,
            Self::Count(n) => *n,
        }
    }
}

/// Operations shared by a repository and its open transactions.
#[async_trait]
pub trait RepositoryOps: Send + Sync {
    /// Windowed, ordered read. The returned stream is lazy and must not be
    /// restarted.
    async fn execute_read(
        &self,
        entity: &str,
        filter: Option<&Filter>,
        order_by: &[OrderBy],
        window: &Window,
    ) -> Result<RowStream>;

    async fn execute_count(&self, entity: &str, filter: Option<&Filter>) -> Result<u64>;

    async fn execute_aggregate(
        &self,
        entity: &str,
        filter: Option<&Filter>,
        spec: &AggregateSpec,
    ) -> Result<AggregateRow>;

    async fn execute_group_by(
        &self,
        entity: &str,
        filter: Option<&Filter>,
        spec: &GroupBySpec,
    ) -> Result<Vec<GroupRow>>;

    async fn execute_write(&self, entity: &str, op: WriteOp) -> Result<WriteResult>;
}

/// A datastore backend.
#[async_trait]
pub trait Repository: RepositoryOps {
    type Tx: RepositoryTx;

    async fn begin(&self, isolation: IsolationLevel) -> Result<Self::Tx>;
}

/// An open transaction. Dropping without commit rolls back.
#[async_trait]
pub trait RepositoryTx: RepositoryOps + Sized {
    async fn commit(self) -> Result<()>;
    async fn rollback(self) -> Result<()>;
}
