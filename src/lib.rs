//! # Conductor Data
//!
//! Data-access core for the Conductor platform: a type-checked query,
//! filter, aggregation and pagination engine over the platform's fixed
//! relational schema, with entity lifecycle enforcement at the write
//! boundary.
//!
//! ## Architecture
//!
//! - **Schema registry** (`schema`): the ten platform entities, their
//!   scalar/relation fields, enum value sets and unique keys.
//! - **Filter model** (`filter`): a serde-backed expression tree with
//!   relational/JSON null sentinels, relation quantifiers and
//!   case-insensitive string matching, validated against the registry
//!   before execution.
//! - **Aggregation** (`aggregate`): count/avg/sum/min/max plus grouped
//!   aggregation with `having` restricted to grouped fields.
//! - **Pagination** (`pagination`): offset pages with derived metadata,
//!   and cursor windows with signed take.
//! - **Repository port** (`repository`): the async boundary a backend
//!   implements; ships with an in-memory adapter for tests and tooling.
//! - **Lifecycles** (`state_machine`): status enums and the transition
//!   planner that stamps derived timestamps exactly once.
//! - **Engine** (`engine`): the validate-then-execute façade callers use.
//!
//! ## Example
//!
//! ```no_run
//! use conductor_data::config::EngineConfig;
//! use conductor_data::engine::QueryEngine;
//! use conductor_data::filter::Filter;
//! use conductor_data::repository::memory::InMemoryRepository;
//! use conductor_data::schema::SchemaRegistry;
//! use std::sync::Arc;
//!
//! # async fn demo() -> conductor_data::error::Result<()> {
//! let schema = Arc::new(SchemaRegistry::platform());
//! let repo = InMemoryRepository::new(schema.clone());
//! let engine = QueryEngine::new(schema, repo, EngineConfig::default());
//!
//! let active = engine
//!     .count("Project", Some(Filter::eq("status", "ACTIVE")))
//!     .await?;
//! # let _ = active;
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod logging;
pub mod pagination;
pub mod repository;
pub mod schema;
pub mod state_machine;

pub use aggregate::{AggregateRow, AggregateSpec, CountSelection, GroupBySpec, GroupRow};
pub use config::EngineConfig;
pub use engine::QueryEngine;
pub use error::{DataError, Result};
pub use filter::{
    CaseMode, CompareOp, FieldValue, Filter, JsonNullFilter, JsonPredicate, LogicalKind,
    RelationMode,
};
pub use pagination::{CursorKey, CursorRequest, PageInfo, PageRequest, Paginated};
pub use repository::{
    memory::InMemoryRepository, IsolationLevel, OrderBy, Repository, RepositoryOps, RepositoryTx,
    Row, SortOrder, Window, WindowMode, WriteOp, WriteResult,
};
pub use schema::SchemaRegistry;
pub use state_machine::{plan_transition, TransitionPlan};
