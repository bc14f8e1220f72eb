//! # Aggregation
//!
//! `_count` / `_avg` / `_sum` / `_min` / `_max` selections and their
//! schema validation. `_avg` and `_sum` are restricted to numeric fields;
//! `_count` supports both per-field counts (non-null occurrences only) and
//! the whole-row `_all` flag.

pub mod group_by;

pub use group_by::{validate_group_by, GroupBySpec, GroupRow};

use crate::error::{DataError, Result};
use crate::filter::FieldValue;
use crate::schema::SchemaRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which counts to compute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSelection {
    /// Count every row, nulls included.
    #[serde(default)]
    pub all: bool,
    /// Per-field counts of non-null occurrences.
    #[serde(default)]
    pub fields: Vec<String>,
}

impl CountSelection {
    pub fn all_rows() -> Self {
        Self {
            all: true,
            fields: Vec::new(),
        }
    }

    pub fn of(fields: &[&str]) -> Self {
        Self {
            all: false,
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
        }
    }
}

/// An aggregate selection over one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<CountSelection>,
    #[serde(default)]
    pub avg: Vec<String>,
    #[serde(default)]
    pub sum: Vec<String>,
    #[serde(default)]
    pub min: Vec<String>,
    #[serde(default)]
    pub max: Vec<String>,
}

impl AggregateSpec {
    pub fn is_empty(&self) -> bool {
        self.count.is_none()
            && self.avg.is_empty()
            && self.sum.is_empty()
            && self.min.is_empty()
            && self.max.is_empty()
    }
}

/// Computed aggregates. SQL semantics: an aggregate over zero non-null
/// inputs is `None`, while `count` over zero rows is `0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_all: Option<u64>,
    #[serde(default)]
    pub count: BTreeMap<String, u64>,
    #[serde(default)]
    pub avg: BTreeMap<String, Option<f64>>,
    #[serde(default)]
    pub sum: BTreeMap<String, Option<FieldValue>>,
    #[serde(default)]
    pub min: BTreeMap<String, Option<FieldValue>>,
    #[serde(default)]
    pub max: BTreeMap<String, Option<FieldValue>>,
}

/// Check every selected field against the registry: it must exist, `_avg`
/// and `_sum` require numeric types, `_min`/`_max` orderable types.
pub fn validate_aggregate(
    registry: &SchemaRegistry,
    entity: &str,
    spec: &AggregateSpec,
) -> Result<()> {
    if let Some(count) = &spec.count {
        for field in &count.fields {
            registry.field_type(entity, field)?;
        }
    }
    for field in spec.avg.iter().chain(&spec.sum) {
        let scalar = registry.field_type(entity, field)?;
        if !scalar.field_type.is_numeric() {
            return Err(DataError::filter(
                entity,
                field,
                "_avg/_sum apply to numeric fields only",
            ));
        }
    }
    for field in spec.min.iter().chain(&spec.max) {
        let scalar = registry.field_type(entity, field)?;
        if !scalar.field_type.is_orderable() {
            return Err(DataError::filter(
                entity,
                field,
                "_min/_max require an orderable field",
            ));
        }
    }
    Ok(())
}
