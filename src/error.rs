//! # Error Taxonomy
//!
//! Typed errors for every failure mode of the data core. Validation errors
//! (`Schema`, `Filter`, `GroupBy`) are produced by pure checks before any
//! repository call; the remaining variants surface from the repository port.
//! The library never logs errors on its own; callers decide.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    /// Unknown entity or field name. Programmer error: fatal to the request,
    /// never retried.
    #[error("schema error on `{entity}`: {detail}")]
    Schema { entity: String, detail: String },

    /// A filter referenced a field with an operator its type does not
    /// support, or used an invalid JSON path. Rejected before any I/O.
    #[error("invalid filter on `{entity}.{field}`: {reason}")]
    Filter {
        entity: String,
        field: String,
        reason: String,
    },

    /// A groupBy request violated the having/orderBy field-membership rules
    /// or named no grouping fields at all.
    #[error("invalid groupBy request: {reason}")]
    GroupBy { reason: String },

    /// A write violated a unique key (single-field or compound).
    /// Caller decides whether to retry, upsert, or surface.
    #[error("uniqueness violation on `{entity}` key ({})", fields.join(", "))]
    UniquenessViolation {
        entity: String,
        fields: Vec<String>,
    },

    /// A unique-or-throw read matched zero rows. Distinct from a plain read
    /// returning an empty sequence.
    #[error("no `{entity}` row matched the unique filter")]
    NotFound { entity: String },

    /// Conflict or timeout from the underlying transaction. Potentially
    /// retryable depending on the isolation level in use.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A status write that the entity's lifecycle does not permit.
    #[error("illegal `{entity}` transition: {from} -> {to}")]
    StateTransition {
        entity: String,
        from: String,
        to: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl DataError {
    pub fn schema(entity: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Schema {
            entity: entity.into(),
            detail: detail.into(),
        }
    }

    pub fn filter(
        entity: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Filter {
            entity: entity.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn group_by(reason: impl Into<String>) -> Self {
        Self::GroupBy {
            reason: reason.into(),
        }
    }

    /// True for validation failures detected locally before any I/O.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Schema { .. } | Self::Filter { .. } | Self::GroupBy { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
