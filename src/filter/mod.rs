//! Filter expression model and its schema-driven validation.

pub mod expression;
pub mod validate;

pub use expression::{
    CaseMode, CompareOp, FieldValue, Filter, JsonNullFilter, JsonPredicate, LogicalKind,
    RelationMode,
};
pub use validate::validate_filter;
