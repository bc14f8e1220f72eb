//! # Filter Expression Model
//!
//! A `WHERE` predicate as a recursive tagged union: scalar comparisons,
//! logical combinators, JSON-path predicates with the three-state null
//! sentinel, and relation quantifiers. Expressions are plain data: they
//! serialize losslessly and are validated against the [`crate::schema`]
//! registry before any repository call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// A typed scalar value as it appears in rows, filter operands, and write
/// payloads.
///
/// The JSON tri-state contract hangs on two variants: `Null` is the
/// relational NULL, while `Json(serde_json::Value::Null)` is a stored JSON
/// literal `null`. A field absent from a write payload is the third state
/// ("leave untouched") and has no value-level representation at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
    /// Operand list for `in`/`notIn`. Never stored in a row.
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::DateTime(_) => "datetime",
            Self::Uuid(_) => "uuid",
            Self::Json(_) => "json",
            Self::List(_) => "list",
        }
    }

    /// Ordering between two values of compatible type. `None` when the
    /// types do not order against each other (or either side is null).
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Uuid(a), Self::Uuid(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality with Int/Float coercion, mirroring `compare`.
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            _ => self
                .compare(other)
                .map(|o| o == Ordering::Equal)
                .unwrap_or(false),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Uuid> for FieldValue {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

/// Scalar comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
}

impl CompareOp {
    pub fn is_ordering(&self) -> bool {
        matches!(self, Self::Lt | Self::Lte | Self::Gt | Self::Gte)
    }

    pub fn is_string_op(&self) -> bool {
        matches!(self, Self::Contains | Self::StartsWith | Self::EndsWith)
    }

    pub fn is_membership(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

/// Case sensitivity for string operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaseMode {
    #[default]
    Default,
    Insensitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalKind {
    And,
    Or,
    Not,
}

/// Which flavour of null a JSON column filter targets.
///
/// `DbNull` matches a relational NULL, `JsonNull` a stored JSON literal
/// `null`, `AnyNull` either. A row can satisfy at most one of the first two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JsonNullFilter {
    DbNull,
    JsonNull,
    AnyNull,
}

/// Predicate applied to the value at a JSON path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JsonPredicate {
    Equals(serde_json::Value),
    Not(serde_json::Value),
    // Ordering ops are restricted to comparable JSON scalars
    // (numbers and strings); validation enforces the operand side.
    Lt(serde_json::Value),
    Lte(serde_json::Value),
    Gt(serde_json::Value),
    Gte(serde_json::Value),
    ArrayContains(serde_json::Value),
    ArrayStartsWith(serde_json::Value),
    ArrayEndsWith(serde_json::Value),
    StringContains(String),
    StringStartsWith(String),
    StringEndsWith(String),
    Null(JsonNullFilter),
}

/// Relation quantifier. `Some`/`Every`/`None` apply to to-many relations,
/// `Is`/`IsNot` to to-one relations. `Every` is vacuously true over an
/// empty collection; `None` is the negation of `Some`; `IsNot` matches when
/// the relation is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationMode {
    Some(Box<Filter>),
    Every(Box<Filter>),
    None(Box<Filter>),
    Is(Box<Filter>),
    IsNot(Box<Filter>),
}

impl RelationMode {
    pub fn nested(&self) -> &Filter {
        match self {
            Self::Some(f) | Self::Every(f) | Self::None(f) | Self::Is(f) | Self::IsNot(f) => f,
        }
    }

    pub fn is_quantifier(&self) -> bool {
        matches!(self, Self::Some(_) | Self::Every(_) | Self::None(_))
    }
}

/// A WHERE predicate tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    Compare {
        field: String,
        op: CompareOp,
        value: FieldValue,
        #[serde(default)]
        mode: CaseMode,
    },
    /// `And`/`Or` take zero or more children (empty `And` is always-true,
    /// empty `Or` always-false). `Not` over a list negates their
    /// conjunction.
    Logical {
        kind: LogicalKind,
        children: Vec<Filter>,
    },
    Json {
        field: String,
        #[serde(default)]
        path: Vec<String>,
        predicate: JsonPredicate,
    },
    Relation {
        field: String,
        mode: RelationMode,
    },
}

impl Filter {
    pub fn compare(field: &str, op: CompareOp, value: impl Into<FieldValue>) -> Self {
        Self::Compare {
            field: field.to_string(),
            op,
            value: value.into(),
            mode: CaseMode::Default,
        }
    }

    pub fn eq(field: &str, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: &str, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn is_in(field: &str, values: Vec<FieldValue>) -> Self {
        Self::compare(field, CompareOp::In, FieldValue::List(values))
    }

    pub fn contains(field: &str, value: &str) -> Self {
        Self::compare(field, CompareOp::Contains, value)
    }

    /// Switch a string comparison to case-insensitive matching.
    pub fn insensitive(mut self) -> Self {
        if let Self::Compare { ref mut mode, .. } = self {
            *mode = CaseMode::Insensitive;
        }
        self
    }

    pub fn and(children: Vec<Filter>) -> Self {
        Self::Logical {
            kind: LogicalKind::And,
            children,
        }
    }

    pub fn or(children: Vec<Filter>) -> Self {
        Self::Logical {
            kind: LogicalKind::Or,
            children,
        }
    }

    pub fn not(child: Filter) -> Self {
        Self::Logical {
            kind: LogicalKind::Not,
            children: vec![child],
        }
    }

    pub fn json(field: &str, path: Vec<String>, predicate: JsonPredicate) -> Self {
        Self::Json {
            field: field.to_string(),
            path,
            predicate,
        }
    }

    /// Null-sentinel filter on a JSON column (no path descent).
    pub fn json_null(field: &str, which: JsonNullFilter) -> Self {
        Self::json(field, Vec::new(), JsonPredicate::Null(which))
    }

    pub fn some(field: &str, nested: Filter) -> Self {
        Self::Relation {
            field: field.to_string(),
            mode: RelationMode::Some(Box::new(nested)),
        }
    }

    pub fn every(field: &str, nested: Filter) -> Self {
        Self::Relation {
            field: field.to_string(),
            mode: RelationMode::Every(Box::new(nested)),
        }
    }

    pub fn none(field: &str, nested: Filter) -> Self {
        Self::Relation {
            field: field.to_string(),
            mode: RelationMode::None(Box::new(nested)),
        }
    }

    pub fn is(field: &str, nested: Filter) -> Self {
        Self::Relation {
            field: field.to_string(),
            mode: RelationMode::Is(Box::new(nested)),
        }
    }

    pub fn is_not(field: &str, nested: Filter) -> Self {
        Self::Relation {
            field: field.to_string(),
            mode: RelationMode::IsNot(Box::new(nested)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_compare() {
        assert_eq!(
            FieldValue::Int(2).compare(&FieldValue::Int(3)),
            Some(Ordering::Less)
        );
        assert_eq!(
            FieldValue::Int(2).compare(&FieldValue::Float(2.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(FieldValue::Null.compare(&FieldValue::Int(1)), None);
        assert_eq!(
            FieldValue::String("a".into()).compare(&FieldValue::Int(1)),
            None
        );
    }

    #[test]
    fn test_filter_serde_round_trip() {
        let filter = Filter::and(vec![
            Filter::eq("status", "IN_PROGRESS"),
            Filter::or(vec![
                Filter::compare("cost", CompareOp::Lte, FieldValue::Float(12.5)),
                Filter::not(Filter::contains("title", "refactor").insensitive()),
            ]),
            Filter::json(
                "context",
                vec!["input".to_string(), "priority".to_string()],
                JsonPredicate::Equals(serde_json::json!("high")),
            ),
            Filter::json_null("result", JsonNullFilter::AnyNull),
            Filter::some("executions", Filter::eq("status", "RUNNING")),
        ]);

        let json = serde_json::to_string(&filter).unwrap();
        let parsed: Filter = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, filter);
    }

    #[test]
    fn test_case_mode_defaults_on_deserialize() {
        let parsed: Filter = serde_json::from_str(
            r#"{"compare":{"field":"title","op":"contains","value":{"string":"api"}}}"#,
        )
        .unwrap();
        assert_eq!(parsed, Filter::contains("title", "api"));
    }

    #[test]
    fn test_null_sentinels_are_distinct_values() {
        let db = Filter::json_null("config", JsonNullFilter::DbNull);
        let json = Filter::json_null("config", JsonNullFilter::JsonNull);
        let any = Filter::json_null("config", JsonNullFilter::AnyNull);
        assert_ne!(db, json);
        assert_ne!(json, any);
        assert_ne!(db, any);
    }
}
