//! GroupBy requests and the having/orderBy field-membership rules.
//!
//! Run-time checks applied before the repository is touched:
//!
//! 1. `by` must be non-empty.
//! 2. Every field referenced in `having` (recursively through the logical
//!    combinators) must also appear in `by`.
//! 3. With an `order_by` or a take/skip window, every ordering field must
//!    appear in `by`, and a window requires an ordering.

use super::{validate_aggregate, AggregateRow, AggregateSpec};
use crate::error::{DataError, Result};
use crate::filter::{validate_filter, FieldValue, Filter};
use crate::repository::OrderBy;
use crate::schema::SchemaRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupBySpec {
    pub by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub having: Option<Filter>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(default)]
    pub aggregates: AggregateSpec,
}

/// One group: its key values plus the computed aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRow {
    pub keys: BTreeMap<String, FieldValue>,
    pub aggregates: AggregateRow,
}

pub fn validate_group_by(
    registry: &SchemaRegistry,
    entity: &str,
    spec: &GroupBySpec,
) -> Result<()> {
    if spec.by.is_empty() {
        return Err(DataError::group_by("groupBy requires at least one field"));
    }
    for field in &spec.by {
        registry.field_type(entity, field)?;
    }

    if let Some(having) = &spec.having {
        validate_filter(registry, entity, having)?;
        check_having_membership(entity, having, &spec.by)?;
    }

    for order in &spec.order_by {
        if !spec.by.contains(&order.field) {
            return Err(DataError::group_by(format!(
                "orderBy field `{}` does not appear in groupBy",
                order.field
            )));
        }
    }
    if (spec.take.is_some() || spec.skip.is_some()) && spec.order_by.is_empty() {
        return Err(DataError::group_by(
            "a take/skip window requires an explicit orderBy",
        ));
    }

    validate_aggregate(registry, entity, &spec.aggregates)
}

/// Every field `having` touches must be a grouping field. Relation and
/// JSON-path predicates have no post-grouping meaning and are rejected.
fn check_having_membership(entity: &str, having: &Filter, by: &[String]) -> Result<()> {
    match having {
        Filter::Compare { field, .. } => {
            if by.contains(field) {
                Ok(())
            } else {
                Err(DataError::group_by(format!(
                    "having references `{field}`, which does not appear in groupBy"
                )))
            }
        }
        Filter::Logical { children, .. } => {
            for child in children {
                check_having_membership(entity, child, by)?;
            }
            Ok(())
        }
        Filter::Json { field, .. } => Err(DataError::group_by(format!(
            "having cannot apply JSON predicates (field `{field}`)"
        ))),
        Filter::Relation { field, .. } => Err(DataError::group_by(format!(
            "having cannot traverse relations (field `{field}`)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::OrderBy;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::platform()
    }

    fn spec(by: &[&str]) -> GroupBySpec {
        GroupBySpec {
            by: by.iter().map(|f| (*f).to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_group_by_rejected() {
        let err = validate_group_by(&registry(), "Task", &spec(&[])).unwrap_err();
        assert!(matches!(err, DataError::GroupBy { .. }));
    }

    #[test]
    fn test_having_field_outside_group_by_rejected() {
        let mut s = spec(&["status"]);
        s.having = Some(Filter::eq("priority", "HIGH"));
        let err = validate_group_by(&registry(), "Task", &s).unwrap_err();
        let DataError::GroupBy { reason } = err else {
            panic!("expected GroupBy error");
        };
        assert!(reason.contains("priority"));
    }

    #[test]
    fn test_having_on_grouped_field_passes() {
        let mut s = spec(&["status"]);
        s.having = Some(Filter::eq("status", "COMPLETED"));
        validate_group_by(&registry(), "Task", &s).unwrap();
    }

    #[test]
    fn test_having_membership_recurses_through_combinators() {
        let mut s = spec(&["status", "priority"]);
        s.having = Some(Filter::and(vec![
            Filter::eq("status", "FAILED"),
            Filter::or(vec![
                Filter::eq("priority", "HIGH"),
                Filter::not(Filter::eq("ai_provider", "anthropic")),
            ]),
        ]));
        let err = validate_group_by(&registry(), "Task", &s).unwrap_err();
        let DataError::GroupBy { reason } = err else {
            panic!("expected GroupBy error");
        };
        assert!(reason.contains("ai_provider"));
    }

    #[test]
    fn test_order_by_outside_group_by_rejected() {
        let mut s = spec(&["status"]);
        s.order_by = vec![OrderBy::asc("priority")];
        let err = validate_group_by(&registry(), "Task", &s).unwrap_err();
        assert!(matches!(err, DataError::GroupBy { .. }));
    }

    #[test]
    fn test_window_without_order_by_rejected() {
        let mut s = spec(&["status"]);
        s.take = Some(5);
        let err = validate_group_by(&registry(), "Task", &s).unwrap_err();
        assert!(matches!(err, DataError::GroupBy { .. }));

        s.order_by = vec![OrderBy::asc("status")];
        validate_group_by(&registry(), "Task", &s).unwrap();
    }
}
