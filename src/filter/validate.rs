//! Pure filter validation against the schema registry.
//!
//! Walks the predicate tree resolving every field for the current entity
//! context, which switches when descending into a relation. No I/O; the
//! first offending node fails the whole request.

use super::expression::{
    CaseMode, CompareOp, FieldValue, Filter, JsonPredicate, LogicalKind, RelationMode,
};
use crate::error::{DataError, Result};
use crate::schema::{FieldType, ScalarField, SchemaRegistry};

/// Validate a filter for the given entity context.
pub fn validate_filter(registry: &SchemaRegistry, entity: &str, filter: &Filter) -> Result<()> {
    match filter {
        Filter::Compare {
            field,
            op,
            value,
            mode,
        } => validate_compare(registry, entity, field, *op, value, *mode),
        Filter::Logical { kind, children } => {
            if *kind == LogicalKind::Not && children.is_empty() {
                return Err(DataError::filter(
                    entity,
                    "NOT",
                    "NOT requires at least one child filter",
                ));
            }
            for child in children {
                validate_filter(registry, entity, child)?;
            }
            Ok(())
        }
        Filter::Json {
            field,
            path,
            predicate,
        } => validate_json(registry, entity, field, path, predicate),
        Filter::Relation { field, mode } => validate_relation(registry, entity, field, mode),
    }
}

fn validate_compare(
    registry: &SchemaRegistry,
    entity: &str,
    field: &str,
    op: CompareOp,
    value: &FieldValue,
    mode: CaseMode,
) -> Result<()> {
    let def = registry.entity(entity)?;
    if def.relation(field).is_some() {
        return Err(DataError::filter(
            entity,
            field,
            "relations take a relation predicate (some/every/none/is), not a scalar comparison",
        ));
    }
    let scalar = registry.field_type(entity, field)?;

    // JSON columns never take scalar comparisons; in particular `eq: null`
    // must not conflate the three null states.
    if scalar.field_type == FieldType::Json {
        let reason = if value.is_null() {
            "JSON columns distinguish DbNull, JsonNull and AnyNull; use a json null sentinel"
        } else {
            "JSON columns take json predicates, not scalar comparisons"
        };
        return Err(DataError::filter(entity, field, reason));
    }

    if mode == CaseMode::Insensitive && scalar.field_type != FieldType::String {
        return Err(DataError::filter(
            entity,
            field,
            "case-insensitive mode applies to string fields only",
        ));
    }

    match op {
        CompareOp::Eq | CompareOp::Ne => {
            if value.is_null() {
                if scalar.nullable {
                    Ok(())
                } else {
                    Err(DataError::filter(
                        entity,
                        field,
                        "field is not nullable; null comparison can never match",
                    ))
                }
            } else {
                check_operand_type(entity, scalar, value)
            }
        }
        CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte => {
            if !scalar.field_type.is_orderable() {
                return Err(DataError::filter(
                    entity,
                    field,
                    format!("ordering operators do not apply to {:?} fields", scalar.field_type),
                ));
            }
            if value.is_null() {
                return Err(DataError::filter(entity, field, "cannot order against null"));
            }
            check_operand_type(entity, scalar, value)
        }
        CompareOp::In | CompareOp::NotIn => match value {
            FieldValue::List(items) => {
                for item in items {
                    if item.is_null() {
                        return Err(DataError::filter(
                            entity,
                            field,
                            "in/notIn lists cannot contain null",
                        ));
                    }
                    check_operand_type(entity, scalar, item)?;
                }
                Ok(())
            }
            _ => Err(DataError::filter(
                entity,
                field,
                "in/notIn requires a list operand",
            )),
        },
        CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith => {
            if scalar.field_type != FieldType::String {
                return Err(DataError::filter(
                    entity,
                    field,
                    format!("string operators do not apply to {:?} fields", scalar.field_type),
                ));
            }
            match value {
                FieldValue::String(_) => Ok(()),
                other => Err(DataError::filter(
                    entity,
                    field,
                    format!("string operator requires a string operand, got {}", other.type_name()),
                )),
            }
        }
    }
}

/// A non-null operand must match the field's storage type; enum fields also
/// check membership in the declared value set.
pub(crate) fn check_operand_type(
    entity: &str,
    scalar: &ScalarField,
    value: &FieldValue,
) -> Result<()> {
    let ok = match scalar.field_type {
        FieldType::String => matches!(value, FieldValue::String(_)),
        FieldType::Int => matches!(value, FieldValue::Int(_)),
        FieldType::Float => matches!(value, FieldValue::Float(_) | FieldValue::Int(_)),
        FieldType::Bool => matches!(value, FieldValue::Bool(_)),
        FieldType::DateTime => matches!(value, FieldValue::DateTime(_)),
        FieldType::Uuid => matches!(value, FieldValue::Uuid(_)),
        FieldType::Json => matches!(value, FieldValue::Json(_)),
        FieldType::Enum => match value {
            FieldValue::String(s) => {
                if !scalar.allows(s) {
                    return Err(DataError::filter(
                        entity,
                        &scalar.name,
                        format!("`{s}` is not a legal value for this enum field"),
                    ));
                }
                true
            }
            _ => false,
        },
    };
    if ok {
        Ok(())
    } else {
        Err(DataError::filter(
            entity,
            &scalar.name,
            format!(
                "operand type {} does not match field type {:?}",
                value.type_name(),
                scalar.field_type
            ),
        ))
    }
}

fn validate_json(
    registry: &SchemaRegistry,
    entity: &str,
    field: &str,
    path: &[String],
    predicate: &JsonPredicate,
) -> Result<()> {
    let scalar = registry.field_type(entity, field)?;
    if scalar.field_type != FieldType::Json {
        return Err(DataError::filter(
            entity,
            field,
            "json predicates apply to JSON fields only",
        ));
    }
    if path.iter().any(String::is_empty) {
        return Err(DataError::filter(entity, field, "empty JSON path segment"));
    }

    match predicate {
        JsonPredicate::Equals(v) | JsonPredicate::Not(v) => {
            if v.is_null() {
                return Err(DataError::filter(
                    entity,
                    field,
                    "use DbNull/JsonNull/AnyNull instead of a literal null operand",
                ));
            }
            Ok(())
        }
        JsonPredicate::Lt(v) | JsonPredicate::Lte(v) | JsonPredicate::Gt(v) | JsonPredicate::Gte(v) => {
            if v.is_number() || v.is_string() {
                Ok(())
            } else {
                Err(DataError::filter(
                    entity,
                    field,
                    "json ordering operators take a number or string operand",
                ))
            }
        }
        JsonPredicate::Null(_) => {
            // Sentinels classify the column value itself.
            if path.is_empty() {
                Ok(())
            } else {
                Err(DataError::filter(
                    entity,
                    field,
                    "null sentinels apply to the column, not a JSON path",
                ))
            }
        }
        _ => Ok(()),
    }
}

fn validate_relation(
    registry: &SchemaRegistry,
    entity: &str,
    field: &str,
    mode: &RelationMode,
) -> Result<()> {
    let def = registry.entity(entity)?;
    let Some(relation) = def.relation(field) else {
        return if def.scalar(field).is_some() {
            Err(DataError::filter(
                entity,
                field,
                "scalar fields take comparisons, not relation predicates",
            ))
        } else {
            Err(DataError::schema(entity, format!("unknown field `{field}`")))
        };
    };

    if relation.cardinality.is_collection() != mode.is_quantifier() {
        let reason = if mode.is_quantifier() {
            "some/every/none apply to to-many relations; use is/isNot here"
        } else {
            "is/isNot apply to to-one relations; use some/every/none here"
        };
        return Err(DataError::filter(entity, field, reason));
    }

    // Entity context switches to the relation target for the nested tree.
    validate_filter(registry, &relation.target, mode.nested())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Filter, JsonNullFilter};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::platform()
    }

    #[test]
    fn test_unknown_field_is_schema_error() {
        let err =
            validate_filter(&registry(), "Task", &Filter::eq("favorite_color", "blue")).unwrap_err();
        assert!(matches!(err, DataError::Schema { .. }));
    }

    #[test]
    fn test_contains_rejected_on_non_string() {
        let err = validate_filter(
            &registry(),
            "Task",
            &Filter::contains("token_usage", "12"),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::Filter { .. }));
    }

    #[test]
    fn test_eq_null_on_json_field_rejected() {
        let err = validate_filter(
            &registry(),
            "Task",
            &Filter::eq("result", FieldValue::Null),
        )
        .unwrap_err();
        let DataError::Filter { reason, .. } = err else {
            panic!("expected filter error");
        };
        assert!(reason.contains("JsonNull"), "reason should name the sentinels: {reason}");
    }

    #[test]
    fn test_eq_null_on_nullable_scalar_allowed() {
        validate_filter(
            &registry(),
            "Task",
            &Filter::eq("completed_at", FieldValue::Null),
        )
        .unwrap();
    }

    #[test]
    fn test_eq_null_on_required_scalar_rejected() {
        let err = validate_filter(
            &registry(),
            "Task",
            &Filter::eq("title", FieldValue::Null),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::Filter { .. }));
    }

    #[test]
    fn test_enum_membership_enforced() {
        let err =
            validate_filter(&registry(), "Task", &Filter::eq("status", "DONE")).unwrap_err();
        assert!(matches!(err, DataError::Filter { .. }));
        validate_filter(&registry(), "Task", &Filter::eq("status", "COMPLETED")).unwrap();
    }

    #[test]
    fn test_relation_context_switch() {
        // `environment` exists on Deployment, not Project: valid only inside
        // the relation predicate.
        let filter = Filter::some("deployments", Filter::eq("environment", "production"));
        validate_filter(&registry(), "Project", &filter).unwrap();

        let bad = Filter::some("deployments", Filter::eq("owner_id", FieldValue::Null));
        assert!(validate_filter(&registry(), "Project", &bad).is_err());
    }

    #[test]
    fn test_quantifier_cardinality_mismatch() {
        // `project` is to-one on Task
        let err = validate_filter(
            &registry(),
            "Task",
            &Filter::some("project", Filter::eq("name", "x")),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::Filter { .. }));

        validate_filter(
            &registry(),
            "Task",
            &Filter::is("project", Filter::eq("name", "x")),
        )
        .unwrap();
    }

    #[test]
    fn test_json_predicate_on_non_json_rejected() {
        let err = validate_filter(
            &registry(),
            "Task",
            &Filter::json_null("title", JsonNullFilter::DbNull),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::Filter { .. }));
    }

    #[test]
    fn test_insensitive_mode_on_non_string_rejected() {
        let err = validate_filter(
            &registry(),
            "Task",
            &Filter::eq("token_usage", FieldValue::Int(3)).insensitive(),
        )
        .unwrap_err();
        assert!(matches!(err, DataError::Filter { .. }));
    }
}
