//! # Schema Registry
//!
//! Single source of truth for the platform's relational schema: every entity,
//! its scalar fields (type, nullability, enum membership), its relations
//! (target, cardinality, foreign key), and its unique keys. Filter and
//! groupBy validation resolve every field name through this registry, so an
//! unknown name fails the request before any repository call.

pub mod entities;

use crate::error::{DataError, Result};
use crate::filter::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Storage type of a scalar column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    DateTime,
    Uuid,
    /// JSON document column. Supports the three-state null contract:
    /// relational NULL, JSON literal `null`, and a non-null document.
    Json,
    /// String-backed enum; legal values live on [`ScalarField::allowed_values`].
    Enum,
}

impl FieldType {
    /// Types `_avg`/`_sum` accept.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Types the ordering operators (`lt`..`gte`, `_min`/`_max`) accept.
    pub fn is_orderable(&self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::String | Self::DateTime)
    }
}

/// A scalar column on an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    /// Legal values when `field_type` is `Enum`.
    pub allowed_values: Vec<String>,
    /// Value applied on create when the payload omits this field.
    pub default: Option<FieldValue>,
}

impl ScalarField {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            nullable: false,
            allowed_values: Vec::new(),
            default: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn values(mut self, values: &[&str]) -> Self {
        self.allowed_values = values.iter().map(|v| (*v).to_string()).collect();
        self
    }

    pub fn value_set(mut self, values: Vec<String>) -> Self {
        self.allowed_values = values;
        self
    }

    pub fn default_value(mut self, value: FieldValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn allows(&self, value: &str) -> bool {
        self.allowed_values.iter().any(|v| v == value)
    }
}

/// How a relation field reaches the related rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForeignKey {
    /// Column on this entity holding the target's id (to-one side).
    Local(String),
    /// Column on the target entity holding this entity's id (to-many side).
    Remote(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    ManyToOne,
    OneToMany,
    OneToOne,
}

impl Cardinality {
    /// To-many relations take the `some`/`every`/`none` quantifiers;
    /// to-one relations take `is`/`is_not`.
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::OneToMany)
    }
}

/// A relation field on an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationField {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub nullable: bool,
    pub foreign_key: ForeignKey,
}

impl RelationField {
    pub fn to_one(name: &str, target: &str, fk_column: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            cardinality: Cardinality::ManyToOne,
            nullable: false,
            foreign_key: ForeignKey::Local(fk_column.to_string()),
        }
    }

    pub fn to_many(name: &str, target: &str, fk_column: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            cardinality: Cardinality::OneToMany,
            nullable: false,
            foreign_key: ForeignKey::Remote(fk_column.to_string()),
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// A single-field or compound unique key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub fields: Vec<String>,
}

impl UniqueKey {
    pub fn single(field: &str) -> Self {
        Self {
            fields: vec![field.to_string()],
        }
    }

    pub fn compound(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
        }
    }
}

/// Full description of one entity.
#[derive(Debug, Clone)]
pub struct EntityDef {
    pub name: String,
    pub scalars: Vec<ScalarField>,
    pub relations: Vec<RelationField>,
    pub unique_keys: Vec<UniqueKey>,
}

impl EntityDef {
    pub fn scalar(&self, field: &str) -> Option<&ScalarField> {
        self.scalars.iter().find(|s| s.name == field)
    }

    pub fn relation(&self, field: &str) -> Option<&RelationField> {
        self.relations.iter().find(|r| r.name == field)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.scalar(field).is_some() || self.relation(field).is_some()
    }
}

/// Registry of every entity in the platform schema.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    entities: BTreeMap<String, EntityDef>,
}

impl SchemaRegistry {
    pub fn new(defs: Vec<EntityDef>) -> Self {
        let entities = defs.into_iter().map(|d| (d.name.clone(), d)).collect();
        Self { entities }
    }

    /// Look up an entity, failing with a `Schema` error when unknown.
    pub fn entity(&self, name: &str) -> Result<&EntityDef> {
        self.entities
            .get(name)
            .ok_or_else(|| DataError::schema(name, "unknown entity"))
    }

    /// Resolve a scalar field's type. Unknown entity or field is fatal to
    /// the request; a relation name here is reported as such.
    pub fn field_type(&self, entity: &str, field: &str) -> Result<&ScalarField> {
        let def = self.entity(entity)?;
        def.scalar(field).ok_or_else(|| {
            if def.relation(field).is_some() {
                DataError::schema(entity, format!("`{field}` is a relation, not a scalar field"))
            } else {
                DataError::schema(entity, format!("unknown field `{field}`"))
            }
        })
    }

    pub fn is_relation(&self, entity: &str, field: &str) -> Result<bool> {
        let def = self.entity(entity)?;
        if !def.has_field(field) {
            return Err(DataError::schema(entity, format!("unknown field `{field}`")));
        }
        Ok(def.relation(field).is_some())
    }

    pub fn relation(&self, entity: &str, field: &str) -> Result<&RelationField> {
        let def = self.entity(entity)?;
        def.relation(field).ok_or_else(|| {
            DataError::schema(entity, format!("`{field}` is not a relation"))
        })
    }

    pub fn unique_keys(&self, entity: &str) -> Result<&[UniqueKey]> {
        Ok(&self.entity(entity)?.unique_keys)
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}
