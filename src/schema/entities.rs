//! The platform schema: ten entities covering users, projects, AI-dispatched
//! tasks, executions, quality gates, teams, deployments, files, and sessions.
//!
//! Every entity carries `id`/`created_at`/`updated_at`; those are filled by
//! the engine on create when the payload omits them. Status columns default
//! to each lifecycle's initial state.

use super::{EntityDef, FieldType, RelationField, ScalarField, SchemaRegistry, UniqueKey};
use crate::filter::FieldValue;
use crate::state_machine::states::{
    wire_names, DeploymentStatus, ExecutionStatus, GateStatus, GateType, ProjectStatus,
    TaskPriority, TaskStatus, TeamRole, TeamStatus, UserRole,
};

fn base_scalars() -> Vec<ScalarField> {
    vec![
        ScalarField::new("id", FieldType::Uuid),
        ScalarField::new("created_at", FieldType::DateTime),
        ScalarField::new("updated_at", FieldType::DateTime),
    ]
}

fn status_field(name: &str, values: Vec<String>, initial: &str) -> ScalarField {
    ScalarField::new(name, FieldType::Enum)
        .value_set(values)
        .default_value(FieldValue::String(initial.to_string()))
}

fn user() -> EntityDef {
    let mut scalars = base_scalars();
    scalars.extend([
        ScalarField::new("email", FieldType::String),
        ScalarField::new("name", FieldType::String).nullable(),
        status_field("role", wire_names(UserRole::ALL), "DEVELOPER"),
        ScalarField::new("is_active", FieldType::Bool).default_value(FieldValue::Bool(true)),
    ]);
    EntityDef {
        name: "User".to_string(),
        scalars,
        relations: vec![
            RelationField::to_many("projects", "Project", "owner_id"),
            RelationField::to_many("tasks", "Task", "user_id"),
            RelationField::to_many("sessions", "Session", "user_id"),
            RelationField::to_many("team_members", "TeamMember", "user_id"),
        ],
        unique_keys: vec![UniqueKey::single("id"), UniqueKey::single("email")],
    }
}

fn project() -> EntityDef {
    let mut scalars = base_scalars();
    scalars.extend([
        ScalarField::new("name", FieldType::String),
        ScalarField::new("description", FieldType::String).nullable(),
        status_field("status", wire_names(ProjectStatus::ALL), "ACTIVE"),
        ScalarField::new("repository", FieldType::String).nullable(),
        ScalarField::new("framework", FieldType::String).nullable(),
        ScalarField::new("language", FieldType::String).nullable(),
        ScalarField::new("owner_id", FieldType::Uuid),
    ]);
    EntityDef {
        name: "Project".to_string(),
        scalars,
        relations: vec![
            RelationField::to_one("owner", "User", "owner_id"),
            RelationField::to_many("tasks", "Task", "project_id"),
            RelationField::to_many("deployments", "Deployment", "project_id"),
            RelationField::to_many("quality_gates", "QualityGate", "project_id"),
            RelationField::to_many("files", "ProjectFile", "project_id"),
        ],
        unique_keys: vec![UniqueKey::single("id")],
    }
}

fn task() -> EntityDef {
    let mut scalars = base_scalars();
    scalars.extend([
        ScalarField::new("title", FieldType::String),
        ScalarField::new("description", FieldType::String).nullable(),
        status_field("status", wire_names(TaskStatus::ALL), "PENDING"),
        status_field("priority", wire_names(TaskPriority::ALL), "MEDIUM"),
        ScalarField::new("ai_provider", FieldType::String),
        ScalarField::new("type", FieldType::String),
        ScalarField::new("context", FieldType::Json),
        ScalarField::new("requirements", FieldType::Json).nullable(),
        ScalarField::new("constraints", FieldType::Json).nullable(),
        ScalarField::new("result", FieldType::Json).nullable(),
        ScalarField::new("artifacts", FieldType::Json).nullable(),
        ScalarField::new("token_usage", FieldType::Int).nullable(),
        ScalarField::new("cost", FieldType::Float).nullable(),
        ScalarField::new("duration", FieldType::Int).nullable(),
        ScalarField::new("quality", FieldType::Float).nullable(),
        ScalarField::new("completed_at", FieldType::DateTime).nullable(),
        ScalarField::new("project_id", FieldType::Uuid),
        ScalarField::new("user_id", FieldType::Uuid),
    ]);
    EntityDef {
        name: "Task".to_string(),
        scalars,
        relations: vec![
            RelationField::to_one("project", "Project", "project_id"),
            RelationField::to_one("user", "User", "user_id"),
            RelationField::to_many("quality_gates", "QualityGate", "task_id"),
            RelationField::to_many("executions", "TaskExecution", "task_id"),
        ],
        unique_keys: vec![UniqueKey::single("id")],
    }
}

fn task_execution() -> EntityDef {
    let mut scalars = base_scalars();
    scalars.extend([
        status_field("status", wire_names(ExecutionStatus::ALL), "QUEUED"),
        ScalarField::new("started_at", FieldType::DateTime).nullable(),
        ScalarField::new("completed_at", FieldType::DateTime).nullable(),
        ScalarField::new("input", FieldType::Json),
        ScalarField::new("output", FieldType::Json).nullable(),
        ScalarField::new("logs", FieldType::Json).nullable(),
        ScalarField::new("metrics", FieldType::Json).nullable(),
        ScalarField::new("error_message", FieldType::String).nullable(),
        ScalarField::new("task_id", FieldType::Uuid),
    ]);
    EntityDef {
        name: "TaskExecution".to_string(),
        scalars,
        relations: vec![RelationField::to_one("task", "Task", "task_id")],
        unique_keys: vec![UniqueKey::single("id")],
    }
}

fn quality_gate() -> EntityDef {
    let mut scalars = base_scalars();
    scalars.extend([
        ScalarField::new("type", FieldType::Enum).value_set(wire_names(GateType::ALL)),
        status_field("status", wire_names(GateStatus::ALL), "PENDING"),
        ScalarField::new("rules", FieldType::Json),
        ScalarField::new("score", FieldType::Float).nullable(),
        ScalarField::new("issues", FieldType::Json).nullable(),
        ScalarField::new("report", FieldType::Json).nullable(),
        ScalarField::new("project_id", FieldType::Uuid),
        ScalarField::new("task_id", FieldType::Uuid).nullable(),
    ]);
    EntityDef {
        name: "QualityGate".to_string(),
        scalars,
        relations: vec![
            RelationField::to_one("project", "Project", "project_id"),
            RelationField::to_one("task", "Task", "task_id").nullable(),
        ],
        unique_keys: vec![UniqueKey::single("id")],
    }
}

fn ai_team() -> EntityDef {
    let mut scalars = base_scalars();
    scalars.extend([
        ScalarField::new("name", FieldType::String),
        status_field("status", wire_names(TeamStatus::ALL), "ACTIVE"),
        // Assignment / fallback / coordination strategy. Structure is
        // immutable, content mutable; opaque to the query engine either way.
        ScalarField::new("strategy", FieldType::Json),
        ScalarField::new("preferences", FieldType::Json).nullable(),
    ]);
    EntityDef {
        name: "AITeam".to_string(),
        scalars,
        relations: vec![RelationField::to_many("members", "TeamMember", "team_id")],
        unique_keys: vec![UniqueKey::single("id")],
    }
}

fn team_member() -> EntityDef {
    let mut scalars = base_scalars();
    scalars.extend([
        ScalarField::new("role", FieldType::Enum).value_set(wire_names(TeamRole::ALL)),
        ScalarField::new("ai_provider", FieldType::String),
        ScalarField::new("model", FieldType::String),
        ScalarField::new("specialties", FieldType::Json).nullable(),
        ScalarField::new("performance", FieldType::Json).nullable(),
        ScalarField::new("team_id", FieldType::Uuid),
        // A member may exist without a linked human user.
        ScalarField::new("user_id", FieldType::Uuid).nullable(),
    ]);
    EntityDef {
        name: "TeamMember".to_string(),
        scalars,
        relations: vec![
            RelationField::to_one("team", "AITeam", "team_id"),
            RelationField::to_one("user", "User", "user_id").nullable(),
        ],
        unique_keys: vec![UniqueKey::single("id")],
    }
}

fn deployment() -> EntityDef {
    let mut scalars = base_scalars();
    scalars.extend([
        ScalarField::new("version", FieldType::String),
        status_field("status", wire_names(DeploymentStatus::ALL), "PENDING"),
        ScalarField::new("environment", FieldType::String),
        ScalarField::new("config", FieldType::Json).nullable(),
        ScalarField::new("logs", FieldType::Json).nullable(),
        ScalarField::new("deployed_at", FieldType::DateTime).nullable(),
        ScalarField::new("project_id", FieldType::Uuid),
    ]);
    EntityDef {
        name: "Deployment".to_string(),
        scalars,
        relations: vec![RelationField::to_one("project", "Project", "project_id")],
        unique_keys: vec![UniqueKey::single("id")],
    }
}

fn project_file() -> EntityDef {
    let mut scalars = base_scalars();
    scalars.extend([
        ScalarField::new("path", FieldType::String),
        ScalarField::new("name", FieldType::String),
        ScalarField::new("size", FieldType::Int),
        ScalarField::new("checksum", FieldType::String),
        ScalarField::new("language", FieldType::String).nullable(),
        ScalarField::new("framework", FieldType::String).nullable(),
        ScalarField::new("purpose", FieldType::String).nullable(),
        ScalarField::new("project_id", FieldType::Uuid),
    ]);
    EntityDef {
        name: "ProjectFile".to_string(),
        scalars,
        relations: vec![RelationField::to_one("project", "Project", "project_id")],
        unique_keys: vec![
            UniqueKey::single("id"),
            // Path is unique per project, not globally.
            UniqueKey::compound(&["project_id", "path"]),
        ],
    }
}

fn session() -> EntityDef {
    let mut scalars = base_scalars();
    scalars.extend([
        ScalarField::new("session_id", FieldType::String),
        ScalarField::new("data", FieldType::Json).nullable(),
        // Expiry is a timestamp the application layer sweeps; the data
        // layer does not delete on read.
        ScalarField::new("expires_at", FieldType::DateTime),
        ScalarField::new("user_id", FieldType::Uuid),
    ]);
    EntityDef {
        name: "Session".to_string(),
        scalars,
        relations: vec![RelationField::to_one("user", "User", "user_id")],
        unique_keys: vec![UniqueKey::single("id"), UniqueKey::single("session_id")],
    }
}

impl SchemaRegistry {
    /// The full platform schema.
    pub fn platform() -> Self {
        Self::new(vec![
            user(),
            project(),
            task(),
            task_execution(),
            quality_gate(),
            ai_team(),
            team_member(),
            deployment(),
            project_file(),
            session(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_entities_registered() {
        let registry = SchemaRegistry::platform();
        for name in [
            "User",
            "Project",
            "Task",
            "TaskExecution",
            "QualityGate",
            "AITeam",
            "TeamMember",
            "Deployment",
            "ProjectFile",
            "Session",
        ] {
            assert!(registry.entity(name).is_ok(), "missing entity {name}");
        }
    }

    #[test]
    fn test_relation_targets_exist() {
        let registry = SchemaRegistry::platform();
        let names: Vec<String> = registry.entity_names().map(str::to_string).collect();
        for name in &names {
            let def = registry.entity(name).unwrap();
            for relation in &def.relations {
                assert!(
                    names.contains(&relation.target),
                    "{name}.{} targets unknown entity {}",
                    relation.name,
                    relation.target
                );
            }
        }
    }

    #[test]
    fn test_status_defaults_match_lifecycles() {
        let registry = SchemaRegistry::platform();
        let status = registry.field_type("Task", "status").unwrap();
        assert_eq!(
            status.default,
            Some(FieldValue::String("PENDING".to_string()))
        );
        let status = registry.field_type("TaskExecution", "status").unwrap();
        assert_eq!(
            status.default,
            Some(FieldValue::String("QUEUED".to_string()))
        );
    }

    #[test]
    fn test_nullable_json_columns_declared() {
        let registry = SchemaRegistry::platform();
        for (entity, field) in [
            ("Task", "result"),
            ("TaskExecution", "output"),
            ("Deployment", "config"),
            ("Session", "data"),
        ] {
            let scalar = registry.field_type(entity, field).unwrap();
            assert_eq!(scalar.field_type, FieldType::Json);
            assert!(scalar.nullable, "{entity}.{field} should be nullable");
        }
        // Required JSON columns stay non-nullable.
        assert!(!registry.field_type("Task", "context").unwrap().nullable);
        assert!(!registry.field_type("AITeam", "strategy").unwrap().nullable);
    }
}
