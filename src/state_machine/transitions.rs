//! Write-boundary lifecycle enforcement.
//!
//! The stored schema does not encode transition tables; this module hardens
//! the documented lifecycles into explicit legality checks and computes the
//! derived writes each transition implies (`completed_at`, `started_at`,
//! `deployed_at`). Re-entering the current state is an idempotent no-op:
//! no second timestamp write, no status write.

use super::states::{
    DeploymentStatus, ExecutionStatus, GateStatus, ProjectStatus, TaskStatus, TeamStatus,
};
use crate::error::{DataError, Result};
use crate::filter::FieldValue;
use crate::repository::Row;
use chrono::{DateTime, Utc};

/// The writes a status change implies. Empty changes mean the transition
/// was an idempotent re-entry and nothing needs to touch the datastore.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransitionPlan {
    pub changes: Row,
}

impl TransitionPlan {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

fn current_status(entity: &str, row: &Row) -> Result<String> {
    match row.get("status") {
        Some(FieldValue::String(s)) => Ok(s.clone()),
        _ => Err(DataError::schema(entity, "row carries no status column")),
    }
}

fn parse<T: std::str::FromStr>(entity: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| DataError::filter(entity, "status", format!("unknown status `{value}`")))
}

fn illegal(entity: &str, from: impl ToString, to: impl ToString) -> DataError {
    DataError::StateTransition {
        entity: entity.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    }
}

fn timestamp_unset(row: &Row, field: &str) -> bool {
    row.get(field).map(FieldValue::is_null).unwrap_or(true)
}

fn stamp(changes: &mut Row, row: &Row, field: &str, now: DateTime<Utc>) {
    // Set exactly once; a repeated terminal entry keeps the original stamp.
    if timestamp_unset(row, field) {
        changes.insert(field.to_string(), FieldValue::DateTime(now));
    }
}

/// Plan the status change for one row of a lifecycle-bearing entity.
/// `extra` is merged into the resulting write after the invariant checks
/// (it is how quality gates deliver their results, for example).
pub fn plan_transition(
    entity: &str,
    row: &Row,
    target: &str,
    extra: Row,
    now: DateTime<Utc>,
) -> Result<TransitionPlan> {
    let from_raw = current_status(entity, row)?;
    let mut changes = match entity {
        "Task" => plan_task(row, &from_raw, target, now)?,
        "TaskExecution" => plan_execution(row, &from_raw, target, now)?,
        "QualityGate" => plan_gate(&from_raw, target, &extra)?,
        "Deployment" => plan_deployment(row, &from_raw, target, now)?,
        "AITeam" => plan_team(&from_raw, target)?,
        "Project" => plan_project(&from_raw, target)?,
        _ => {
            return Err(DataError::schema(
                entity,
                "entity has no status lifecycle",
            ))
        }
    };
    for (field, value) in extra {
        changes.insert(field, value);
    }
    Ok(TransitionPlan { changes })
}

fn plan_task(row: &Row, from_raw: &str, target: &str, now: DateTime<Utc>) -> Result<Row> {
    let from: TaskStatus = parse("Task", from_raw)?;
    let to: TaskStatus = parse("Task", target)?;
    if from == to {
        return Ok(Row::new());
    }

    use TaskStatus::*;
    let allowed = matches!(
        (from, to),
        (Pending, InProgress | Cancelled | Failed)
            | (InProgress, Completed | Failed | Cancelled)
            | (Failed, Pending | InProgress)
    );
    if !allowed {
        return Err(illegal("Task", from, to));
    }

    let mut changes = Row::new();
    changes.insert("status".to_string(), FieldValue::String(to.to_string()));
    if to.stamps_completed_at() {
        stamp(&mut changes, row, "completed_at", now);
    }
    Ok(changes)
}

fn plan_execution(row: &Row, from_raw: &str, target: &str, now: DateTime<Utc>) -> Result<Row> {
    let from: ExecutionStatus = parse("TaskExecution", from_raw)?;
    let to: ExecutionStatus = parse("TaskExecution", target)?;
    if from == to {
        return Ok(Row::new());
    }

    // Append-only once finished. Skipping RUNNING is legal.
    use ExecutionStatus::*;
    let allowed = matches!(
        (from, to),
        (Queued, Running | Completed | Failed | Cancelled | Timeout)
            | (Running, Completed | Failed | Cancelled | Timeout)
    );
    if !allowed {
        return Err(illegal("TaskExecution", from, to));
    }

    let mut changes = Row::new();
    changes.insert("status".to_string(), FieldValue::String(to.to_string()));
    if to == Running {
        stamp(&mut changes, row, "started_at", now);
    }
    if to.is_terminal() {
        stamp(&mut changes, row, "completed_at", now);
    }
    Ok(changes)
}

fn plan_gate(from_raw: &str, target: &str, extra: &Row) -> Result<Row> {
    let from: GateStatus = parse("QualityGate", from_raw)?;
    let to: GateStatus = parse("QualityGate", target)?;

    // Results exist only once evaluation has finished.
    if !to.holds_results() {
        for field in ["score", "issues", "report"] {
            if extra.contains_key(field) {
                return Err(DataError::filter(
                    "QualityGate",
                    field,
                    "populated only once evaluation leaves PENDING/RUNNING",
                ));
            }
        }
    }
    if from == to {
        return Ok(Row::new());
    }

    use GateStatus::*;
    let allowed = matches!(
        (from, to),
        (Pending, Running | Passed | Failed | Skipped) | (Running, Passed | Failed | Skipped)
    );
    if !allowed {
        return Err(illegal("QualityGate", from, to));
    }

    let mut changes = Row::new();
    changes.insert("status".to_string(), FieldValue::String(to.to_string()));
    Ok(changes)
}

fn plan_deployment(row: &Row, from_raw: &str, target: &str, now: DateTime<Utc>) -> Result<Row> {
    let from: DeploymentStatus = parse("Deployment", from_raw)?;
    let to: DeploymentStatus = parse("Deployment", target)?;
    if from == to {
        return Ok(Row::new());
    }

    use DeploymentStatus::*;
    let allowed = matches!(
        (from, to),
        (Pending, Building | Deploying | Failed)
            | (Building, Deploying | Failed)
            | (Deploying, Deployed | Failed)
            | (Deployed, RolledBack)
            | (Failed, Building)
            | (RolledBack, Building)
    );
    if !allowed {
        return Err(illegal("Deployment", from, to));
    }

    let mut changes = Row::new();
    changes.insert("status".to_string(), FieldValue::String(to.to_string()));
    if to.stamps_deployed_at() {
        // A later ROLLED_BACK keeps this stamp: deployment happened.
        stamp(&mut changes, row, "deployed_at", now);
    }
    Ok(changes)
}

fn plan_team(from_raw: &str, target: &str) -> Result<Row> {
    let from: TeamStatus = parse("AITeam", from_raw)?;
    let to: TeamStatus = parse("AITeam", target)?;
    if from == to {
        return Ok(Row::new());
    }

    use TeamStatus::*;
    let allowed = matches!(
        (from, to),
        (Active, Paused | Disbanded) | (Paused, Active | Disbanded)
    );
    if !allowed {
        return Err(illegal("AITeam", from, to));
    }

    let mut changes = Row::new();
    changes.insert("status".to_string(), FieldValue::String(to.to_string()));
    Ok(changes)
}

fn plan_project(from_raw: &str, target: &str) -> Result<Row> {
    let from: ProjectStatus = parse("Project", from_raw)?;
    let to: ProjectStatus = parse("Project", target)?;
    if from == to {
        return Ok(Row::new());
    }
    // Project status is caller-driven; every transition is legal.
    let mut changes = Row::new();
    changes.insert("status".to_string(), FieldValue::String(to.to_string()));
    Ok(changes)
}
