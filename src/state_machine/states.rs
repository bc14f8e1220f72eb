//! Status and role enums for every lifecycle-bearing entity.
//!
//! Wire values are SCREAMING_SNAKE_CASE, matching what the platform stores
//! in the status columns. Each status enum knows its terminal states; the
//! legality of individual transitions lives in [`super::transitions`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Initial state at creation
    #[default]
    Pending,
    /// Dispatched to an AI provider and running
    InProgress,
    /// Finished successfully; stamps `completed_at`
    Completed,
    /// Finished unsuccessfully; stamps `completed_at`, retryable
    Failed,
    /// Abandoned by the caller
    Cancelled,
}

impl TaskStatus {
    /// No further transitions allowed (a failed task may still be retried).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Entering this state stamps `completed_at` exactly once.
    pub fn stamps_completed_at(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub const ALL: &'static [Self] = &[
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];
}

/// Task execution attempt states. One task may have many executions
/// (retries); an execution is append-only once it reaches a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    #[default]
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Timeout
        )
    }

    pub const ALL: &'static [Self] = &[
        Self::Queued,
        Self::Running,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
        Self::Timeout,
    ];
}

/// Quality gate evaluation states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateStatus {
    #[default]
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
}

impl GateStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Skipped)
    }

    /// While evaluation has not finished, `score`/`issues`/`report`
    /// must stay empty.
    pub fn holds_results(&self) -> bool {
        self.is_terminal()
    }

    pub const ALL: &'static [Self] = &[
        Self::Pending,
        Self::Running,
        Self::Passed,
        Self::Failed,
        Self::Skipped,
    ];
}

/// Kinds of automated quality checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateType {
    SecurityScan,
    LintCheck,
    TestCoverage,
    PerformanceCheck,
    CodeReview,
}

impl GateType {
    pub const ALL: &'static [Self] = &[
        Self::SecurityScan,
        Self::LintCheck,
        Self::TestCoverage,
        Self::PerformanceCheck,
        Self::CodeReview,
    ];
}

/// Deployment lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    #[default]
    Pending,
    Building,
    Deploying,
    /// Live; stamps `deployed_at` (preserved through a later rollback)
    Deployed,
    Failed,
    RolledBack,
}

impl DeploymentStatus {
    pub fn stamps_deployed_at(&self) -> bool {
        matches!(self, Self::Deployed)
    }

    pub const ALL: &'static [Self] = &[
        Self::Pending,
        Self::Building,
        Self::Deploying,
        Self::Deployed,
        Self::Failed,
        Self::RolledBack,
    ];
}

/// AI team coordination states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeamStatus {
    #[default]
    Active,
    Paused,
    Disbanded,
}

impl TeamStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disbanded)
    }

    pub const ALL: &'static [Self] = &[Self::Active, Self::Paused, Self::Disbanded];
}

/// Project states. Transitions are caller-driven; the engine enforces no
/// ordering between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    #[default]
    Active,
    Paused,
    Completed,
    Archived,
}

impl ProjectStatus {
    pub const ALL: &'static [Self] = &[
        Self::Active,
        Self::Paused,
        Self::Completed,
        Self::Archived,
    ];
}

/// Platform user roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    #[default]
    Developer,
    Viewer,
}

impl UserRole {
    pub const ALL: &'static [Self] = &[Self::Admin, Self::Developer, Self::Viewer];
}

/// Roles inside an AI team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeamRole {
    Lead,
    Specialist,
    Assistant,
    Reviewer,
}

impl TeamRole {
    pub const ALL: &'static [Self] = &[
        Self::Lead,
        Self::Specialist,
        Self::Assistant,
        Self::Reviewer,
    ];
}

/// Task priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub const ALL: &'static [Self] = &[Self::Low, Self::Medium, Self::High, Self::Critical];
}

macro_rules! impl_wire_strings {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    // serde emits the canonical SCREAMING_SNAKE_CASE token
                    let s = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                    write!(f, "{}", s.trim_matches('"'))
                }
            }

            impl std::str::FromStr for $ty {
                type Err = String;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    serde_json::from_str(&format!("\"{s}\""))
                        .map_err(|_| format!("invalid {} value: {s}", stringify!($ty)))
                }
            }
        )+
    };
}

impl_wire_strings!(
    TaskStatus,
    ExecutionStatus,
    GateStatus,
    GateType,
    DeploymentStatus,
    TeamStatus,
    ProjectStatus,
    UserRole,
    TeamRole,
    TaskPriority,
);

/// Wire names for a status enum, in declaration order.
pub fn wire_names<T: fmt::Display>(all: &[T]) -> Vec<String> {
    all.iter().map(|v| v.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_terminal_check() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_execution_terminal_states() {
        assert!(ExecutionStatus::Timeout.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(!ExecutionStatus::Queued.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
    }

    #[test]
    fn test_status_string_conversion() {
        assert_eq!(TaskStatus::InProgress.to_string(), "IN_PROGRESS");
        assert_eq!(
            "IN_PROGRESS".parse::<TaskStatus>().unwrap(),
            TaskStatus::InProgress
        );
        assert_eq!(DeploymentStatus::RolledBack.to_string(), "ROLLED_BACK");
        assert_eq!(
            "SECURITY_SCAN".parse::<GateType>().unwrap(),
            GateType::SecurityScan
        );
        assert!("NOT_A_STATE".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_serde() {
        let status = ExecutionStatus::Timeout;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"TIMEOUT\"");
        let parsed: ExecutionStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(TaskStatus::default(), TaskStatus::Pending);
        assert_eq!(ExecutionStatus::default(), ExecutionStatus::Queued);
        assert_eq!(GateStatus::default(), GateStatus::Pending);
        assert_eq!(DeploymentStatus::default(), DeploymentStatus::Pending);
        assert_eq!(TeamStatus::default(), TeamStatus::Active);
    }
}
