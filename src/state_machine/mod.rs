//! Entity lifecycles: status enums plus the write-boundary transition
//! planner that derives timestamps and enforces legality.

pub mod states;
pub mod transitions;

pub use states::{
    DeploymentStatus, ExecutionStatus, GateStatus, GateType, ProjectStatus, TaskPriority,
    TaskStatus, TeamRole, TeamStatus, UserRole,
};
pub use transitions::{plan_transition, TransitionPlan};
