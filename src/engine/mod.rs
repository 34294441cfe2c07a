//! Execution engine for workflows.

mod executor;
pub mod pricing;

pub use executor::{
    ExecutionContext, ExecutionResult, ExecutionStatus, Executor, StepCostEntry, StepRecord,
    StepStatus,
};
pub use pricing::{calculate_revenue, partial_revenue, Revenue};
