pub mod definition;
pub mod engine;
pub mod history;

pub use definition::{
    workflow_for, ApprovalStage, ProcessingStage, StatusPosition, WorkflowDefinition,
    STATUS_CANCELLED, STATUS_REJECTED,
};
pub use engine::{ActorContext, Transition, WorkflowAction, WorkflowEngine, WorkflowError};
pub use history::{reconstruct, WorkflowStepView};
