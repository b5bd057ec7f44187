pub mod config;
pub mod domain;
pub mod errors;
pub mod notifications;
pub mod submissions;
pub mod workflow;

pub use domain::document::VisaDocument;
pub use domain::payload::RequestPayload;
pub use domain::request::{RequestId, RequestKind, Requestor, ServiceRequest};
pub use domain::step::{ApprovalStep, StepOutcome};
pub use domain::user::{Role, User};
pub use errors::{DomainError, FieldError};
pub use notifications::{NotificationEvent, Notifier};
pub use submissions::{SubmissionCheck, SubmissionGuard};
pub use workflow::{workflow_for, ActorContext, Transition, WorkflowAction, WorkflowEngine, WorkflowError};
