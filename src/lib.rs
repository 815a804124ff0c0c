//! Status approval workflow for purchasing and accounting back-offices.
//!
//! Records carry one current status; changes go through a pending
//! [`StatusRequest`](workflow::StatusRequest) that an approver resolves via
//! the [`ApprovalEngine`](engine::ApprovalEngine).

pub mod cli;
pub mod config;
pub mod engine;
pub mod entities;
pub mod error;
pub mod projection;
pub mod store;
pub mod telemetry;
pub mod ui;
pub mod workflow;

pub use engine::{ApprovalEngine, WorkflowState};
pub use error::{AppError, WorkflowError, WorkflowResult};
pub use projection::{Projection, RequestCursor};
pub use workflow::{
    DecisionEvent, EntityRef, HasStatus, ModelStatus, RequestState, StatusRegistry, StatusRequest,
};
