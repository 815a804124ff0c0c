use thiserror::Error;
use uuid::Uuid;

use crate::workflow::EntityRef;

/// Validation failures raised by the registry, the ledger and the engine.
///
/// Every variant is recoverable and carries enough context for the caller
/// to show a precise message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Unknown or inactive status `{status}` for entity type `{entity_type}`")]
    UnknownStatus { entity_type: String, status: String },

    #[error("Transition {from} -> {to} is not allowed for {entity}")]
    InvalidTransition {
        entity: EntityRef,
        from: String,
        to: String,
    },

    #[error("{entity} already has a pending status request ({request_id})")]
    DuplicatePending { entity: EntityRef, request_id: Uuid },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Status request {request_id} is already {state}")]
    AlreadyResolved { request_id: Uuid, state: String },

    #[error("Request {request_id} to move {entity} {from} -> {to} is stale (current status: {current})")]
    StaleTransition {
        request_id: Uuid,
        entity: EntityRef,
        from: String,
        to: String,
        current: String,
    },

    #[error("{entity} is already tracked with status `{status}`")]
    AlreadyTracked { entity: EntityRef, status: String },

    #[error("Status `{status}` of `{entity_type}` is still referenced and cannot be removed")]
    StatusInUse { entity_type: String, status: String },

    #[error("Status `{status}` already exists for entity type `{entity_type}`")]
    DuplicateStatus { entity_type: String, status: String },
}

impl WorkflowError {
    pub(crate) fn request_not_found(id: Uuid) -> Self {
        WorkflowError::NotFound {
            kind: "Status request",
            id: id.to_string(),
        }
    }

    pub(crate) fn entity_not_found(entity: &EntityRef) -> Self {
        WorkflowError::NotFound {
            kind: "Tracked entity",
            id: entity.to_string(),
        }
    }

    pub(crate) fn unknown_status(entity_type: &str, status: &str) -> Self {
        WorkflowError::UnknownStatus {
            entity_type: entity_type.to_string(),
            status: status.to_string(),
        }
    }
}

/// Top-level error for the binary, the snapshot store and configuration loading.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_display() {
        let err = WorkflowError::InvalidTransition {
            entity: EntityRef::new("quotation", "Q-7"),
            from: "draft".into(),
            to: "approved".into(),
        };
        assert_eq!(
            err.to_string(),
            "Transition draft -> approved is not allowed for quotation#Q-7"
        );
    }

    #[test]
    fn not_found_display() {
        let err = WorkflowError::entity_not_found(&EntityRef::new("price_list", "12"));
        assert_eq!(err.to_string(), "Tracked entity not found: price_list#12");
    }

    #[test]
    fn workflow_error_converts_into_app_error() {
        let err: AppError = WorkflowError::unknown_status("tax_rule", "void").into();
        assert!(matches!(err, AppError::Workflow(WorkflowError::UnknownStatus { .. })));
        assert_eq!(
            err.to_string(),
            "Unknown or inactive status `void` for entity type `tax_rule`"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WorkflowError>();
        assert_send_sync::<AppError>();
    }
}
