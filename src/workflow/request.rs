use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::EntityRef;

/// Resolution state of a [`StatusRequest`].
///
/// `Pending` moves exactly once to `Approved` or `Rejected`; both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Pending,
    Approved,
    Rejected,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestState::Pending)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestState::Pending => f.pad("pending"),
            RequestState::Approved => f.pad("approved"),
            RequestState::Rejected => f.pad("rejected"),
        }
    }
}

/// The approver's verdict on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn from_approve(approve: bool) -> Self {
        if approve {
            Decision::Approve
        } else {
            Decision::Reject
        }
    }

    pub fn resulting_state(self) -> RequestState {
        match self {
            Decision::Approve => RequestState::Approved,
            Decision::Reject => RequestState::Rejected,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Approve => write!(f, "approve"),
            Decision::Reject => write!(f, "reject"),
        }
    }
}

/// A requested status change awaiting (or past) review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRequest {
    pub id: Uuid,
    /// Position in the ledger; strictly increasing in submission order.
    pub seq: u64,
    pub entity: EntityRef,
    pub from_status: String,
    pub to_status: String,
    pub requester: String,
    pub reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub state: RequestState,
    pub resolver: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
}

impl StatusRequest {
    pub(crate) fn new(
        seq: u64,
        entity: EntityRef,
        from_status: String,
        to_status: String,
        requester: String,
        reason: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            seq,
            entity,
            from_status,
            to_status,
            requester,
            reason,
            requested_at: Utc::now(),
            state: RequestState::Pending,
            resolver: None,
            resolved_at: None,
            comment: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == RequestState::Pending
    }
}

/// Emitted once per decision for downstream notification and audit consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub request_id: Uuid,
    pub entity: EntityRef,
    pub from_status: String,
    pub to_status: String,
    pub outcome: RequestState,
    pub resolver: String,
    pub comment: Option<String>,
    pub decided_at: DateTime<Utc>,
    /// Milliseconds between submission and decision.
    pub wait_ms: i64,
}

impl DecisionEvent {
    /// Build the event from a request that has just been resolved.
    pub fn from_request(request: &StatusRequest) -> Self {
        let decided_at = request.resolved_at.unwrap_or_else(Utc::now);
        Self {
            request_id: request.id,
            entity: request.entity.clone(),
            from_status: request.from_status.clone(),
            to_status: request.to_status.clone(),
            outcome: request.state,
            resolver: request.resolver.clone().unwrap_or_default(),
            comment: request.comment.clone(),
            decided_at,
            wait_ms: (decided_at - request.requested_at).num_milliseconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request() -> StatusRequest {
        StatusRequest::new(
            0,
            EntityRef::new("purchase_requisition", "PR-1"),
            "draft".into(),
            "pending_approval".into(),
            "ana".into(),
            Some("ready for review".into()),
        )
    }

    #[test]
    fn new_request_is_pending() {
        let request = make_request();
        assert!(request.is_pending());
        assert!(request.resolver.is_none());
        assert!(request.resolved_at.is_none());
        assert!(!request.state.is_terminal());
    }

    #[test]
    fn decision_maps_to_terminal_state() {
        assert_eq!(Decision::from_approve(true), Decision::Approve);
        assert_eq!(Decision::Approve.resulting_state(), RequestState::Approved);
        assert_eq!(Decision::Reject.resulting_state(), RequestState::Rejected);
        assert!(RequestState::Approved.is_terminal());
        assert!(RequestState::Rejected.is_terminal());
    }

    #[test]
    fn event_from_resolved_request() {
        let mut request = make_request();
        request.state = RequestState::Rejected;
        request.resolver = Some("carla".into());
        request.resolved_at = Some(request.requested_at + chrono::Duration::milliseconds(250));
        request.comment = Some("missing quotes".into());

        let event = DecisionEvent::from_request(&request);
        assert_eq!(event.request_id, request.id);
        assert_eq!(event.outcome, RequestState::Rejected);
        assert_eq!(event.resolver, "carla");
        assert_eq!(event.wait_ms, 250);
        assert_eq!(event.comment.as_deref(), Some("missing quotes"));
    }

    #[test]
    fn request_state_serializes_lowercase() {
        let json = serde_json::to_string(&RequestState::Approved).unwrap();
        assert_eq!(json, "\"approved\"");
        assert_eq!(RequestState::Pending.to_string(), "pending");
    }
}
