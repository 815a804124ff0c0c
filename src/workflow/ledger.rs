use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use super::registry::StatusRegistry;
use super::request::{Decision, StatusRequest};
use super::status::EntityRef;
use crate::error::{WorkflowError, WorkflowResult};

/// Append-only record of status-change requests and their resolutions.
///
/// The ledger never touches entity bindings; applying an approved change is
/// the engine's job.
#[derive(Debug, Clone, Default)]
pub struct StatusLedger {
    requests: Vec<StatusRequest>,
    index: HashMap<Uuid, usize>,
    pending: HashMap<EntityRef, Uuid>,
    next_seq: u64,
}

impl StatusLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted requests.
    ///
    /// Requests are ordered by `seq`; a second pending request for the same
    /// entity is rejected with `DuplicatePending`.
    pub fn from_requests(mut requests: Vec<StatusRequest>) -> WorkflowResult<Self> {
        requests.sort_by_key(|r| r.seq);
        let mut ledger = Self::new();
        for request in requests {
            if request.is_pending() {
                if let Some(existing) = ledger.pending.get(&request.entity) {
                    return Err(WorkflowError::DuplicatePending {
                        entity: request.entity.clone(),
                        request_id: *existing,
                    });
                }
                ledger.pending.insert(request.entity.clone(), request.id);
            }
            ledger.next_seq = request.seq + 1;
            ledger.index.insert(request.id, ledger.requests.len());
            ledger.requests.push(request);
        }
        Ok(ledger)
    }

    /// Record a new pending request for `entity`.
    ///
    /// Fails with `InvalidTransition` when `to` is not reachable from `from`
    /// and with `DuplicatePending` when the entity already has an open request.
    /// Nothing is recorded on failure.
    pub fn submit(
        &mut self,
        registry: &StatusRegistry,
        entity: &EntityRef,
        from: &str,
        to: &str,
        requester: &str,
        reason: Option<String>,
    ) -> WorkflowResult<&StatusRequest> {
        if !registry.is_allowed(&entity.entity_type, from, to)? {
            return Err(WorkflowError::InvalidTransition {
                entity: entity.clone(),
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        if let Some(existing) = self.pending.get(entity) {
            return Err(WorkflowError::DuplicatePending {
                entity: entity.clone(),
                request_id: *existing,
            });
        }

        let request = StatusRequest::new(
            self.next_seq,
            entity.clone(),
            from.to_string(),
            to.to_string(),
            requester.to_string(),
            reason,
        );
        self.next_seq += 1;
        self.pending.insert(entity.clone(), request.id);
        self.index.insert(request.id, self.requests.len());
        self.requests.push(request);
        Ok(&self.requests[self.requests.len() - 1])
    }

    pub fn get(&self, id: Uuid) -> WorkflowResult<&StatusRequest> {
        self.index
            .get(&id)
            .map(|&i| &self.requests[i])
            .ok_or_else(|| WorkflowError::request_not_found(id))
    }

    pub fn pending_for(&self, entity: &EntityRef) -> Option<&StatusRequest> {
        self.pending.get(entity).and_then(|id| self.get(*id).ok())
    }

    /// Pending requests oldest first, optionally restricted to one entity type.
    pub fn list_pending<'a>(
        &'a self,
        entity_type: Option<&'a str>,
    ) -> impl Iterator<Item = &'a StatusRequest> + 'a {
        self.pending_after(entity_type, None)
    }

    /// Same as [`list_pending`](Self::list_pending) but resuming after the given `seq`.
    pub fn pending_after<'a>(
        &'a self,
        entity_type: Option<&'a str>,
        after: Option<u64>,
    ) -> impl Iterator<Item = &'a StatusRequest> + 'a {
        self.from_position(after).iter().filter(move |r| {
            r.is_pending() && entity_type.is_none_or(|t| r.entity.entity_type == t)
        })
    }

    /// Every request ever made for `entity`, in submission order.
    pub fn history<'a>(&'a self, entity: &'a EntityRef) -> impl Iterator<Item = &'a StatusRequest> + 'a {
        self.history_after(entity, None)
    }

    pub fn history_after<'a>(
        &'a self,
        entity: &'a EntityRef,
        after: Option<u64>,
    ) -> impl Iterator<Item = &'a StatusRequest> + 'a {
        self.from_position(after)
            .iter()
            .filter(move |r| &r.entity == entity)
    }

    /// Mark a pending request as approved or rejected.
    pub fn resolve(
        &mut self,
        id: Uuid,
        decision: Decision,
        resolver: &str,
        comment: Option<String>,
    ) -> WorkflowResult<&StatusRequest> {
        let position = *self
            .index
            .get(&id)
            .ok_or_else(|| WorkflowError::request_not_found(id))?;
        let request = &mut self.requests[position];
        if !request.is_pending() {
            return Err(WorkflowError::AlreadyResolved {
                request_id: id,
                state: request.state.to_string(),
            });
        }

        request.state = decision.resulting_state();
        request.resolver = Some(resolver.to_string());
        request.resolved_at = Some(Utc::now());
        request.comment = comment;
        self.pending.remove(&request.entity);
        Ok(&self.requests[position])
    }

    /// True when any request moves from or to the given status.
    pub fn references_status(&self, entity_type: &str, name: &str) -> bool {
        self.requests.iter().any(|r| {
            r.entity.entity_type == entity_type && (r.from_status == name || r.to_status == name)
        })
    }

    pub fn requests(&self) -> &[StatusRequest] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn from_position(&self, after: Option<u64>) -> &[StatusRequest] {
        match after {
            Some(seq) => {
                let start = self.requests.partition_point(|r| r.seq <= seq);
                &self.requests[start..]
            }
            None => &self.requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{ModelStatus, RequestState};

    fn registry() -> StatusRegistry {
        let mut registry = StatusRegistry::new();
        for entity_type in ["purchase_requisition", "quotation"] {
            registry
                .register_workflow(
                    entity_type,
                    "draft",
                    ["draft", "pending_approval", "approved"]
                        .into_iter()
                        .map(|n| ModelStatus::new(entity_type, n))
                        .collect(),
                    vec![
                        ("draft".to_string(), "pending_approval".to_string()),
                        ("pending_approval".to_string(), "approved".to_string()),
                    ],
                )
                .unwrap();
        }
        registry
    }

    fn submit(ledger: &mut StatusLedger, registry: &StatusRegistry, entity: &EntityRef) -> Uuid {
        ledger
            .submit(registry, entity, "draft", "pending_approval", "ana", None)
            .unwrap()
            .id
    }

    #[test]
    fn submit_records_pending_request() {
        let registry = registry();
        let mut ledger = StatusLedger::new();
        let entity = EntityRef::new("quotation", "Q-1");

        let request = ledger
            .submit(&registry, &entity, "draft", "pending_approval", "ana", Some("ok".into()))
            .unwrap()
            .clone();

        assert_eq!(request.seq, 0);
        assert_eq!(request.state, RequestState::Pending);
        assert_eq!(ledger.pending_for(&entity).unwrap().id, request.id);
        assert_eq!(ledger.get(request.id).unwrap(), &request);
    }

    #[test]
    fn invalid_transition_leaves_no_entry() {
        let registry = registry();
        let mut ledger = StatusLedger::new();
        let entity = EntityRef::new("quotation", "Q-1");

        let err = ledger
            .submit(&registry, &entity, "draft", "approved", "ana", None)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));

        let err = ledger
            .submit(&registry, &entity, "draft", "archived", "ana", None)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
        assert!(ledger.is_empty());
    }

    #[test]
    fn duplicate_pending_is_rejected() {
        let registry = registry();
        let mut ledger = StatusLedger::new();
        let entity = EntityRef::new("quotation", "Q-1");
        let first = submit(&mut ledger, &registry, &entity);

        let err = ledger
            .submit(&registry, &entity, "draft", "pending_approval", "bruno", None)
            .unwrap_err();
        assert_eq!(
            err,
            WorkflowError::DuplicatePending {
                entity: entity.clone(),
                request_id: first
            }
        );
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn resolve_is_single_shot() {
        let registry = registry();
        let mut ledger = StatusLedger::new();
        let entity = EntityRef::new("quotation", "Q-1");
        let id = submit(&mut ledger, &registry, &entity);

        let resolved = ledger
            .resolve(id, Decision::Reject, "carla", Some("no budget".into()))
            .unwrap();
        assert_eq!(resolved.state, RequestState::Rejected);
        assert_eq!(resolved.resolver.as_deref(), Some("carla"));
        assert!(resolved.resolved_at.is_some());

        let err = ledger.resolve(id, Decision::Approve, "dora", None).unwrap_err();
        assert!(matches!(err, WorkflowError::AlreadyResolved { .. }));
        assert_eq!(ledger.get(id).unwrap().state, RequestState::Rejected);
        assert_eq!(ledger.get(id).unwrap().resolver.as_deref(), Some("carla"));
        assert!(ledger.pending_for(&entity).is_none());
    }

    #[test]
    fn resolve_unknown_request_is_not_found() {
        let mut ledger = StatusLedger::new();
        let err = ledger
            .resolve(Uuid::new_v4(), Decision::Approve, "carla", None)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound { .. }));
    }

    #[test]
    fn list_pending_is_oldest_first_and_restartable() {
        let registry = registry();
        let mut ledger = StatusLedger::new();
        let q1 = EntityRef::new("quotation", "Q-1");
        let pr1 = EntityRef::new("purchase_requisition", "PR-1");
        let q2 = EntityRef::new("quotation", "Q-2");
        let a = submit(&mut ledger, &registry, &q1);
        let b = submit(&mut ledger, &registry, &pr1);
        let c = submit(&mut ledger, &registry, &q2);

        let all: Vec<Uuid> = ledger.list_pending(None).map(|r| r.id).collect();
        assert_eq!(all, vec![a, b, c]);

        let quotations: Vec<Uuid> = ledger.list_pending(Some("quotation")).map(|r| r.id).collect();
        assert_eq!(quotations, vec![a, c]);

        let first_seq = ledger.get(a).unwrap().seq;
        let resumed: Vec<Uuid> = ledger
            .pending_after(Some("quotation"), Some(first_seq))
            .map(|r| r.id)
            .collect();
        assert_eq!(resumed, vec![c]);
    }

    #[test]
    fn history_keeps_every_request_for_entity() {
        let registry = registry();
        let mut ledger = StatusLedger::new();
        let entity = EntityRef::new("quotation", "Q-1");
        let other = EntityRef::new("quotation", "Q-2");

        let first = submit(&mut ledger, &registry, &entity);
        submit(&mut ledger, &registry, &other);
        ledger.resolve(first, Decision::Reject, "carla", None).unwrap();
        let second = submit(&mut ledger, &registry, &entity);

        let history: Vec<Uuid> = ledger.history(&entity).map(|r| r.id).collect();
        assert_eq!(history, vec![first, second]);
        assert!(ledger.references_status("quotation", "pending_approval"));
        assert!(!ledger.references_status("quotation", "approved"));
    }

    #[test]
    fn from_requests_rebuilds_indexes() {
        let registry = registry();
        let mut ledger = StatusLedger::new();
        let entity = EntityRef::new("quotation", "Q-1");
        let id = submit(&mut ledger, &registry, &entity);

        let mut rebuilt = StatusLedger::from_requests(ledger.requests().to_vec()).unwrap();
        assert_eq!(rebuilt.pending_for(&entity).unwrap().id, id);
        let err = rebuilt
            .submit(&registry, &entity, "draft", "pending_approval", "ana", None)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicatePending { .. }));

        rebuilt.resolve(id, Decision::Approve, "carla", None).unwrap();
        let next = rebuilt
            .submit(&registry, &EntityRef::new("quotation", "Q-9"), "draft", "pending_approval", "ana", None)
            .unwrap();
        assert_eq!(next.seq, 1);
    }

    #[test]
    fn from_requests_rejects_two_pending_for_one_entity() {
        let registry = registry();
        let mut ledger = StatusLedger::new();
        let entity = EntityRef::new("quotation", "Q-1");
        submit(&mut ledger, &registry, &entity);

        let mut copy = ledger.requests()[0].clone();
        copy.id = Uuid::new_v4();
        copy.seq = 5;
        let mut requests = ledger.requests().to_vec();
        requests.push(copy);

        assert!(matches!(
            StatusLedger::from_requests(requests),
            Err(WorkflowError::DuplicatePending { .. })
        ));
    }
}
