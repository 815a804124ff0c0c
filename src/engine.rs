use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{WorkflowError, WorkflowResult};
use crate::projection::Projection;
use crate::workflow::{
    Decision, DecisionEvent, EntityRef, HasStatus, ModelStatus, StatusLedger, StatusPatch,
    StatusRegistry, StatusRequest,
};

/// Default capacity of the decision event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Everything the engine guards: registry, current bindings and the ledger.
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    pub registry: StatusRegistry,
    /// Entity-status binding: exactly one status per tracked entity.
    pub bindings: BTreeMap<EntityRef, String>,
    pub ledger: StatusLedger,
}

impl WorkflowState {
    pub fn new(registry: StatusRegistry) -> Self {
        Self {
            registry,
            ..Default::default()
        }
    }

    fn status_in_use(&self, entity_type: &str, name: &str) -> bool {
        self.bindings
            .iter()
            .any(|(entity, status)| entity.entity_type == entity_type && status == name)
            || self.ledger.references_status(entity_type, name)
    }
}

/// Sole writer of entity status.
///
/// Each mutating call runs read, validate and write under one write guard, so
/// concurrent submissions for one entity cannot both succeed and a decision is
/// never observed half-applied.
#[derive(Debug, Clone)]
pub struct ApprovalEngine {
    state: Arc<RwLock<WorkflowState>>,
    events: broadcast::Sender<DecisionEvent>,
}

impl ApprovalEngine {
    pub fn new(registry: StatusRegistry) -> Self {
        Self::with_state(WorkflowState::new(registry), DEFAULT_EVENT_BUFFER)
    }

    pub fn with_state(state: WorkflowState, event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            state: Arc::new(RwLock::new(state)),
            events,
        }
    }

    /// Subscribe to decision events, delivered in the order decisions commit.
    pub fn subscribe(&self) -> broadcast::Receiver<DecisionEvent> {
        self.events.subscribe()
    }

    /// Read-only view sharing this engine's state.
    pub fn projection(&self) -> Projection {
        Projection::new(Arc::clone(&self.state))
    }

    /// Consistent copy of the whole state, used for persistence.
    pub async fn snapshot(&self) -> WorkflowState {
        self.state.read().await.clone()
    }

    /// Start tracking an entity at its workflow's initial status.
    pub async fn track(&self, entity: &impl HasStatus) -> WorkflowResult<ModelStatus> {
        let entity = entity.entity_ref();
        let mut state = self.state.write().await;
        if let Some(current) = state.bindings.get(&entity) {
            return Err(WorkflowError::AlreadyTracked {
                entity,
                status: current.clone(),
            });
        }
        let initial = state.registry.initial_status(&entity.entity_type)?.clone();
        state.bindings.insert(entity.clone(), initial.name.clone());
        info!(entity = %entity, status = %initial.name, "tracking entity");
        Ok(initial)
    }

    /// Ask for `entity` to move to `to`. The request stays pending until [`decide`](Self::decide).
    pub async fn request_change(
        &self,
        entity: &impl HasStatus,
        to: &str,
        requester: &str,
        reason: Option<String>,
    ) -> WorkflowResult<StatusRequest> {
        let entity = entity.entity_ref();
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let from = state
            .bindings
            .get(&entity)
            .ok_or_else(|| WorkflowError::entity_not_found(&entity))?;

        match state
            .ledger
            .submit(&state.registry, &entity, from, to, requester, reason)
        {
            Ok(request) => {
                info!(
                    request_id = %request.id,
                    entity = %entity,
                    from = %request.from_status,
                    to,
                    requester,
                    "status change requested"
                );
                Ok(request.clone())
            }
            Err(err) => {
                warn!(entity = %entity, to, requester, error = %err, "status change refused");
                Err(err)
            }
        }
    }

    /// Approve or reject a pending request.
    ///
    /// Approval re-checks that the entity is still at the request's
    /// `from_status` and that the transition is still allowed; otherwise it
    /// fails with `StaleTransition` and the request stays pending.
    pub async fn decide(
        &self,
        request_id: Uuid,
        approve: bool,
        resolver: &str,
        comment: Option<String>,
    ) -> WorkflowResult<DecisionEvent> {
        let decision = Decision::from_approve(approve);
        let event = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;

            let request = state.ledger.get(request_id)?;
            if !request.is_pending() {
                warn!(%request_id, state = %request.state, "request already resolved");
                return Err(WorkflowError::AlreadyResolved {
                    request_id,
                    state: request.state.to_string(),
                });
            }
            let entity = request.entity.clone();
            let to = request.to_status.clone();

            if decision == Decision::Approve {
                let current = state.bindings.get(&entity);
                let still_legal = current == Some(&request.from_status)
                    && state
                        .registry
                        .is_allowed(&entity.entity_type, &request.from_status, &to)
                        .unwrap_or(false);
                if !still_legal {
                    let current = current.cloned().unwrap_or_else(|| "<untracked>".to_string());
                    warn!(%request_id, entity = %entity, %current, "stale transition");
                    return Err(WorkflowError::StaleTransition {
                        request_id,
                        entity,
                        from: request.from_status.clone(),
                        to,
                        current,
                    });
                }
            }

            let resolved = state
                .ledger
                .resolve(request_id, decision, resolver, comment)?;
            let event = DecisionEvent::from_request(resolved);
            if decision == Decision::Approve {
                state.bindings.insert(entity, to);
            }
            // Sent before the guard drops so events follow commit order.
            // No subscribers is fine.
            let _ = self.events.send(event.clone());
            event
        };

        info!(
            %request_id,
            entity = %event.entity,
            outcome = %event.outcome,
            resolver,
            "status request decided"
        );
        Ok(event)
    }

    pub async fn define_status(&self, status: ModelStatus) -> WorkflowResult<()> {
        let mut state = self.state.write().await;
        info!(entity_type = %status.entity_type, status = %status.name, "defining status");
        state.registry.define_status(status)
    }

    pub async fn update_status(
        &self,
        entity_type: &str,
        name: &str,
        patch: StatusPatch,
    ) -> WorkflowResult<ModelStatus> {
        let mut state = self.state.write().await;
        let updated = state.registry.update_status(entity_type, name, patch)?.clone();
        info!(entity_type, status = name, active = updated.is_active, "status updated");
        Ok(updated)
    }

    pub async fn set_status_active(
        &self,
        entity_type: &str,
        name: &str,
        active: bool,
    ) -> WorkflowResult<ModelStatus> {
        self.update_status(
            entity_type,
            name,
            StatusPatch {
                is_active: Some(active),
                ..Default::default()
            },
        )
        .await
    }

    /// Remove a status nobody references, neither a binding nor any request.
    pub async fn remove_status(&self, entity_type: &str, name: &str) -> WorkflowResult<ModelStatus> {
        let mut state = self.state.write().await;
        if state.status_in_use(entity_type, name) {
            warn!(entity_type, status = name, "refusing to remove referenced status");
            return Err(WorkflowError::StatusInUse {
                entity_type: entity_type.to_string(),
                status: name.to_string(),
            });
        }
        let removed = state.registry.remove_status(entity_type, name)?;
        info!(entity_type, status = name, "status removed");
        Ok(removed)
    }

    pub async fn allow_transition(&self, entity_type: &str, from: &str, to: &str) -> WorkflowResult<()> {
        let mut state = self.state.write().await;
        state.registry.allow_transition(entity_type, from, to)?;
        info!(entity_type, from, to, "transition allowed");
        Ok(())
    }

    pub async fn forbid_transition(&self, entity_type: &str, from: &str, to: &str) -> bool {
        let mut state = self.state.write().await;
        let removed = state.registry.forbid_transition(entity_type, from, to);
        info!(entity_type, from, to, removed, "transition forbidden");
        removed
    }
}
