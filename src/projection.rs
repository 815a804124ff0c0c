//! Read side of the workflow: current status, pending requests and history.
//!
//! A [`Projection`] never mutates. Cursors take a short read guard per item
//! and remember the last `seq` they yielded, so a listing can be resumed later
//! from [`RequestCursor::position`].

use std::sync::Arc;

use futures::Stream;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::engine::WorkflowState;
use crate::error::{WorkflowError, WorkflowResult};
use crate::workflow::{EntityRef, HasStatus, ModelStatus, StatusRequest};

#[derive(Debug, Clone)]
pub struct Projection {
    state: Arc<RwLock<WorkflowState>>,
}

impl Projection {
    pub(crate) fn new(state: Arc<RwLock<WorkflowState>>) -> Self {
        Self { state }
    }

    /// The entity's bound status, inactive ones included.
    pub async fn current_status(&self, entity: &impl HasStatus) -> WorkflowResult<ModelStatus> {
        let entity = entity.entity_ref();
        let state = self.state.read().await;
        let name = state
            .bindings
            .get(&entity)
            .ok_or_else(|| WorkflowError::entity_not_found(&entity))?;
        state
            .registry
            .status(&entity.entity_type, name)
            .cloned()
            .ok_or_else(|| WorkflowError::unknown_status(&entity.entity_type, name))
    }

    /// Open requests for the entity; the engine keeps this to at most one.
    pub async fn pending_requests_for(&self, entity: &impl HasStatus) -> Vec<StatusRequest> {
        let entity = entity.entity_ref();
        let state = self.state.read().await;
        state.ledger.pending_for(&entity).cloned().into_iter().collect()
    }

    pub async fn get(&self, request_id: Uuid) -> WorkflowResult<StatusRequest> {
        self.state.read().await.ledger.get(request_id).cloned()
    }

    /// Statuses the entity may be moved to from where it is now.
    pub async fn allowed_transitions(&self, entity: &impl HasStatus) -> WorkflowResult<Vec<ModelStatus>> {
        let entity = entity.entity_ref();
        let state = self.state.read().await;
        let from = state
            .bindings
            .get(&entity)
            .ok_or_else(|| WorkflowError::entity_not_found(&entity))?;
        Ok(state
            .registry
            .allowed_transitions(&entity.entity_type, from)?
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn statuses(&self, entity_type: &str) -> Vec<ModelStatus> {
        self.state.read().await.registry.statuses(entity_type).to_vec()
    }

    pub async fn entity_types(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .registry
            .entity_types()
            .map(str::to_string)
            .collect()
    }

    /// Tracked entities and their status names, optionally for one entity type.
    pub async fn tracked(&self, entity_type: Option<&str>) -> Vec<(EntityRef, String)> {
        self.state
            .read()
            .await
            .bindings
            .iter()
            .filter(|(entity, _)| entity_type.is_none_or(|t| entity.entity_type == t))
            .map(|(entity, status)| (entity.clone(), status.clone()))
            .collect()
    }

    /// Lazy listing of an entity's requests in submission order.
    pub fn history(&self, entity: &impl HasStatus) -> RequestCursor {
        RequestCursor::new(
            Arc::clone(&self.state),
            CursorFilter::History(entity.entity_ref()),
        )
    }

    /// Lazy listing of pending requests, oldest first.
    pub fn list_pending(&self, entity_type: Option<&str>) -> RequestCursor {
        RequestCursor::new(
            Arc::clone(&self.state),
            CursorFilter::Pending(entity_type.map(str::to_string)),
        )
    }
}

#[derive(Debug, Clone)]
enum CursorFilter {
    Pending(Option<String>),
    History(EntityRef),
}

/// Restartable, lazily evaluated sequence of [`StatusRequest`]s.
#[derive(Debug, Clone)]
pub struct RequestCursor {
    state: Arc<RwLock<WorkflowState>>,
    filter: CursorFilter,
    position: Option<u64>,
}

impl RequestCursor {
    fn new(state: Arc<RwLock<WorkflowState>>, filter: CursorFilter) -> Self {
        Self {
            state,
            filter,
            position: None,
        }
    }

    /// `seq` of the last request yielded, `None` before the first one.
    pub fn position(&self) -> Option<u64> {
        self.position
    }

    /// Continue after a position obtained from an earlier cursor.
    pub fn resume_from(mut self, position: Option<u64>) -> Self {
        self.position = position;
        self
    }

    pub fn restart(&mut self) {
        self.position = None;
    }

    pub async fn next_request(&mut self) -> Option<StatusRequest> {
        let state = self.state.read().await;
        let found = match &self.filter {
            CursorFilter::Pending(entity_type) => state
                .ledger
                .pending_after(entity_type.as_deref(), self.position)
                .next()
                .cloned(),
            CursorFilter::History(entity) => state
                .ledger
                .history_after(entity, self.position)
                .next()
                .cloned(),
        };
        if let Some(request) = &found {
            self.position = Some(request.seq);
        }
        found
    }

    /// Read up to `limit` requests.
    pub async fn take(&mut self, limit: usize) -> Vec<StatusRequest> {
        let mut page = Vec::with_capacity(limit);
        while page.len() < limit {
            match self.next_request().await {
                Some(request) => page.push(request),
                None => break,
            }
        }
        page
    }

    pub async fn collect_all(mut self) -> Vec<StatusRequest> {
        let mut all = Vec::new();
        while let Some(request) = self.next_request().await {
            all.push(request);
        }
        all
    }

    pub fn into_stream(self) -> impl Stream<Item = StatusRequest> {
        futures::stream::unfold(self, |mut cursor| async move {
            cursor.next_request().await.map(|request| (request, cursor))
        })
    }
}
