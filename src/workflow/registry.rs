use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::status::{ModelStatus, StatusPatch};
use crate::error::{WorkflowError, WorkflowResult};

/// Statuses and transition table for a single entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub entity_type: String,
    /// Status assigned when an entity starts being tracked.
    pub initial: String,
    pub statuses: Vec<ModelStatus>,
    /// `from -> {to...}`
    pub transitions: BTreeMap<String, BTreeSet<String>>,
}

impl Workflow {
    fn find(&self, name: &str) -> Option<&ModelStatus> {
        self.statuses.iter().find(|s| s.name == name)
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut ModelStatus> {
        self.statuses.iter_mut().find(|s| s.name == name)
    }

    fn active(&self, name: &str) -> Option<&ModelStatus> {
        self.find(name).filter(|s| s.is_active)
    }
}

/// Valid statuses per entity type and the transitions allowed between them.
///
/// The registry is plain data: new entity types register their own tables
/// through [`StatusRegistry::register_workflow`] or configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRegistry {
    workflows: BTreeMap<String, Workflow>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the workflow for an entity type.
    ///
    /// Fails with `UnknownStatus` when `initial` or a transition endpoint is
    /// not one of `statuses`, and with `DuplicateStatus` on repeated names.
    pub fn register_workflow<I>(
        &mut self,
        entity_type: &str,
        initial: &str,
        statuses: Vec<ModelStatus>,
        transitions: I,
    ) -> WorkflowResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut seen = BTreeSet::new();
        let statuses: Vec<ModelStatus> = statuses
            .into_iter()
            .map(|mut s| {
                s.entity_type = entity_type.to_string();
                s
            })
            .collect();
        for status in &statuses {
            if !seen.insert(status.name.clone()) {
                return Err(WorkflowError::DuplicateStatus {
                    entity_type: entity_type.to_string(),
                    status: status.name.clone(),
                });
            }
        }
        if !seen.contains(initial) {
            return Err(WorkflowError::unknown_status(entity_type, initial));
        }

        let mut table: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (from, to) in transitions {
            for endpoint in [&from, &to] {
                if !seen.contains(endpoint.as_str()) {
                    return Err(WorkflowError::unknown_status(entity_type, endpoint));
                }
            }
            table.entry(from).or_default().insert(to);
        }

        debug!(
            entity_type,
            statuses = statuses.len(),
            "registered workflow"
        );
        self.workflows.insert(
            entity_type.to_string(),
            Workflow {
                entity_type: entity_type.to_string(),
                initial: initial.to_string(),
                statuses,
                transitions: table,
            },
        );
        Ok(())
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.workflows.keys().map(String::as_str)
    }

    pub fn workflow(&self, entity_type: &str) -> Option<&Workflow> {
        self.workflows.get(entity_type)
    }

    /// All statuses of an entity type, inactive ones included. Empty for unknown types.
    pub fn statuses(&self, entity_type: &str) -> &[ModelStatus] {
        self.workflows
            .get(entity_type)
            .map(|w| w.statuses.as_slice())
            .unwrap_or_default()
    }

    pub fn status(&self, entity_type: &str, name: &str) -> Option<&ModelStatus> {
        self.workflows.get(entity_type)?.find(name)
    }

    /// True when the status exists for the entity type and is active.
    pub fn is_valid_status(&self, entity_type: &str, name: &str) -> bool {
        self.workflows
            .get(entity_type)
            .and_then(|w| w.active(name))
            .is_some()
    }

    /// Active statuses reachable from `from`.
    ///
    /// Unknown entity types and unknown or inactive `from` statuses are
    /// rejected with `UnknownStatus`.
    pub fn allowed_transitions(
        &self,
        entity_type: &str,
        from: &str,
    ) -> WorkflowResult<Vec<&ModelStatus>> {
        let workflow = self
            .workflows
            .get(entity_type)
            .filter(|w| w.active(from).is_some())
            .ok_or_else(|| WorkflowError::unknown_status(entity_type, from))?;

        let Some(targets) = workflow.transitions.get(from) else {
            return Ok(Vec::new());
        };
        Ok(workflow
            .statuses
            .iter()
            .filter(|s| s.is_active && targets.contains(&s.name))
            .collect())
    }

    pub fn is_allowed(&self, entity_type: &str, from: &str, to: &str) -> WorkflowResult<bool> {
        Ok(self
            .allowed_transitions(entity_type, from)?
            .iter()
            .any(|s| s.name == to))
    }

    pub fn initial_status(&self, entity_type: &str) -> WorkflowResult<&ModelStatus> {
        let workflow = self
            .workflows
            .get(entity_type)
            .ok_or_else(|| WorkflowError::unknown_status(entity_type, "<initial>"))?;
        workflow
            .active(&workflow.initial)
            .ok_or_else(|| WorkflowError::unknown_status(entity_type, &workflow.initial))
    }

    /// Add a status. The first status of an unknown entity type starts a new
    /// workflow and becomes its initial status.
    pub fn define_status(&mut self, status: ModelStatus) -> WorkflowResult<()> {
        match self.workflows.get_mut(&status.entity_type) {
            Some(workflow) => {
                if workflow.find(&status.name).is_some() {
                    return Err(WorkflowError::DuplicateStatus {
                        entity_type: status.entity_type,
                        status: status.name,
                    });
                }
                workflow.statuses.push(status);
            }
            None => {
                let entity_type = status.entity_type.clone();
                self.workflows.insert(
                    entity_type.clone(),
                    Workflow {
                        entity_type,
                        initial: status.name.clone(),
                        statuses: vec![status],
                        transitions: BTreeMap::new(),
                    },
                );
            }
        }
        Ok(())
    }

    pub fn update_status(
        &mut self,
        entity_type: &str,
        name: &str,
        patch: StatusPatch,
    ) -> WorkflowResult<&ModelStatus> {
        let status = self
            .workflows
            .get_mut(entity_type)
            .and_then(|w| w.find_mut(name))
            .ok_or_else(|| status_not_found(entity_type, name))?;
        patch.apply(status);
        Ok(status)
    }

    /// Remove a status and every transition touching it.
    ///
    /// The initial status cannot be removed. Callers must check that no record
    /// references the status before calling this.
    pub fn remove_status(&mut self, entity_type: &str, name: &str) -> WorkflowResult<ModelStatus> {
        let workflow = self
            .workflows
            .get_mut(entity_type)
            .ok_or_else(|| status_not_found(entity_type, name))?;
        if workflow.initial == name {
            return Err(WorkflowError::StatusInUse {
                entity_type: entity_type.to_string(),
                status: name.to_string(),
            });
        }
        let index = workflow
            .statuses
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| status_not_found(entity_type, name))?;

        workflow.transitions.remove(name);
        for targets in workflow.transitions.values_mut() {
            targets.remove(name);
        }
        Ok(workflow.statuses.remove(index))
    }

    pub fn allow_transition(&mut self, entity_type: &str, from: &str, to: &str) -> WorkflowResult<()> {
        let workflow = self
            .workflows
            .get_mut(entity_type)
            .ok_or_else(|| status_not_found(entity_type, from))?;
        for endpoint in [from, to] {
            if workflow.find(endpoint).is_none() {
                return Err(status_not_found(entity_type, endpoint));
            }
        }
        workflow
            .transitions
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        Ok(())
    }

    /// Returns whether the transition existed.
    pub fn forbid_transition(&mut self, entity_type: &str, from: &str, to: &str) -> bool {
        self.workflows
            .get_mut(entity_type)
            .and_then(|w| w.transitions.get_mut(from))
            .is_some_and(|targets| targets.remove(to))
    }
}

fn status_not_found(entity_type: &str, name: &str) -> WorkflowError {
    WorkflowError::NotFound {
        kind: "Status",
        id: format!("{entity_type}/{name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    fn registry() -> StatusRegistry {
        let mut registry = StatusRegistry::new();
        registry
            .register_workflow(
                "quotation",
                "draft",
                vec![
                    ModelStatus::new("quotation", "draft"),
                    ModelStatus::new("quotation", "pending_approval"),
                    ModelStatus::new("quotation", "approved"),
                    ModelStatus::new("quotation", "rejected"),
                ],
                pairs(&[
                    ("draft", "pending_approval"),
                    ("pending_approval", "approved"),
                    ("pending_approval", "rejected"),
                    ("rejected", "draft"),
                ]),
            )
            .unwrap();
        registry
    }

    fn names(statuses: Vec<&ModelStatus>) -> Vec<&str> {
        statuses.into_iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn allowed_transitions_follow_table() {
        let registry = registry();
        assert_eq!(
            names(registry.allowed_transitions("quotation", "pending_approval").unwrap()),
            vec!["approved", "rejected"]
        );
        assert!(registry.allowed_transitions("quotation", "approved").unwrap().is_empty());
        assert!(registry.is_allowed("quotation", "draft", "pending_approval").unwrap());
        assert!(!registry.is_allowed("quotation", "draft", "approved").unwrap());
    }

    #[test]
    fn unknown_type_or_status_is_rejected() {
        let registry = registry();
        assert!(matches!(
            registry.allowed_transitions("tax_rule", "draft"),
            Err(WorkflowError::UnknownStatus { .. })
        ));
        assert!(matches!(
            registry.allowed_transitions("quotation", "archived"),
            Err(WorkflowError::UnknownStatus { .. })
        ));
    }

    #[test]
    fn inactive_statuses_are_not_assignable() {
        let mut registry = registry();
        registry
            .update_status(
                "quotation",
                "rejected",
                StatusPatch {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(!registry.is_valid_status("quotation", "rejected"));
        assert!(registry.status("quotation", "rejected").is_some());
        assert_eq!(
            names(registry.allowed_transitions("quotation", "pending_approval").unwrap()),
            vec!["approved"]
        );
        assert!(matches!(
            registry.allowed_transitions("quotation", "rejected"),
            Err(WorkflowError::UnknownStatus { .. })
        ));
    }

    #[test]
    fn register_rejects_unknown_endpoints() {
        let mut registry = StatusRegistry::new();
        let err = registry
            .register_workflow(
                "price_list",
                "draft",
                vec![ModelStatus::new("price_list", "draft")],
                pairs(&[("draft", "published")]),
            )
            .unwrap_err();
        assert_eq!(err, WorkflowError::unknown_status("price_list", "published"));

        let err = registry
            .register_workflow(
                "price_list",
                "draft",
                vec![
                    ModelStatus::new("price_list", "draft"),
                    ModelStatus::new("price_list", "draft"),
                ],
                Vec::new(),
            )
            .unwrap_err();
        assert!(matches!(err, WorkflowError::DuplicateStatus { .. }));
    }

    #[test]
    fn define_status_starts_new_workflow() {
        let mut registry = StatusRegistry::new();
        registry.define_status(ModelStatus::new("tax_rule", "draft")).unwrap();
        registry.define_status(ModelStatus::new("tax_rule", "active")).unwrap();
        registry.allow_transition("tax_rule", "draft", "active").unwrap();

        assert_eq!(registry.initial_status("tax_rule").unwrap().name, "draft");
        assert!(registry.is_allowed("tax_rule", "draft", "active").unwrap());
        assert!(matches!(
            registry.define_status(ModelStatus::new("tax_rule", "active")),
            Err(WorkflowError::DuplicateStatus { .. })
        ));
        assert_eq!(registry.entity_types().collect::<Vec<_>>(), vec!["tax_rule"]);
    }

    #[test]
    fn remove_status_drops_its_transitions() {
        let mut registry = registry();
        let removed = registry.remove_status("quotation", "rejected").unwrap();
        assert_eq!(removed.name, "rejected");
        assert_eq!(
            names(registry.allowed_transitions("quotation", "pending_approval").unwrap()),
            vec!["approved"]
        );
        assert!(matches!(
            registry.remove_status("quotation", "draft"),
            Err(WorkflowError::StatusInUse { .. })
        ));
    }

    #[test]
    fn forbid_transition_reports_change() {
        let mut registry = registry();
        assert!(registry.forbid_transition("quotation", "rejected", "draft"));
        assert!(!registry.forbid_transition("quotation", "rejected", "draft"));
        assert!(registry.allowed_transitions("quotation", "rejected").unwrap().is_empty());
    }
}
