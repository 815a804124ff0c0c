use std::fmt;

use serde::{Deserialize, Serialize};

/// Polymorphic reference to any status-bearing record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub entity_id: String,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_type, self.entity_id)
    }
}

/// Capability implemented by domain records that carry a workflow status.
pub trait HasStatus {
    /// Workflow key shared by every record of this kind (e.g. `quotation`).
    fn entity_type(&self) -> &str;

    fn entity_id(&self) -> String;

    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.entity_type(), self.entity_id())
    }
}

impl HasStatus for EntityRef {
    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn entity_id(&self) -> String {
        self.entity_id.clone()
    }

    fn entity_ref(&self) -> EntityRef {
        self.clone()
    }
}

/// A named status value scoped to one entity type.
///
/// Inactive statuses stay on historical records but can no longer be assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub entity_type: String,
    pub name: String,
    pub label: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_color() -> String {
    "gray".to_string()
}

fn default_active() -> bool {
    true
}

impl ModelStatus {
    /// Active status whose label is derived from the name (`pending_approval` -> `Pending approval`).
    pub fn new(entity_type: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            entity_type: entity_type.into(),
            label: humanize(&name),
            name,
            color: default_color(),
            icon: None,
            is_active: true,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// Partial update applied to a [`ModelStatus`] from the admin screens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPatch {
    pub label: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub is_active: Option<bool>,
}

impl StatusPatch {
    pub fn apply(self, status: &mut ModelStatus) {
        if let Some(label) = self.label {
            status.label = label;
        }
        if let Some(color) = self.color {
            status.color = color;
        }
        if let Some(icon) = self.icon {
            status.icon = Some(icon);
        }
        if let Some(active) = self.is_active {
            status.is_active = active;
        }
    }
}

fn humanize(name: &str) -> String {
    let spaced = name.replace(['_', '-'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
