//! Module Templates
//!
//! A [`ModuleTemplate`] is the declarative description every module instance
//! is built from: its audio inlets and outlets, its parameters and a few
//! presentation hints. Templates are grouped into collections
//! (see [`collection`](crate::collection)) and addressed by
//! `"collection/template"` ids.

use serde::{Deserialize, Serialize};

/// Parameter description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamTemplate {
    /// Identifier, unique within the template
    pub id: String,
    /// Display name; the id is shown when empty
    #[serde(default)]
    pub name: String,
    /// Initial value
    #[serde(default)]
    pub default: f32,
    #[serde(default)]
    pub min: f32,
    #[serde(default = "default_param_max")]
    pub max: f32,
}

fn default_param_max() -> f32 {
    1.0
}

impl ParamTemplate {
    pub fn new(id: impl Into<String>, min: f32, max: f32) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            default: min,
            min,
            max,
        }
    }

    pub fn with_default(mut self, default: f32) -> Self {
        self.default = default;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Name to display next to the slider
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Declarative description of a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleTemplate {
    /// Identifier, unique within its collection
    pub id: String,
    /// Id of the owning collection, filled in when the collection is parsed
    #[serde(skip)]
    pub collection: String,
    /// Human-readable name
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Audio input port names
    #[serde(default)]
    pub inlets: Vec<String>,
    /// Audio output port names
    #[serde(default)]
    pub outlets: Vec<String>,
    #[serde(default)]
    pub params: Vec<ParamTemplate>,
    /// Whether instances own an interior canvas
    #[serde(default)]
    pub subpatch: bool,
    /// Requested presentation kind; `None` means the standard layout
    #[serde(default)]
    pub gui: Option<String>,
}

impl ModuleTemplate {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            collection: String::new(),
            name: name.into(),
            description: String::new(),
            inlets: Vec::new(),
            outlets: Vec::new(),
            params: Vec::new(),
            subpatch: false,
            gui: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn add_inlet(mut self, name: impl Into<String>) -> Self {
        self.inlets.push(name.into());
        self
    }

    pub fn add_outlet(mut self, name: impl Into<String>) -> Self {
        self.outlets.push(name.into());
        self
    }

    pub fn add_param(mut self, param: ParamTemplate) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_subpatch(mut self, subpatch: bool) -> Self {
        self.subpatch = subpatch;
        self
    }

    pub fn with_gui(mut self, gui: impl Into<String>) -> Self {
        self.gui = Some(gui.into());
        self
    }

    /// `"collection/template"` identifier
    pub fn full_id(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }

    pub fn has_inlet(&self, name: &str) -> bool {
        self.inlets.iter().any(|n| n == name)
    }

    pub fn has_outlet(&self, name: &str) -> bool {
        self.outlets.iter().any(|n| n == name)
    }

    pub fn param(&self, id: &str) -> Option<&ParamTemplate> {
        self.params.iter().find(|p| p.id == id)
    }
}
