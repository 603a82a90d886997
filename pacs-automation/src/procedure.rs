//! Procedures: named, ordered lists of operations, and their JSON store.

use crate::errors::AutomationError;
use crate::utils::{load_json_or_default, save_json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// How an argument's `Value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    /// Name of a bookmark to resolve.
    Element,
    String,
    Number,
    /// Name of a run variable or built-in property.
    Var,
}

impl ArgKind {
    /// Case-insensitive; unknown or empty input is `String`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "element" => ArgKind::Element,
            "number" => ArgKind::Number,
            "var" => ArgKind::Var,
            _ => ArgKind::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArgKind::Element => "Element",
            ArgKind::String => "String",
            ArgKind::Number => "Number",
            ArgKind::Var => "Var",
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_kind() -> String {
    ArgKind::String.as_str().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OpArg {
    #[serde(default = "default_kind", alias = "type")]
    pub r#type: String,
    #[serde(default, alias = "value", skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Default for OpArg {
    fn default() -> Self {
        Self {
            r#type: default_kind(),
            value: None,
        }
    }
}

impl OpArg {
    pub fn new(kind: ArgKind, value: impl Into<String>) -> Self {
        Self {
            r#type: kind.as_str().to_string(),
            value: Some(value.into()),
        }
    }

    pub fn kind(&self) -> ArgKind {
        ArgKind::parse(&self.r#type)
    }

    pub fn element(bookmark: impl Into<String>) -> Self {
        Self::new(ArgKind::Element, bookmark)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ArgKind::String, value)
    }

    pub fn number(value: impl fmt::Display) -> Self {
        Self::new(ArgKind::Number, value.to_string())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::new(ArgKind::Var, name)
    }
}

/// The three argument positions of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgSlot {
    Arg1,
    Arg2,
    Arg3,
}

impl ArgSlot {
    pub const ALL: [ArgSlot; 3] = [ArgSlot::Arg1, ArgSlot::Arg2, ArgSlot::Arg3];
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Operation {
    #[serde(alias = "op")]
    pub op: String,
    #[serde(default, alias = "arg1")]
    pub arg1: OpArg,
    #[serde(default, alias = "arg2")]
    pub arg2: OpArg,
    #[serde(default, alias = "arg3")]
    pub arg3: OpArg,
    #[serde(default = "yes", alias = "arg1Enabled")]
    pub arg1_enabled: bool,
    #[serde(default = "yes", alias = "arg2Enabled")]
    pub arg2_enabled: bool,
    #[serde(default, alias = "arg3Enabled")]
    pub arg3_enabled: bool,
    #[serde(default, alias = "outputVar", skip_serializing_if = "Option::is_none")]
    pub output_var: Option<String>,
    #[serde(default, alias = "outputPreview", skip_serializing_if = "Option::is_none")]
    pub output_preview: Option<String>,
}

impl Operation {
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            arg1: OpArg::default(),
            arg2: OpArg::default(),
            arg3: OpArg::default(),
            arg1_enabled: true,
            arg2_enabled: true,
            arg3_enabled: false,
            output_var: None,
            output_preview: None,
        }
    }

    /// Sets an argument and enables its slot.
    pub fn with_arg(mut self, slot: ArgSlot, arg: OpArg) -> Self {
        match slot {
            ArgSlot::Arg1 => (self.arg1, self.arg1_enabled) = (arg, true),
            ArgSlot::Arg2 => (self.arg2, self.arg2_enabled) = (arg, true),
            ArgSlot::Arg3 => (self.arg3, self.arg3_enabled) = (arg, true),
        }
        self
    }

    pub fn arg1(self, arg: OpArg) -> Self {
        self.with_arg(ArgSlot::Arg1, arg)
    }

    pub fn arg2(self, arg: OpArg) -> Self {
        self.with_arg(ArgSlot::Arg2, arg)
    }

    pub fn arg3(self, arg: OpArg) -> Self {
        self.with_arg(ArgSlot::Arg3, arg)
    }

    pub fn output_var(mut self, name: impl Into<String>) -> Self {
        self.output_var = Some(name.into());
        self
    }

    pub fn arg(&self, slot: ArgSlot) -> &OpArg {
        match slot {
            ArgSlot::Arg1 => &self.arg1,
            ArgSlot::Arg2 => &self.arg2,
            ArgSlot::Arg3 => &self.arg3,
        }
    }

    pub fn arg_mut(&mut self, slot: ArgSlot) -> &mut OpArg {
        match slot {
            ArgSlot::Arg1 => &mut self.arg1,
            ArgSlot::Arg2 => &mut self.arg2,
            ArgSlot::Arg3 => &mut self.arg3,
        }
    }

    pub fn is_enabled(&self, slot: ArgSlot) -> bool {
        match slot {
            ArgSlot::Arg1 => self.arg1_enabled,
            ArgSlot::Arg2 => self.arg2_enabled,
            ArgSlot::Arg3 => self.arg3_enabled,
        }
    }

    pub fn set_enabled(&mut self, slot: ArgSlot, enabled: bool) {
        match slot {
            ArgSlot::Arg1 => self.arg1_enabled = enabled,
            ArgSlot::Arg2 => self.arg2_enabled = enabled,
            ArgSlot::Arg3 => self.arg3_enabled = enabled,
        }
    }

    /// Non-blank output alias, trimmed.
    pub fn alias(&self) -> Option<&str> {
        self.output_var
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Named procedures persisted as `{"Methods": {"name": [ops...]}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureStore {
    #[serde(rename = "Methods", alias = "methods", default)]
    methods: BTreeMap<String, Vec<Operation>>,
}

impl ProcedureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the store; a missing or corrupt file yields an empty store.
    pub fn load(path: &Path) -> Self {
        let store: Self = load_json_or_default(path, "procedure store");
        debug!("loaded {} procedures from {}", store.methods.len(), path.display());
        store
    }

    pub fn save(&self, path: &Path) -> Result<(), AutomationError> {
        save_json(path, self)
    }

    pub fn get(&self, name: &str) -> Option<&[Operation]> {
        self.methods.get(name).map(Vec::as_slice)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Vec<Operation>> {
        self.methods.get_mut(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, steps: Vec<Operation>) {
        self.methods.insert(name.into(), steps);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<Operation>> {
        self.methods.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
