//! Operation registry and the per-step context handlers run against.
//!
//! Handlers are looked up by op name at run time, so a new operation is a
//! new registration and never a change to the executor.

pub mod app_ops;
pub mod element_ops;
pub mod fetch;
pub mod string_ops;
pub mod system_ops;

use crate::bookmark::BookmarkStore;
use crate::context::{RunContext, VarValue};
use crate::ocr::TextRecognizer;
use crate::platforms::{AccessibilityEngine, InputDriver};
use crate::procedure::{ArgKind, ArgSlot, Operation};
use crate::properties::{is_built_in, PropertySource};
use crate::resolver::ElementResolver;
use crate::UIElement;
use fetch::HttpFetcher;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// What one operation produced: a line for the editor and the value stored
/// into the step's variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub preview: String,
    pub value: VarValue,
}

impl StepOutcome {
    pub fn new(preview: impl Into<String>, value: VarValue) -> Self {
        Self {
            preview: preview.into(),
            value,
        }
    }

    /// Preview and stored text differ.
    pub fn text(preview: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(preview, VarValue::Text(value.into()))
    }

    /// The stored text doubles as the preview.
    pub fn same(value: impl Into<String>) -> Self {
        let value = value.into();
        Self::new(value.clone(), VarValue::Text(value))
    }

    /// Status line only; nothing is stored.
    pub fn status(preview: impl Into<String>) -> Self {
        Self::new(preview, VarValue::None)
    }

    pub fn boolean(result: bool, preview: impl Into<String>) -> Self {
        Self::text(preview, if result { "true" } else { "false" })
    }
}

#[async_trait::async_trait]
pub trait OperationHandler: Send + Sync {
    async fn execute(&self, step: &mut StepContext<'_>) -> StepOutcome;
}

/// Adapts a plain function into a handler for operations that never wait.
pub struct SyncOperation(pub fn(&mut StepContext<'_>) -> StepOutcome);

#[async_trait::async_trait]
impl OperationHandler for SyncOperation {
    async fn execute(&self, step: &mut StepContext<'_>) -> StepOutcome {
        (self.0)(step)
    }
}

/// Editor preset for one argument slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpec {
    pub enabled: bool,
    pub kind: Option<ArgKind>,
    /// Filled in when the slot is blank.
    pub default: Option<&'static str>,
}

impl SlotSpec {
    pub const OFF: SlotSpec = SlotSpec {
        enabled: false,
        kind: None,
        default: None,
    };

    /// Enabled, with the kind left to the author.
    pub const ANY: SlotSpec = SlotSpec {
        enabled: true,
        kind: None,
        default: None,
    };

    pub const fn on(kind: ArgKind) -> Self {
        Self {
            enabled: true,
            kind: Some(kind),
            default: None,
        }
    }

    pub const fn with_default(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }
}

/// Argument layout of an operation, used by editors to preset a new row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub slots: [SlotSpec; 3],
}

impl Signature {
    pub const NONE: Signature = Signature {
        slots: [SlotSpec::OFF; 3],
    };

    pub const fn new(arg1: SlotSpec, arg2: SlotSpec, arg3: SlotSpec) -> Self {
        Self {
            slots: [arg1, arg2, arg3],
        }
    }

    pub const fn one(arg1: SlotSpec) -> Self {
        Self::new(arg1, SlotSpec::OFF, SlotSpec::OFF)
    }

    pub const fn two(arg1: SlotSpec, arg2: SlotSpec) -> Self {
        Self::new(arg1, arg2, SlotSpec::OFF)
    }

    /// Presets kinds, enablement and defaults. Disabled slots are cleared.
    pub fn apply(&self, op: &mut Operation) {
        for (slot, spec) in ArgSlot::ALL.into_iter().zip(self.slots) {
            op.set_enabled(slot, spec.enabled);
            let arg = op.arg_mut(slot);
            if let Some(kind) = spec.kind {
                arg.r#type = kind.as_str().to_string();
            }
            if !spec.enabled {
                arg.value = None;
                continue;
            }
            let blank = arg.value.as_deref().map_or(true, |v| v.trim().is_empty());
            if let (true, Some(default)) = (blank, spec.default) {
                arg.value = Some(default.to_string());
            }
        }
    }
}

#[derive(Clone)]
pub struct Registration {
    pub signature: Signature,
    pub handler: Arc<dyn OperationHandler>,
}

/// Op name to handler. Names are matched exactly.
#[derive(Clone, Default)]
pub struct OperationRegistry {
    ops: HashMap<String, Registration>,
}

impl OperationRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        string_ops::register(&mut registry);
        element_ops::register(&mut registry);
        system_ops::register(&mut registry);
        app_ops::register(&mut registry);
        fetch::register(&mut registry);
        debug!("registered {} built-in operations", registry.ops.len());
        registry
    }

    /// Adds or replaces an operation.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        signature: Signature,
        handler: Arc<dyn OperationHandler>,
    ) {
        self.ops.insert(name.into(), Registration { signature, handler });
    }

    pub fn register_sync(
        &mut self,
        name: impl Into<String>,
        signature: Signature,
        handler: fn(&mut StepContext<'_>) -> StepOutcome,
    ) {
        self.register(name, signature, Arc::new(SyncOperation(handler)));
    }

    pub fn get(&self, name: &str) -> Option<&Registration> {
        self.ops.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ops.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Platform services shared by every run.
#[derive(Clone)]
pub struct Services {
    pub engine: Arc<dyn AccessibilityEngine>,
    pub input: Arc<dyn InputDriver>,
    pub ocr: Arc<dyn TextRecognizer>,
    pub http: Arc<HttpFetcher>,
    pub properties: Arc<dyn PropertySource>,
}

/// Everything a handler can see while executing one step.
pub struct StepContext<'a> {
    pub operation: &'a Operation,
    pub services: &'a Services,
    pub resolver: &'a ElementResolver,
    pub bookmarks: &'a BookmarkStore,
    pub run: &'a mut RunContext,
}

impl<'a> StepContext<'a> {
    fn enabled_value(&self, slot: ArgSlot) -> Option<(ArgKind, &'a str)> {
        let operation: &'a Operation = self.operation;
        if !operation.is_enabled(slot) {
            return None;
        }
        let arg = operation.arg(slot);
        Some((arg.kind(), arg.value.as_deref()?))
    }

    /// Resolves an argument to a live element: bookmarks by name, variables
    /// through the run's element cache.
    pub fn element(&mut self, slot: ArgSlot) -> Option<UIElement> {
        let (kind, raw) = self.enabled_value(slot)?;
        match kind {
            ArgKind::Element => {
                let bookmark = match self.bookmarks.get(raw.trim()) {
                    Some(b) => b,
                    None => {
                        debug!("no bookmark named '{}'", raw);
                        return None;
                    }
                };
                let resolution = self.resolver.resolve(bookmark);
                if !resolution.is_resolved() {
                    debug!("bookmark '{}' did not resolve:\n{}", raw, resolution.trace);
                }
                resolution.element
            }
            ArgKind::Var => {
                let key = match self.run.var(raw.trim())? {
                    VarValue::ElementRef(key) | VarValue::Text(key) => key.clone(),
                    VarValue::None => return None,
                };
                self.run.cached_element(&key)
            }
            ArgKind::String | ArgKind::Number => None,
        }
    }

    /// Resolves an argument to text. Built-in property names shadow run
    /// variables; element arguments have no text.
    pub fn string(&self, slot: ArgSlot) -> Option<String> {
        let (kind, raw) = self.enabled_value(slot)?;
        match kind {
            ArgKind::String | ArgKind::Number => Some(raw.to_string()),
            ArgKind::Var if is_built_in(raw) => self.services.properties.property(raw.trim()),
            ArgKind::Var => self.run.text(raw.trim()).map(str::to_string),
            ArgKind::Element => None,
        }
    }

    pub fn arg1(&self) -> Option<String> {
        self.string(ArgSlot::Arg1)
    }

    pub fn arg2(&self) -> Option<String> {
        self.string(ArgSlot::Arg2)
    }

    pub fn arg3(&self) -> Option<String> {
        self.string(ArgSlot::Arg3)
    }

    pub fn element1(&mut self) -> Option<UIElement> {
        self.element(ArgSlot::Arg1)
    }
}
