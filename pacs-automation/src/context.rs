use crate::UIElement;
use std::collections::HashMap;
use tracing::debug;

/// A run variable. Element references are keys into the element cache and
/// are never treated as displayable text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VarValue {
    #[default]
    None,
    Text(String),
    ElementRef(String),
}

impl VarValue {
    pub fn text(value: impl Into<String>) -> Self {
        VarValue::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            VarValue::Text(s) => Some(s),
            VarValue::None | VarValue::ElementRef(_) => None,
        }
    }
}

/// Variable table and element cache for one procedure run.
#[derive(Debug, Default)]
pub struct RunContext {
    vars: HashMap<String, VarValue>,
    elements: HashMap<String, UIElement>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.vars.clear();
        self.elements.clear();
    }

    /// Variable names are case-insensitive.
    pub fn set_var(&mut self, name: &str, value: VarValue) {
        self.vars.insert(name.to_lowercase(), value);
    }

    pub fn var(&self, name: &str) -> Option<&VarValue> {
        self.vars.get(&name.to_lowercase())
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.var(name).and_then(VarValue::as_text)
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    /// Caches a live element and returns the variable value referring to it.
    pub fn cache_element(&mut self, key: impl Into<String>, element: UIElement) -> VarValue {
        let key = key.into();
        self.elements.insert(key.clone(), element);
        VarValue::ElementRef(key)
    }

    /// The cached element for `key` if it is still alive. Stale handles are evicted.
    pub fn cached_element(&mut self, key: &str) -> Option<UIElement> {
        let element = self.elements.get(key)?;
        if element.is_alive() {
            return Some(element.clone());
        }
        debug!("evicting stale cached element '{}'", key);
        self.elements.remove(key);
        None
    }

    pub fn cached_count(&self) -> usize {
        self.elements.len()
    }
}
