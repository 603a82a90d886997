use crate::bookmark::SearchScope;
use crate::errors::AutomationError;
use crate::ScreenshotResult;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::fmt::Debug;
use tracing::instrument;

/// Screen rectangle of an element, in physical pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn center(&self) -> (i32, i32) {
        (
            (self.x + self.width / 2.0) as i32,
            (self.y + self.height / 2.0) as i32,
        )
    }
}

/// The four attributes a bookmark node can match on.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementAttributes {
    pub name: Option<String>,
    pub class_name: Option<String>,
    pub control_type_id: Option<i32>,
    pub automation_id: Option<String>,
}

impl ElementAttributes {
    /// Empty strings coming back from the platform are stored as `None`.
    pub fn new(
        name: Option<String>,
        class_name: Option<String>,
        control_type_id: Option<i32>,
        automation_id: Option<String>,
    ) -> Self {
        fn non_empty(s: Option<String>) -> Option<String> {
            s.filter(|s| !s.is_empty())
        }
        Self {
            name: non_empty(name),
            class_name: non_empty(class_name),
            control_type_id,
            automation_id: non_empty(automation_id),
        }
    }
}

impl fmt::Debug for ElementAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug_struct = f.debug_struct("ElementAttributes");
        if let Some(ref name) = self.name {
            debug_struct.field("name", name);
        }
        if let Some(ref class_name) = self.class_name {
            debug_struct.field("class_name", class_name);
        }
        if let Some(ct) = self.control_type_id {
            debug_struct.field("control_type_id", &ct);
        }
        if let Some(ref automation_id) = self.automation_id {
            debug_struct.field("automation_id", automation_id);
        }
        debug_struct.finish()
    }
}

/// Conjunction of attribute constraints. String comparisons are ordinal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeFilter {
    pub name: Option<String>,
    pub class_name: Option<String>,
    pub control_type_id: Option<i32>,
    pub automation_id: Option<String>,
}

impl AttributeFilter {
    pub fn automation_id(id: impl Into<String>) -> Self {
        Self {
            automation_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.class_name.is_none()
            && self.control_type_id.is_none()
            && self.automation_id.is_none()
    }

    pub fn matches(&self, attrs: &ElementAttributes) -> bool {
        fn eq(want: &Option<String>, have: &Option<String>) -> bool {
            match want {
                None => true,
                Some(w) => have.as_deref().unwrap_or("") == w,
            }
        }
        eq(&self.name, &attrs.name)
            && eq(&self.class_name, &attrs.class_name)
            && eq(&self.automation_id, &attrs.automation_id)
            && self
                .control_type_id
                .map_or(true, |ct| attrs.control_type_id == Some(ct))
    }
}

impl fmt::Display for AttributeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref n) = self.name {
            parts.push(format!("Name='{n}'"));
        }
        if let Some(ref c) = self.class_name {
            parts.push(format!("Class='{c}'"));
        }
        if let Some(ct) = self.control_type_id {
            parts.push(format!("CT={ct}"));
        }
        if let Some(ref a) = self.automation_id {
            parts.push(format!("AutoId='{a}'"));
        }
        if parts.is_empty() {
            write!(f, "(none)")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Represents a UI element in a foreign application window
pub struct UIElement {
    inner: Box<dyn UIElementImpl>,
}

/// Interface for platform-specific element implementations
pub trait UIElementImpl: Send + Sync + Debug {
    /// Identity of the underlying control; equal ids mean the same control.
    fn object_id(&self) -> usize;
    fn attributes(&self) -> Result<ElementAttributes, AutomationError>;
    fn children(&self) -> Result<Vec<UIElement>, AutomationError>;
    fn parent(&self) -> Result<Option<UIElement>, AutomationError>;
    fn bounds(&self) -> Result<Bounds, AutomationError>;
    fn process_id(&self) -> Result<u32, AutomationError>;

    /// Current text of the Value pattern, `None` when the control has none.
    fn value(&self) -> Result<Option<String>, AutomationError>;
    fn legacy_name(&self) -> Result<Option<String>, AutomationError>;

    fn set_value(&self, value: &str) -> Result<(), AutomationError>;
    fn invoke(&self) -> Result<(), AutomationError>;
    fn toggle(&self) -> Result<(), AutomationError>;
    fn focus(&self) -> Result<(), AutomationError>;
    fn activate_window(&self) -> Result<(), AutomationError>;

    /// Items reported by the Selection pattern of a list-like control.
    fn selected_items(&self) -> Result<Vec<UIElement>, AutomationError>;
    fn is_selected(&self) -> Result<bool, AutomationError>;

    fn capture(&self) -> Result<ScreenshotResult, AutomationError>;
    fn clone_box(&self) -> Box<dyn UIElementImpl>;

    /// Matches in `scope` in tree-search order. Platforms with a native
    /// query engine override this; the fallback walks `children()` breadth
    /// first.
    fn find_all(
        &self,
        scope: SearchScope,
        filter: &AttributeFilter,
    ) -> Result<Vec<UIElement>, AutomationError> {
        let mut found = Vec::new();
        let mut queue: VecDeque<UIElement> = self.children()?.into();
        while let Some(el) = queue.pop_front() {
            if el.attributes().is_ok_and(|a| filter.matches(&a)) {
                found.push(el.clone());
            }
            if scope == SearchScope::Descendants {
                if let Ok(kids) = el.children() {
                    queue.extend(kids);
                }
            }
        }
        Ok(found)
    }

    fn find_first(
        &self,
        scope: SearchScope,
        filter: &AttributeFilter,
    ) -> Result<Option<UIElement>, AutomationError> {
        Ok(self.find_all(scope, filter)?.into_iter().next())
    }
}

impl UIElement {
    /// Create a new UI element from a platform-specific implementation
    pub fn new(impl_: Box<dyn UIElementImpl>) -> Self {
        Self { inner: impl_ }
    }

    pub fn object_id(&self) -> usize {
        self.inner.object_id()
    }

    pub fn attributes(&self) -> Result<ElementAttributes, AutomationError> {
        self.inner.attributes()
    }

    /// Accessible name, `None` when empty or unreadable.
    pub fn name(&self) -> Option<String> {
        self.inner.attributes().ok().and_then(|a| a.name)
    }

    pub fn automation_id(&self) -> Option<String> {
        self.inner.attributes().ok().and_then(|a| a.automation_id)
    }

    pub fn children(&self) -> Result<Vec<UIElement>, AutomationError> {
        self.inner.children()
    }

    pub fn parent(&self) -> Result<Option<UIElement>, AutomationError> {
        self.inner.parent()
    }

    pub fn bounds(&self) -> Result<Bounds, AutomationError> {
        self.inner.bounds()
    }

    pub fn process_id(&self) -> Result<u32, AutomationError> {
        self.inner.process_id()
    }

    pub fn value(&self) -> Result<Option<String>, AutomationError> {
        self.inner.value()
    }

    pub fn legacy_name(&self) -> Result<Option<String>, AutomationError> {
        self.inner.legacy_name()
    }

    #[instrument(level = "debug", skip(self, value))]
    pub fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        self.inner.set_value(value)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn invoke(&self) -> Result<(), AutomationError> {
        self.inner.invoke()
    }

    #[instrument(level = "debug", skip(self))]
    pub fn toggle(&self) -> Result<(), AutomationError> {
        self.inner.toggle()
    }

    pub fn focus(&self) -> Result<(), AutomationError> {
        self.inner.focus()
    }

    /// Brings the top-level window owning this element to the foreground.
    pub fn activate_window(&self) -> Result<(), AutomationError> {
        self.inner.activate_window()
    }

    pub fn selected_items(&self) -> Result<Vec<UIElement>, AutomationError> {
        self.inner.selected_items()
    }

    pub fn is_selected(&self) -> Result<bool, AutomationError> {
        self.inner.is_selected()
    }

    pub fn capture(&self) -> Result<ScreenshotResult, AutomationError> {
        self.inner.capture()
    }

    pub fn find_all(
        &self,
        scope: SearchScope,
        filter: &AttributeFilter,
    ) -> Result<Vec<UIElement>, AutomationError> {
        self.inner.find_all(scope, filter)
    }

    pub fn find_first(
        &self,
        scope: SearchScope,
        filter: &AttributeFilter,
    ) -> Result<Option<UIElement>, AutomationError> {
        self.inner.find_first(scope, filter)
    }

    /// A handle is alive while its properties can still be read.
    pub fn is_alive(&self) -> bool {
        self.inner.attributes().is_ok()
    }

    /// First non-empty of Value, Name and the legacy accessible name.
    pub fn text(&self) -> Option<String> {
        self.text_where(|s| !s.is_empty())
    }

    /// Like [`UIElement::text`] but whitespace-only candidates are skipped.
    pub fn visible_text(&self) -> Option<String> {
        self.text_where(|s| !s.trim().is_empty())
    }

    fn text_where(&self, accept: impl Fn(&str) -> bool) -> Option<String> {
        if let Ok(Some(v)) = self.value() {
            if accept(&v) {
                return Some(v);
            }
        }
        if let Some(n) = self.name() {
            if accept(&n) {
                return Some(n);
            }
        }
        match self.legacy_name() {
            Ok(Some(l)) if accept(&l) => Some(l),
            _ => None,
        }
    }
}

impl PartialEq for UIElement {
    fn eq(&self, other: &Self) -> bool {
        self.inner.object_id() == other.inner.object_id()
    }
}

impl Eq for UIElement {}

impl std::hash::Hash for UIElement {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.object_id().hash(state);
    }
}

impl Clone for UIElement {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone_box(),
        }
    }
}

impl Debug for UIElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UIElement")
            .field("object_id", &self.inner.object_id())
            .field("attributes", &self.inner.attributes().ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_only_constrained_attributes() {
        let attrs = ElementAttributes::new(
            Some("Save".into()),
            Some("Button".into()),
            Some(50000),
            None,
        );
        let by_class = AttributeFilter {
            class_name: Some("Button".into()),
            ..Default::default()
        };
        assert!(by_class.matches(&attrs));

        let wrong_case = AttributeFilter {
            name: Some("save".into()),
            ..Default::default()
        };
        assert!(!wrong_case.matches(&attrs));

        let by_id = AttributeFilter::automation_id("btnSave");
        assert!(!by_id.matches(&attrs));
        assert!(AttributeFilter::default().matches(&attrs));
    }

    #[test]
    fn bounds_center_and_emptiness() {
        let b = Bounds::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(b.center(), (60, 45));
        assert!(!b.is_empty());
        assert!(Bounds::new(10.0, 20.0, 0.0, 50.0).is_empty());
    }

    #[test]
    fn filter_renders_for_traces() {
        let f = AttributeFilter {
            class_name: Some("Edit".into()),
            control_type_id: Some(50004),
            ..Default::default()
        };
        assert_eq!(f.to_string(), "Class='Edit', CT=50004");
        assert_eq!(AttributeFilter::default().to_string(), "(none)");
    }
}
