//! Bookmarks: durable descriptors for re-finding one control in a host
//! process window, and the JSON store that keeps them by name.

use crate::element::{AttributeFilter, ElementAttributes};
use crate::errors::AutomationError;
use crate::utils::{load_json_or_default, save_json};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::debug;

/// How a bookmark is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ResolveMethod {
    #[default]
    Chain,
    AutomationIdOnly,
}

/// Search breadth of one chain node relative to its parent scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SearchScope {
    #[default]
    Children,
    Descendants,
}

/// Stored either by variant name or by ordinal.
#[derive(Deserialize)]
#[serde(untagged)]
enum NameOrOrdinal {
    Name(String),
    Ordinal(i64),
}

fn enum_from_repr<'de, D, T>(deserializer: D, variants: &'static [&'static str], values: &[T]) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Copy,
{
    match NameOrOrdinal::deserialize(deserializer)? {
        NameOrOrdinal::Name(name) => variants
            .iter()
            .position(|v| v.eq_ignore_ascii_case(name.trim()))
            .map(|i| values[i])
            .ok_or_else(|| D::Error::unknown_variant(&name, variants)),
        NameOrOrdinal::Ordinal(n) => usize::try_from(n)
            .ok()
            .and_then(|i| values.get(i).copied())
            .ok_or_else(|| D::Error::custom(format!("ordinal {n} out of range"))),
    }
}

impl<'de> Deserialize<'de> for ResolveMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        enum_from_repr(
            deserializer,
            &["Chain", "AutomationIdOnly"],
            &[ResolveMethod::Chain, ResolveMethod::AutomationIdOnly],
        )
    }
}

impl<'de> Deserialize<'de> for SearchScope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        enum_from_repr(
            deserializer,
            &["Children", "Descendants"],
            &[SearchScope::Children, SearchScope::Descendants],
        )
    }
}

fn yes() -> bool {
    true
}

/// One ancestor step of a chain, root first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Node {
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "className", skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, alias = "controlTypeId", skip_serializing_if = "Option::is_none")]
    pub control_type_id: Option<i32>,
    #[serde(default, alias = "automationId", skip_serializing_if = "Option::is_none")]
    pub automation_id: Option<String>,
    #[serde(default, alias = "indexAmongMatches")]
    pub index_among_matches: i32,
    #[serde(default = "yes", alias = "include")]
    pub include: bool,
    #[serde(default, alias = "useName")]
    pub use_name: bool,
    #[serde(default = "yes", alias = "useClassName")]
    pub use_class_name: bool,
    #[serde(default = "yes", alias = "useControlTypeId")]
    pub use_control_type_id: bool,
    #[serde(default = "yes", alias = "useAutomationId")]
    pub use_automation_id: bool,
    #[serde(default = "yes", alias = "useIndex")]
    pub use_index: bool,
    #[serde(default, alias = "scope")]
    pub scope: SearchScope,
    #[serde(default, alias = "order", skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            name: None,
            class_name: None,
            control_type_id: None,
            automation_id: None,
            index_among_matches: 0,
            include: true,
            use_name: false,
            use_class_name: true,
            use_control_type_id: true,
            use_automation_id: true,
            use_index: true,
            scope: SearchScope::Children,
            order: None,
        }
    }
}

impl Node {
    /// Node for a freshly captured element: every attribute that has a value
    /// is switched on, the sibling ordinal is recorded and used.
    pub fn captured(attrs: ElementAttributes, sibling_index: usize) -> Self {
        Self {
            use_name: attrs.name.is_some(),
            use_class_name: attrs.class_name.is_some(),
            use_control_type_id: attrs.control_type_id.is_some(),
            use_automation_id: attrs.automation_id.is_some(),
            use_index: true,
            index_among_matches: i32::try_from(sibling_index).unwrap_or(i32::MAX),
            name: attrs.name,
            class_name: attrs.class_name,
            control_type_id: attrs.control_type_id,
            automation_id: attrs.automation_id,
            ..Default::default()
        }
    }

    /// Constraints contributed by this node. A flag only counts when the
    /// captured value is present.
    pub fn filter(&self) -> AttributeFilter {
        fn pick(enabled: bool, value: &Option<String>) -> Option<String> {
            if enabled {
                value.clone().filter(|v| !v.is_empty())
            } else {
                None
            }
        }
        AttributeFilter {
            name: pick(self.use_name, &self.name),
            class_name: pick(self.use_class_name, &self.class_name),
            control_type_id: self.control_type_id.filter(|_| self.use_control_type_id),
            automation_id: pick(self.use_automation_id, &self.automation_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Bookmark {
    #[serde(default, alias = "name")]
    pub name: String,
    #[serde(default, alias = "processName")]
    pub process_name: String,
    #[serde(default, alias = "method")]
    pub method: ResolveMethod,
    #[serde(default, alias = "directAutomationId", skip_serializing_if = "Option::is_none")]
    pub direct_automation_id: Option<String>,
    #[serde(default = "yes", alias = "crawlFromRoot")]
    pub crawl_from_root: bool,
    #[serde(default, alias = "chain")]
    pub chain: Vec<Node>,
}

impl Default for Bookmark {
    fn default() -> Self {
        Self {
            name: String::new(),
            process_name: String::new(),
            method: ResolveMethod::Chain,
            direct_automation_id: None,
            crawl_from_root: true,
            chain: Vec::new(),
        }
    }
}

impl Bookmark {
    pub fn new(name: impl Into<String>, process_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            process_name: process_name.into(),
            ..Default::default()
        }
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.chain.push(node);
        self
    }

    /// Chain in processing order: `Order` when set, else position. Stable.
    pub fn ordered_nodes(&self) -> Vec<(usize, &Node)> {
        let mut nodes: Vec<(usize, &Node)> = self.chain.iter().enumerate().collect();
        nodes.sort_by_key(|(pos, n)| n.order.map(i64::from).unwrap_or(*pos as i64));
        nodes
    }

    /// Direct automation id, when the bookmark is resolved by id only.
    pub fn direct_id(&self) -> Option<&str> {
        match self.method {
            ResolveMethod::AutomationIdOnly => self
                .direct_automation_id
                .as_deref()
                .filter(|id| !id.trim().is_empty()),
            ResolveMethod::Chain => None,
        }
    }
}

/// Named bookmarks persisted as `{"Bookmarks": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookmarkStore {
    #[serde(rename = "Bookmarks", alias = "bookmarks", default)]
    bookmarks: Vec<Bookmark>,
}

impl BookmarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the store; a missing or corrupt file yields an empty store.
    pub fn load(path: &Path) -> Self {
        let store: Self = load_json_or_default(path, "bookmark store");
        debug!("loaded {} bookmarks from {}", store.bookmarks.len(), path.display());
        store
    }

    pub fn save(&self, path: &Path) -> Result<(), AutomationError> {
        save_json(path, self)
    }

    /// Case-insensitive lookup by name.
    pub fn get(&self, name: &str) -> Option<&Bookmark> {
        self.bookmarks
            .iter()
            .find(|b| b.name.eq_ignore_ascii_case(name))
    }

    /// Inserts or replaces the bookmark with the same name.
    pub fn upsert(&mut self, bookmark: Bookmark) {
        match self
            .bookmarks
            .iter_mut()
            .find(|b| b.name.eq_ignore_ascii_case(&bookmark.name))
        {
            Some(existing) => *existing = bookmark,
            None => self.bookmarks.push(bookmark),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.bookmarks.len();
        self.bookmarks.retain(|b| !b.name.eq_ignore_ascii_case(name));
        before != self.bookmarks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bookmark> {
        self.bookmarks.iter()
    }

    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_defaults_apply_to_sparse_json() {
        let node: Node = serde_json::from_str(r#"{"ClassName": "Edit"}"#).unwrap();
        assert!(node.include);
        assert!(!node.use_name);
        assert!(node.use_class_name && node.use_control_type_id && node.use_automation_id);
        assert!(node.use_index);
        assert_eq!(node.scope, SearchScope::Children);
        assert_eq!(node.index_among_matches, 0);
        assert_eq!(node.order, None);
    }

    #[test]
    fn enums_accept_names_and_ordinals() {
        let b: Bookmark = serde_json::from_str(
            r#"{"name": "x", "processName": "p", "method": 1,
                "chain": [{"scope": "descendants"}, {"Scope": 0}]}"#,
        )
        .unwrap();
        assert_eq!(b.method, ResolveMethod::AutomationIdOnly);
        assert_eq!(b.chain[0].scope, SearchScope::Descendants);
        assert_eq!(b.chain[1].scope, SearchScope::Children);
        assert!(b.crawl_from_root);

        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["Method"], "AutomationIdOnly");
        assert_eq!(json["Chain"][0]["Scope"], "Descendants");
        assert!(json.get("DirectAutomationId").is_none());
    }

    #[test]
    fn filter_ignores_flagged_but_empty_values() {
        let node = Node {
            name: Some(String::new()),
            use_name: true,
            class_name: Some("Edit".into()),
            control_type_id: None,
            ..Default::default()
        };
        let f = node.filter();
        assert_eq!(f.name, None);
        assert_eq!(f.class_name.as_deref(), Some("Edit"));
        assert_eq!(f.control_type_id, None);
    }

    #[test]
    fn ordered_nodes_honours_order_then_position() {
        let b = Bookmark::new("b", "p")
            .with_node(Node { order: Some(5), name: Some("late".into()), ..Default::default() })
            .with_node(Node { name: Some("second".into()), ..Default::default() })
            .with_node(Node { order: Some(0), name: Some("first".into()), ..Default::default() });
        let names: Vec<_> = b
            .ordered_nodes()
            .into_iter()
            .map(|(_, n)| n.name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["first", "second", "late"]);
    }

    #[test]
    fn store_lookup_is_case_insensitive_and_upsert_replaces() {
        let mut store = BookmarkStore::new();
        store.upsert(Bookmark::new("StudyList", "viewer"));
        store.upsert(Bookmark::new("studylist", "viewer2"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("STUDYLIST").unwrap().process_name, "viewer2");
        assert!(store.remove("StudyList"));
        assert!(store.is_empty());
    }
}
