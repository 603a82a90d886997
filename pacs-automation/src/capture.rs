use crate::bookmark::{Bookmark, Node, SearchScope};
use crate::platforms::AccessibilityEngine;
use crate::UIElement;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Ancestor walks stop after this many hops.
const MAX_CHAIN_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub bookmark: Bookmark,
    pub process_name: String,
    /// One line per captured node, root first.
    pub summary: Vec<String>,
}

/// Turns "the control under the cursor" into a bookmark.
pub struct ElementCapture {
    engine: Arc<dyn AccessibilityEngine>,
}

impl ElementCapture {
    pub fn new(engine: Arc<dyn AccessibilityEngine>) -> Self {
        Self { engine }
    }

    #[instrument(level = "debug", skip(self))]
    pub fn capture_at(&self, x: i32, y: i32) -> Option<CaptureResult> {
        match self.engine.element_from_point(x, y) {
            Ok(Some(el)) => Some(self.capture_element(&el)),
            Ok(None) => {
                debug!("nothing under ({}, {})", x, y);
                None
            }
            Err(e) => {
                warn!("element lookup at ({}, {}) failed: {}", x, y, e);
                None
            }
        }
    }

    /// Records the ancestor chain of `target`, top-level window first.
    /// The desktop root itself is not part of the chain.
    pub fn capture_element(&self, target: &UIElement) -> CaptureResult {
        let mut path = vec![target.clone()];
        let mut reached_root = false;
        while path.len() < MAX_CHAIN_DEPTH {
            let Some(current) = path.last() else { break };
            match current.parent() {
                Ok(Some(parent)) => path.push(parent),
                Ok(None) => {
                    reached_root = true;
                    break;
                }
                Err(e) => {
                    debug!("parent walk stopped: {}", e);
                    break;
                }
            }
        }
        if reached_root && path.len() > 1 {
            path.pop();
        }
        path.reverse();

        let mut chain = Vec::with_capacity(path.len());
        let mut summary = Vec::with_capacity(path.len());
        for (depth, el) in path.iter().enumerate() {
            let attrs = el.attributes().unwrap_or_default();
            let mut node = Node::captured(attrs, 0);
            node.index_among_matches = i32::try_from(sibling_index(el, &node)).unwrap_or(0);
            summary.push(format!(
                "[{depth}] {} #{}",
                node.filter(),
                node.index_among_matches
            ));
            chain.push(node);
        }

        let process_name = target
            .process_id()
            .and_then(|pid| self.engine.process_name(pid))
            .unwrap_or_else(|e| {
                debug!("process name unavailable: {}", e);
                "Unknown".to_string()
            });

        let mut bookmark = Bookmark::new(String::new(), process_name.clone());
        bookmark.chain = chain;
        debug!("captured {} nodes for '{}'", bookmark.chain.len(), process_name);
        CaptureResult {
            bookmark,
            process_name,
            summary,
        }
    }
}

/// Position of `el` among the parent's children that match the node's own
/// constraints, which is the ordinal the resolver will pick by. 0 when unknown.
fn sibling_index(el: &UIElement, node: &Node) -> usize {
    let Ok(Some(parent)) = el.parent() else {
        return 0;
    };
    parent
        .find_all(SearchScope::Children, &node.filter())
        .ok()
        .and_then(|matches| matches.iter().position(|m| m == el))
        .unwrap_or(0)
}
