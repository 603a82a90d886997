//! Re-finds the control a [`Bookmark`] describes in the live UI tree.
//!
//! Resolution is one deterministic forward pass per candidate root window:
//! each included node narrows the scope to exactly one element, and the
//! first node that cannot do so ends the attempt. Failures never surface as
//! errors; the caller gets `None` plus a [`ResolveTrace`].

use crate::bookmark::{Bookmark, SearchScope};
use crate::element::AttributeFilter;
use crate::platforms::AccessibilityEngine;
use crate::UIElement;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Matches listed per step in the rendered trace.
const TRACE_LISTED_MATCHES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepVerdict {
    Skipped,
    NoConstraints,
    /// The node matched the root window itself.
    MatchedRoot,
    Selected(usize),
    NoMatches,
    IndexOutOfRange { index: i32, matches: usize },
    SearchFailed(String),
}

impl StepVerdict {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StepVerdict::NoMatches
                | StepVerdict::IndexOutOfRange { .. }
                | StepVerdict::SearchFailed(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct TraceStep {
    pub root: usize,
    /// Position of the node in the bookmark chain.
    pub node: usize,
    pub filter: AttributeFilter,
    pub scope: SearchScope,
    pub matches: usize,
    pub listed: Vec<String>,
    pub verdict: StepVerdict,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub enum TraceEntry {
    Note(String),
    Step(TraceStep),
}

#[derive(Debug, Clone, Default)]
pub struct ResolveTrace {
    pub entries: Vec<TraceEntry>,
}

impl ResolveTrace {
    fn note(&mut self, line: impl Into<String>) {
        let line = line.into();
        debug!("{}", line);
        self.entries.push(TraceEntry::Note(line));
    }

    fn step(&mut self, step: TraceStep) {
        debug!(
            root = step.root,
            node = step.node,
            matches = step.matches,
            elapsed_ms = step.elapsed.as_millis() as u64,
            "resolve step {:?}",
            step.verdict
        );
        self.entries.push(TraceEntry::Step(step));
    }

    pub fn steps(&self) -> impl Iterator<Item = &TraceStep> {
        self.entries.iter().filter_map(|e| match e {
            TraceEntry::Step(s) => Some(s),
            TraceEntry::Note(_) => None,
        })
    }
}

impl fmt::Display for ResolveTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            match entry {
                TraceEntry::Note(line) => writeln!(f, "{line}")?,
                TraceEntry::Step(s) => {
                    writeln!(
                        f,
                        "Step {}: {}, Scope={:?}, matches={} [{} ms]",
                        s.node,
                        s.filter,
                        s.scope,
                        s.matches,
                        s.elapsed.as_millis()
                    )?;
                    for m in &s.listed {
                        writeln!(f, "  - {m}")?;
                    }
                    match &s.verdict {
                        StepVerdict::Skipped => writeln!(f, "  skipped (excluded)")?,
                        StepVerdict::NoConstraints => writeln!(f, "  no constraints, scope unchanged")?,
                        StepVerdict::MatchedRoot => writeln!(f, "  matched root window")?,
                        StepVerdict::Selected(i) => writeln!(f, "  selected match #{i}")?,
                        StepVerdict::NoMatches => writeln!(f, "  FAIL: no matches")?,
                        StepVerdict::IndexOutOfRange { index, matches } => writeln!(
                            f,
                            "  FAIL: index {index} out of range ({matches} matches)"
                        )?,
                        StepVerdict::SearchFailed(e) => writeln!(f, "  FAIL: search error: {e}")?,
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub element: Option<UIElement>,
    pub trace: ResolveTrace,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        self.element.is_some()
    }
}

pub struct ElementResolver {
    engine: Arc<dyn AccessibilityEngine>,
}

impl ElementResolver {
    pub fn new(engine: Arc<dyn AccessibilityEngine>) -> Self {
        Self { engine }
    }

    #[instrument(level = "debug", skip(self, bookmark), fields(bookmark = %bookmark.name))]
    pub fn resolve(&self, bookmark: &Bookmark) -> Resolution {
        let mut trace = ResolveTrace::default();
        let element = self.resolve_inner(bookmark, &mut trace);
        trace.note(match element {
            Some(_) => "Resolved".to_string(),
            None => "Resolution failed".to_string(),
        });
        Resolution { element, trace }
    }

    fn resolve_inner(&self, bookmark: &Bookmark, trace: &mut ResolveTrace) -> Option<UIElement> {
        let mut roots = match self.engine.top_level_windows(&bookmark.process_name) {
            Ok(roots) => roots,
            Err(e) => {
                trace.note(format!("Window lookup for '{}' failed: {e}", bookmark.process_name));
                return None;
            }
        };
        if roots.is_empty() {
            trace.note(format!("No window found for process '{}'", bookmark.process_name));
            return None;
        }
        trace.note(format!(
            "Attached to '{}': {} top-level window(s)",
            bookmark.process_name,
            roots.len()
        ));

        if let Some(id) = bookmark.direct_id() {
            return self.resolve_direct(&roots, id, trace);
        }

        let nodes = bookmark.ordered_nodes();
        let first_filter = nodes
            .iter()
            .find(|(_, n)| n.include)
            .map(|(_, n)| n.filter())
            .filter(|f| !f.is_empty());
        if let (true, Some(filter)) = (bookmark.crawl_from_root, first_filter) {
            let preferred: Vec<UIElement> = roots
                .iter()
                .filter(|r| r.attributes().is_ok_and(|a| filter.matches(&a)))
                .cloned()
                .collect();
            if !preferred.is_empty() {
                trace.note(format!(
                    "{} window(s) match the first node ({filter})",
                    preferred.len()
                ));
                roots = preferred;
            }
        }

        for (root_index, root) in roots.iter().enumerate() {
            trace.note(format!(
                "Root #{root_index}: '{}'",
                root.name().unwrap_or_default()
            ));
            if let Some(found) = self.walk_chain(root_index, root, bookmark, trace) {
                return Some(found);
            }
        }
        None
    }

    /// One subtree search per root window for the direct automation id.
    fn resolve_direct(
        &self,
        roots: &[UIElement],
        automation_id: &str,
        trace: &mut ResolveTrace,
    ) -> Option<UIElement> {
        let filter = AttributeFilter::automation_id(automation_id);
        for (root_index, root) in roots.iter().enumerate() {
            let started = Instant::now();
            let (found, verdict) = match root.find_first(SearchScope::Descendants, &filter) {
                Ok(Some(el)) => (Some(el), StepVerdict::Selected(0)),
                Ok(None) => (None, StepVerdict::NoMatches),
                Err(e) => (None, StepVerdict::SearchFailed(e.to_string())),
            };
            trace.step(TraceStep {
                root: root_index,
                node: 0,
                filter: filter.clone(),
                scope: SearchScope::Descendants,
                matches: usize::from(found.is_some()),
                listed: Vec::new(),
                verdict,
                elapsed: started.elapsed(),
            });
            if found.is_some() {
                return found;
            }
        }
        None
    }

    fn walk_chain(
        &self,
        root_index: usize,
        root: &UIElement,
        bookmark: &Bookmark,
        trace: &mut ResolveTrace,
    ) -> Option<UIElement> {
        let mut scope = root.clone();
        let mut first_included = true;

        for (position, node) in bookmark.ordered_nodes() {
            let started = Instant::now();
            let filter = node.filter();
            let mut step = TraceStep {
                root: root_index,
                node: position,
                filter: filter.clone(),
                scope: node.scope,
                matches: 0,
                listed: Vec::new(),
                verdict: StepVerdict::Skipped,
                elapsed: Duration::ZERO,
            };

            if !node.include {
                trace.step(step);
                continue;
            }
            let is_first = std::mem::replace(&mut first_included, false);

            if filter.is_empty() {
                step.verdict = StepVerdict::NoConstraints;
                step.elapsed = started.elapsed();
                trace.step(step);
                continue;
            }

            if is_first && scope.attributes().is_ok_and(|a| filter.matches(&a)) {
                step.verdict = StepVerdict::MatchedRoot;
                step.matches = 1;
                step.elapsed = started.elapsed();
                trace.step(step);
                continue;
            }

            let matches = match scope.find_all(node.scope, &filter) {
                Ok(m) => m,
                Err(e) => {
                    step.verdict = StepVerdict::SearchFailed(e.to_string());
                    step.elapsed = started.elapsed();
                    trace.step(step);
                    return None;
                }
            };
            step.matches = matches.len();
            step.listed = matches
                .iter()
                .take(TRACE_LISTED_MATCHES)
                .map(|m| format!("{:?}", m.attributes().unwrap_or_default()))
                .collect();

            let picked = if matches.is_empty() {
                Err(StepVerdict::NoMatches)
            } else if node.use_index {
                usize::try_from(node.index_among_matches)
                    .ok()
                    .filter(|i| *i < matches.len())
                    .ok_or(StepVerdict::IndexOutOfRange {
                        index: node.index_among_matches,
                        matches: matches.len(),
                    })
            } else {
                Ok(0)
            };

            step.elapsed = started.elapsed();
            match picked {
                Ok(i) => {
                    step.verdict = StepVerdict::Selected(i);
                    trace.step(step);
                    scope = matches.into_iter().nth(i)?;
                }
                Err(verdict) => {
                    step.verdict = verdict;
                    trace.step(step);
                    return None;
                }
            }
        }
        Some(scope)
    }
}
