use super::fixture::*;
use super::init_tracing;
use crate::capture::ElementCapture;
use crate::resolver::ElementResolver;
use std::sync::Arc;

fn setup() -> (Arc<FakeDesktop>, Viewer, ElementCapture) {
    init_tracing();
    let desktop = FakeDesktop::new();
    let viewer = viewer(&desktop);
    let capture = ElementCapture::new(Arc::new(FakeEngine(desktop.clone())));
    (desktop, viewer, capture)
}

#[test]
fn capture_records_the_chain_below_the_desktop() {
    let (desktop, viewer, capture) = setup();
    desktop.set_under_cursor(Some(viewer.open));

    let result = capture.capture_at(120, 30).expect("something under the cursor");
    let chain = &result.bookmark.chain;

    assert_eq!(result.process_name, "Viewer");
    assert_eq!(result.bookmark.process_name, "Viewer");
    assert!(result.bookmark.name.is_empty());
    assert_eq!(chain.len(), 3);
    assert_eq!(chain[0].name.as_deref(), Some("INFINITT PACS"));
    assert_eq!(chain[2].name.as_deref(), Some("Open"));
    assert!(chain.iter().all(|n| n.include && n.use_index));
    assert_eq!(result.summary.len(), 3);
    assert!(result.summary[0].starts_with("[0] "));
}

#[test]
fn nothing_under_the_point_captures_nothing() {
    let (desktop, _viewer, capture) = setup();
    desktop.set_under_cursor(None);
    assert!(capture.capture_at(5, 5).is_none());
}

#[test]
fn only_present_attributes_are_switched_on() {
    let (desktop, viewer, capture) = setup();
    let grid = capture.capture_element(&desktop.element(viewer.grid)).bookmark;
    let grid_node = grid.chain.last().unwrap();
    assert!(grid_node.use_automation_id);
    assert_eq!(grid_node.automation_id.as_deref(), Some("grid"));

    let window = &grid.chain[0];
    assert_eq!(
        window.name,
        desktop.node(viewer.window).attrs.name
    );
    assert!(!window.use_automation_id);
    assert!(window.automation_id.is_none());
    assert!(window.use_name);
}

#[test]
fn sibling_index_disambiguates_identical_controls() {
    let (desktop, viewer, capture) = setup();
    let twin = desktop.add(viewer.toolbar, attrs("Open", "Button", BUTTON, ""));

    let bookmark = capture.capture_element(&desktop.element(twin)).bookmark;
    assert_eq!(bookmark.chain.last().unwrap().index_among_matches, 1);

    let resolver = ElementResolver::new(Arc::new(FakeEngine(desktop.clone())));
    assert_eq!(resolver.resolve(&bookmark).element, Some(desktop.element(twin)));
}

#[test]
fn unnamed_process_is_reported_as_unknown() {
    let (desktop, _viewer, capture) = setup();
    let orphan = desktop.add_window(7, attrs("Popup", "#32770", WINDOW, ""));
    let button = desktop.add(orphan, attrs("OK", "Button", BUTTON, ""));

    let result = capture.capture_element(&desktop.element(button));
    assert_eq!(result.process_name, "Unknown");
    assert_eq!(result.bookmark.chain.len(), 2);
}
