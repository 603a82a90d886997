use super::fixture::*;
use super::init_tracing;
use crate::bookmark::{Bookmark, Node, ResolveMethod, SearchScope};
use crate::capture::ElementCapture;
use crate::resolver::{ElementResolver, StepVerdict};
use std::sync::Arc;

fn node(name: Option<&str>, class: &str, control_type: i32) -> Node {
    Node {
        name: name.map(String::from),
        use_name: name.is_some(),
        class_name: Some(class.to_string()),
        control_type_id: Some(control_type),
        ..Default::default()
    }
}

fn window_node() -> Node {
    node(Some("INFINITT PACS"), "ViewerFrame", WINDOW)
}

fn setup() -> (Arc<FakeDesktop>, Viewer, ElementResolver) {
    init_tracing();
    let desktop = FakeDesktop::new();
    let viewer = viewer(&desktop);
    let resolver = ElementResolver::new(Arc::new(FakeEngine(desktop.clone())));
    (desktop, viewer, resolver)
}

fn verdicts(resolution: &crate::Resolution) -> Vec<StepVerdict> {
    resolution.trace.steps().map(|s| s.verdict.clone()).collect()
}

#[test]
fn captured_bookmark_resolves_back_to_the_same_control() {
    let (desktop, viewer, resolver) = setup();
    let capture = ElementCapture::new(Arc::new(FakeEngine(desktop.clone())));
    let captured = capture.capture_element(&desktop.element(viewer.close));

    let first = resolver.resolve(&captured.bookmark);
    let second = resolver.resolve(&captured.bookmark);

    assert_eq!(first.element, Some(desktop.element(viewer.close)));
    assert_eq!(first.element, second.element);
    assert_eq!(
        verdicts(&first),
        vec![
            StepVerdict::MatchedRoot,
            StepVerdict::Selected(0),
            StepVerdict::Selected(0)
        ]
    );
}

#[test]
fn index_picks_among_equal_matches() {
    let (desktop, viewer, resolver) = setup();
    let mut buttons = node(None, "Button", BUTTON);
    buttons.scope = SearchScope::Descendants;
    buttons.index_among_matches = 1;
    let bookmark = Bookmark::new("close", "Viewer")
        .with_node(window_node())
        .with_node(buttons.clone());
    assert_eq!(
        resolver.resolve(&bookmark).element,
        Some(desktop.element(viewer.close))
    );

    buttons.use_index = false;
    let bookmark = Bookmark::new("first", "Viewer")
        .with_node(window_node())
        .with_node(buttons);
    assert_eq!(
        resolver.resolve(&bookmark).element,
        Some(desktop.element(viewer.open))
    );
}

#[test]
fn out_of_range_and_negative_indexes_fail() {
    let (_desktop, _viewer, resolver) = setup();
    for index in [5, -1] {
        let mut buttons = node(None, "Button", BUTTON);
        buttons.scope = SearchScope::Descendants;
        buttons.index_among_matches = index;
        let bookmark = Bookmark::new("bad", "Viewer")
            .with_node(window_node())
            .with_node(buttons);

        let resolution = resolver.resolve(&bookmark);
        assert!(!resolution.is_resolved());
        assert_eq!(
            verdicts(&resolution).last(),
            Some(&StepVerdict::IndexOutOfRange { index, matches: 2 })
        );
        let rendered = resolution.trace.to_string();
        assert!(rendered.contains(&format!("FAIL: index {index} out of range (2 matches)")));
        assert!(rendered.contains("Resolution failed"));
    }
}

#[test]
fn excluded_and_unconstrained_nodes_leave_the_scope_alone() {
    let (desktop, viewer, resolver) = setup();
    let mut excluded = node(Some("Nowhere"), "Missing", BUTTON);
    excluded.include = false;
    let mut blank = Node::default();
    blank.use_class_name = false;
    blank.use_control_type_id = false;
    blank.use_automation_id = false;

    let bookmark = Bookmark::new("toolbar", "Viewer")
        .with_node(window_node())
        .with_node(excluded)
        .with_node(blank)
        .with_node(node(Some("Toolbar"), "ToolbarWindow32", PANE));

    let resolution = resolver.resolve(&bookmark);
    assert_eq!(resolution.element, Some(desktop.element(viewer.toolbar)));
    assert_eq!(
        verdicts(&resolution),
        vec![
            StepVerdict::MatchedRoot,
            StepVerdict::Skipped,
            StepVerdict::NoConstraints,
            StepVerdict::Selected(0)
        ]
    );
}

#[test]
fn order_field_overrides_chain_position() {
    let (desktop, viewer, resolver) = setup();
    let mut toolbar = node(Some("Toolbar"), "ToolbarWindow32", PANE);
    toolbar.order = Some(1);
    let mut open = node(Some("Open"), "Button", BUTTON);
    open.order = Some(2);
    let mut window = window_node();
    window.order = Some(0);

    let bookmark = Bookmark::new("open", "Viewer")
        .with_node(open)
        .with_node(toolbar)
        .with_node(window);
    assert_eq!(
        resolver.resolve(&bookmark).element,
        Some(desktop.element(viewer.open))
    );
}

#[test]
fn missing_step_stops_the_walk() {
    let (_desktop, _viewer, resolver) = setup();
    let bookmark = Bookmark::new("gone", "Viewer")
        .with_node(window_node())
        .with_node(node(Some("Settings"), "Button", BUTTON))
        .with_node(node(Some("Open"), "Button", BUTTON));

    let resolution = resolver.resolve(&bookmark);
    assert!(resolution.element.is_none());
    assert_eq!(
        verdicts(&resolution),
        vec![StepVerdict::MatchedRoot, StepVerdict::NoMatches]
    );
    let last = resolution.trace.steps().last().unwrap();
    assert!(last.verdict.is_failure());
    assert!(!StepVerdict::MatchedRoot.is_failure());
}

#[test]
fn detached_controls_are_not_found() {
    let (desktop, viewer, resolver) = setup();
    let bookmark = ElementCapture::new(Arc::new(FakeEngine(desktop.clone())))
        .capture_element(&desktop.element(viewer.report))
        .bookmark;
    assert!(resolver.resolve(&bookmark).is_resolved());

    desktop.update(viewer.report, |n| n.detached = true);
    assert!(!resolver.resolve(&bookmark).is_resolved());
}

#[test]
fn unknown_process_reports_no_window() {
    let (_desktop, _viewer, resolver) = setup();
    let bookmark = Bookmark::new("x", "Nonexistent").with_node(window_node());
    let resolution = resolver.resolve(&bookmark);
    assert!(resolution.element.is_none());
    assert!(resolution
        .trace
        .to_string()
        .contains("No window found for process 'Nonexistent'"));
}

#[test]
fn process_name_matching_ignores_case_and_extension() {
    let (desktop, viewer, resolver) = setup();
    for process in ["viewer.EXE", "VIEWER.EXE", " Viewer.exe", "viewer"] {
        let bookmark = Bookmark::new("grid", process)
            .with_node(window_node())
            .with_node(node(Some("Worklist"), "SysListView32", LIST));
        assert_eq!(
            resolver.resolve(&bookmark).element,
            Some(desktop.element(viewer.grid)),
            "{process}"
        );
    }
}

#[test]
fn later_root_windows_are_tried_after_a_failure() {
    init_tracing();
    let desktop = FakeDesktop::new();
    desktop.add_process(PID, "Viewer");
    desktop.add_window(PID, attrs("Loading", "ViewerFrame", WINDOW, ""));
    let viewer = viewer(&desktop);
    let resolver = ElementResolver::new(Arc::new(FakeEngine(desktop.clone())));

    let bookmark = Bookmark::new("open", "Viewer")
        .with_node(node(None, "ViewerFrame", WINDOW))
        .with_node(node(Some("Toolbar"), "ToolbarWindow32", PANE))
        .with_node(node(Some("Open"), "Button", BUTTON));

    let resolution = resolver.resolve(&bookmark);
    assert_eq!(resolution.element, Some(desktop.element(viewer.open)));
    let roots: Vec<usize> = resolution.trace.steps().map(|s| s.root).collect();
    assert_eq!(roots.first(), Some(&0));
    assert_eq!(roots.last(), Some(&1));
}

#[test]
fn automation_id_only_is_one_subtree_search() {
    let (desktop, viewer, resolver) = setup();
    let mut bookmark = Bookmark::new("report", "Viewer").with_node(node(Some("Ignored"), "X", 1));
    bookmark.method = ResolveMethod::AutomationIdOnly;
    bookmark.direct_automation_id = Some("report".to_string());

    let before = desktop.searches();
    let resolution = resolver.resolve(&bookmark);
    assert_eq!(resolution.element, Some(desktop.element(viewer.report)));
    assert_eq!(desktop.searches() - before, 1);
    assert_eq!(verdicts(&resolution), vec![StepVerdict::Selected(0)]);
}

#[test]
fn blank_direct_id_falls_back_to_the_chain() {
    let (desktop, viewer, resolver) = setup();
    let mut bookmark = Bookmark::new("report", "Viewer")
        .with_node(window_node())
        .with_node(node(Some("Report"), "Edit", EDIT));
    bookmark.method = ResolveMethod::AutomationIdOnly;
    bookmark.direct_automation_id = Some("  ".to_string());

    assert_eq!(
        resolver.resolve(&bookmark).element,
        Some(desktop.element(viewer.report))
    );
}
