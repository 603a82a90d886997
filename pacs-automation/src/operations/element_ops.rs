use super::{OperationRegistry, Signature, SlotSpec, StepContext, StepOutcome};
use crate::bookmark::SearchScope;
use crate::element::AttributeFilter;
use crate::encoding::normalize_mojibake;
use crate::ocr::Recognition;
use crate::procedure::ArgKind;
use crate::{AutomationError, UIElement};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const ELEMENT: SlotSpec = SlotSpec::on(ArgKind::Element);

pub(super) fn register(registry: &mut OperationRegistry) {
    let one = Signature::one(ELEMENT);
    registry.register_sync("GetText", one, get_text);
    registry.register_sync("GetName", one, get_name);
    registry.register("GetTextWait", one, Arc::new(WaitForText::default()));
    registry.register("GetTextOCR", one, Arc::new(OcrText));
    registry.register_sync("Invoke", one, invoke);
    registry.register("SetFocus", one, Arc::new(FocusElement::default()));
    registry.register_sync(
        "SetValue",
        Signature::two(ELEMENT, SlotSpec::ANY),
        set_value,
    );
    registry.register_sync("ClickElement", one, click_element);
    registry.register_sync("ClickElementAndStay", one, click_element_and_stay);
    registry.register_sync("MouseMoveToElement", one, move_to_element);
    registry.register_sync("IsVisible", one, is_visible);
    registry.register_sync(
        "GetValueFromSelection",
        Signature::two(ELEMENT, SlotSpec::on(ArgKind::String).with_default("ID")),
        value_from_selection,
    );
    registry.register_sync("GetSelectedElement", one, selected_element);
}

/// Value pattern, then Name, then the legacy accessible name; repaired.
/// Errors only when the element can no longer be read at all.
pub fn read_text(el: &UIElement) -> Result<String, AutomationError> {
    el.attributes()?;
    Ok(normalize_mojibake(&el.text().unwrap_or_default()))
}

fn text_outcome(el: &UIElement) -> StepOutcome {
    match read_text(el) {
        Ok(text) => StepOutcome::same(text),
        Err(e) => {
            debug!("GetText failed: {}", e);
            StepOutcome::status("(error)")
        }
    }
}

fn get_text(step: &mut StepContext<'_>) -> StepOutcome {
    match step.element1() {
        Some(el) => text_outcome(&el),
        None => StepOutcome::status("(no element)"),
    }
}

fn get_name(step: &mut StepContext<'_>) -> StepOutcome {
    let Some(el) = step.element1() else {
        return StepOutcome::status("(no element)");
    };
    match el.attributes() {
        Ok(attrs) => {
            let name = normalize_mojibake(&attrs.name.unwrap_or_default());
            let preview = if name.is_empty() { "(empty)".to_string() } else { name.clone() };
            StepOutcome::text(preview, name)
        }
        Err(_) => StepOutcome::status("(error)"),
    }
}

/// Re-resolves the element until it has a visible rectangle, then reads
/// its text like `GetText`.
#[derive(Debug, Clone)]
pub struct WaitForText {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for WaitForText {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            interval: Duration::from_millis(200),
        }
    }
}

#[async_trait::async_trait]
impl super::OperationHandler for WaitForText {
    async fn execute(&self, step: &mut StepContext<'_>) -> StepOutcome {
        let interval_ms = self.interval.as_millis().max(1);
        let attempts = (self.timeout.as_millis() / interval_ms).max(1);
        for attempt in 0..attempts {
            if let Some(el) = step.element1() {
                match el.bounds() {
                    Ok(b) if !b.is_empty() => {
                        debug!("element visible after {} attempts", attempt + 1);
                        return text_outcome(&el);
                    }
                    Ok(_) => debug!("element resolved but not visible yet"),
                    Err(e) => debug!("visibility check failed: {}", e),
                }
            }
            tokio::time::sleep(self.interval).await;
        }
        StepOutcome::status("(timeout - not visible)")
    }
}

/// Recognizes the text drawn inside the element's rectangle.
#[derive(Debug, Default)]
pub struct OcrText;

#[async_trait::async_trait]
impl super::OperationHandler for OcrText {
    async fn execute(&self, step: &mut StepContext<'_>) -> StepOutcome {
        let Some(el) = step.element1() else {
            return StepOutcome::status("(no element)");
        };
        match el.bounds() {
            Ok(b) if !b.is_empty() => {}
            Ok(_) => return StepOutcome::status("(no bounds)"),
            Err(_) => return StepOutcome::status("(error)"),
        }
        let shot = match el.capture() {
            Ok(shot) => shot,
            Err(e) => {
                warn!("element capture for OCR failed: {}", e);
                return StepOutcome::status("(error)");
            }
        };
        match step.services.ocr.recognize(&shot).await {
            Ok(Recognition::Unavailable) => StepOutcome::status("(ocr unavailable)"),
            Ok(Recognition::Text(text)) if text.trim().is_empty() => StepOutcome::text("(empty)", text),
            Ok(Recognition::Text(text)) => StepOutcome::same(text),
            Err(e) => {
                warn!("OCR failed: {}", e);
                StepOutcome::status("(error)")
            }
        }
    }
}

fn invoke(step: &mut StepContext<'_>) -> StepOutcome {
    let Some(el) = step.element1() else {
        return StepOutcome::status("(no element)");
    };
    let result = match el.invoke() {
        Err(e) if e.is_unsupported() => el.toggle(),
        other => other,
    };
    match result {
        Ok(()) => StepOutcome::status("(invoked)"),
        Err(e) => {
            debug!("Invoke failed: {}", e);
            StepOutcome::status("(error)")
        }
    }
}

/// Activates the owning window, then retries keyboard focus.
#[derive(Debug, Clone)]
pub struct FocusElement {
    pub settle: Duration,
    pub retry_delay: Duration,
    pub attempts: u32,
}

impl Default for FocusElement {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(100),
            retry_delay: Duration::from_millis(150),
            attempts: 3,
        }
    }
}

#[async_trait::async_trait]
impl super::OperationHandler for FocusElement {
    async fn execute(&self, step: &mut StepContext<'_>) -> StepOutcome {
        let Some(el) = step.element1() else {
            return StepOutcome::status("(no element)");
        };
        match el.activate_window() {
            Ok(()) => tokio::time::sleep(self.settle).await,
            Err(e) => debug!("window activation skipped: {}", e),
        }
        let attempts = self.attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match el.focus() {
                Ok(()) if attempt == 1 => return StepOutcome::status("(focused)"),
                Ok(()) => {
                    return StepOutcome::status(format!("(focused after {attempt} attempts)"))
                }
                Err(e) => {
                    debug!("focus attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        StepOutcome::status(format!("(error after {attempts} attempts: {last_error})"))
    }
}

fn set_value(step: &mut StepContext<'_>) -> StepOutcome {
    let Some(el) = step.element1() else {
        return StepOutcome::status("(no element)");
    };
    let text = step.arg2().unwrap_or_default();
    match el.set_value(&text) {
        Ok(()) => StepOutcome::status(format!("(value set, {} chars)", text.chars().count())),
        Err(AutomationError::UnsupportedOperation(_)) => StepOutcome::status("(no value pattern)"),
        Err(AutomationError::PermissionDenied(_)) => StepOutcome::status("(read-only)"),
        Err(e) => StepOutcome::status(format!("(error: {e})")),
    }
}

/// Center of a visible element, or the preview explaining why not.
fn visible_center(step: &mut StepContext<'_>) -> Result<(i32, i32), StepOutcome> {
    let el = step
        .element1()
        .ok_or_else(|| StepOutcome::status("(no element)"))?;
    match el.bounds() {
        Ok(b) if !b.is_empty() => Ok(b.center()),
        Ok(_) => Err(StepOutcome::status("(no bounds)")),
        Err(_) => Err(StepOutcome::status("(error)")),
    }
}

fn click_element(step: &mut StepContext<'_>) -> StepOutcome {
    let (x, y) = match visible_center(step) {
        Ok(p) => p,
        Err(outcome) => return outcome,
    };
    match step.services.input.click_and_restore(x, y) {
        Ok(()) => StepOutcome::status(format!("(clicked element center {x},{y})")),
        Err(_) => StepOutcome::status("(error)"),
    }
}

fn click_element_and_stay(step: &mut StepContext<'_>) -> StepOutcome {
    let (x, y) = match visible_center(step) {
        Ok(p) => p,
        Err(outcome) => return outcome,
    };
    match step.services.input.click(x, y) {
        Ok(()) => StepOutcome::status(format!("(clicked and stayed at {x},{y})")),
        Err(_) => StepOutcome::status("(error)"),
    }
}

fn move_to_element(step: &mut StepContext<'_>) -> StepOutcome {
    let (x, y) = match visible_center(step) {
        Ok(p) => p,
        Err(outcome) => return outcome,
    };
    match step.services.input.move_cursor(x, y) {
        Ok(()) => StepOutcome::status(format!("(moved to element center {x},{y})")),
        Err(_) => StepOutcome::status("(error)"),
    }
}

fn is_visible(step: &mut StepContext<'_>) -> StepOutcome {
    let visible = step
        .element1()
        .and_then(|el| el.bounds().ok())
        .is_some_and(|b| !b.is_empty());
    StepOutcome::boolean(visible, visible.to_string())
}

/// First selected item of a list, from its Selection pattern or, failing
/// that, from descendants reporting themselves selected.
fn selected_row(list: &UIElement) -> Option<UIElement> {
    if let Some(first) = list.selected_items().ok().and_then(|v| v.into_iter().next()) {
        return Some(first);
    }
    list.find_all(SearchScope::Descendants, &AttributeFilter::default())
        .ok()?
        .into_iter()
        .find(|el| el.is_selected().unwrap_or(false))
}

/// Trimmed text of a cell, looking one level down when the cell itself is blank.
fn cell_text(cell: &UIElement) -> String {
    if let Some(text) = cell.visible_text() {
        return text.trim().to_string();
    }
    cell.children()
        .unwrap_or_default()
        .iter()
        .find_map(UIElement::visible_text)
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

/// Header texts from the list's first child row.
fn header_texts(list: &UIElement) -> Vec<String> {
    let Some(header_row) = list.children().ok().and_then(|c| c.into_iter().next()) else {
        return Vec::new();
    };
    header_row
        .children()
        .unwrap_or_default()
        .iter()
        .map(cell_text)
        .collect()
}

/// Maps viewer-specific column captions onto the names procedures use.
pub fn normalize_header(header: &str) -> String {
    const ALIASES: &[(&str, &str)] = &[
        ("Accession", "Accession No."),
        ("Study Description", "Study Desc"),
        ("Institution Name", "Institution"),
        ("BirthDate", "Birth Date"),
        ("BodyPart", "Body Part"),
    ];
    let h = header.trim();
    ALIASES
        .iter()
        .find(|(from, _)| from.eq_ignore_ascii_case(h))
        .map_or_else(|| h.to_string(), |(_, to)| to.to_string())
}

/// Picks the cell under `wanted`: exact header match first, then the first
/// header containing it. Both case-insensitive.
pub fn pick_column(headers: &[String], cells: &[String], wanted: &str) -> Option<String> {
    let mut headers: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let mut cells = cells.to_vec();
    while headers.len() < cells.len() {
        headers.push(format!("Col{}", headers.len() + 1));
    }
    cells.resize(headers.len(), String::new());

    let wanted_lower = wanted.to_lowercase();
    let exact = headers.iter().position(|h| h.to_lowercase() == wanted_lower);
    let index = exact.or_else(|| {
        headers
            .iter()
            .position(|h| h.to_lowercase().contains(&wanted_lower))
    })?;
    cells.get(index).cloned()
}

fn value_from_selection(step: &mut StepContext<'_>) -> StepOutcome {
    let wanted = step
        .arg2()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "ID".to_string());
    let Some(list) = step.element1() else {
        return StepOutcome::status("(no element)");
    };
    let Some(row) = selected_row(&list) else {
        return StepOutcome::status("(no selection)");
    };
    let headers = header_texts(&list);
    let cells: Vec<String> = row
        .children()
        .unwrap_or_default()
        .iter()
        .map(|c| normalize_mojibake(&cell_text(c)))
        .collect();
    match pick_column(&headers, &cells, &wanted) {
        Some(value) => StepOutcome::same(value),
        None => StepOutcome::status(format!("({wanted} not found)")),
    }
}

fn selected_element(step: &mut StepContext<'_>) -> StepOutcome {
    let Some(list) = step.element1() else {
        return StepOutcome::status("(element not resolved)");
    };
    let Some(row) = selected_row(&list) else {
        return StepOutcome::status("(no selection)");
    };
    let name = row.name();
    let preview = format!(
        "(element: {}, automationId: {})",
        name.as_deref().unwrap_or("(no name)"),
        row.automation_id().as_deref().unwrap_or("(no automationId)")
    );
    let key = format!("SelectedElement:{}", name.unwrap_or_default());
    let value = step.run.cache_element(key, row);
    StepOutcome::new(preview, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn headers_are_normalized_before_matching() {
        let headers = strings(&["Accession", "Patient Name", "BodyPart"]);
        let cells = strings(&["A123", "Hong", "CHEST"]);
        assert_eq!(pick_column(&headers, &cells, "accession no.").as_deref(), Some("A123"));
        assert_eq!(pick_column(&headers, &cells, "Body Part").as_deref(), Some("CHEST"));
    }

    #[test]
    fn exact_header_wins_over_substring() {
        let headers = strings(&["Patient ID", "ID"]);
        let cells = strings(&["P-1", "42"]);
        assert_eq!(pick_column(&headers, &cells, "id").as_deref(), Some("42"));
        assert_eq!(pick_column(&headers, &cells, "patient").as_deref(), Some("P-1"));
        assert_eq!(pick_column(&headers, &cells, "Modality"), None);
    }

    #[test]
    fn missing_headers_and_cells_are_padded() {
        let headers = strings(&["ID"]);
        let cells = strings(&["7", "CT"]);
        assert_eq!(pick_column(&headers, &cells, "Col2").as_deref(), Some("CT"));
        let short = strings(&["7"]);
        let wide = strings(&["ID", "Modality"]);
        assert_eq!(pick_column(&wide, &short, "Modality").as_deref(), Some(""));
    }
}
