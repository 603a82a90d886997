//! Windows UI Automation element wrapper

use super::types::ThreadSafeWinUIElement;
use super::utils::{
    convert_uiautomation_element, create_ui_automation_with_com_init, filter_to_condition,
    generate_element_id,
};
use crate::bookmark::SearchScope;
use crate::element::{AttributeFilter, Bounds, ElementAttributes, UIElementImpl};
use crate::{AutomationError, ScreenshotResult, UIElement};
use std::fmt::Debug;
use tracing::debug;
use uiautomation::patterns;
use uiautomation::types::TreeScope;

/// Ancestor hops tried when looking for a native window handle.
const MAX_HANDLE_WALK: usize = 32;

pub struct WindowsUIElement {
    pub(crate) element: ThreadSafeWinUIElement,
}

impl WindowsUIElement {
    /// Get the raw UI element for direct automation
    pub fn get_raw_element(&self) -> &uiautomation::UIElement {
        &self.element.0
    }

    fn pattern_missing(pattern: &str, e: uiautomation::Error) -> AutomationError {
        AutomationError::UnsupportedOperation(format!(
            "Element does not support {pattern}: {e}"
        ))
    }

    fn tree_scope(scope: SearchScope) -> TreeScope {
        match scope {
            SearchScope::Children => TreeScope::Children,
            SearchScope::Descendants => TreeScope::Descendants,
        }
    }

    /// Native handle of this element or of its nearest ancestor that has one.
    fn nearest_window_handle(&self) -> Result<windows::Win32::Foundation::HWND, AutomationError> {
        let automation = create_ui_automation_with_com_init()?;
        let walker = automation.get_raw_view_walker()?;
        let mut current = (*self.element.0).clone();
        for _ in 0..MAX_HANDLE_WALK {
            if let Ok(handle) = current.get_native_window_handle() {
                let hwnd: windows::Win32::Foundation::HWND = handle.into();
                if !hwnd.is_invalid() {
                    return Ok(hwnd);
                }
            }
            current = match walker.get_parent(&current) {
                Ok(parent) => parent,
                Err(_) => break,
            };
        }
        Err(AutomationError::ElementNotFound(
            "no native window handle above element".to_string(),
        ))
    }
}

impl Debug for WindowsUIElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowsUIElement")
            .field("name", &self.element.0.get_name().unwrap_or_default())
            .finish()
    }
}

impl UIElementImpl for WindowsUIElement {
    fn object_id(&self) -> usize {
        generate_element_id(&self.element.0)
    }

    fn attributes(&self) -> Result<ElementAttributes, AutomationError> {
        let el = &self.element.0;
        let name = el.get_name()?;
        let class_name = el.get_classname().ok();
        let control_type_id = el.get_control_type().ok().map(|ct| ct as i32);
        let automation_id = el.get_automation_id().ok();
        Ok(ElementAttributes::new(
            Some(name),
            class_name,
            control_type_id,
            automation_id,
        ))
    }

    fn children(&self) -> Result<Vec<UIElement>, AutomationError> {
        let automation = create_ui_automation_with_com_init()?;
        let true_condition = automation.create_true_condition()?;
        let children = self
            .element
            .0
            .find_all(TreeScope::Children, &true_condition)
            .map_err(|e| AutomationError::PlatformError(format!("Failed to get children: {e}")))?;
        Ok(children
            .into_iter()
            .map(convert_uiautomation_element)
            .collect())
    }

    fn parent(&self) -> Result<Option<UIElement>, AutomationError> {
        let automation = create_ui_automation_with_com_init()?;
        let walker = automation.get_raw_view_walker()?;
        match walker.get_parent(&self.element.0) {
            Ok(parent) => Ok(Some(convert_uiautomation_element(parent))),
            Err(e) => {
                // No parent: this is the desktop root
                debug!("TreeWalker get_parent failed: {}", e);
                Ok(None)
            }
        }
    }

    fn find_all(
        &self,
        scope: SearchScope,
        filter: &AttributeFilter,
    ) -> Result<Vec<UIElement>, AutomationError> {
        let automation = create_ui_automation_with_com_init()?;
        let condition = filter_to_condition(&automation, filter)?;
        match self.element.0.find_all(Self::tree_scope(scope), &condition) {
            Ok(found) => Ok(found
                .into_iter()
                .map(convert_uiautomation_element)
                .collect()),
            Err(e) => {
                debug!("find_all({:?}, {}) returned nothing: {}", scope, filter, e);
                Ok(Vec::new())
            }
        }
    }

    fn find_first(
        &self,
        scope: SearchScope,
        filter: &AttributeFilter,
    ) -> Result<Option<UIElement>, AutomationError> {
        let automation = create_ui_automation_with_com_init()?;
        let condition = filter_to_condition(&automation, filter)?;
        match self.element.0.find_first(Self::tree_scope(scope), &condition) {
            Ok(found) => Ok(Some(convert_uiautomation_element(found))),
            Err(e) => {
                debug!("find_first({:?}, {}) returned nothing: {}", scope, filter, e);
                Ok(None)
            }
        }
    }

    fn bounds(&self) -> Result<Bounds, AutomationError> {
        let rect = self
            .element
            .0
            .get_bounding_rectangle()
            .map_err(|e| AutomationError::ElementNotFound(e.to_string()))?;
        Ok(Bounds::new(
            rect.get_left() as f64,
            rect.get_top() as f64,
            rect.get_width() as f64,
            rect.get_height() as f64,
        ))
    }

    fn process_id(&self) -> Result<u32, AutomationError> {
        Ok(self.element.0.get_process_id()? as u32)
    }

    fn value(&self) -> Result<Option<String>, AutomationError> {
        match self.element.0.get_pattern::<patterns::UIValuePattern>() {
            Ok(pattern) => Ok(Some(pattern.get_value()?)),
            Err(_) => Ok(None),
        }
    }

    fn legacy_name(&self) -> Result<Option<String>, AutomationError> {
        match self
            .element
            .0
            .get_pattern::<patterns::UILegacyIAccessiblePattern>()
        {
            Ok(pattern) => Ok(pattern.get_name().ok()),
            Err(_) => Ok(None),
        }
    }

    fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        debug!("setting {} chars on {:?}", value.chars().count(), self);
        let pattern = self
            .element
            .0
            .get_pattern::<patterns::UIValuePattern>()
            .map_err(|e| Self::pattern_missing("ValuePattern", e))?;
        if pattern.is_readonly().unwrap_or(false) {
            return Err(AutomationError::PermissionDenied(
                "value pattern is read-only".to_string(),
            ));
        }
        pattern
            .set_value(value)
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    fn invoke(&self) -> Result<(), AutomationError> {
        let pattern = self
            .element
            .0
            .get_pattern::<patterns::UIInvokePattern>()
            .map_err(|e| Self::pattern_missing("InvokePattern", e))?;
        pattern
            .invoke()
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    fn toggle(&self) -> Result<(), AutomationError> {
        let pattern = self
            .element
            .0
            .get_pattern::<patterns::UITogglePattern>()
            .map_err(|e| Self::pattern_missing("TogglePattern", e))?;
        pattern
            .toggle()
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    fn focus(&self) -> Result<(), AutomationError> {
        self.element
            .0
            .set_focus()
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    fn activate_window(&self) -> Result<(), AutomationError> {
        use windows::Win32::UI::WindowsAndMessaging::{
            GetAncestor, IsIconic, SetForegroundWindow, ShowWindow, GA_ROOT, SW_RESTORE,
        };

        let hwnd = self.nearest_window_handle()?;
        unsafe {
            let top = GetAncestor(hwnd, GA_ROOT);
            let top = if top.is_invalid() { hwnd } else { top };
            if IsIconic(top).as_bool() {
                debug!("window is minimized, restoring it");
                let _ = ShowWindow(top, SW_RESTORE);
            }
            if !SetForegroundWindow(top).as_bool() {
                return Err(AutomationError::PlatformError(
                    "SetForegroundWindow was refused".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn selected_items(&self) -> Result<Vec<UIElement>, AutomationError> {
        let pattern = self
            .element
            .0
            .get_pattern::<patterns::UISelectionPattern>()
            .map_err(|e| Self::pattern_missing("SelectionPattern", e))?;
        Ok(pattern
            .get_selection()?
            .into_iter()
            .map(convert_uiautomation_element)
            .collect())
    }

    fn is_selected(&self) -> Result<bool, AutomationError> {
        match self
            .element
            .0
            .get_pattern::<patterns::UISelectionItemPattern>()
        {
            Ok(pattern) => Ok(pattern.is_selected().unwrap_or(false)),
            Err(_) => Ok(false),
        }
    }

    fn capture(&self) -> Result<ScreenshotResult, AutomationError> {
        let rect = self.element.0.get_bounding_rectangle().map_err(|e| {
            AutomationError::PlatformError(format!("Failed to get bounding rectangle: {e}"))
        })?;

        let monitors = xcap::Monitor::all()
            .map_err(|e| AutomationError::PlatformError(format!("Failed to get monitors: {e}")))?;

        for monitor in monitors {
            let (Ok(mx), Ok(my), Ok(mw), Ok(mh)) =
                (monitor.x(), monitor.y(), monitor.width(), monitor.height())
            else {
                continue;
            };
            let (mw, mh) = (mw as i32, mh as i32);
            let intersects = rect.get_left() < mx + mw
                && rect.get_left() + rect.get_width() > mx
                && rect.get_top() < my + mh
                && rect.get_top() + rect.get_height() > my;
            if !intersects {
                continue;
            }

            let scale = monitor.scale_factor().unwrap_or(1.0) as f64;
            let rel_x = ((rect.get_left() - mx).max(0) as f64 * scale) as u32;
            let rel_y = ((rect.get_top() - my).max(0) as f64 * scale) as u32;
            let max_w = (mw as u32).saturating_sub(rel_x);
            let max_h = (mh as u32).saturating_sub(rel_y);
            let width = ((rect.get_width() as f64 * scale) as u32).min(max_w);
            let height = ((rect.get_height() as f64 * scale) as u32).min(max_h);

            let capture = monitor
                .capture_region(rel_x, rel_y, width, height)
                .map_err(|e| {
                    AutomationError::PlatformError(format!("Failed to capture region: {e}"))
                })?;
            return Ok(ScreenshotResult {
                image_data: capture.to_vec(),
                width,
                height,
            });
        }

        Err(AutomationError::PlatformError(
            "Element is not visible on any monitor".to_string(),
        ))
    }

    fn clone_box(&self) -> Box<dyn UIElementImpl> {
        Box::new(WindowsUIElement {
            element: self.element.clone(),
        })
    }
}
