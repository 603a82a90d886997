use super::types::ThreadSafeWinUIAutomation;
use super::utils::{
    convert_uiautomation_element, create_ui_automation_with_com_init, get_process_name_by_pid,
};
use crate::platforms::{normalize_process_name, AccessibilityEngine};
use crate::{AutomationError, UIElement};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};
use uiautomation::types::{Point, TreeScope};

pub struct WindowsEngine {
    automation: ThreadSafeWinUIAutomation,
}

impl WindowsEngine {
    pub fn new() -> Result<Self, AutomationError> {
        let automation = create_ui_automation_with_com_init()?;
        #[allow(clippy::arc_with_non_send_sync)]
        let automation = ThreadSafeWinUIAutomation(Arc::new(automation));
        Ok(Self { automation })
    }
}

impl AccessibilityEngine for WindowsEngine {
    fn root(&self) -> Result<UIElement, AutomationError> {
        let root = self.automation.0.get_root_element()?;
        Ok(convert_uiautomation_element(root))
    }

    #[instrument(level = "debug", skip(self))]
    fn top_level_windows(&self, process_name: &str) -> Result<Vec<UIElement>, AutomationError> {
        let wanted = normalize_process_name(process_name);
        let root = self.automation.0.get_root_element()?;
        let condition = self.automation.0.create_true_condition()?;
        let windows = root
            .find_all(TreeScope::Children, &condition)
            .map_err(|e| AutomationError::ElementNotFound(e.to_string()))?;

        let mut names: HashMap<u32, Option<String>> = HashMap::new();
        let matching: Vec<UIElement> = windows
            .into_iter()
            .filter(|w| {
                let Ok(pid) = w.get_process_id() else {
                    return false;
                };
                let pid = pid as u32;
                names
                    .entry(pid)
                    .or_insert_with(|| {
                        get_process_name_by_pid(pid)
                            .ok()
                            .map(|n| normalize_process_name(&n))
                    })
                    .as_deref()
                    == Some(wanted.as_str())
            })
            .map(convert_uiautomation_element)
            .collect();

        debug!("{} top-level windows for '{}'", matching.len(), process_name);
        Ok(matching)
    }

    fn element_from_point(&self, x: i32, y: i32) -> Result<Option<UIElement>, AutomationError> {
        match self.automation.0.element_from_point(Point::new(x, y)) {
            Ok(el) => Ok(Some(convert_uiautomation_element(el))),
            Err(e) => {
                debug!("no element at ({}, {}): {}", x, y, e);
                Ok(None)
            }
        }
    }

    fn process_name(&self, pid: u32) -> Result<String, AutomationError> {
        get_process_name_by_pid(pid)
    }
}
