//! Utility functions and type conversions for Windows platform

use super::types::{HandleGuard, ThreadSafeWinUIElement};
use crate::element::{AttributeFilter, Bounds, ElementAttributes};
use crate::{AutomationError, UIElement};
use std::sync::Arc;
use uiautomation::types::UIProperty;
use uiautomation::variants::Variant;
use uiautomation::core::UICondition;
use uiautomation::UIAutomation;
use windows::core::HRESULT;
use windows::Win32::System::Com::{CoInitializeEx, COINIT_MULTITHREADED};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W, TH32CS_SNAPPROCESS,
};

pub use super::element::WindowsUIElement;

/// Stable per-session id derived from the UI Automation runtime id, or from
/// the element's identifying properties when the provider has none.
pub fn generate_element_id(element: &uiautomation::UIElement) -> usize {
    let key = match element.get_runtime_id() {
        Ok(parts) if !parts.is_empty() => parts
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join("."),
        _ => property_key(element),
    };
    let hash = blake3::hash(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(bytes) as usize
}

fn property_key(element: &uiautomation::UIElement) -> String {
    let attributes = ElementAttributes::new(
        element.get_name().ok(),
        element.get_classname().ok(),
        element.get_control_type().ok().map(|ct| ct as i32),
        element.get_automation_id().ok(),
    );
    let bounds = element
        .get_bounding_rectangle()
        .map(|r| {
            Bounds::new(
                r.get_left() as f64,
                r.get_top() as f64,
                r.get_width() as f64,
                r.get_height() as f64,
            )
        })
        .unwrap_or_default();
    attribute_key(&attributes, element.get_process_id().ok().map(|p| p as u32), &bounds)
}

/// Identity key for elements whose provider exposes no runtime id.
pub(crate) fn attribute_key(
    attributes: &ElementAttributes,
    pid: Option<u32>,
    bounds: &Bounds,
) -> String {
    format!(
        "{}|{}|{}|{}|{}|{},{},{},{}",
        attributes.control_type_id.unwrap_or_default(),
        attributes.name.as_deref().unwrap_or_default(),
        attributes.automation_id.as_deref().unwrap_or_default(),
        attributes.class_name.as_deref().unwrap_or_default(),
        pid.unwrap_or_default(),
        bounds.x,
        bounds.y,
        bounds.width,
        bounds.height
    )
}

/// Converts a raw uiautomation::UIElement to a UIElement
pub fn convert_uiautomation_element(element: uiautomation::UIElement) -> UIElement {
    #[allow(clippy::arc_with_non_send_sync)]
    let arc_ele = ThreadSafeWinUIElement(Arc::new(element));
    UIElement::new(Box::new(WindowsUIElement { element: arc_ele }))
}

/// Helper function to create UIAutomation instance with proper COM initialization
pub(crate) fn create_ui_automation_with_com_init() -> Result<UIAutomation, AutomationError> {
    unsafe {
        let hr = CoInitializeEx(None, COINIT_MULTITHREADED);
        if hr.is_err() && hr != HRESULT(0x80010106u32 as i32) {
            // Only return error if it's not the "already initialized" case
            return Err(AutomationError::PlatformError(format!(
                "Failed to initialize COM: {hr}"
            )));
        }
    }

    UIAutomation::new_direct().map_err(|e| AutomationError::PlatformError(e.to_string()))
}

/// Builds a native AND condition from the attribute constraints.
pub(crate) fn filter_to_condition(
    automation: &UIAutomation,
    filter: &AttributeFilter,
) -> Result<UICondition, AutomationError> {
    let mut conditions = Vec::new();
    if let Some(ref name) = filter.name {
        conditions.push(automation.create_property_condition(
            UIProperty::Name,
            Variant::from(name.as_str()),
            None,
        )?);
    }
    if let Some(ref class_name) = filter.class_name {
        conditions.push(automation.create_property_condition(
            UIProperty::ClassName,
            Variant::from(class_name.as_str()),
            None,
        )?);
    }
    if let Some(ct) = filter.control_type_id {
        conditions.push(automation.create_property_condition(
            UIProperty::ControlType,
            Variant::from(ct),
            None,
        )?);
    }
    if let Some(ref automation_id) = filter.automation_id {
        conditions.push(automation.create_property_condition(
            UIProperty::AutomationId,
            Variant::from(automation_id.as_str()),
            None,
        )?);
    }

    let mut iter = conditions.into_iter();
    let Some(first) = iter.next() else {
        return Ok(automation.create_true_condition()?);
    };
    iter.try_fold(first, |acc, next| {
        automation
            .create_and_condition(acc, next)
            .map_err(AutomationError::from)
    })
}

// Helper function to get process name by PID using native Windows API
pub fn get_process_name_by_pid(pid: u32) -> Result<String, AutomationError> {
    unsafe {
        let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0).map_err(|e| {
            AutomationError::PlatformError(format!("Failed to create process snapshot: {e}"))
        })?;

        if snapshot.is_invalid() {
            return Err(AutomationError::PlatformError(
                "Invalid snapshot handle".to_string(),
            ));
        }

        let _guard = HandleGuard(snapshot);

        let mut process_entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        if Process32FirstW(snapshot, &mut process_entry).is_err() {
            return Err(AutomationError::PlatformError(
                "Failed to get first process".to_string(),
            ));
        }

        loop {
            if process_entry.th32ProcessID == pid {
                let name_slice = &process_entry.szExeFile;
                let name_len = name_slice
                    .iter()
                    .position(|&c| c == 0)
                    .unwrap_or(name_slice.len());
                let process_name = String::from_utf16_lossy(&name_slice[..name_len]);

                let clean_name = process_name
                    .strip_suffix(".exe")
                    .or_else(|| process_name.strip_suffix(".EXE"))
                    .unwrap_or(&process_name);

                return Ok(clean_name.to_string());
            }

            if Process32NextW(snapshot, &mut process_entry).is_err() {
                break;
            }
        }

        Err(AutomationError::ElementNotFound(format!(
            "no running process with id {pid}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::attribute_key;
    use crate::element::{Bounds, ElementAttributes};

    fn button(name: &str) -> ElementAttributes {
        ElementAttributes::new(
            Some(name.to_string()),
            Some("Button".to_string()),
            Some(50000),
            None,
        )
    }

    #[test]
    fn attribute_key_is_stable_and_tells_controls_apart() {
        let bounds = Bounds::new(10.0, 20.0, 80.0, 24.0);
        let open = attribute_key(&button("Open"), Some(42), &bounds);

        assert_eq!(open, attribute_key(&button("Open"), Some(42), &bounds));
        assert_ne!(open, attribute_key(&button("Close"), Some(42), &bounds));
        assert_ne!(open, attribute_key(&button("Open"), Some(7), &bounds));
        assert_ne!(
            open,
            attribute_key(&button("Open"), Some(42), &Bounds::new(90.0, 20.0, 80.0, 24.0))
        );
    }
}
