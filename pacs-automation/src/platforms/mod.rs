use crate::{AutomationError, UIElement};
use std::sync::Arc;

#[cfg(target_os = "windows")]
pub mod windows;

/// The common trait that all platform-specific accessibility engines implement
pub trait AccessibilityEngine: Send + Sync {
    /// The desktop root element
    fn root(&self) -> Result<UIElement, AutomationError>;

    /// Top-level windows owned by processes named `process_name`.
    /// Matching is case-insensitive and ignores an `.exe` suffix.
    fn top_level_windows(&self, process_name: &str) -> Result<Vec<UIElement>, AutomationError>;

    /// The deepest element under a screen point, if any
    fn element_from_point(&self, x: i32, y: i32) -> Result<Option<UIElement>, AutomationError>;

    /// Executable name (without extension) of a running process
    fn process_name(&self, pid: u32) -> Result<String, AutomationError>;
}

/// Lower-cased process name without a trailing `.exe`.
pub(crate) fn normalize_process_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    lower.strip_suffix(".exe").unwrap_or(&lower).to_string()
}

/// Keys the procedure runner can send to the focused window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyChord {
    Tab,
    Paste,
    SelectAll,
    Delete,
}

impl KeyChord {
    pub fn label(&self) -> &'static str {
        match self {
            KeyChord::Tab => "Tab key",
            KeyChord::Paste => "Ctrl+V",
            KeyChord::SelectAll => "Ctrl+A",
            KeyChord::Delete => "Delete key",
        }
    }
}

/// Native mouse, keyboard and clipboard primitives.
pub trait InputDriver: Send + Sync {
    fn cursor_position(&self) -> Result<(i32, i32), AutomationError>;
    fn move_cursor(&self, x: i32, y: i32) -> Result<(), AutomationError>;
    fn click(&self, x: i32, y: i32) -> Result<(), AutomationError>;
    fn send_key(&self, key: KeyChord) -> Result<(), AutomationError>;
    fn set_clipboard_text(&self, text: &str) -> Result<(), AutomationError>;

    /// Clicks at a point and puts the cursor back where it was.
    fn click_and_restore(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        let previous = self.cursor_position()?;
        self.click(x, y)?;
        self.move_cursor(previous.0, previous.1)
    }
}

pub fn create_engine() -> Result<Arc<dyn AccessibilityEngine>, AutomationError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(windows::WindowsEngine::new()?))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(AutomationError::UnsupportedPlatform(
            "UI Automation is only available on Windows".to_string(),
        ))
    }
}

pub fn create_input() -> Result<Arc<dyn InputDriver>, AutomationError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(windows::WindowsInput::new()))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(AutomationError::UnsupportedPlatform(
            "native input is only available on Windows".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_process_name;

    #[test]
    fn process_names_compare_without_case_or_extension() {
        assert_eq!(normalize_process_name("NOTEPAD.EXE"), "notepad");
        assert_eq!(normalize_process_name(" Viewer.exe "), "viewer");
        assert_eq!(normalize_process_name("viewer"), "viewer");
        assert_eq!(normalize_process_name("exe"), "exe");
    }
}
