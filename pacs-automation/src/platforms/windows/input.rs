//! Mouse, keyboard and clipboard primitives

use crate::platforms::{InputDriver, KeyChord};
use crate::AutomationError;
use tracing::debug;
use uiautomation::inputs::Mouse;
use uiautomation::types::Point;
use windows::Win32::Foundation::POINT;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS, KEYEVENTF_KEYUP,
    VIRTUAL_KEY, VK_CONTROL, VK_DELETE, VK_TAB,
};
use windows::Win32::UI::WindowsAndMessaging::{GetCursorPos, SetCursorPos};

const VK_A: VIRTUAL_KEY = VIRTUAL_KEY(0x41);
const VK_V: VIRTUAL_KEY = VIRTUAL_KEY(0x56);

#[derive(Debug, Default)]
pub struct WindowsInput;

impl WindowsInput {
    pub fn new() -> Self {
        Self
    }

    fn key_input(vk: VIRTUAL_KEY, up: bool) -> INPUT {
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: vk,
                    wScan: 0,
                    dwFlags: if up { KEYEVENTF_KEYUP } else { KEYBD_EVENT_FLAGS(0) },
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }

    /// Presses `keys` in order and releases them in reverse.
    fn send_chord(keys: &[VIRTUAL_KEY]) -> Result<(), AutomationError> {
        let mut inputs: Vec<INPUT> = keys.iter().map(|k| Self::key_input(*k, false)).collect();
        inputs.extend(keys.iter().rev().map(|k| Self::key_input(*k, true)));
        let sent = unsafe { SendInput(&inputs, std::mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            return Err(AutomationError::PlatformError(format!(
                "SendInput injected {sent} of {} events",
                inputs.len()
            )));
        }
        Ok(())
    }
}

impl InputDriver for WindowsInput {
    fn cursor_position(&self) -> Result<(i32, i32), AutomationError> {
        let mut point = POINT::default();
        unsafe { GetCursorPos(&mut point) }
            .map_err(|e| AutomationError::PlatformError(format!("GetCursorPos failed: {e}")))?;
        Ok((point.x, point.y))
    }

    fn move_cursor(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        unsafe { SetCursorPos(x, y) }
            .map_err(|e| AutomationError::PlatformError(format!("SetCursorPos failed: {e}")))
    }

    fn click(&self, x: i32, y: i32) -> Result<(), AutomationError> {
        debug!("clicking at ({}, {})", x, y);
        Mouse::default()
            .click(Point::new(x, y))
            .map_err(|e| AutomationError::PlatformError(e.to_string()))
    }

    fn send_key(&self, key: KeyChord) -> Result<(), AutomationError> {
        match key {
            KeyChord::Tab => Self::send_chord(&[VK_TAB]),
            KeyChord::Paste => Self::send_chord(&[VK_CONTROL, VK_V]),
            KeyChord::SelectAll => Self::send_chord(&[VK_CONTROL, VK_A]),
            KeyChord::Delete => Self::send_chord(&[VK_DELETE]),
        }
    }

    fn set_clipboard_text(&self, text: &str) -> Result<(), AutomationError> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| AutomationError::PlatformError(format!("clipboard unavailable: {e}")))?;
        clipboard
            .set_text(text.to_owned())
            .map_err(|e| AutomationError::PlatformError(format!("clipboard write failed: {e}")))
    }
}
