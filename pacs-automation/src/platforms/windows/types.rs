//! Type definitions and RAII wrappers for Windows platform

use crate::AutomationError;
use std::sync::Arc;
use uiautomation::UIAutomation;
use windows::Win32::Foundation::{CloseHandle, HANDLE};

/// RAII wrapper for Windows HANDLE that ensures proper cleanup
pub(crate) struct HandleGuard(pub(crate) HANDLE);

impl Drop for HandleGuard {
    fn drop(&mut self) {
        unsafe {
            if !self.0.is_invalid() {
                let _ = CloseHandle(self.0);
            }
        }
    }
}

/// Thread-safe wrapper for the UIAutomation COM client
#[derive(Clone)]
pub(crate) struct ThreadSafeWinUIAutomation(pub(crate) Arc<UIAutomation>);

// Safety: the client is created in the multithreaded apartment
unsafe impl Send for ThreadSafeWinUIAutomation {}
unsafe impl Sync for ThreadSafeWinUIAutomation {}

/// Thread-safe wrapper for UIElement
#[derive(Clone)]
pub(crate) struct ThreadSafeWinUIElement(pub(crate) Arc<uiautomation::UIElement>);

// Safety: UIElement is thread-safe when wrapped properly
unsafe impl Send for ThreadSafeWinUIElement {}
unsafe impl Sync for ThreadSafeWinUIElement {}

impl From<uiautomation::Error> for AutomationError {
    fn from(error: uiautomation::Error) -> Self {
        AutomationError::PlatformError(format!("UIAutomation error: {error}"))
    }
}
