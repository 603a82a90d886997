//! Windows platform implementation
//!
//! Element access goes through the Windows UI Automation API (uiautomation
//! crate); mouse, keyboard and process lookups use Win32 directly.

pub mod element;
pub mod engine;
pub mod input;
pub mod types;
pub mod utils;

pub use element::WindowsUIElement;
pub use engine::WindowsEngine;
pub use input::WindowsInput;
pub use utils::{convert_uiautomation_element, generate_element_id, get_process_name_by_pid};
