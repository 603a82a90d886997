//! Live values exposed by the host reporting application. `Var` arguments
//! naming one of these read the host's current state instead of a run
//! variable.

use std::collections::HashMap;
use std::sync::RwLock;

pub const CURRENT_PATIENT_NUMBER: &str = "Current Patient Number";
pub const CURRENT_STUDY_DATETIME: &str = "Current Study Datetime";
pub const CURRENT_HEADER: &str = "Current Header";
pub const CURRENT_FINDINGS: &str = "Current Findings";
pub const CURRENT_CONCLUSION: &str = "Current Conclusion";

pub const BUILT_IN_PROPERTIES: &[&str] = &[
    "Current Patient Name",
    CURRENT_PATIENT_NUMBER,
    "Current Patient Age",
    "Current Patient Sex",
    "Current Study Studyname",
    CURRENT_STUDY_DATETIME,
    "Current Study Remark",
    "Current Patient Remark",
    "Previous Study Studyname",
    "Previous Study Datetime",
    "Previous Study Report Datetime",
    "Previous Study Report Reporter",
    "Previous Study Report Header and Findings",
    "Previous Study Report Conclusion",
    "Temp Header",
    "Study Locked",
    "Study Opened",
    "Current Reportified",
    "Current Proofread",
    "Previous Proofread",
    "Previous Splitted",
    CURRENT_HEADER,
    CURRENT_FINDINGS,
    CURRENT_CONCLUSION,
];

pub fn is_built_in(name: &str) -> bool {
    BUILT_IN_PROPERTIES
        .iter()
        .any(|p| p.eq_ignore_ascii_case(name.trim()))
}

/// Read access to the host application's state.
pub trait PropertySource: Send + Sync {
    /// Current value of a built-in property; `None` when unset.
    fn property(&self, name: &str) -> Option<String>;
}

/// Host with no live state.
#[derive(Debug, Default)]
pub struct NoProperties;

impl PropertySource for NoProperties {
    fn property(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Property values pushed in by the host, keyed case-insensitively.
#[derive(Debug, Default)]
pub struct PropertyMap {
    values: RwLock<HashMap<String, String>>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: &str, value: impl Into<String>) {
        if let Ok(mut values) = self.values.write() {
            values.insert(name.trim().to_lowercase(), value.into());
        }
    }

    pub fn clear(&self, name: &str) {
        if let Ok(mut values) = self.values.write() {
            values.remove(&name.trim().to_lowercase());
        }
    }
}

impl PropertySource for PropertyMap {
    fn property(&self, name: &str) -> Option<String> {
        self.values
            .read()
            .ok()?
            .get(&name.trim().to_lowercase())
            .cloned()
    }
}
