//! Read-only access to the reporting application's current study.

use super::string_ops::{parse_datetime, DISPLAY_FORMAT};
use super::{OperationRegistry, Signature, StepContext, StepOutcome};
use crate::properties::{
    CURRENT_CONCLUSION, CURRENT_FINDINGS, CURRENT_HEADER, CURRENT_PATIENT_NUMBER,
    CURRENT_STUDY_DATETIME,
};

pub(super) fn register(registry: &mut OperationRegistry) {
    registry.register_sync("GetCurrentPatientNumber", Signature::NONE, |s| {
        property(s, CURRENT_PATIENT_NUMBER)
    });
    registry.register_sync("GetCurrentStudyDateTime", Signature::NONE, study_datetime);
    registry.register_sync("GetCurrentHeader", Signature::NONE, |s| {
        property(s, CURRENT_HEADER)
    });
    registry.register_sync("GetCurrentFindings", Signature::NONE, |s| {
        property(s, CURRENT_FINDINGS)
    });
    registry.register_sync("GetCurrentConclusion", Signature::NONE, |s| {
        property(s, CURRENT_CONCLUSION)
    });
}

fn outcome(value: String) -> StepOutcome {
    if value.trim().is_empty() {
        StepOutcome::text("(empty)", value)
    } else {
        StepOutcome::same(value)
    }
}

fn property(step: &mut StepContext<'_>, name: &str) -> StepOutcome {
    outcome(step.services.properties.property(name).unwrap_or_default())
}

/// Re-formatted when parseable, passed through otherwise.
fn study_datetime(step: &mut StepContext<'_>) -> StepOutcome {
    let raw = step
        .services
        .properties
        .property(CURRENT_STUDY_DATETIME)
        .unwrap_or_default();
    let value = match parse_datetime(&raw) {
        Some(dt) if !raw.trim().is_empty() => dt.format(DISPLAY_FORMAT).to_string(),
        _ => raw,
    };
    outcome(value)
}
