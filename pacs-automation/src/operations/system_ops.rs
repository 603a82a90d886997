use super::{OperationHandler, OperationRegistry, Signature, SlotSpec, StepContext, StepOutcome};
use crate::platforms::KeyChord;
use crate::procedure::ArgKind;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub(super) fn register(registry: &mut OperationRegistry) {
    let number = SlotSpec::on(ArgKind::Number);
    registry.register_sync(
        "MouseClick",
        Signature::two(number.with_default("0"), number.with_default("0")),
        mouse_click,
    );
    registry.register_sync(
        "SetClipboard",
        Signature::one(SlotSpec::on(ArgKind::String)),
        set_clipboard,
    );
    registry.register_sync("SimulateTab", Signature::NONE, |s| send_key(s, KeyChord::Tab));
    registry.register_sync("SimulatePaste", Signature::NONE, |s| {
        send_key(s, KeyChord::Paste)
    });
    registry.register_sync("SimulateSelectAll", Signature::NONE, |s| {
        send_key(s, KeyChord::SelectAll)
    });
    registry.register_sync("SimulateDelete", Signature::NONE, |s| {
        send_key(s, KeyChord::Delete)
    });
    registry.register(
        "Delay",
        Signature::one(number.with_default("100")),
        Arc::new(Delay),
    );
}

fn parse_int(raw: Option<String>) -> Option<i32> {
    raw?.trim().parse().ok()
}

fn mouse_click(step: &mut StepContext<'_>) -> StepOutcome {
    let (Some(x), Some(y)) = (parse_int(step.arg1()), parse_int(step.arg2())) else {
        return StepOutcome::status("(invalid coords)");
    };
    match step.services.input.click(x, y) {
        Ok(()) => StepOutcome::status(format!("(clicked {x},{y})")),
        Err(e) => {
            debug!("MouseClick failed: {}", e);
            StepOutcome::status("(error)")
        }
    }
}

fn set_clipboard(step: &mut StepContext<'_>) -> StepOutcome {
    let Some(text) = step.arg1() else {
        return StepOutcome::status("(null)");
    };
    match step.services.input.set_clipboard_text(&text) {
        Ok(()) => StepOutcome::status(format!("(clipboard set, {} chars)", text.chars().count())),
        Err(e) => StepOutcome::status(format!("(error: {e})")),
    }
}

fn send_key(step: &mut StepContext<'_>, key: KeyChord) -> StepOutcome {
    match step.services.input.send_key(key) {
        Ok(()) => StepOutcome::status(format!("({} sent)", key.label())),
        Err(e) => StepOutcome::status(format!("(error: {e})")),
    }
}

/// Pauses the run without blocking the thread.
#[derive(Debug, Default)]
pub struct Delay;

#[async_trait::async_trait]
impl OperationHandler for Delay {
    async fn execute(&self, step: &mut StepContext<'_>) -> StepOutcome {
        let Some(ms) = step.arg1().and_then(|s| s.trim().parse::<u64>().ok()) else {
            return StepOutcome::status("(invalid delay)");
        };
        tokio::time::sleep(Duration::from_millis(ms)).await;
        StepOutcome::status(format!("(delayed {ms} ms)"))
    }
}
