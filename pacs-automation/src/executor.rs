//! Procedure interpreter: runs operations in order against one run context.

use crate::bookmark::BookmarkStore;
use crate::context::{RunContext, VarValue};
use crate::operations::{OperationRegistry, Services, StepContext, StepOutcome};
use crate::procedure::{Operation, ProcedureStore};
use crate::resolver::ElementResolver;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};

/// What one step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// 1-based, matching the implicit `var{index}` name.
    pub index: usize,
    pub op: String,
    pub var_name: String,
    pub preview: String,
    pub value: VarValue,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
    /// Text stored by the last step; empty when it stored nothing.
    pub result: String,
}

pub struct ProcedureExecutor {
    registry: OperationRegistry,
    services: Services,
    resolver: ElementResolver,
    bookmarks: BookmarkStore,
    procedures: ProcedureStore,
    context: RunContext,
}

impl ProcedureExecutor {
    pub fn new(
        registry: OperationRegistry,
        services: Services,
        bookmarks: BookmarkStore,
        procedures: ProcedureStore,
    ) -> Self {
        let resolver = ElementResolver::new(services.engine.clone());
        Self {
            registry,
            services,
            resolver,
            bookmarks,
            procedures,
            context: RunContext::new(),
        }
    }

    /// Variables and cached elements left by the most recent run.
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn bookmarks(&self) -> &BookmarkStore {
        &self.bookmarks
    }

    pub fn bookmarks_mut(&mut self) -> &mut BookmarkStore {
        &mut self.bookmarks
    }

    pub fn procedures(&self) -> &ProcedureStore {
        &self.procedures
    }

    pub fn procedures_mut(&mut self) -> &mut ProcedureStore {
        &mut self.procedures
    }

    /// Runs `steps` from a fresh context. A failing or panicking step is
    /// reported and the run moves on to the next one.
    #[instrument(level = "info", skip_all, fields(steps = steps.len()))]
    pub async fn run(&mut self, steps: &[Operation]) -> RunReport {
        self.context.reset();
        let mut reports = Vec::with_capacity(steps.len());

        for (i, operation) in steps.iter().enumerate() {
            let started = Instant::now();
            let outcome = self.execute_step(operation).await;
            let elapsed = started.elapsed();

            let var_name = format!("var{}", i + 1);
            self.context.set_var(&var_name, outcome.value.clone());
            if let Some(alias) = operation.alias() {
                self.context.set_var(alias, outcome.value.clone());
            }
            debug!(
                step = i + 1,
                op = %operation.op,
                preview = %outcome.preview,
                elapsed_ms = elapsed.as_millis() as u64,
                "step finished"
            );

            reports.push(StepReport {
                index: i + 1,
                op: operation.op.clone(),
                var_name,
                preview: outcome.preview,
                value: outcome.value,
                elapsed,
            });
        }

        let result = reports
            .last()
            .and_then(|r| r.value.as_text())
            .unwrap_or_default()
            .to_string();
        info!("procedure finished after {} steps", reports.len());
        RunReport {
            steps: reports,
            result,
        }
    }

    async fn execute_step(&mut self, operation: &Operation) -> StepOutcome {
        let Some(registration) = self.registry.get(&operation.op) else {
            debug!("no handler for '{}'", operation.op);
            return StepOutcome::status("(unsupported)");
        };
        let handler = registration.handler.clone();
        let mut step = StepContext {
            operation,
            services: &self.services,
            resolver: &self.resolver,
            bookmarks: &self.bookmarks,
            run: &mut self.context,
        };
        match AssertUnwindSafe(handler.execute(&mut step))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                error!("operation '{}' panicked: {}", operation.op, panic_message(&*panic));
                StepOutcome::status("(error)")
            }
        }
    }

    /// Runs a stored procedure by name. Unknown or empty procedures give `None`.
    pub async fn run_named(&mut self, name: &str) -> Option<RunReport> {
        let steps = match self.procedures.get(name) {
            Some(steps) if !steps.is_empty() => steps.to_vec(),
            _ => {
                debug!("procedure '{}' not found or empty", name);
                return None;
            }
        };
        Some(self.run(&steps).await)
    }

    /// Like [`run`](Self::run), also writing each preview back into the
    /// step's `output_preview`.
    pub async fn run_and_annotate(&mut self, steps: &mut [Operation]) -> RunReport {
        let report = self.run(steps).await;
        for (op, step) in steps.iter_mut().zip(&report.steps) {
            op.output_preview = Some(step.preview.clone());
        }
        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
