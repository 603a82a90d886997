//! Bookmark-driven UI automation for PACS viewer windows
//!
//! A [`Bookmark`] records how to walk from a top-level window down to one
//! control. Procedures are ordered lists of operations that read, click and
//! transform what those bookmarks point at; [`ProcedureExecutor`] runs them.

use std::sync::Arc;
use tracing::{debug, instrument};

pub mod bookmark;
pub mod capture;
pub mod config;
pub mod context;
pub mod element;
pub mod encoding;
pub mod errors;
pub mod executor;
pub mod ocr;
pub mod operations;
pub mod platforms;
pub mod procedure;
pub mod properties;
pub mod resolver;
#[cfg(test)]
mod tests;
pub mod utils;

pub use bookmark::{Bookmark, BookmarkStore, Node, ResolveMethod, SearchScope};
pub use capture::{CaptureResult, ElementCapture};
pub use config::AutomationConfig;
pub use context::{RunContext, VarValue};
pub use element::{AttributeFilter, Bounds, ElementAttributes, UIElement, UIElementImpl};
pub use errors::AutomationError;
pub use executor::{ProcedureExecutor, RunReport, StepReport};
pub use operations::{OperationRegistry, Services, StepOutcome};
pub use procedure::{ArgKind, ArgSlot, OpArg, Operation, ProcedureStore};
pub use resolver::{ElementResolver, Resolution, ResolveTrace};

#[cfg(target_os = "windows")]
pub use platforms::windows::convert_uiautomation_element;

/// Holds the screenshot data
#[derive(Debug, Clone)]
pub struct ScreenshotResult {
    /// Raw RGBA pixels, row-major
    pub image_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Installs a fmt subscriber honouring `RUST_LOG` (default `info`).
/// Later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .try_init();
}

/// The main entry point: platform services plus the two JSON stores.
pub struct PacsAutomation {
    config: AutomationConfig,
    services: Services,
    registry: OperationRegistry,
    bookmarks: BookmarkStore,
    procedures: ProcedureStore,
}

impl PacsAutomation {
    /// Connects to the platform accessibility API and loads both stores.
    ///
    /// ```no_run
    /// use pacs_automation::{AutomationConfig, PacsAutomation};
    /// let pacs = PacsAutomation::new(AutomationConfig::from_env())?;
    /// println!("{} bookmarks", pacs.bookmarks().len());
    /// # Ok::<(), pacs_automation::AutomationError>(())
    /// ```
    #[instrument(skip(config))]
    pub fn new(config: AutomationConfig) -> Result<Self, AutomationError> {
        let services = Services {
            engine: platforms::create_engine()?,
            input: platforms::create_input()?,
            ocr: default_recognizer(config.ocr_enabled),
            http: Arc::new(operations::fetch::HttpFetcher::new(&config.http)?),
            properties: Arc::new(properties::NoProperties),
        };
        Ok(Self::with_services(config, services))
    }

    /// Uses caller-supplied services, e.g. a host's property source or a
    /// test double for the accessibility tree.
    pub fn with_services(config: AutomationConfig, services: Services) -> Self {
        let bookmarks = BookmarkStore::load(&config.bookmarks_path());
        let procedures = ProcedureStore::load(&config.procedures_path());
        debug!(
            "loaded {} bookmarks and {} procedures",
            bookmarks.len(),
            procedures.len()
        );
        Self {
            config,
            services,
            registry: OperationRegistry::with_builtins(),
            bookmarks,
            procedures,
        }
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn set_properties(&mut self, properties: Arc<dyn properties::PropertySource>) {
        self.services.properties = properties;
    }

    /// Register custom operations here before creating an executor.
    pub fn registry_mut(&mut self) -> &mut OperationRegistry {
        &mut self.registry
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

    /// Re-reads both stores from disk, discarding unsaved edits.
    pub fn reload(&mut self) {
        self.bookmarks = BookmarkStore::load(&self.config.bookmarks_path());
        self.procedures = ProcedureStore::load(&self.config.procedures_path());
    }

    pub fn save(&self) -> Result<(), AutomationError> {
        self.bookmarks.save(&self.config.bookmarks_path())?;
        self.procedures.save(&self.config.procedures_path())
    }

    /// Captures the control at a screen point as a new bookmark chain.
    #[instrument(skip(self))]
    pub fn capture_at(&self, x: i32, y: i32) -> Option<CaptureResult> {
        ElementCapture::new(self.services.engine.clone()).capture_at(x, y)
    }

    /// Captures the control under the mouse cursor.
    pub fn capture_at_cursor(&self) -> Option<CaptureResult> {
        let (x, y) = self.services.input.cursor_position().ok()?;
        self.capture_at(x, y)
    }

    /// Resolves a stored bookmark by name; `None` if no such bookmark exists.
    #[instrument(skip(self))]
    pub fn resolve(&self, name: &str) -> Option<Resolution> {
        let bookmark = self.bookmarks.get(name)?;
        Some(ElementResolver::new(self.services.engine.clone()).resolve(bookmark))
    }

    /// An executor over snapshots of the current stores and registry.
    pub fn executor(&self) -> ProcedureExecutor {
        ProcedureExecutor::new(
            self.registry.clone(),
            self.services.clone(),
            self.bookmarks.clone(),
            self.procedures.clone(),
        )
    }
}

fn default_recognizer(enabled: bool) -> Arc<dyn ocr::TextRecognizer> {
    #[cfg(target_os = "windows")]
    {
        if enabled {
            return Arc::new(ocr::WindowsOcr);
        }
    }
    if !enabled {
        debug!("OCR disabled by configuration");
    }
    Arc::new(ocr::NoOcr)
}
