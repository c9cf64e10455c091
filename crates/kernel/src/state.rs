//! Application state shared across all handlers.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::form::{FieldTokenGuard, FormBuilder};
use crate::theme::{TemplateRenderer, form_templates};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,

    /// Built-in form templates merged with any configured overrides.
    /// Each request gets its own renderer seeded from this map.
    templates: HashMap<String, String>,
}

impl AppState {
    /// Create application state, loading template overrides if configured.
    pub fn new(config: Config) -> Result<Self> {
        let mut renderer = TemplateRenderer::new(form_templates());
        if let Some(path) = &config.templates_file {
            let count = renderer
                .load_file(path)
                .with_context(|| format!("failed to load templates from {}", path.display()))?;
            info!(count, path = %path.display(), "template overrides loaded");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                templates: renderer.get_templates().clone(),
                config,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// A form builder for one request.
    pub fn form_builder(&self) -> FormBuilder {
        FormBuilder::new(
            TemplateRenderer::new(self.inner.templates.clone()),
            self.inner.config.guard_config(),
        )
    }

    /// A guard for verifying one submission.
    pub fn guard(&self) -> FieldTokenGuard {
        FieldTokenGuard::new(self.inner.config.guard_config())
    }
}
