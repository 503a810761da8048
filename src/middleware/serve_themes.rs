use http::Method;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::repository::MiddlewareContext;
use super::{Flow, Middleware};
use crate::build_cache::{BuildCache, BuildError};
use crate::error::ServeError;
use crate::etag::{content_etag, is_fresh};
use crate::mime::mime_info;
use crate::resources::{Resource, ResourceReader};
use crate::server::{DevRequest, DevResponse};
use crate::theme::{ThemeBuildOptions, ThemeCompiler, CSS_VARIABLES_OUTPUTS, THEME_OUTPUTS, THEME_SOURCE};

/// Builds theme files on request.
///
/// Concurrent requests for the same file share one build through a
/// [`BuildCache`]. The first request for a CSS variables output switches
/// every later build into CSS variables mode.
pub struct ServeThemesMiddleware {
    all: Arc<dyn ResourceReader>,
    compiler: Arc<dyn ThemeCompiler>,
    builds: BuildCache<Vec<Resource>>,
    css_variables: AtomicBool,
}

impl ServeThemesMiddleware {
    pub fn new(all: Arc<dyn ResourceReader>, compiler: Arc<dyn ThemeCompiler>) -> Self {
        Self {
            all,
            compiler,
            builds: BuildCache::new(),
            css_variables: AtomicBool::new(false),
        }
    }

    pub fn css_variables_enabled(&self) -> bool {
        self.css_variables.load(Ordering::Acquire)
    }

    /// Switch to CSS variables mode; the compiler cache is cleared by the
    /// one caller that performs the switch, which gets `true`.
    fn enable_css_variables(&self) -> bool {
        let switched = self
            .css_variables
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if switched {
            info!("CSS variables requested, clearing theme compiler cache");
            self.compiler.clear_cache();
        }
        switched
    }

    fn build(&self, key: &str, source_path: &str) -> Result<Option<Vec<Resource>>, BuildError> {
        let source = self
            .all
            .by_path(source_path)
            .map_err(|e| BuildError::failed(key, e))?;
        let Some(source) = source else {
            debug!(source = %source_path, "No theme source");
            return Ok(None);
        };
        let options = ThemeBuildOptions {
            css_variables: self.css_variables_enabled(),
            compress: false,
        };
        self.compiler
            .build(&[source], &options)
            .map(Some)
            .map_err(|e| BuildError::failed(key, e))
    }
}

pub fn create(ctx: &MiddlewareContext, _options: &Value) -> Result<Arc<dyn Middleware>, String> {
    Ok(Arc::new(ServeThemesMiddleware::new(
        Arc::clone(&ctx.resources.all),
        Arc::clone(&ctx.theme_compiler),
    )))
}

impl Middleware for ServeThemesMiddleware {
    fn handle(&self, req: &DevRequest, res: &mut DevResponse) -> Result<Flow, ServeError> {
        if req.method != Method::GET && req.method != Method::HEAD {
            return Ok(Flow::Next);
        }
        let Some((dir, name)) = req.path.rsplit_once('/') else {
            return Ok(Flow::Next);
        };
        if !THEME_OUTPUTS.contains(&name) {
            return Ok(Flow::Next);
        }
        if CSS_VARIABLES_OUTPUTS.contains(&name) && self.enable_css_variables() {
            // A build of this path started before the switch has no variables output
            if self.builds.invalidate(&req.path) {
                debug!(path = %req.path, "Detached build started before CSS variables mode");
            }
        }

        let source_path = format!("{dir}/{THEME_SOURCE}");
        let outputs = self
            .builds
            .get_or_build(&req.path, || self.build(&req.path, &source_path))?;
        let Some(outputs) = outputs else {
            return Ok(Flow::Next);
        };
        let output = outputs
            .iter()
            .find(|r| r.name() == name)
            .ok_or_else(|| ServeError::MissingBuildOutput {
                requested: req.path.clone(),
            })?;

        let etag = content_etag(output.content());
        res.set_header("Content-Type", mime_info(name).content_type());
        res.set_header("ETag", etag.clone());
        if is_fresh(req.header("if-none-match"), req.header("cache-control"), &etag) {
            res.set_status(304);
            res.set_body(Vec::new());
        } else {
            res.set_status(200);
            res.set_body(output.content().to_vec());
        }
        Ok(Flow::Done)
    }
}
