use chrono::Utc;
use http::Method;
use serde_json::Value;
use std::sync::Arc;

use super::repository::MiddlewareContext;
use super::{Flow, Middleware};
use crate::error::ServeError;
use crate::resources::{GlobOptions, ProjectInfo, ResourceReader};
use crate::server::{DevRequest, DevResponse};
use crate::versioninfo::{generate, LibraryInput};

/// Serves the generated `sap-ui-version.json`.
pub struct VersionInfoMiddleware {
    root: Arc<ProjectInfo>,
    dependencies: Arc<dyn ResourceReader>,
}

pub fn create(ctx: &MiddlewareContext, _options: &Value) -> Result<Arc<dyn Middleware>, String> {
    Ok(Arc::new(VersionInfoMiddleware {
        root: Arc::clone(ctx.graph.root()),
        dependencies: Arc::clone(&ctx.resources.dependencies),
    }))
}

fn resource_error(path: &str) -> impl FnOnce(std::io::Error) -> ServeError {
    let path = path.to_string();
    move |source| ServeError::Resource { path, source }
}

impl VersionInfoMiddleware {
    fn libraries(&self) -> Result<Vec<LibraryInput>, ServeError> {
        let descriptors = self
            .dependencies
            .by_glob("/resources/**/.library", GlobOptions::default())
            .map_err(resource_error("/resources/**/.library"))?;
        let mut libraries = Vec::with_capacity(descriptors.len());
        for library in descriptors {
            let dir = library.path().trim_end_matches(".library");
            let manifest_path = format!("{dir}manifest.json");
            let manifest = self
                .dependencies
                .by_path(&manifest_path)
                .map_err(resource_error(&manifest_path))?;
            libraries.push(LibraryInput { library, manifest });
        }
        Ok(libraries)
    }
}

impl Middleware for VersionInfoMiddleware {
    fn handle(&self, req: &DevRequest, res: &mut DevResponse) -> Result<Flow, ServeError> {
        if req.method != Method::GET && req.method != Method::HEAD {
            return Ok(Flow::Next);
        }
        if req.path != "/" {
            return Ok(Flow::Next);
        }
        let libraries = self.libraries()?;
        let info = generate(&self.root.name, &self.root.version, &libraries, Utc::now())
            .map_err(ServeError::Render)?;
        let body = serde_json::to_value(&info).map_err(|e| ServeError::Render(e.to_string()))?;
        res.send_pretty_json(200, &body);
        Ok(Flow::Done)
    }
}
