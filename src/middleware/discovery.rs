use http::Method;
use serde_json::{json, Value};
use std::sync::Arc;

use super::repository::MiddlewareContext;
use super::{Flow, Middleware};
use crate::error::ServeError;
use crate::resources::{GlobOptions, MiddlewareResources, Resource, ResourceReader};
use crate::server::{DevRequest, DevResponse};

/// JSON listings of apps, libraries and test suites.
///
/// Mounted at `/discovery`, answering `/app_index`, `/all_libs` and
/// `/all_tests`.
pub struct DiscoveryMiddleware {
    resources: MiddlewareResources,
}

pub fn create(ctx: &MiddlewareContext, _options: &Value) -> Result<Arc<dyn Middleware>, String> {
    Ok(Arc::new(DiscoveryMiddleware {
        resources: ctx.resources.clone(),
    }))
}

fn glob(
    reader: &Arc<dyn ResourceReader>,
    pattern: &str,
) -> Result<Vec<Resource>, ServeError> {
    reader
        .by_glob(pattern, GlobOptions::default())
        .map_err(|source| ServeError::Resource {
            path: pattern.to_string(),
            source,
        })
}

fn relative(path: &str) -> &str {
    path.trim_start_matches('/')
}

impl DiscoveryMiddleware {
    fn app_index(&self) -> Result<Value, ServeError> {
        let entries: Vec<Value> = glob(&self.resources.root_project, "/**/*.html")?
            .iter()
            .map(|r| json!({ "entry": relative(r.path()) }))
            .collect();
        Ok(json!({ "app_index": entries }))
    }

    fn all_libs(&self) -> Result<Value, ServeError> {
        let entries: Vec<Value> = glob(&self.resources.dependencies, "/resources/**/.library")?
            .iter()
            .filter_map(|r| {
                let dir = r.path().strip_prefix("/resources/")?.strip_suffix("/.library")?;
                Some(json!({ "entry": dir }))
            })
            .collect();
        Ok(json!({ "all_libs": entries }))
    }

    fn all_tests(&self) -> Result<Value, ServeError> {
        let entries: Vec<Value> = glob(
            &self.resources.all,
            "/test-resources/**/testsuite*.{html,js}",
        )?
        .iter()
        .filter_map(|r| {
            let rel = r.path().strip_prefix("/test-resources/")?;
            let (dir, name) = rel.rsplit_once('/')?;
            let lib = dir.strip_suffix("/qunit").unwrap_or(dir).replace('/', ".");
            Some(json!({
                "lib": lib,
                "name": name,
                "url": format!("../{}", relative(r.path())),
            }))
        })
        .collect();
        Ok(json!({ "all_tests": entries }))
    }
}

impl Middleware for DiscoveryMiddleware {
    fn handle(&self, req: &DevRequest, res: &mut DevResponse) -> Result<Flow, ServeError> {
        if req.method != Method::GET && req.method != Method::HEAD {
            return Ok(Flow::Next);
        }
        let body = match req.path.as_str() {
            "/app_index" => self.app_index()?,
            "/all_libs" => self.all_libs()?,
            "/all_tests" => self.all_tests()?,
            _ => return Ok(Flow::Next),
        };
        res.send_json(200, &body);
        Ok(Flow::Done)
    }
}
