use http::Method;
use serde_json::Value;
use std::sync::Arc;

use super::repository::MiddlewareContext;
use super::{Flow, Middleware};
use crate::error::ServeError;
use crate::server::{DevRequest, DevResponse};

/// Rejects requests that do not read, before the index listing runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonReadRequestsMiddleware;

pub fn create(_ctx: &MiddlewareContext, _options: &Value) -> Result<Arc<dyn Middleware>, String> {
    Ok(Arc::new(NonReadRequestsMiddleware))
}

/// Body of the fallthrough `404`.
pub fn cannot(method: &Method, path: &str) -> String {
    format!("Cannot {method} {path}")
}

impl Middleware for NonReadRequestsMiddleware {
    fn handle(&self, req: &DevRequest, res: &mut DevResponse) -> Result<Flow, ServeError> {
        if matches!(req.method, Method::GET | Method::HEAD | Method::OPTIONS) {
            return Ok(Flow::Next);
        }
        res.send_text(404, &cannot(&req.method, &req.original_path));
        Ok(Flow::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_writes() {
        let mut res = DevResponse::new();
        let req = DevRequest::new(Method::PUT, "/index.html");
        assert_eq!(NonReadRequestsMiddleware.handle(&req, &mut res).unwrap(), Flow::Done);
        assert_eq!(res.status(), 404);
        assert_eq!(res.body(), b"Cannot PUT /index.html");
    }

    #[test]
    fn test_reads_pass() {
        for method in [Method::GET, Method::HEAD, Method::OPTIONS] {
            let mut res = DevResponse::new();
            let req = DevRequest::new(method, "/index.html");
            assert_eq!(NonReadRequestsMiddleware.handle(&req, &mut res).unwrap(), Flow::Next);
        }
    }
}
