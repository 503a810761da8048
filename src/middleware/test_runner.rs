use http::Method;
use serde_json::Value;
use std::sync::Arc;

use super::repository::MiddlewareContext;
use super::{Flow, Middleware};
use crate::error::ServeError;
use crate::etag::{content_etag, is_fresh};
use crate::mime::mime_info;
use crate::server::{DevRequest, DevResponse};

const PREFIX: &str = "/test-resources/sap/ui/qunit/";

/// Bundled runner files, by name below [`PREFIX`].
const ASSETS: &[(&str, &str)] = &[
    (
        "testrunner.html",
        include_str!("../../assets/testrunner/testrunner.html"),
    ),
    (
        "testrunner.css",
        include_str!("../../assets/testrunner/testrunner.css"),
    ),
    (
        "TestRunner.js",
        include_str!("../../assets/testrunner/TestRunner.js"),
    ),
];

/// Serves the bundled QUnit test runner.
#[derive(Debug, Default, Clone, Copy)]
pub struct TestRunnerMiddleware;

pub fn create(_ctx: &MiddlewareContext, _options: &Value) -> Result<Arc<dyn Middleware>, String> {
    Ok(Arc::new(TestRunnerMiddleware))
}

fn asset(path: &str) -> Option<&'static str> {
    let name = path.strip_prefix(PREFIX)?;
    ASSETS
        .iter()
        .find(|(asset, _)| *asset == name)
        .map(|(_, content)| *content)
}

impl Middleware for TestRunnerMiddleware {
    fn handle(&self, req: &DevRequest, res: &mut DevResponse) -> Result<Flow, ServeError> {
        if req.method != Method::GET && req.method != Method::HEAD {
            return Ok(Flow::Next);
        }
        let Some(content) = asset(&req.path) else {
            return Ok(Flow::Next);
        };
        let etag = content_etag(content.as_bytes());
        res.set_header("Content-Type", mime_info(&req.path).content_type());
        res.set_header("ETag", etag.clone());
        if is_fresh(req.header("if-none-match"), req.header("cache-control"), &etag) {
            res.set_status(304);
            res.set_body(Vec::new());
        } else {
            res.set_status(200);
            res.set_body(content.as_bytes().to_vec());
        }
        Ok(Flow::Done)
    }
}
