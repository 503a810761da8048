use serde_json::Value;
use std::sync::Arc;

use super::repository::MiddlewareContext;
use super::{Flow, Middleware};
use crate::error::ServeError;
use crate::server::{DevRequest, DevResponse};

/// Negotiates brotli compression.
///
/// Only marks the response; the body is compressed when the finished
/// response is written, once later middleware have produced it.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompressionMiddleware;

pub fn create(_ctx: &MiddlewareContext, _options: &Value) -> Result<Arc<dyn Middleware>, String> {
    Ok(Arc::new(CompressionMiddleware))
}

/// Whether `Accept-Encoding` allows `br` (a `q=0` weight refuses it).
pub fn accepts_brotli(accept_encoding: &str) -> bool {
    accept_encoding.split(',').any(|candidate| {
        let mut parts = candidate.split(';').map(str::trim);
        let coding = parts.next().unwrap_or("");
        if !coding.eq_ignore_ascii_case("br") && coding != "*" {
            return false;
        }
        !parts.any(|param| {
            param
                .strip_prefix("q=")
                .and_then(|q| q.parse::<f32>().ok())
                .is_some_and(|q| q == 0.0)
        })
    })
}

impl Middleware for CompressionMiddleware {
    fn handle(&self, req: &DevRequest, res: &mut DevResponse) -> Result<Flow, ServeError> {
        if !req.is_head() && req.header("accept-encoding").is_some_and(accepts_brotli) {
            res.enable_compression();
        }
        Ok(Flow::Next)
    }
}
