use may_minihttp::{HttpService, Request, Response};
use std::io;
use std::sync::Arc;
use tracing::{debug, error, info_span, warn};

use super::request::{parse_request, DevRequest};
use super::response::DevResponse;
use crate::middleware::{cannot, Flow, Pipeline};

/// Path as seen by a middleware mounted at `mount`, or `None` when the
/// mount does not cover `path`.
///
/// Mounts match on segment boundaries: `/discovery` covers
/// `/discovery` and `/discovery/all_libs` but not `/discoveryx`.
pub fn strip_mount(mount: &str, path: &str) -> Option<String> {
    let mount = mount.trim_end_matches('/');
    if mount.is_empty() {
        return Some(path.to_string());
    }
    let rest = path.strip_prefix(mount)?;
    if rest.is_empty() {
        Some("/".to_string())
    } else if rest.starts_with('/') {
        Some(rest.to_string())
    } else {
        None
    }
}

/// `may_minihttp` service running the assembled pipeline.
#[derive(Clone)]
pub struct DevService {
    pipeline: Arc<Pipeline>,
}

impl DevService {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run one request through the pipeline.
    ///
    /// Middleware errors become a `500` for this request only; a request no
    /// middleware finalizes becomes `404 Cannot <METHOD> <path>`. A
    /// client-supplied request id is echoed on every outcome.
    pub fn dispatch(&self, mut req: DevRequest) -> DevResponse {
        let mut res = self.run(&mut req);
        req.request_id.echo(&mut res);
        res
    }

    fn run(&self, req: &mut DevRequest) -> DevResponse {
        let mut res = DevResponse::new();
        for entry in self.pipeline.entries() {
            let Some(path) = strip_mount(&entry.mount_path, &req.original_path) else {
                continue;
            };
            req.path = path;
            match entry.handler.handle(req, &mut res) {
                Ok(Flow::Done) => {
                    debug!(middleware = %entry.name, status = res.status(), "Request finalized");
                    return res;
                }
                Ok(Flow::Next) => {}
                Err(err) => {
                    error!(middleware = %entry.name, error = %err, "Middleware failed");
                    let mut failed = DevResponse::new();
                    failed.send_text(500, &err.to_string());
                    return failed;
                }
            }
        }
        res.send_text(404, &cannot(&req.method, &req.original_path));
        res
    }
}

impl HttpService for DevService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let req = match parse_request(req) {
            Ok(req) => req,
            Err(err) => {
                warn!(error = %err, "Rejecting request");
                let mut rejected = DevResponse::new();
                rejected.send_text(400, &err.to_string());
                rejected.write_to(res, false);
                return Ok(());
            }
        };
        let span = info_span!(
            "request",
            request_id = %req.request_id,
            method = %req.method,
            path = %req.original_path
        );
        let head_only = req.is_head();
        let out = span.in_scope(|| self.dispatch(req));
        out.write_to(res, head_only);
        Ok(())
    }
}
