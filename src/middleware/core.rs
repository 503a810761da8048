use crate::error::ServeError;
use crate::server::{DevRequest, DevResponse};

/// What the pipeline does after a middleware returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// The response is final; later middleware does not run
    Done,
    /// Delegate to the next middleware
    Next,
}

/// A request handler installed in the pipeline.
///
/// `req.path` is relative to the handler's mount path. A handler may
/// decorate `res` and return [`Flow::Next`] (headers accumulate across
/// handlers) or finalize it and return [`Flow::Done`].
pub trait Middleware: Send + Sync {
    fn handle(&self, req: &DevRequest, res: &mut DevResponse) -> Result<Flow, ServeError>;
}

impl<F> Middleware for F
where
    F: Fn(&DevRequest, &mut DevResponse) -> Result<Flow, ServeError> + Send + Sync,
{
    fn handle(&self, req: &DevRequest, res: &mut DevResponse) -> Result<Flow, ServeError> {
        self(req, res)
    }
}
