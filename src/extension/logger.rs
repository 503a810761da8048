use tracing::{debug, error, info, trace, warn};

/// Logger handed to `3.0+` custom middleware.
///
/// Events go through `tracing` with a `logger` field of
/// `server:custom-middleware:<name>` so they can be filtered per extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareLogger {
    name: String,
}

impl MiddlewareLogger {
    pub fn new(middleware_name: &str) -> Self {
        Self {
            name: format!("server:custom-middleware:{middleware_name}"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn silly(&self, message: &str) {
        trace!(logger = %self.name, "{message}");
    }

    pub fn verbose(&self, message: &str) {
        debug!(logger = %self.name, "{message}");
    }

    pub fn info(&self, message: &str) {
        info!(logger = %self.name, "{message}");
    }

    pub fn warn(&self, message: &str) {
        warn!(logger = %self.name, "{message}");
    }

    pub fn error(&self, message: &str) {
        error!(logger = %self.name, "{message}");
    }
}
