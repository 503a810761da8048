//! Cross-origin headers for the dev server.
//!
//! By default every origin is allowed (`Access-Control-Allow-Origin: *`),
//! which is what a local development loop wants. Projects can narrow this
//! through the middleware options:
//!
//! ```json
//! { "origins": ["http://localhost:3000"], "allowCredentials": true }
//! { "originPatterns": ["^https://.*\\.example\\.com$"] }
//! ```

mod error;

pub use error::CorsConfigError;

use http::Method;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::repository::MiddlewareContext;
use super::{Flow, Middleware};
use crate::error::ServeError;
use crate::server::{DevRequest, DevResponse};

const DEFAULT_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";

/// Origin validation strategy
#[derive(Clone)]
pub enum OriginValidation {
    /// Exact string matching
    Exact(Vec<String>),
    /// Wildcard (allow all origins)
    Wildcard,
    /// Regex pattern matching
    Regex(Vec<Regex>),
}

impl std::fmt::Debug for OriginValidation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OriginValidation::Exact(origins) => f.debug_tuple("Exact").field(origins).finish(),
            OriginValidation::Wildcard => write!(f, "Wildcard"),
            OriginValidation::Regex(patterns) => f
                .debug_tuple("Regex")
                .field(&patterns.iter().map(|re| re.as_str()).collect::<Vec<_>>())
                .finish(),
        }
    }
}

impl OriginValidation {
    fn is_allowed(&self, origin: &str) -> bool {
        match self {
            OriginValidation::Exact(origins) => origins.iter().any(|o| o == origin),
            OriginValidation::Wildcard => true,
            OriginValidation::Regex(patterns) => patterns.iter().any(|re| re.is_match(origin)),
        }
    }

    fn is_wildcard(&self) -> bool {
        matches!(self, OriginValidation::Wildcard)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CorsOptions {
    origins: Vec<String>,
    origin_patterns: Vec<String>,
    allow_credentials: bool,
    expose_headers: Vec<String>,
    max_age: Option<u32>,
}

/// CORS middleware
///
/// Decorates responses with `Access-Control-*` headers and answers
/// preflight `OPTIONS` requests with `204`.
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    origin_validation: OriginValidation,
    allow_credentials: bool,
    expose_headers: Vec<String>,
    max_age: Option<u32>,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self {
            origin_validation: OriginValidation::Wildcard,
            allow_credentials: false,
            expose_headers: Vec::new(),
            max_age: None,
        }
    }
}

impl CorsMiddleware {
    /// Build from the middleware options block.
    pub fn from_options(options: &Value) -> Result<Self, CorsConfigError> {
        if options.is_null() {
            return Ok(Self::default());
        }
        let options: CorsOptions = serde_json::from_value(options.clone())
            .map_err(|e| CorsConfigError::InvalidOptions(e.to_string()))?;

        let origin_validation = if !options.origin_patterns.is_empty() {
            let patterns = options
                .origin_patterns
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|e| CorsConfigError::InvalidPattern {
                        pattern: p.clone(),
                        reason: e.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            OriginValidation::Regex(patterns)
        } else if options.origins.is_empty() || options.origins.iter().any(|o| o == "*") {
            OriginValidation::Wildcard
        } else {
            OriginValidation::Exact(options.origins)
        };

        if options.allow_credentials && origin_validation.is_wildcard() {
            return Err(CorsConfigError::WildcardWithCredentials);
        }
        Ok(Self {
            origin_validation,
            allow_credentials: options.allow_credentials,
            expose_headers: options.expose_headers,
            max_age: options.max_age,
        })
    }

    fn allowed_origin(&self, origin: Option<&str>) -> Option<String> {
        if self.origin_validation.is_wildcard() {
            return Some("*".to_string());
        }
        let origin = origin?;
        if self.origin_validation.is_allowed(origin) {
            Some(origin.to_string())
        } else {
            debug!(origin = %origin, "CORS origin not allowed");
            None
        }
    }
}

pub fn create(_ctx: &MiddlewareContext, options: &Value) -> Result<Arc<dyn Middleware>, String> {
    CorsMiddleware::from_options(options)
        .map(|cors| Arc::new(cors) as Arc<dyn Middleware>)
        .map_err(|e| e.to_string())
}

impl Middleware for CorsMiddleware {
    fn handle(&self, req: &DevRequest, res: &mut DevResponse) -> Result<Flow, ServeError> {
        let Some(allowed) = self.allowed_origin(req.header("origin")) else {
            return Ok(Flow::Next);
        };
        if allowed != "*" {
            res.append_header("Vary", "Origin");
        }
        res.set_header("Access-Control-Allow-Origin", allowed);
        if self.allow_credentials {
            res.set_header("Access-Control-Allow-Credentials", "true");
        }
        if !self.expose_headers.is_empty() {
            res.set_header("Access-Control-Expose-Headers", self.expose_headers.join(","));
        }

        let preflight =
            req.method == Method::OPTIONS && req.header("access-control-request-method").is_some();
        if !preflight {
            return Ok(Flow::Next);
        }
        res.set_header("Access-Control-Allow-Methods", DEFAULT_METHODS);
        if let Some(requested) = req.header("access-control-request-headers") {
            res.append_header("Vary", "Access-Control-Request-Headers");
            res.set_header("Access-Control-Allow-Headers", requested);
        }
        if let Some(max_age) = self.max_age {
            res.set_header("Access-Control-Max-Age", max_age.to_string());
        }
        res.set_status(204);
        res.set_body(Vec::new());
        Ok(Flow::Done)
    }
}
