use chrono::{DateTime, Utc};
use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::repository::MiddlewareContext;
use super::{Flow, Middleware};
use crate::error::ServeError;
use crate::etag::{is_fresh, versioned_etag};
use crate::mime::mime_info;
use crate::resources::{PropertiesEncoding, Resource, ResourceReader};
use crate::server::{DevRequest, DevResponse};

static REPLACE_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(library|js|json)$").expect("version regex should be valid"));

const VERSION_PLACEHOLDER: &str = "${version}";

/// Serves project files from the combined reader.
pub struct ServeResourcesMiddleware {
    all: Arc<dyn ResourceReader>,
}

impl ServeResourcesMiddleware {
    pub fn new(all: Arc<dyn ResourceReader>) -> Self {
        Self { all }
    }
}

pub fn create(ctx: &MiddlewareContext, _options: &Value) -> Result<Arc<dyn Middleware>, String> {
    Ok(Arc::new(ServeResourcesMiddleware::new(Arc::clone(
        &ctx.resources.all,
    ))))
}

/// Escape every non-ASCII character as `\uXXXX` (UTF-16 code units).
pub fn escape_non_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}

fn decode_properties(content: &[u8], encoding: PropertiesEncoding) -> String {
    match encoding {
        PropertiesEncoding::Utf8 => String::from_utf8_lossy(content).into_owned(),
        // Every ISO-8859-1 byte is the code point of the same value
        PropertiesEncoding::Latin1 => content.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Content to send for a resource and the version marker folded into its
/// validator, if any.
fn prepare(resource: &Resource) -> (Vec<u8>, Option<String>) {
    let path = resource.path();
    if path.ends_with(".properties") {
        let encoding = resource
            .project()
            .map(|p| p.properties_encoding)
            .unwrap_or_default();
        let text = decode_properties(resource.content(), encoding);
        return (escape_non_ascii(&text).into_bytes(), None);
    }
    if REPLACE_VERSION.is_match(path) {
        if let Some(project) = resource.project() {
            if let Ok(text) = std::str::from_utf8(resource.content()) {
                if text.contains(VERSION_PLACEHOLDER) {
                    let replaced = text.replace(VERSION_PLACEHOLDER, &project.version);
                    return (replaced.into_bytes(), Some(project.version.clone()));
                }
            }
        }
    }
    (resource.content().to_vec(), None)
}

/// `Last-Modified` value for a modification time.
pub fn http_date(time: std::time::SystemTime) -> String {
    let time: DateTime<Utc> = time.into();
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

impl Middleware for ServeResourcesMiddleware {
    fn handle(&self, req: &DevRequest, res: &mut DevResponse) -> Result<Flow, ServeError> {
        if req.method != Method::GET && req.method != Method::HEAD {
            return Ok(Flow::Next);
        }
        let resource = self
            .all
            .by_path(&req.path)
            .map_err(|source| ServeError::Resource {
                path: req.path.clone(),
                source,
            })?;
        let Some(resource) = resource else {
            return Ok(Flow::Next);
        };
        if resource.is_directory() {
            return Ok(Flow::Next);
        }

        let (content, version) = prepare(&resource);
        let mime = mime_info(resource.path());
        if res.header("Content-Type").is_none() {
            res.set_header("Content-Type", mime.content_type());
        }
        res.set_header("Last-Modified", http_date(resource.stat().modified));
        let etag = versioned_etag(&content, version.as_deref());
        res.set_header("ETag", etag.clone());

        if is_fresh(req.header("if-none-match"), req.header("cache-control"), &etag) {
            debug!(path = %req.path, "Resource not modified");
            res.set_status(304);
            res.set_body(Vec::new());
            return Ok(Flow::Done);
        }
        res.set_status(200);
        res.set_body(content);
        Ok(Flow::Done)
    }
}
