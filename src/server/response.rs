use may_minihttp::Response;
use once_cell::sync::Lazy;
use serde::Serialize;
use smallvec::SmallVec;
use std::collections::HashSet;
use std::io::Write;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Responses smaller than this are never compressed.
pub const COMPRESSION_THRESHOLD: usize = 1024;

type ResponseHeaders = SmallVec<[(String, String); 8]>;

/// Distinct header lines handed to `may_minihttp`, which only accepts
/// `&'static str`. Each distinct line is leaked once and kept until the
/// process exits.
///
/// Fixed lines such as `Content-Type`, `Vary` or the wildcard CORS origin
/// are shared by every response. Per-content values are not: every new
/// `ETag` and `Last-Modified` after a file edit, every allowed echoed
/// `Origin` and every echoed `X-Request-ID` adds one line. A dev session
/// therefore grows by a few short lines per edit, which is why the server
/// only echoes ids the client chose.
static HEADER_LINES: Lazy<Mutex<HashSet<&'static str>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Interned line count at which a long-running server says so once.
pub const HEADER_LINES_WARN_THRESHOLD: usize = 50_000;

fn intern_header(line: String) -> &'static str {
    let mut lines = match HEADER_LINES.lock() {
        Ok(lines) => lines,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(&existing) = lines.get(line.as_str()) {
        return existing;
    }
    let leaked: &'static str = Box::leak(line.into_boxed_str());
    lines.insert(leaked);
    if lines.len() == HEADER_LINES_WARN_THRESHOLD {
        warn!(
            lines = lines.len(),
            "Many distinct response header lines interned; restart the server to release them"
        );
    }
    leaked
}

/// Number of distinct header lines interned so far.
pub fn interned_header_lines() -> usize {
    match HEADER_LINES.lock() {
        Ok(lines) => lines.len(),
        Err(poisoned) => poisoned.into_inner().len(),
    }
}

pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

/// Response under construction by the middleware chain.
///
/// Headers are multi-valued: [`DevResponse::append_header`] keeps earlier
/// values of the same name, [`DevResponse::set_header`] replaces them.
#[derive(Debug, Clone)]
pub struct DevResponse {
    status: u16,
    headers: ResponseHeaders,
    body: Vec<u8>,
    brotli: bool,
}

impl Default for DevResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl DevResponse {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: ResponseHeaders::new(),
            body: Vec::new(),
            brotli: false,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    /// First value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of a header in insertion order.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn append_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    /// Finalize with a status, content type and body.
    pub fn send(&mut self, status: u16, content_type: &str, body: impl Into<Vec<u8>>) {
        self.status = status;
        self.set_header("Content-Type", content_type);
        self.body = body.into();
    }

    pub fn send_text(&mut self, status: u16, text: &str) {
        self.send(status, "text/plain; charset=utf-8", text.as_bytes().to_vec());
    }

    pub fn send_json(&mut self, status: u16, body: &serde_json::Value) {
        match serde_json::to_vec(body) {
            Ok(bytes) => self.send(status, "application/json; charset=utf-8", bytes),
            Err(err) => self.send_text(500, &format!("Failed to serialize response: {err}")),
        }
    }

    /// Tab-indented JSON body.
    pub fn send_pretty_json(&mut self, status: u16, body: &serde_json::Value) {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        match body.serialize(&mut serializer) {
            Ok(()) => self.send(status, "application/json; charset=utf-8", out),
            Err(err) => self.send_text(500, &format!("Failed to serialize response: {err}")),
        }
    }

    /// Ask for brotli compression when the response is written.
    pub fn enable_compression(&mut self) {
        self.brotli = true;
    }

    pub fn compression_enabled(&self) -> bool {
        self.brotli
    }

    /// Apply negotiated compression if the response qualifies.
    ///
    /// Only `200` responses of a compressible type above
    /// [`COMPRESSION_THRESHOLD`] bytes that are not already encoded.
    pub fn compress(&mut self) {
        if !self.brotli
            || self.status != 200
            || self.body.len() < COMPRESSION_THRESHOLD
            || self.header("Content-Encoding").is_some()
        {
            return;
        }
        let compressible = self
            .header("Content-Type")
            .map(is_compressible_type)
            .unwrap_or(false);
        if !compressible {
            return;
        }
        let mut out = Vec::with_capacity(self.body.len() / 3);
        let written = {
            let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 5, 22);
            writer.write_all(&self.body).and_then(|_| writer.flush())
        };
        match written {
            Ok(()) => {
                debug!(before = self.body.len(), after = out.len(), "Compressed response");
                self.body = out;
                self.set_header("Content-Encoding", "br");
                self.append_header("Vary", "Accept-Encoding");
            }
            Err(err) => warn!(error = %err, "Compression failed, sending identity body"),
        }
    }

    /// Write into the `may_minihttp` response.
    ///
    /// `head_only` drops the body, keeping headers intact.
    pub fn write_to(mut self, res: &mut Response, head_only: bool) {
        if !head_only {
            self.compress();
        }
        res.status_code(self.status as usize, status_reason(self.status));
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("Content-Length") {
                continue;
            }
            res.header(intern_header(format!("{name}: {value}")));
        }
        if !head_only && self.status != 204 && self.status != 304 {
            res.body_vec(self.body);
        }
    }
}

fn is_compressible_type(content_type: &str) -> bool {
    let bare = content_type.split(';').next().unwrap_or("").trim();
    bare.starts_with("text/")
        || bare.ends_with("+json")
        || bare.ends_with("+xml")
        || matches!(
            bare,
            "application/javascript" | "application/json" | "application/xml" | "application/wasm"
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(304), "Not Modified");
        assert_eq!(status_reason(404), "Not Found");
    }

    #[test]
    fn test_append_keeps_existing_values() {
        let mut res = DevResponse::new();
        res.append_header("Content-Security-Policy-Report-Only", "a");
        res.append_header("Content-Security-Policy-Report-Only", "b");
        assert_eq!(
            res.header_values("content-security-policy-report-only"),
            vec!["a", "b"]
        );
        res.set_header("Content-Security-Policy-Report-Only", "c");
        assert_eq!(res.header_values("Content-Security-Policy-Report-Only"), vec!["c"]);
    }

    #[test]
    fn test_compress_large_text() {
        let mut res = DevResponse::new();
        let body = "body { color: red; }\n".repeat(200);
        res.send(200, "text/css; charset=UTF-8", body.clone().into_bytes());
        res.enable_compression();
        res.compress();
        assert_eq!(res.header("Content-Encoding"), Some("br"));
        assert_eq!(res.header("Vary"), Some("Accept-Encoding"));

        let mut decoded = Vec::new();
        brotli::Decompressor::new(res.body(), 4096)
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, body.into_bytes());
    }

    #[test]
    fn test_no_compression_for_small_or_binary_or_304() {
        let mut small = DevResponse::new();
        small.send(200, "text/css", b"a{}".to_vec());
        small.enable_compression();
        small.compress();
        assert_eq!(small.header("Content-Encoding"), None);

        let mut binary = DevResponse::new();
        binary.send(200, "image/png", vec![0u8; 4096]);
        binary.enable_compression();
        binary.compress();
        assert_eq!(binary.header("Content-Encoding"), None);

        let mut not_modified = DevResponse::new();
        not_modified.send(304, "text/css", vec![b'a'; 4096]);
        not_modified.enable_compression();
        not_modified.compress();
        assert_eq!(not_modified.header("Content-Encoding"), None);
    }

    #[test]
    fn test_intern_reuses_lines() {
        let a = intern_header("X-Test: 1".to_string());
        let b = intern_header("X-Test: 1".to_string());
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn test_repeated_header_lines_are_interned_once() {
        let line = format!("ETag: \"{}\"", ulid::Ulid::new());
        let first = intern_header(line.clone());
        let second = intern_header(line.clone());
        assert!(std::ptr::eq(first, second));
        assert_eq!(first, line);
        assert!(interned_header_lines() >= 1);
        let fixed = intern_header("Vary: Origin".to_string());
        assert!(std::ptr::eq(fixed, intern_header("Vary: Origin".to_string())));
    }
}
