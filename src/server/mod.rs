//! # Server Module
//!
//! Hosts the assembled middleware pipeline on `may_minihttp`.
//!
//! Each request is parsed into a [`DevRequest`], run through the pipeline by
//! [`DevService`] and written back from the resulting [`DevResponse`].

mod http_server;
mod options;
mod request;
mod response;
mod serve;
mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use options::{ServerOptions, DEFAULT_PORT};
pub use request::{
    decode_path, parse_method, parse_query, parse_request, DevRequest, HeaderVec,
    MAX_INLINE_HEADERS,
};
pub use response::{
    interned_header_lines, status_reason, DevResponse, COMPRESSION_THRESHOLD,
    HEADER_LINES_WARN_THRESHOLD,
};
pub use serve::{build_pipeline, resolve_port, serve};
pub use service::{strip_mount, DevService};
