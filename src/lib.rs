//! # brrtserve
//!
//! **brrtserve** is a coroutine-powered development server for UI5 style
//! projects, built on the `may` runtime and `may_minihttp`.
//!
//! ## Overview
//!
//! A dev server run loads a project graph (the root project plus its
//! dependencies), assembles an ordered pipeline of named middleware and
//! serves requests through it. The pipeline is where most of the behavior
//! lives: CSP negotiation, compression, theme builds, version info,
//! resource serving and directory listings are each one named step.
//!
//! ## Architecture
//!
//! - **[`middleware`]** - The pipeline assembler and the standard middleware
//! - **[`build_cache`]** - Single-flight cache for on-demand builds
//! - **[`csp`]** - Content-Security-Policy decision engine and report store
//! - **[`resources`]** - Virtual file system over the project graph
//! - **[`theme`]** - Theme compilation behind a swappable trait
//! - **[`extension`]** - Custom middleware extensions and their API versions
//! - **[`server`]** - HTTP hosting of a pipeline with request/response types
//! - **[`config`]** - Project configuration files
//! - **[`cli`]** - The `brrtserve` command line
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as HttpServer<br/>(may_minihttp)
//!     participant Service as DevService
//!     participant Pipeline as Middleware Pipeline
//!     participant Cache as BuildCache
//!
//!     Client->>Server: GET /resources/my/lib/themes/base/library.css
//!     Server->>Service: parse request
//!     Service->>Pipeline: run entries whose mount path matches
//!     Pipeline->>Pipeline: csp, compression, cors, discovery ...
//!     Pipeline->>Cache: serveThemes: get_or_build(path)
//!     Cache-->>Pipeline: shared build result
//!     Pipeline-->>Service: response marked done
//!     Service-->>Client: 200 (or 304 when the ETag matches)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use brrtserve::config::ProjectConfig;
//! use brrtserve::extension::ExtensionRegistry;
//! use brrtserve::server::{build_pipeline, serve, ServerOptions};
//! use brrtserve::theme::SourceThemeCompiler;
//! use std::sync::Arc;
//!
//! let config = ProjectConfig::load("ui5.yaml".as_ref())?;
//! let options = ServerOptions::default();
//! let pipeline = build_pipeline(
//!     config.to_graph()?,
//!     Arc::new(SourceThemeCompiler::new()),
//!     &options,
//!     config.custom_middleware(),
//!     &ExtensionRegistry::new(),
//! )?;
//! let handle = serve(pipeline, &options)?;
//! handle.join().ok();
//! ```

pub mod build_cache;
pub mod cli;
pub mod config;
pub mod csp;
pub mod error;
pub mod etag;
pub mod extension;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod mime;
pub mod resources;
pub mod runtime_config;
pub mod server;
pub mod theme;
pub mod versioninfo;

pub use build_cache::{BuildCache, BuildError, BuildOutcome};
pub use error::{ConfigError, ServeError};
pub use middleware::{MiddlewareManager, Pipeline, PipelineError};
pub use server::{DevRequest, DevResponse, ServerOptions};
