//! # Middleware Module
//!
//! The request pipeline and the standard middleware installed into it.
//!
//! [`MiddlewareManager`] assembles a uniquely named, ordered list of
//! middleware at startup. Entries are appended, or inserted before/after an
//! already installed anchor; the finished [`Pipeline`] is read-only.
//!
//! ## Standard middleware (installation order)
//!
//! | name              | mount                            | purpose                          |
//! |-------------------|----------------------------------|----------------------------------|
//! | `csp`             | `/`                              | CSP headers, violation reports   |
//! | `compression`     | `/`                              | brotli negotiation               |
//! | `cors`            | `/`                              | cross-origin headers             |
//! | `discovery`       | `/discovery`                     | app, library and test listings   |
//! | `serveResources`  | `/`                              | project files                    |
//! | `testRunner`      | `/`                              | bundled QUnit runner             |
//! | `serveThemes`     | `/`                              | on-demand theme builds           |
//! | `versionInfo`     | `/resources/sap-ui-version.json` | generated version info           |
//! | `nonReadRequests` | `/`                              | 404 for non-read methods         |
//! | `serveIndex`      | `/`                              | directory listings               |
//!
//! Project-declared custom middleware are inserted relative to these names
//! after the standard set is installed.

mod compression;
mod core;
mod cors;
mod csp;
mod discovery;
mod non_read;
mod pipeline;
mod repository;
mod serve_index;
mod serve_resources;
mod serve_themes;
mod test_runner;
mod version_info;

pub use compression::{accepts_brotli, CompressionMiddleware};
pub use core::{Flow, Middleware};
pub use cors::{CorsConfigError, CorsMiddleware, OriginValidation};
pub use csp::CspMiddleware;
pub use discovery::DiscoveryMiddleware;
pub use non_read::{cannot, NonReadRequestsMiddleware};
pub use pipeline::{
    AddOptions, CustomMiddlewareDeclaration, FactoryWrapper, HandlerSource, MiddlewareManager,
    Pipeline, PipelineEntry, PipelineError, REMOVED_STANDARD_MIDDLEWARE,
};
pub use repository::{
    standard_factory, standard_middleware, with_options, MiddlewareContext, MiddlewareFactory,
    STANDARD_MIDDLEWARE,
};
pub use serve_index::ServeIndexMiddleware;
pub use serve_resources::{escape_non_ascii, http_date, ServeResourcesMiddleware};
pub use serve_themes::ServeThemesMiddleware;
pub use test_runner::TestRunnerMiddleware;
pub use version_info::VersionInfoMiddleware;
