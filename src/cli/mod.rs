//! # CLI Module
//!
//! Command-line interface for the `brrtserve` dev server.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Load a project configuration, assemble the middleware pipeline and serve
//! it until SIGINT or SIGTERM:
//!
//! ```bash
//! brrtserve serve --config ui5.yaml --port 8080
//! brrtserve serve --sap-csp-policies --serve-csp-reports
//! brrtserve serve --accept-remote-connections --change-port-if-in-use
//! ```
//!
//! The port comes from `--port`, then `server.settings.port` in the
//! configuration file, then 8080.
//!
//! ### `middleware`
//!
//! Print the assembled pipeline in execution order without starting a
//! server. Useful for checking where custom middleware lands:
//!
//! ```bash
//! brrtserve middleware --config ui5.yaml
//! ```

mod commands;

pub use commands::{run_cli, Cli, Commands};
