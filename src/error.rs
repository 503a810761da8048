//! Request-scoped and configuration-file errors.
//!
//! Assembly-time errors live next to the assembler in
//! [`crate::middleware::PipelineError`]; build failures shared between
//! single-flight waiters live in [`crate::build_cache::BuildError`].

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::build_cache::BuildError;

/// Error raised by a middleware while handling a single request.
///
/// The server's generic error path turns every variant into a `500`
/// response for that request only; the server keeps running.
#[derive(Debug)]
pub enum ServeError {
    /// A CSP violation report whose body is not a JSON object
    MalformedReport {
        /// Request URL the report was posted to
        url: String,
    },
    /// The theme compiler returned successfully but did not produce the
    /// requested output file
    MissingBuildOutput {
        /// Path that was requested
        requested: String,
    },
    /// The shared build failed
    Build(BuildError),
    /// Reading a resource failed
    Resource {
        /// Virtual path of the resource
        path: String,
        /// Underlying I/O error
        source: io::Error,
    },
    /// Rendering a response body failed
    Render(String),
    /// The request line carried a method token that is not valid HTTP
    InvalidMethod {
        /// Method as received
        method: String,
    },
}

impl fmt::Display for ServeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServeError::MalformedReport { url } => {
                write!(f, "No body content available: {url}")
            }
            ServeError::MissingBuildOutput { requested } => {
                write!(f, "Theme Build did not return requested file \"{requested}\"")
            }
            ServeError::Build(err) => write!(f, "{err}"),
            ServeError::Resource { path, source } => {
                write!(f, "Failed to read resource {path}: {source}")
            }
            ServeError::Render(reason) => write!(f, "Failed to render response: {reason}"),
            ServeError::InvalidMethod { method } => write!(f, "Invalid HTTP method \"{method}\""),
        }
    }
}

impl std::error::Error for ServeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServeError::Build(err) => Some(err),
            ServeError::Resource { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<BuildError> for ServeError {
    fn from(err: BuildError) -> Self {
        ServeError::Build(err)
    }
}

/// Error raised while loading the project configuration file.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read
    Read {
        /// Path of the configuration file
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },
    /// The file is not valid YAML for the expected shape
    Parse {
        /// Path of the configuration file
        path: PathBuf,
        /// Parser error
        source: serde_yaml::Error,
    },
    /// The file parsed, but describes an impossible project graph
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read configuration {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Failed to parse configuration {}: {source}", path.display())
            }
            ConfigError::Invalid(reason) => write!(f, "Invalid configuration: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid(_) => None,
        }
    }
}
