//! # Extension Module
//!
//! Custom middleware supplied by projects, and the capability-versioned
//! adapter that decides what those middleware get to see.
//!
//! A custom middleware is registered once in an [`ExtensionRegistry`] under
//! the name projects refer to in `server.customMiddleware[].name`. Each
//! registration declares a [`SpecVersion`]; the version controls the shape
//! of [`CustomMiddlewareParams`] passed to the factory:
//!
//! - `< 2.0`: resources and configuration only
//! - `>= 2.0`: plus a [`MiddlewareUtilInterface`] with path and mime helpers
//! - `>= 3.0`: plus project queries, a [`MiddlewareLogger`] and the
//!   effective registration name in the options

mod logger;
mod util;
mod version;

pub use logger::MiddlewareLogger;
pub use util::{MiddlewareUtil, MiddlewareUtilInterface, ProjectQueries};
pub use version::{InvalidSpecVersion, SpecVersion};

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::middleware::Middleware;
use crate::resources::MiddlewareResources;

/// Options passed to a custom middleware factory.
#[derive(Debug, Clone, Default)]
pub struct CustomMiddlewareOptions {
    /// `configuration` block of the declaration, `Null` when absent
    pub configuration: Value,
    /// Effective registration name (after suffixing); `3.0+` only
    pub middleware_name: Option<String>,
}

/// Everything a custom middleware factory receives.
#[derive(Clone)]
pub struct CustomMiddlewareParams {
    pub resources: MiddlewareResources,
    pub options: CustomMiddlewareOptions,
    /// `None` below `2.0`
    pub middleware_util: Option<MiddlewareUtilInterface>,
    /// `None` below `3.0`
    pub log: Option<MiddlewareLogger>,
}

/// Factory building the middleware instance for one declaration.
pub type CustomMiddlewareFactory =
    Arc<dyn Fn(CustomMiddlewareParams) -> Result<Arc<dyn Middleware>, String> + Send + Sync>;

/// A custom middleware implementation available to projects.
#[derive(Clone)]
pub struct CustomMiddlewareExtension {
    pub name: String,
    pub spec_version: SpecVersion,
    pub factory: CustomMiddlewareFactory,
}

impl CustomMiddlewareExtension {
    pub fn new<F>(name: &str, spec_version: SpecVersion, factory: F) -> Self
    where
        F: Fn(CustomMiddlewareParams) -> Result<Arc<dyn Middleware>, String>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.to_string(),
            spec_version,
            factory: Arc::new(factory),
        }
    }

    /// Assemble the version-filtered parameters for this extension.
    pub fn params(
        &self,
        resources: MiddlewareResources,
        configuration: Value,
        effective_name: &str,
        util: &MiddlewareUtil,
    ) -> CustomMiddlewareParams {
        let is_v3 = self.spec_version >= SpecVersion::V3_0;
        CustomMiddlewareParams {
            resources,
            options: CustomMiddlewareOptions {
                configuration,
                middleware_name: is_v3.then(|| effective_name.to_string()),
            },
            middleware_util: util.interface(self.spec_version),
            // Logger is named after the declaration, not the suffixed name
            log: is_v3.then(|| MiddlewareLogger::new(&self.name)),
        }
    }
}

impl fmt::Debug for CustomMiddlewareExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomMiddlewareExtension")
            .field("name", &self.name)
            .field("spec_version", &self.spec_version)
            .finish_non_exhaustive()
    }
}

/// Custom middleware implementations by name.
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    extensions: HashMap<String, CustomMiddlewareExtension>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension, replacing any earlier one of the same name.
    pub fn register(&mut self, extension: CustomMiddlewareExtension) {
        self.extensions.insert(extension.name.clone(), extension);
    }

    pub fn get(&self, name: &str) -> Option<&CustomMiddlewareExtension> {
        self.extensions.get(name)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}
