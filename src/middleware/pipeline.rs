use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use super::repository::{self, MiddlewareContext, MiddlewareFactory};
use super::Middleware;
use crate::extension::ExtensionRegistry;
use crate::server::ServerOptions;

/// Standard middleware that no longer exists and must not be used as an anchor.
pub const REMOVED_STANDARD_MIDDLEWARE: &str = "connectUi5Proxy";

const MIGRATION_GUIDE: &str = "https://sap.github.io/ui5-tooling/updates/migrate-v3/";

/// Fatal pipeline assembly error. The server does not start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A middleware with this name is already installed
    DuplicateName { name: String },
    /// Both an insert-before and an insert-after anchor were given
    ConflictingAnchors { name: String },
    /// The anchor is not installed
    UnknownAnchor { anchor: String, referenced_by: String },
    /// The anchor names a standard middleware that has been removed
    RemovedStandardMiddleware {
        anchor: String,
        referenced_by: String,
        project: String,
    },
    /// No standard middleware with this name exists
    UnknownStandardMiddleware { name: String },
    /// A custom middleware declaration without a name
    MissingCustomName { project: String, index: usize },
    /// A custom middleware declaration with both anchors
    BothAnchors { name: String, project: String },
    /// A custom middleware declaration with neither anchor
    NeitherAnchor { name: String, project: String },
    /// A custom middleware declaration naming an unregistered extension
    UnknownExtension { name: String, project: String },
    /// The middleware factory failed
    Factory { name: String, message: String },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::DuplicateName { name } => {
                write!(f, "A middleware with the name {name} has already been added")
            }
            PipelineError::ConflictingAnchors { name } => write!(
                f,
                "Middleware {name} can only be inserted either before or after another middleware"
            ),
            PipelineError::UnknownAnchor {
                anchor,
                referenced_by,
            } => write!(
                f,
                "Could not find middleware {anchor}, referenced by custom middleware {referenced_by}"
            ),
            PipelineError::RemovedStandardMiddleware {
                anchor,
                referenced_by,
                project,
            } => write!(
                f,
                "Standard middleware \"{anchor}\", referenced by middleware \"{referenced_by}\" \
                 in project {project}, has been removed and can't be referenced anymore. \
                 Please see the migration guide at {MIGRATION_GUIDE}"
            ),
            PipelineError::UnknownStandardMiddleware { name } => {
                write!(f, "Could not find standard middleware {name}")
            }
            PipelineError::MissingCustomName { project, index } => write!(
                f,
                "Missing name for custom middleware defined in project {project} at index {index}"
            ),
            PipelineError::BothAnchors { name, project } => write!(
                f,
                "Custom middleware {name} in project {project} defines both \"beforeMiddleware\" \
                 and \"afterMiddleware\" parameters. Only one must be defined."
            ),
            PipelineError::NeitherAnchor { name, project } => write!(
                f,
                "Custom middleware {name} in project {project} defines neither a \
                 \"beforeMiddleware\" nor an \"afterMiddleware\" parameter. One must be defined."
            ),
            PipelineError::UnknownExtension { name, project } => write!(
                f,
                "Could not find custom middleware {name}, referenced by project {project}"
            ),
            PipelineError::Factory { name, message } => {
                write!(f, "Failed to create middleware {name}: {message}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// Turns a raw factory into the installable one.
pub type FactoryWrapper = Box<dyn FnOnce(MiddlewareFactory) -> MiddlewareFactory>;

/// Where the executable form of a middleware comes from.
#[derive(Clone)]
pub enum HandlerSource {
    /// Look up a standard middleware factory by this name
    Named(String),
    /// Use this factory
    Factory(MiddlewareFactory),
    /// Install this handler as is
    Handler(Arc<dyn Middleware>),
}

/// Options for [`MiddlewareManager::add_middleware`].
pub struct AddOptions {
    /// `None` looks up the standard middleware of the same name
    pub source: Option<HandlerSource>,
    pub wrapper: Option<FactoryWrapper>,
    pub mount_path: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            source: None,
            wrapper: None,
            mount_path: "/".to_string(),
            before: None,
            after: None,
        }
    }
}

impl AddOptions {
    pub fn handler(handler: Arc<dyn Middleware>) -> Self {
        Self {
            source: Some(HandlerSource::Handler(handler)),
            ..Self::default()
        }
    }

    pub fn mounted(mut self, mount_path: &str) -> Self {
        self.mount_path = mount_path.to_string();
        self
    }

    pub fn before(mut self, anchor: &str) -> Self {
        self.before = Some(anchor.to_string());
        self
    }

    pub fn after(mut self, anchor: &str) -> Self {
        self.after = Some(anchor.to_string());
        self
    }

    pub fn wrapped<W>(mut self, wrapper: W) -> Self
    where
        W: FnOnce(MiddlewareFactory) -> MiddlewareFactory + 'static,
    {
        self.wrapper = Some(Box::new(wrapper));
        self
    }
}

/// `server.customMiddleware[]` entry of a project.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomMiddlewareDeclaration {
    pub name: Option<String>,
    pub before_middleware: Option<String>,
    pub after_middleware: Option<String>,
    pub mount_path: Option<String>,
    pub configuration: Value,
}

/// An installed middleware.
#[derive(Clone)]
pub struct PipelineEntry {
    pub name: String,
    pub handler: Arc<dyn Middleware>,
    pub mount_path: String,
}

impl fmt::Debug for PipelineEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineEntry")
            .field("name", &self.name)
            .field("mount_path", &self.mount_path)
            .finish_non_exhaustive()
    }
}

/// The assembled, immutable middleware sequence.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    entries: Vec<PipelineEntry>,
}

impl Pipeline {
    pub fn entries(&self) -> &[PipelineEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Assembles the named, ordered middleware registry.
///
/// Insertions relative to an anchor resolve the anchor's index at the time
/// of the insertion. Several middleware added `after` the same anchor
/// therefore end up in reverse order of addition directly behind it.
pub struct MiddlewareManager {
    context: MiddlewareContext,
    entries: HashMap<String, PipelineEntry>,
    order: Vec<String>,
}

impl MiddlewareManager {
    pub fn new(context: MiddlewareContext) -> Self {
        Self {
            context,
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn context(&self) -> &MiddlewareContext {
        &self.context
    }

    /// Installed names in execution order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Install a middleware under `name`.
    ///
    /// On error the registry is left unchanged.
    pub fn add_middleware(&mut self, name: &str, options: AddOptions) -> Result<(), PipelineError> {
        if self.entries.contains_key(name) {
            return Err(PipelineError::DuplicateName {
                name: name.to_string(),
            });
        }
        let index = self.insertion_index(name, &options)?;

        let handler = match options.source.unwrap_or_else(|| HandlerSource::Named(name.to_string())) {
            HandlerSource::Handler(handler) => handler,
            HandlerSource::Named(module) => {
                let raw = repository::standard_factory(&module)
                    .ok_or(PipelineError::UnknownStandardMiddleware { name: module })?;
                self.construct(name, raw, options.wrapper)?
            }
            HandlerSource::Factory(raw) => self.construct(name, raw, options.wrapper)?,
        };

        self.order.insert(index, name.to_string());
        self.entries.insert(
            name.to_string(),
            PipelineEntry {
                name: name.to_string(),
                handler,
                mount_path: options.mount_path.clone(),
            },
        );
        debug!(middleware = %name, index, mount_path = %options.mount_path, "Middleware added");
        Ok(())
    }

    fn construct(
        &self,
        name: &str,
        raw: MiddlewareFactory,
        wrapper: Option<FactoryWrapper>,
    ) -> Result<Arc<dyn Middleware>, PipelineError> {
        let factory = match wrapper {
            Some(wrapper) => wrapper(raw),
            None => raw,
        };
        factory(&self.context, &Value::Null).map_err(|message| PipelineError::Factory {
            name: name.to_string(),
            message,
        })
    }

    fn insertion_index(&self, name: &str, options: &AddOptions) -> Result<usize, PipelineError> {
        let (anchor, after) = match (&options.before, &options.after) {
            (Some(_), Some(_)) => {
                return Err(PipelineError::ConflictingAnchors {
                    name: name.to_string(),
                })
            }
            (Some(before), None) => (before, false),
            (None, Some(after)) => (after, true),
            (None, None) => return Ok(self.order.len()),
        };
        if anchor == REMOVED_STANDARD_MIDDLEWARE {
            return Err(PipelineError::RemovedStandardMiddleware {
                anchor: anchor.clone(),
                referenced_by: name.to_string(),
                project: self.context.graph.root().name.clone(),
            });
        }
        let index = self
            .order
            .iter()
            .position(|n| n == anchor)
            .ok_or_else(|| PipelineError::UnknownAnchor {
                anchor: anchor.clone(),
                referenced_by: name.to_string(),
            })?;
        Ok(if after { index + 1 } else { index })
    }

    /// Install the standard middleware in their fixed order.
    pub fn add_standard_middleware(&mut self, options: &ServerOptions) -> Result<(), PipelineError> {
        for (name, options) in repository::standard_middleware(options) {
            self.add_middleware(name, options)?;
        }
        Ok(())
    }

    /// Install the root project's custom middleware declarations.
    ///
    /// Declarations resolving to an already installed name are registered as
    /// `name--1`, `name--2`, … using the first free suffix.
    pub fn add_custom_middleware(
        &mut self,
        declarations: &[CustomMiddlewareDeclaration],
        extensions: &ExtensionRegistry,
    ) -> Result<(), PipelineError> {
        let project = self.context.graph.root().name.clone();
        for (index, declaration) in declarations.iter().enumerate() {
            let Some(declared_name) = declaration.name.clone().filter(|n| !n.is_empty()) else {
                return Err(PipelineError::MissingCustomName {
                    project,
                    index,
                });
            };
            match (&declaration.before_middleware, &declaration.after_middleware) {
                (Some(_), Some(_)) => {
                    return Err(PipelineError::BothAnchors {
                        name: declared_name,
                        project,
                    })
                }
                (None, None) => {
                    return Err(PipelineError::NeitherAnchor {
                        name: declared_name,
                        project,
                    })
                }
                _ => {}
            }
            let extension = extensions.get(&declared_name).cloned().ok_or_else(|| {
                PipelineError::UnknownExtension {
                    name: declared_name.clone(),
                    project: project.clone(),
                }
            })?;

            let name = self.free_name(&declared_name);
            let configuration = declaration.configuration.clone();
            let effective_name = name.clone();
            let factory: MiddlewareFactory = Arc::new(move |ctx: &MiddlewareContext, _: &Value| {
                let params = extension.params(
                    ctx.resources.clone(),
                    configuration.clone(),
                    &effective_name,
                    &ctx.util,
                );
                (extension.factory)(params)
            });

            let options = AddOptions {
                source: Some(HandlerSource::Factory(factory)),
                wrapper: None,
                mount_path: declaration
                    .mount_path
                    .clone()
                    .unwrap_or_else(|| "/".to_string()),
                before: declaration.before_middleware.clone(),
                after: declaration.after_middleware.clone(),
            };
            self.add_middleware(&name, options)?;
            info!(middleware = %name, project = %project, "Custom middleware added");
        }
        Ok(())
    }

    fn free_name(&self, declared: &str) -> String {
        let mut name = declared.to_string();
        let mut suffix = 0;
        while self.entries.contains_key(&name) {
            suffix += 1;
            name = format!("{declared}--{suffix}");
        }
        name
    }

    /// Freeze the registry into execution order.
    pub fn into_pipeline(mut self) -> Pipeline {
        let entries = self
            .order
            .iter()
            .filter_map(|name| self.entries.remove(name))
            .collect();
        Pipeline { entries }
    }
}
