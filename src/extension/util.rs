use std::sync::Arc;

use super::SpecVersion;
use crate::mime::{mime_info, MimeInfo};
use crate::resources::{ProjectGraph, ProjectInfo, Resource};
use crate::server::DevRequest;

/// Helpers offered to custom middleware.
///
/// What a given middleware can see depends on its declared
/// [`SpecVersion`]; see [`MiddlewareUtil::interface`].
#[derive(Debug, Clone)]
pub struct MiddlewareUtil {
    graph: Arc<ProjectGraph>,
}

impl MiddlewareUtil {
    pub fn new(graph: Arc<ProjectGraph>) -> Self {
        Self { graph }
    }

    /// Capability view for an extension declaring `version`.
    ///
    /// | version  | view                                            |
    /// |----------|-------------------------------------------------|
    /// | `< 2.0`  | none                                            |
    /// | `>= 2.0` | path name and mime helpers                      |
    /// | `>= 3.0` | plus project/dependency queries, resource factory |
    pub fn interface(&self, version: SpecVersion) -> Option<MiddlewareUtilInterface> {
        if version < SpecVersion::V2_0 {
            return None;
        }
        Some(MiddlewareUtilInterface {
            version,
            graph: (version >= SpecVersion::V3_0).then(|| Arc::clone(&self.graph)),
        })
    }
}

/// Version-filtered view of [`MiddlewareUtil`].
#[derive(Debug, Clone)]
pub struct MiddlewareUtilInterface {
    version: SpecVersion,
    graph: Option<Arc<ProjectGraph>>,
}

impl MiddlewareUtilInterface {
    pub fn version(&self) -> SpecVersion {
        self.version
    }

    /// Decoded request path relative to the middleware's mount point.
    pub fn pathname(&self, req: &DevRequest) -> String {
        req.path.clone()
    }

    pub fn mime_info(&self, path: &str) -> MimeInfo {
        mime_info(path)
    }

    /// Project queries and the resource factory; `None` below `3.0`.
    pub fn projects(&self) -> Option<ProjectQueries<'_>> {
        self.graph.as_deref().map(|graph| ProjectQueries { graph })
    }
}

/// Read-only project graph queries for `3.0+` extensions.
#[derive(Debug, Clone, Copy)]
pub struct ProjectQueries<'a> {
    graph: &'a ProjectGraph,
}

impl ProjectQueries<'_> {
    /// Look up a project by name; `None` names the root project.
    pub fn project(&self, name: Option<&str>) -> Option<Arc<ProjectInfo>> {
        match name {
            Some(name) => self.graph.project(name),
            None => Some(Arc::clone(self.graph.root())),
        }
    }

    /// Project a resource belongs to.
    pub fn project_of(&self, resource: &Resource) -> Option<Arc<ProjectInfo>> {
        resource.project().map(Arc::clone)
    }

    /// Direct dependencies of a project; `None` names the root project.
    pub fn dependencies(&self, name: Option<&str>) -> Vec<String> {
        let name = name.unwrap_or(&self.graph.root().name);
        self.graph.dependencies_of(name)
    }

    /// Create an in-memory resource.
    pub fn create_resource(&self, path: &str, content: impl Into<Arc<[u8]>>) -> Resource {
        Resource::new(path, content)
    }
}
