use std::path::PathBuf;
use std::sync::Arc;

use super::{FsReader, ProjectInfo, ResourceReader};

#[derive(Debug, Clone)]
struct ProjectNode {
    info: Arc<ProjectInfo>,
    mounts: Vec<(String, PathBuf)>,
    dependencies: Vec<String>,
}

impl ProjectNode {
    fn readers(&self) -> Vec<Arc<dyn ResourceReader>> {
        self.mounts
            .iter()
            .map(|(virtual_base, dir)| {
                Arc::new(
                    FsReader::new(virtual_base, dir.clone()).with_project(Arc::clone(&self.info)),
                ) as Arc<dyn ResourceReader>
            })
            .collect()
    }
}

/// Root project plus the projects it depends on.
///
/// Each project contributes one [`FsReader`] per mount.
#[derive(Debug, Clone)]
pub struct ProjectGraph {
    root: ProjectNode,
    dependencies: Vec<ProjectNode>,
}

impl ProjectGraph {
    pub fn new(root: ProjectInfo) -> Self {
        Self {
            root: ProjectNode {
                info: Arc::new(root),
                mounts: Vec::new(),
                dependencies: Vec::new(),
            },
            dependencies: Vec::new(),
        }
    }

    /// Mount a directory of the root project under a virtual prefix.
    pub fn mount_root(mut self, virtual_base: &str, dir: impl Into<PathBuf>) -> Self {
        self.root.mounts.push((virtual_base.to_string(), dir.into()));
        self
    }

    /// Add a dependency project with its mounts and its own direct
    /// dependencies. The root project depends on every added project
    /// unless [`ProjectGraph::set_root_dependencies`] says otherwise.
    pub fn add_dependency(
        mut self,
        info: ProjectInfo,
        mounts: Vec<(String, PathBuf)>,
        dependencies: Vec<String>,
    ) -> Self {
        self.root.dependencies.push(info.name.clone());
        self.dependencies.push(ProjectNode {
            info: Arc::new(info),
            mounts,
            dependencies,
        });
        self
    }

    pub fn set_root_dependencies(mut self, names: Vec<String>) -> Self {
        self.root.dependencies = names;
        self
    }

    pub fn root(&self) -> &Arc<ProjectInfo> {
        &self.root.info
    }

    fn node(&self, name: &str) -> Option<&ProjectNode> {
        std::iter::once(&self.root)
            .chain(self.dependencies.iter())
            .find(|n| n.info.name == name)
    }

    /// Look up any project in the graph by name.
    pub fn project(&self, name: &str) -> Option<Arc<ProjectInfo>> {
        self.node(name).map(|n| Arc::clone(&n.info))
    }

    /// Names of the direct dependencies of `name`.
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.node(name)
            .map(|n| n.dependencies.clone())
            .unwrap_or_default()
    }

    pub fn dependency_projects(&self) -> impl Iterator<Item = &Arc<ProjectInfo>> {
        self.dependencies.iter().map(|n| &n.info)
    }

    pub fn root_readers(&self) -> Vec<Arc<dyn ResourceReader>> {
        self.root.readers()
    }

    pub fn dependency_readers(&self) -> Vec<Arc<dyn ResourceReader>> {
        self.dependencies.iter().flat_map(|n| n.readers()).collect()
    }
}
