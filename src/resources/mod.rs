//! # Resources Module
//!
//! The virtual file layer that every middleware reads from. A resource is
//! addressed by its *virtual path* (`/resources/sap/m/library.js`) rather than
//! a file system path; readers decide where the bytes come from.
//!
//! - [`FsReader`] maps one virtual prefix onto a directory
//! - [`ReaderCollection`] layers several readers, first hit wins
//! - [`MiddlewareResources`] is the bundle of readers handed to middleware
//!   factories (`all`, `root_project`, `dependencies`)
//! - [`ProjectGraph`] describes the root project and its dependencies

mod collection;
mod fs;
mod project;
mod resource;

pub use collection::ReaderCollection;
pub use fs::FsReader;
pub use project::ProjectGraph;
pub use resource::{ProjectInfo, ProjectKind, PropertiesEncoding, Resource, ResourceStat};

use std::io;
use std::sync::Arc;

/// Options for [`ResourceReader::by_glob`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobOptions {
    /// Also return directory entries (files only by default)
    pub include_directories: bool,
}

/// Resolves virtual paths and glob patterns to resources.
pub trait ResourceReader: Send + Sync {
    /// Look up a single resource; `Ok(None)` when nothing lives at `path`.
    fn by_path(&self, path: &str) -> io::Result<Option<Resource>>;

    /// All resources whose virtual path matches `pattern`.
    fn by_glob(&self, pattern: &str, options: GlobOptions) -> io::Result<Vec<Resource>>;
}

/// Readers handed to middleware factories.
#[derive(Clone)]
pub struct MiddlewareResources {
    /// Root project and all dependencies
    pub all: Arc<dyn ResourceReader>,
    /// Root project only
    pub root_project: Arc<dyn ResourceReader>,
    /// Dependencies only
    pub dependencies: Arc<dyn ResourceReader>,
}

impl MiddlewareResources {
    /// Build the reader bundle for a project graph.
    pub fn from_graph(graph: &ProjectGraph) -> Self {
        let root = ReaderCollection::new(graph.root_readers());
        let deps = ReaderCollection::new(graph.dependency_readers());
        let mut all_readers = graph.root_readers();
        all_readers.extend(graph.dependency_readers());
        Self {
            all: Arc::new(ReaderCollection::new(all_readers)),
            root_project: Arc::new(root),
            dependencies: Arc::new(deps),
        }
    }

    /// Use a single reader for every view; handy in tests.
    pub fn single(reader: Arc<dyn ResourceReader>) -> Self {
        Self {
            all: Arc::clone(&reader),
            root_project: Arc::clone(&reader),
            dependencies: reader,
        }
    }
}
