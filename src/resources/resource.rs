use serde::Deserialize;
use std::sync::Arc;
use std::time::SystemTime;

/// Encoding of `.properties` sources in a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum PropertiesEncoding {
    #[default]
    #[serde(rename = "UTF-8")]
    Utf8,
    #[serde(rename = "ISO-8859-1")]
    Latin1,
}

/// Kind of project that owns a set of resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    #[default]
    Application,
    Library,
    Module,
}

/// Project handle attached to resources it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub name: String,
    pub version: String,
    /// Slash-separated namespace, e.g. `sap/m`
    pub namespace: Option<String>,
    pub kind: ProjectKind,
    pub properties_encoding: PropertiesEncoding,
}

/// File metadata of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceStat {
    pub size: u64,
    pub modified: SystemTime,
    pub is_directory: bool,
}

/// A file (or directory) addressed by its virtual path.
#[derive(Debug, Clone)]
pub struct Resource {
    path: String,
    content: Arc<[u8]>,
    stat: ResourceStat,
    project: Option<Arc<ProjectInfo>>,
}

impl Resource {
    /// Create an in-memory resource.
    pub fn new(path: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        let content = content.into();
        Self {
            path: path.into(),
            stat: ResourceStat {
                size: content.len() as u64,
                modified: SystemTime::now(),
                is_directory: false,
            },
            content,
            project: None,
        }
    }

    pub(crate) fn from_parts(
        path: String,
        content: Arc<[u8]>,
        stat: ResourceStat,
        project: Option<Arc<ProjectInfo>>,
    ) -> Self {
        Self {
            path,
            content,
            stat,
            project,
        }
    }

    pub fn with_project(mut self, project: Option<Arc<ProjectInfo>>) -> Self {
        self.project = project;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Final path segment.
    pub fn name(&self) -> &str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("")
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Shared handle to the content buffer.
    pub fn buffer(&self) -> Arc<[u8]> {
        Arc::clone(&self.content)
    }

    pub fn stat(&self) -> &ResourceStat {
        &self.stat
    }

    pub fn is_directory(&self) -> bool {
        self.stat.is_directory
    }

    pub fn project(&self) -> Option<&Arc<ProjectInfo>> {
        self.project.as_ref()
    }
}
