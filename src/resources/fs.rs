use globset::{GlobBuilder, GlobMatcher};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

use super::{GlobOptions, ProjectInfo, Resource, ResourceReader, ResourceStat};

/// Serves one directory under a virtual path prefix.
///
/// `FsReader::new("/resources/my/lib/", "src/my/lib")` maps
/// `/resources/my/lib/Button.js` onto `src/my/lib/Button.js`.
#[derive(Debug, Clone)]
pub struct FsReader {
    virtual_base: String,
    base_dir: PathBuf,
    project: Option<Arc<ProjectInfo>>,
}

impl FsReader {
    pub fn new<P: Into<PathBuf>>(virtual_base: &str, base: P) -> Self {
        let mut virtual_base = virtual_base.to_string();
        if !virtual_base.starts_with('/') {
            virtual_base.insert(0, '/');
        }
        if !virtual_base.ends_with('/') {
            virtual_base.push('/');
        }
        Self {
            virtual_base,
            base_dir: base.into(),
            project: None,
        }
    }

    pub fn with_project(mut self, project: Arc<ProjectInfo>) -> Self {
        self.project = Some(project);
        self
    }

    pub fn virtual_base(&self) -> &str {
        &self.virtual_base
    }

    fn map_path(&self, virtual_path: &str) -> Option<PathBuf> {
        let rel = if format!("{virtual_path}/") == self.virtual_base {
            ""
        } else {
            virtual_path.strip_prefix(&self.virtual_base)?
        };
        let mut pb = self.base_dir.clone();
        for comp in Path::new(rel).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    fn virtual_path_of(&self, fs_path: &Path) -> Option<String> {
        let rel = fs_path.strip_prefix(&self.base_dir).ok()?;
        let mut out = self.virtual_base.clone();
        let parts: Vec<_> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();
        out.push_str(&parts.join("/"));
        Some(out)
    }

    fn load(&self, virtual_path: String, fs_path: &Path) -> io::Result<Option<Resource>> {
        let meta = match fs::metadata(fs_path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let stat = ResourceStat {
            size: meta.len(),
            modified: meta.modified()?,
            is_directory: meta.is_dir(),
        };
        let content: Arc<[u8]> = if meta.is_dir() {
            Arc::from(Vec::new())
        } else {
            Arc::from(fs::read(fs_path)?)
        };
        Ok(Some(Resource::from_parts(
            virtual_path,
            content,
            stat,
            self.project.clone(),
        )))
    }
}

fn compile_glob(pattern: &str) -> io::Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

impl ResourceReader for FsReader {
    fn by_path(&self, path: &str) -> io::Result<Option<Resource>> {
        let Some(fs_path) = self.map_path(path) else {
            return Ok(None);
        };
        self.load(path.to_string(), &fs_path)
    }

    fn by_glob(&self, pattern: &str, options: GlobOptions) -> io::Result<Vec<Resource>> {
        let matcher = compile_glob(pattern)?;
        let mut found = Vec::new();
        if !self.base_dir.is_dir() {
            return Ok(found);
        }
        for entry in WalkDir::new(&self.base_dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(io::Error::other)?;
            if entry.file_type().is_dir() && !options.include_directories {
                continue;
            }
            let Some(virtual_path) = self.virtual_path_of(entry.path()) else {
                continue;
            };
            if matcher.is_match(&virtual_path) {
                if let Some(res) = self.load(virtual_path, entry.path())? {
                    found.push(res);
                }
            }
        }
        debug!(pattern = %pattern, base = %self.virtual_base, matches = found.len(), "Glob resolved");
        Ok(found)
    }
}
