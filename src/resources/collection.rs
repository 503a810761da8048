use std::collections::HashSet;
use std::io;
use std::sync::Arc;

use super::{GlobOptions, Resource, ResourceReader};

/// Queries readers in order.
///
/// `by_path` returns the first hit; `by_glob` returns the union with earlier
/// readers shadowing later ones on equal paths.
#[derive(Clone, Default)]
pub struct ReaderCollection {
    readers: Vec<Arc<dyn ResourceReader>>,
}

impl ReaderCollection {
    pub fn new(readers: Vec<Arc<dyn ResourceReader>>) -> Self {
        Self { readers }
    }

    pub fn push(&mut self, reader: Arc<dyn ResourceReader>) {
        self.readers.push(reader);
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

impl ResourceReader for ReaderCollection {
    fn by_path(&self, path: &str) -> io::Result<Option<Resource>> {
        for reader in &self.readers {
            if let Some(res) = reader.by_path(path)? {
                return Ok(Some(res));
            }
        }
        Ok(None)
    }

    fn by_glob(&self, pattern: &str, options: GlobOptions) -> io::Result<Vec<Resource>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for reader in &self.readers {
            for res in reader.by_glob(pattern, options)? {
                if seen.insert(res.path().to_string()) {
                    out.push(res);
                }
            }
        }
        Ok(out)
    }
}
