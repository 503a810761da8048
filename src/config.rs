//! Project configuration file
//!
//! A YAML document describing the project graph and server settings:
//!
//! ```yaml
//! project:
//!   name: my.app
//!   version: 1.0.0
//!   type: application
//!   mounts:
//!     - { virtualPath: /, path: webapp }
//! dependencies:
//!   - name: sap.m
//!     version: 1.120.0
//!     type: library
//!     namespace: sap/m
//!     propertiesFileSourceEncoding: ISO-8859-1
//! server:
//!   settings:
//!     port: 8080
//!     cors:
//!       origins: [http://localhost:3000]
//!   customMiddleware:
//!     - name: my-proxy
//!       afterMiddleware: compression
//!       mountPath: /backend
//!       configuration:
//!         target: http://localhost:4004
//! ```
//!
//! Mount directories are relative to the configuration file. Projects
//! without mounts get the conventional layout of their type.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::middleware::CustomMiddlewareDeclaration;
use crate::resources::{ProjectGraph, ProjectInfo, ProjectKind, PropertiesEncoding};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountConfig {
    pub virtual_path: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSection {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, rename = "type")]
    pub kind: ProjectKind,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub properties_file_source_encoding: PropertiesEncoding,
    #[serde(default)]
    pub mounts: Vec<MountConfig>,
    /// Direct dependencies by name; all listed dependencies when absent
    #[serde(default)]
    pub dependencies: Option<Vec<String>>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub port: Option<u16>,
    /// Options of the standard `cors` middleware; all origins when absent
    pub cors: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSection {
    pub settings: ServerSettings,
    pub custom_middleware: Vec<CustomMiddlewareDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub project: ProjectSection,
    #[serde(default)]
    pub dependencies: Vec<ProjectSection>,
    #[serde(default)]
    pub server: ServerSection,
    /// Directory mount paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl ProjectSection {
    fn info(&self) -> ProjectInfo {
        ProjectInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            namespace: self.namespace.clone(),
            kind: self.kind,
            properties_encoding: self.properties_file_source_encoding,
        }
    }

    fn mounts(&self, base_dir: &Path) -> Vec<(String, PathBuf)> {
        if self.mounts.is_empty() {
            return default_mounts(self.kind, self.namespace.as_deref())
                .into_iter()
                .map(|(virtual_path, dir)| (virtual_path, base_dir.join(dir)))
                .collect();
        }
        self.mounts
            .iter()
            .map(|m| (m.virtual_path.clone(), base_dir.join(&m.path)))
            .collect()
    }
}

fn default_mounts(kind: ProjectKind, namespace: Option<&str>) -> Vec<(String, &'static str)> {
    match kind {
        ProjectKind::Application => vec![("/".to_string(), "webapp")],
        ProjectKind::Library => vec![
            ("/resources/".to_string(), "src"),
            ("/test-resources/".to_string(), "test"),
        ],
        ProjectKind::Module => {
            let base = namespace
                .map(|ns| format!("/resources/{}/", ns.trim_matches('/')))
                .unwrap_or_else(|| "/".to_string());
            vec![(base, ".")]
        }
    }
}

impl ProjectConfig {
    /// Options handed to the standard `cors` middleware.
    pub fn cors_options(&self) -> serde_json::Value {
        self.server.settings.cors.clone().unwrap_or_default()
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_yaml(&text, base_dir).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(text: &str, base_dir: PathBuf) -> Result<Self, serde_yaml::Error> {
        let mut config: ProjectConfig = serde_yaml::from_str(text)?;
        config.base_dir = base_dir;
        Ok(config)
    }

    /// Build the project graph.
    pub fn to_graph(&self) -> Result<ProjectGraph, ConfigError> {
        let mut names = HashSet::new();
        for project in std::iter::once(&self.project).chain(&self.dependencies) {
            if project.name.trim().is_empty() {
                return Err(ConfigError::Invalid("project name must not be empty".to_string()));
            }
            if !names.insert(project.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "project {} is declared more than once",
                    project.name
                )));
            }
        }
        let known = |deps: &[String], owner: &str| -> Result<(), ConfigError> {
            match deps.iter().find(|d| !names.contains(d.as_str())) {
                Some(missing) => Err(ConfigError::Invalid(format!(
                    "project {owner} depends on unknown project {missing}"
                ))),
                None => Ok(()),
            }
        };

        let mut graph = ProjectGraph::new(self.project.info());
        for (virtual_path, dir) in self.project.mounts(&self.base_dir) {
            graph = graph.mount_root(&virtual_path, dir);
        }
        for dep in &self.dependencies {
            let deps = dep.dependencies.clone().unwrap_or_default();
            known(&deps, &dep.name)?;
            graph = graph.add_dependency(dep.info(), dep.mounts(&self.base_dir), deps);
        }
        if let Some(root_deps) = &self.project.dependencies {
            known(root_deps, &self.project.name)?;
            graph = graph.set_root_dependencies(root_deps.clone());
        }
        Ok(graph)
    }

    pub fn custom_middleware(&self) -> &[CustomMiddlewareDeclaration] {
        &self.server.custom_middleware
    }

    pub fn port(&self) -> Option<u16> {
        self.server.settings.port
    }
}
