//! Generation of `sap-ui-version.json`.
//!
//! The document lists every library the root project depends on, read from
//! the libraries' `.library` descriptors, and carries manifest hints taken
//! from each library's `manifest.json`.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::resources::Resource;

static LIBRARY_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<name>\s*([^<\s]+)\s*</name>").expect("library name regex should be valid")
});

/// A library found among the dependencies.
#[derive(Debug, Clone)]
pub struct LibraryInput {
    /// Its `.library` descriptor
    pub library: Resource,
    /// Its `manifest.json`, if it has one
    pub manifest: Option<Resource>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryInfo {
    pub name: String,
    pub version: String,
    pub build_timestamp: String,
    pub scm_revision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_hints: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub name: String,
    pub version: String,
    pub build_timestamp: String,
    pub scm_revision: String,
    pub libraries: Vec<LibraryInfo>,
}

/// `yyyyMMddHHmm` in UTC.
pub fn build_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M").to_string()
}

/// Library name declared in a `.library` descriptor.
pub fn library_name(descriptor: &str) -> Option<&str> {
    LIBRARY_NAME
        .captures(descriptor)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Manifest hints: the library dependencies declared under
/// `sap.ui5/dependencies/libs`.
fn manifest_hints(manifest: &Resource) -> Option<Value> {
    let manifest: Value = serde_json::from_slice(manifest.content()).ok()?;
    let libs = manifest
        .get("sap.ui5")?
        .get("dependencies")?
        .get("libs")?
        .as_object()?;
    if libs.is_empty() {
        return None;
    }
    let mut hints = Map::new();
    let mut deps = Map::new();
    deps.insert("libs".to_string(), Value::Object(libs.clone()));
    hints.insert("dependencies".to_string(), Value::Object(deps));
    Some(Value::Object(hints))
}

/// Generate the version info for the root project `name`@`version`.
pub fn generate(
    name: &str,
    version: &str,
    libraries: &[LibraryInput],
    now: DateTime<Utc>,
) -> Result<VersionInfo, String> {
    let timestamp = build_timestamp(now);
    let mut infos = Vec::with_capacity(libraries.len());
    for input in libraries {
        let descriptor = std::str::from_utf8(input.library.content())
            .map_err(|e| format!("{} is not valid UTF-8: {e}", input.library.path()))?;
        let Some(lib_name) = library_name(descriptor) else {
            return Err(format!("{} declares no library name", input.library.path()));
        };
        let lib_version = input
            .library
            .project()
            .map(|p| p.version.clone())
            .unwrap_or_default();
        infos.push(LibraryInfo {
            name: lib_name.to_string(),
            version: lib_version,
            build_timestamp: timestamp.clone(),
            scm_revision: String::new(),
            manifest_hints: input.manifest.as_ref().and_then(manifest_hints),
        });
    }
    infos.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(VersionInfo {
        name: name.to_string(),
        version: version.to_string(),
        build_timestamp: timestamp,
        scm_revision: String::new(),
        libraries: infos,
    })
}
