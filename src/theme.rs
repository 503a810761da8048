//! # Theme Module
//!
//! The theme transformation engine behind the `serveThemes` middleware.
//!
//! A theme build takes a `library.source.less` resource and produces the
//! derived files browsers request:
//!
//! | output                       | when                    |
//! |------------------------------|-------------------------|
//! | `library.css`                | always                  |
//! | `library-RTL.css`            | always                  |
//! | `library-parameters.json`    | always                  |
//! | `css_variables.source.less`  | CSS variables mode only |
//! | `css_variables.css`          | CSS variables mode only |
//! | `library_skeleton.css`       | CSS variables mode only |
//! | `library_skeleton-RTL.css`   | CSS variables mode only |
//!
//! Engines implement [`ThemeCompiler`]. The bundled [`SourceThemeCompiler`]
//! resolves top-level `@variable: value;` declarations and substitutes them
//! textually; it does not evaluate LESS mixins, functions or imports.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use lru::LruCache;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::debug;

use crate::etag::content_etag;
use crate::resources::Resource;

/// File names a theme build can produce.
pub const THEME_OUTPUTS: [&str; 7] = [
    "library.css",
    "library-RTL.css",
    "library-parameters.json",
    "css_variables.source.less",
    "css_variables.css",
    "library_skeleton.css",
    "library_skeleton-RTL.css",
];

/// Outputs that are only produced in CSS variables mode.
pub const CSS_VARIABLES_OUTPUTS: [&str; 4] = [
    "css_variables.source.less",
    "css_variables.css",
    "library_skeleton.css",
    "library_skeleton-RTL.css",
];

/// Name of the source file every theme build starts from.
pub const THEME_SOURCE: &str = "library.source.less";

static VARIABLE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*@([A-Za-z_][\w-]*)\s*:\s*([^;]+);\s*$")
        .expect("variable declaration regex should be valid")
});

static VARIABLE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z_][\w-]*)").expect("variable reference regex should be valid"));

/// Options for a single theme build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThemeBuildOptions {
    /// Also produce the CSS variables outputs
    pub css_variables: bool,
    /// Minify the CSS outputs
    pub compress: bool,
}

/// A theme transformation engine.
///
/// `build` is a pure function of its inputs; engines may memoize results
/// until [`ThemeCompiler::clear_cache`] is called.
pub trait ThemeCompiler: Send + Sync {
    /// Build every output for the given `library.source.less` resources.
    fn build(
        &self,
        sources: &[Resource],
        options: &ThemeBuildOptions,
    ) -> Result<Vec<Resource>, String>;

    /// Drop memoized build results.
    fn clear_cache(&self);
}

/// Theme sources kept in the compiler cache.
pub const DEFAULT_THEME_CACHE_SIZE: usize = 64;

/// Outputs of the last build of one source in one mode.
#[derive(Clone)]
struct CachedBuild {
    source_etag: String,
    outputs: Vec<Resource>,
}

/// Variable-substituting theme compiler without LESS evaluation.
///
/// Builds are memoized per source path and mode. Only the latest content
/// of a source is kept, so editing a theme replaces its entry instead of
/// adding one, and the least recently built sources are evicted once the
/// cache is full.
pub struct SourceThemeCompiler {
    cache: Mutex<LruCache<String, CachedBuild>>,
}

impl Default for SourceThemeCompiler {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_THEME_CACHE_SIZE)
    }
}

impl fmt::Debug for SourceThemeCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceThemeCompiler")
            .field("cached_sources", &self.cached_sources())
            .finish()
    }
}

impl SourceThemeCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiler caching at most `capacity` source/mode combinations.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of memoized builds.
    pub fn cached_sources(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    fn build_one(&self, source: &Resource, options: &ThemeBuildOptions) -> Result<Vec<Resource>, String> {
        let text = std::str::from_utf8(source.content())
            .map_err(|e| format!("{} is not valid UTF-8: {e}", source.path()))?;
        let dir = source
            .path()
            .strip_suffix(source.name())
            .unwrap_or("/")
            .to_string();

        let variables: Vec<(String, String)> = VARIABLE_DECL
            .captures_iter(text)
            .map(|c| (c[1].to_string(), c[2].trim().to_string()))
            .collect();
        let resolved = resolve_variables(&variables);
        let rules = VARIABLE_DECL.replace_all(text, "").trim().to_string();

        let css = substitute(&rules, |name| resolved.get(name).cloned());
        let css = if options.compress { minify(&css) } else { css };

        let mut parameters = Map::new();
        for (name, _) in &variables {
            if let Some(value) = resolved.get(name) {
                parameters.insert(name.clone(), Value::String(value.clone()));
            }
        }
        let parameters = serde_json::to_vec(&Value::Object(parameters))
            .map_err(|e| format!("Failed to serialize theme parameters: {e}"))?;

        let output = |name: &str, content: Vec<u8>| {
            Resource::new(format!("{dir}{name}"), content).with_project(source.project().cloned())
        };
        let mut outputs = vec![
            output("library.css", css.clone().into_bytes()),
            output("library-RTL.css", mirror(&css).into_bytes()),
            output("library-parameters.json", parameters),
        ];

        if options.css_variables {
            let declarations: String = variables
                .iter()
                .map(|(name, value)| format!("@{name}: {value};\n"))
                .collect();
            let root: String = variables
                .iter()
                .filter_map(|(name, _)| resolved.get(name).map(|v| format!("  --{name}: {v};\n")))
                .collect();
            let skeleton = substitute(&rules, |name| {
                resolved.contains_key(name).then(|| format!("var(--{name})"))
            });
            outputs.push(output("css_variables.source.less", declarations.into_bytes()));
            outputs.push(output("css_variables.css", format!(":root {{\n{root}}}\n").into_bytes()));
            outputs.push(output("library_skeleton-RTL.css", mirror(&skeleton).into_bytes()));
            outputs.push(output("library_skeleton.css", skeleton.into_bytes()));
        }
        Ok(outputs)
    }
}

impl ThemeCompiler for SourceThemeCompiler {
    fn build(
        &self,
        sources: &[Resource],
        options: &ThemeBuildOptions,
    ) -> Result<Vec<Resource>, String> {
        let mut all = Vec::new();
        for source in sources {
            let key = format!(
                "{}|{}|{}",
                source.path(),
                options.css_variables,
                options.compress
            );
            let source_etag = content_etag(source.content());
            let cached = self.cache.lock().ok().and_then(|mut cache| {
                let hit = cache.get(&key)?;
                (hit.source_etag == source_etag).then(|| hit.outputs.clone())
            });
            let outputs = match cached {
                Some(outputs) => {
                    debug!(source = %source.path(), "Theme build served from compiler cache");
                    outputs
                }
                None => {
                    let outputs = self.build_one(source, options)?;
                    if let Ok(mut cache) = self.cache.lock() {
                        // Replaces the build of an earlier revision of this source
                        cache.put(
                            key,
                            CachedBuild {
                                source_etag,
                                outputs: outputs.clone(),
                            },
                        );
                    }
                    outputs
                }
            };
            all.extend(outputs);
        }
        Ok(all)
    }

    fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

/// Resolve variables that refer to other variables, in declaration order.
fn resolve_variables(variables: &[(String, String)]) -> HashMap<String, String> {
    let mut resolved: HashMap<String, String> = HashMap::new();
    for (name, value) in variables {
        let value = substitute(value, |n| resolved.get(n).cloned());
        resolved.insert(name.clone(), value);
    }
    resolved
}

fn substitute(text: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    VARIABLE_REF
        .replace_all(text, |caps: &regex::Captures<'_>| {
            lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Swap `left` and `right` for right-to-left stylesheets.
fn mirror(css: &str) -> String {
    static SIDES: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\b(left|right|ltr|rtl)\b").expect("side regex should be valid"));
    SIDES
        .replace_all(css, |caps: &regex::Captures<'_>| match &caps[1] {
            "left" => "right",
            "right" => "left",
            "ltr" => "rtl",
            _ => "ltr",
        })
        .into_owned()
}

fn minify(css: &str) -> String {
    css.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "@baseColor: #fff;\n@textColor: @baseColor;\n.button { color: @textColor; margin-left: 1rem; }\n";

    fn source() -> Resource {
        Resource::new(
            "/resources/sap/m/themes/base/library.source.less",
            SOURCE.as_bytes().to_vec(),
        )
    }

    fn output<'a>(outputs: &'a [Resource], name: &str) -> &'a Resource {
        outputs
            .iter()
            .find(|r| r.name() == name)
            .unwrap_or_else(|| panic!("missing {name}"))
    }

    fn text(res: &Resource) -> &str {
        std::str::from_utf8(res.content()).unwrap()
    }

    #[test]
    fn test_default_build_outputs() {
        let compiler = SourceThemeCompiler::new();
        let outputs = compiler
            .build(&[source()], &ThemeBuildOptions::default())
            .unwrap();
        assert_eq!(outputs.len(), 3);
        let css = output(&outputs, "library.css");
        assert_eq!(css.path(), "/resources/sap/m/themes/base/library.css");
        assert_eq!(text(css), ".button { color: #fff; margin-left: 1rem; }");
        assert_eq!(
            text(output(&outputs, "library-RTL.css")),
            ".button { color: #fff; margin-right: 1rem; }"
        );
        let params: Value =
            serde_json::from_slice(output(&outputs, "library-parameters.json").content()).unwrap();
        assert_eq!(params["textColor"], "#fff");
    }

    #[test]
    fn test_css_variables_outputs() {
        let compiler = SourceThemeCompiler::new();
        let options = ThemeBuildOptions {
            css_variables: true,
            ..ThemeBuildOptions::default()
        };
        let outputs = compiler.build(&[source()], &options).unwrap();
        assert_eq!(outputs.len(), THEME_OUTPUTS.len());
        assert!(text(output(&outputs, "css_variables.css")).contains("--baseColor: #fff;"));
        assert!(text(output(&outputs, "library_skeleton.css")).contains("var(--textColor)"));
    }

    #[test]
    fn test_cache_is_keyed_by_mode_and_clearable() {
        let compiler = SourceThemeCompiler::new();
        compiler.build(&[source()], &ThemeBuildOptions::default()).unwrap();
        assert_eq!(compiler.cache.lock().unwrap().len(), 1);
        let options = ThemeBuildOptions {
            css_variables: true,
            ..ThemeBuildOptions::default()
        };
        compiler.build(&[source()], &options).unwrap();
        assert_eq!(compiler.cache.lock().unwrap().len(), 2);
        compiler.clear_cache();
        assert!(compiler.cache.lock().unwrap().is_empty());
    }

    #[test]
    fn test_edited_source_replaces_its_entry() {
        let compiler = SourceThemeCompiler::new();
        for color in ["#000", "#111", "#222", "#333"] {
            let edited = Resource::new(
                "/resources/sap/m/themes/base/library.source.less",
                format!("@textColor: {color};\n.a {{ color: @textColor; }}\n").into_bytes(),
            );
            let outputs = compiler
                .build(&[edited], &ThemeBuildOptions::default())
                .unwrap();
            assert_eq!(text(output(&outputs, "library.css")), format!(".a {{ color: {color}; }}"));
            assert_eq!(compiler.cached_sources(), 1);
        }
    }

    #[test]
    fn test_cache_evicts_least_recently_built_source() {
        let compiler = SourceThemeCompiler::with_capacity(2);
        let theme = |lib: &str| {
            Resource::new(
                format!("/resources/{lib}/themes/base/library.source.less"),
                SOURCE.as_bytes().to_vec(),
            )
        };
        for lib in ["a", "b", "c", "d"] {
            compiler
                .build(&[theme(lib)], &ThemeBuildOptions::default())
                .unwrap();
            assert!(compiler.cached_sources() <= 2);
        }
        let mut cache = compiler.cache.lock().unwrap();
        assert!(cache.get("/resources/d/themes/base/library.source.less|false|false").is_some());
        assert!(cache.get("/resources/a/themes/base/library.source.less|false|false").is_none());
    }
}
