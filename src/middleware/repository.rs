use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

use super::pipeline::AddOptions;
use super::{
    compression, cors, csp, discovery, non_read, serve_index, serve_resources, serve_themes,
    test_runner, version_info, Middleware,
};
use crate::csp::{server_policy_configuration, POLICY_PARAMETER};
use crate::extension::MiddlewareUtil;
use crate::resources::{MiddlewareResources, ProjectGraph};
use crate::server::ServerOptions;
use crate::theme::ThemeCompiler;

/// Builds a middleware from the server context and its options.
///
/// Options are `Null` unless a wrapper supplies them.
pub type MiddlewareFactory =
    Arc<dyn Fn(&MiddlewareContext, &Value) -> Result<Arc<dyn Middleware>, String> + Send + Sync>;

/// What every middleware factory gets to work with.
#[derive(Clone)]
pub struct MiddlewareContext {
    pub resources: MiddlewareResources,
    pub graph: Arc<ProjectGraph>,
    pub util: MiddlewareUtil,
    pub theme_compiler: Arc<dyn ThemeCompiler>,
}

impl MiddlewareContext {
    pub fn new(graph: ProjectGraph, theme_compiler: Arc<dyn ThemeCompiler>) -> Self {
        let resources = MiddlewareResources::from_graph(&graph);
        let graph = Arc::new(graph);
        Self {
            resources,
            util: MiddlewareUtil::new(Arc::clone(&graph)),
            graph,
            theme_compiler,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        use crate::resources::{ProjectInfo, ProjectKind, PropertiesEncoding};
        let root = ProjectInfo {
            name: "test.app".to_string(),
            version: "1.0.0".to_string(),
            namespace: None,
            kind: ProjectKind::Application,
            properties_encoding: PropertiesEncoding::Utf8,
        };
        Self::new(
            ProjectGraph::new(root),
            Arc::new(crate::theme::SourceThemeCompiler::new()),
        )
    }
}

impl fmt::Debug for MiddlewareContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareContext")
            .field("root", &self.graph.root().name)
            .finish_non_exhaustive()
    }
}

/// Standard middleware names in installation order.
pub const STANDARD_MIDDLEWARE: [&str; 10] = [
    "csp",
    "compression",
    "cors",
    "discovery",
    "serveResources",
    "testRunner",
    "serveThemes",
    "versionInfo",
    "nonReadRequests",
    "serveIndex",
];

/// Raw factory of a standard middleware.
pub fn standard_factory(name: &str) -> Option<MiddlewareFactory> {
    let factory: MiddlewareFactory = match name {
        "csp" => Arc::new(csp::create),
        "compression" => Arc::new(compression::create),
        "cors" => Arc::new(cors::create),
        "discovery" => Arc::new(discovery::create),
        "serveResources" => Arc::new(serve_resources::create),
        "testRunner" => Arc::new(test_runner::create),
        "serveThemes" => Arc::new(serve_themes::create),
        "versionInfo" => Arc::new(version_info::create),
        "nonReadRequests" => Arc::new(non_read::create),
        "serveIndex" => Arc::new(serve_index::create),
        _ => return None,
    };
    Some(factory)
}

/// Install plan for the standard middleware.
///
/// Server options reach the built-in factories through wrappers, so the
/// built-ins themselves stay option-agnostic.
pub fn standard_middleware(options: &ServerOptions) -> Vec<(&'static str, AddOptions)> {
    let policy_config = server_policy_configuration(
        options.send_sap_target_csp.as_ref(),
        options.serve_csp_reports,
    );
    let csp_options = json!({
        "parameterName": POLICY_PARAMETER,
        "config": policy_config,
    });
    let index_options = json!({ "simpleIndex": options.simple_index, "showHidden": true });

    vec![
        ("csp", AddOptions::default().wrapped(with_options(csp_options))),
        ("compression", AddOptions::default()),
        ("cors", AddOptions::default().wrapped(with_options(options.cors.clone()))),
        ("discovery", AddOptions::default().mounted("/discovery")),
        ("serveResources", AddOptions::default()),
        ("testRunner", AddOptions::default()),
        ("serveThemes", AddOptions::default()),
        (
            "versionInfo",
            AddOptions::default().mounted("/resources/sap-ui-version.json"),
        ),
        // Non-read requests are rejected with 404 before the index logic runs
        ("nonReadRequests", AddOptions::default()),
        ("serveIndex", AddOptions::default().wrapped(with_options(index_options))),
    ]
}

/// Wrapper that calls the raw factory with fixed options.
pub fn with_options(options: Value) -> impl FnOnce(MiddlewareFactory) -> MiddlewareFactory {
    move |raw: MiddlewareFactory| -> MiddlewareFactory {
        Arc::new(move |ctx: &MiddlewareContext, _: &Value| raw(ctx, &options))
    }
}
