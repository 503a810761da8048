use std::io;
use std::net::TcpListener;
use std::sync::Arc;
use tracing::{info, warn};

use super::http_server::{HttpServer, ServerHandle};
use super::options::ServerOptions;
use super::service::DevService;
use crate::extension::ExtensionRegistry;
use crate::middleware::{
    CustomMiddlewareDeclaration, MiddlewareContext, MiddlewareManager, Pipeline, PipelineError,
};
use crate::resources::ProjectGraph;
use crate::theme::ThemeCompiler;

/// Ports tried above the configured one when it is taken.
const PORT_SEARCH_LIMIT: u16 = 30;

/// Assemble the standard and custom middleware for a project.
pub fn build_pipeline(
    graph: ProjectGraph,
    theme_compiler: Arc<dyn ThemeCompiler>,
    options: &ServerOptions,
    custom: &[CustomMiddlewareDeclaration],
    extensions: &ExtensionRegistry,
) -> Result<Pipeline, PipelineError> {
    let mut manager = MiddlewareManager::new(MiddlewareContext::new(graph, theme_compiler));
    manager.add_standard_middleware(options)?;
    manager.add_custom_middleware(custom, extensions)?;
    info!(middleware = manager.len(), "Pipeline assembled");
    Ok(manager.into_pipeline())
}

/// Find the port to bind.
///
/// Returns `port` when it is free. Otherwise, with `change_port_if_in_use`,
/// the next free port above it.
pub fn resolve_port(host: &str, port: u16, change_port_if_in_use: bool) -> io::Result<u16> {
    let limit = if change_port_if_in_use {
        PORT_SEARCH_LIMIT
    } else {
        0
    };
    for offset in 0..=limit {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        match TcpListener::bind((host, candidate)) {
            Ok(listener) => {
                let bound = listener.local_addr()?.port();
                if offset > 0 {
                    warn!(requested = port, port = bound, "Port in use, using next free port");
                }
                return Ok(bound);
            }
            Err(err) if err.kind() == io::ErrorKind::AddrInUse => continue,
            Err(err) => return Err(err),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AddrInUse,
        format!("Port {port} is already in use"),
    ))
}

/// Start serving an assembled pipeline.
pub fn serve(pipeline: Pipeline, options: &ServerOptions) -> io::Result<ServerHandle> {
    let host = options.host();
    let port = resolve_port(host, options.port, options.change_port_if_in_use)?;
    let handle = HttpServer(DevService::new(pipeline)).start((host, port))?;
    info!(addr = %handle.addr(), "Server started");
    Ok(handle)
}
