use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::ProjectConfig;
use crate::csp::SapTargetCsp;
use crate::extension::ExtensionRegistry;
use crate::middleware::Pipeline;
use crate::server::{build_pipeline, serve, ServerHandle, ServerOptions, DEFAULT_PORT};
use crate::theme::SourceThemeCompiler;

/// Command-line interface for the dev server
#[derive(Parser, Debug)]
#[command(name = "brrtserve", version, about = "Development server for UI5 style projects")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve a project with the standard middleware pipeline
    Serve {
        /// Project configuration file
        #[arg(short, long, default_value = "ui5.yaml")]
        config: PathBuf,

        /// Port to bind; overrides the configuration file
        #[arg(short, long)]
        port: Option<u16>,

        /// Try the next ports when the requested one is taken
        #[arg(long, default_value_t = false)]
        change_port_if_in_use: bool,

        /// Listen on all interfaces instead of localhost only
        #[arg(long, default_value_t = false)]
        accept_remote_connections: bool,

        /// Send the SAP target CSP policies as report-only headers
        #[arg(long, default_value_t = false)]
        sap_csp_policies: bool,

        /// Keep CSP violation reports and serve them as JSON
        #[arg(long, default_value_t = false)]
        serve_csp_reports: bool,

        /// Render directory listings without styling
        #[arg(long, default_value_t = false)]
        simple_index: bool,
    },
    /// Print the assembled middleware pipeline in execution order
    Middleware {
        /// Project configuration file
        #[arg(short, long, default_value = "ui5.yaml")]
        config: PathBuf,

        /// Include the CSP middleware as if `--sap-csp-policies` was given
        #[arg(long, default_value_t = false)]
        sap_csp_policies: bool,
    },
}

impl Commands {
    fn server_options(&self, config: &ProjectConfig) -> ServerOptions {
        match self {
            Commands::Serve {
                port,
                change_port_if_in_use,
                accept_remote_connections,
                sap_csp_policies,
                serve_csp_reports,
                simple_index,
                ..
            } => ServerOptions {
                port: port.or(config.port()).unwrap_or(DEFAULT_PORT),
                change_port_if_in_use: *change_port_if_in_use,
                accept_remote_connections: *accept_remote_connections,
                send_sap_target_csp: sap_csp_policies.then(SapTargetCsp::default),
                serve_csp_reports: *serve_csp_reports,
                simple_index: *simple_index,
                cors: config.cors_options(),
            },
            Commands::Middleware {
                sap_csp_policies, ..
            } => ServerOptions {
                port: config.port().unwrap_or(DEFAULT_PORT),
                send_sap_target_csp: sap_csp_policies.then(SapTargetCsp::default),
                cors: config.cors_options(),
                ..ServerOptions::default()
            },
        }
    }

    fn config_path(&self) -> &Path {
        match self {
            Commands::Serve { config, .. } | Commands::Middleware { config, .. } => config,
        }
    }
}

fn assemble(config: &ProjectConfig, options: &ServerOptions) -> anyhow::Result<Pipeline> {
    let graph = config.to_graph()?;
    let pipeline = build_pipeline(
        graph,
        Arc::new(SourceThemeCompiler::new()),
        options,
        config.custom_middleware(),
        &ExtensionRegistry::new(),
    )
    .with_context(|| format!("Failed to assemble middleware for {}", config.project.name))?;
    Ok(pipeline)
}

/// Execute the CLI command provided by the user
///
/// # Errors
///
/// Returns an error if:
/// - The configuration file cannot be read or is invalid
/// - The middleware pipeline cannot be assembled
/// - The server fails to bind its port
pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let config = ProjectConfig::load(cli.command.config_path())?;
    let options = cli.command.server_options(&config);
    let pipeline = assemble(&config, &options)?;

    match cli.command {
        Commands::Serve { .. } => {
            let handle = serve(pipeline, &options)
                .with_context(|| format!("Failed to start server on port {}", options.port))?;
            println!("Server started at http://{}", handle.addr());
            wait_for_shutdown(handle)
        }
        Commands::Middleware { .. } => {
            for entry in pipeline.entries() {
                if entry.mount_path == "/" {
                    println!("{}", entry.name);
                } else {
                    println!("{} (mounted at {})", entry.name, entry.mount_path);
                }
            }
            Ok(())
        }
    }
}

#[cfg(unix)]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "Shutting down");
    }
    handle.stop();
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    handle
        .join()
        .map_err(|e| anyhow::anyhow!("server coroutine panicked: {e:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["brrtserve", "serve"]).unwrap();
        match cli.command {
            Commands::Serve {
                config,
                port,
                sap_csp_policies,
                ..
            } => {
                assert_eq!(config, PathBuf::from("ui5.yaml"));
                assert_eq!(port, None);
                assert!(!sap_csp_policies);
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_port_flag_overrides_config() {
        let config = ProjectConfig::from_yaml(
            "project: {name: a}\nserver: {settings: {port: 9000}}\n",
            PathBuf::new(),
        )
        .unwrap();

        let cli = Cli::try_parse_from(["brrtserve", "serve", "--port", "3000"]).unwrap();
        assert_eq!(cli.command.server_options(&config).port, 3000);

        let cli = Cli::try_parse_from(["brrtserve", "serve", "--sap-csp-policies"]).unwrap();
        let options = cli.command.server_options(&config);
        assert_eq!(options.port, 9000);
        assert_eq!(options.send_sap_target_csp, Some(SapTargetCsp::default()));
    }

    #[test]
    fn test_middleware_command_parses() {
        let cli =
            Cli::try_parse_from(["brrtserve", "middleware", "-c", "project/ui5.yaml"]).unwrap();
        assert_eq!(cli.command.config_path(), Path::new("project/ui5.yaml"));
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Cli::try_parse_from(["brrtserve", "serve", "--watch"]).is_err());
    }
}
