use brrtserve::cli::{run_cli, Cli};
use brrtserve::logging::{init_logging, LogConfig};
use brrtserve::runtime_config::RuntimeConfig;
use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&LogConfig::from_env())?;
    RuntimeConfig::from_env().apply();
    run_cli(cli)
}
