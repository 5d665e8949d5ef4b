// transparenc/crates/transparenc/src/main.rs

#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use transparenc::{cli::Cli, config::Config, metrics, telemetry};

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(if cli.verbose { "debug" } else { "warn" });
    metrics::init_metrics()?;

    let cfg = cli.apply_overrides(Config::from_env()?)?;
    cfg.print_config();

    transparenc::cli::run(cli, cfg).await
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
