//! `start-agent` - run a courier decision core against a simulator.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use courier_agent::{Driver, SimWorld};
use courier_proto::{AgentConfig, GameConfig, Interval};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "start-agent")]
#[command(about = "Autonomous delivery agent", version)]
struct Cli {
    /// Path to the agent configuration file (JSON).
    #[arg(long)]
    config: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AgentConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    fmt()
        .with_env_filter(EnvFilter::new(config.log_level.as_filter()))
        .with_target(false)
        .init();

    tracing::info!(host = %config.api_host, mode = ?config.mode, "starting agent");

    if let Some(rest) = config.api_host.strip_prefix("local://") {
        let rest = rest.to_string();
        run_local(&rest, config).await
    } else {
        // The socket transport is supplied by the deployment, not this
        // workspace.
        bail!(
            "no transport linked for {:?}; only local:// worlds run standalone",
            config.api_host
        );
    }
}

/// Run against the built-in scripted world. Handy for smoke-testing the
/// decision core without a simulator.
async fn run_local(world_name: &str, config: AgentConfig) -> Result<()> {
    if !world_name.is_empty() && world_name != "demo" {
        bail!("unknown local world {world_name:?}; try local://demo");
    }

    let mut game = GameConfig::default();
    game.map_file = "local-demo".to_string();
    game.movement_duration = Interval::Millis(100);
    game.parcel_decading_interval = Interval::Millis(2_000);

    let map = "\
        P....D\n\
        .#..#.\n\
        S....P\n";
    let (world, events) = SimWorld::new(map, game);
    world.spawn_parcel("p1", 0, 2, 30);
    world.spawn_parcel("p2", 5, 0, 18);

    let driver = Driver::new(config, world.actuator(), events);
    driver.run().await
}
