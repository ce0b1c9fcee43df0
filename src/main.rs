use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cellnet::{
    engine::{Engine, EngineSettings},
    scenario::ScenarioLoader,
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Cellular network simulator")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/two_zones.yaml")]
    scenario: PathBuf,

    /// Serve the HTTP API instead of printing a run report
    #[arg(long)]
    serve: bool,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Log filter (overrides `logging.level` from the scenario config)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&cli.scenario)?;

    let directive = cli
        .log_level
        .clone()
        .unwrap_or_else(|| scenario.config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)),
        )
        .with_target(false)
        .init();

    if cli.serve {
        let runtime = tokio::runtime::Runtime::new()?;
        return runtime.block_on(web::run(WebServerConfig {
            scenario,
            host: cli.host,
            port: cli.port,
        }));
    }

    let mut directory = scenario.build_directory()?;
    let mut engine = Engine::new(EngineSettings {
        scenario_name: scenario.name.clone(),
        seed: scenario.seed,
    });
    let summary = engine.run(&mut directory, &scenario.steps)?;

    println!("{}", serde_json::to_string_pretty(&directory.snapshot())?);
    println!(
        "Scenario '{}' completed: {} steps, {} moves ({} handovers), {} calls established, {} rejected.",
        scenario.name,
        summary.steps,
        summary.moves,
        summary.handovers,
        summary.calls_established,
        summary.rejected
    );
    Ok(())
}
