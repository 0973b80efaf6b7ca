mod cli;
mod commands;
mod logging;
mod ui;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use transforma::config::EngineConfig;
use transforma::registry::JobRegistry;
use transforma::state_machine::JobState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = EngineConfig::load()?;
    if let Some(dir) = cli.jobs_dir {
        config.jobs_dir = dir;
    }
    logging::init(&config.log_level, cli.verbose)?;

    let registry = JobRegistry::with_tokio(&config);

    match cli.command {
        Command::Run { input_value, keep } => {
            let view = commands::run(&registry, input_value, keep).await?;
            if view.state == JobState::Failed {
                anyhow::bail!("job {} failed", view.id);
            }
        }
        Command::Demo => commands::demo(&registry).await?,
        Command::Config => commands::show_config(&config)?,
    }
    Ok(())
}
