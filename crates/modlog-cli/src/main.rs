use clap::Parser;
use modlog_cli::config::{Cli, CliConfig};
use modlog_logging::ModlogSubscriberBuilder;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CliConfig::load(cli.config.as_deref())?;
    config.apply(&cli);

    // Keep the guard alive so file logs are flushed on exit
    let _guard = ModlogSubscriberBuilder::new()
        .with_config(config.logging.clone())
        .init()?;

    let stdout = std::io::stdout();
    modlog_cli::run(cli.command, &config, &mut stdout.lock())
}
