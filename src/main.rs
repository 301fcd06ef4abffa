use anyhow::Context;
use clap::Parser;
use log_mailer::{init_logging, run, Cli, MailConfig};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = MailConfig::load_from(&cli.get_config_path())?;
    let hook = config
        .build_hook()
        .context("Failed to set up mail notifications")?;
    let _handle = init_logging(cli.log_level.into(), Some(hook))?;
    run(&cli)?;
    Ok(())
}
