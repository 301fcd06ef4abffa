mod cli;
mod config;
mod entry;
mod error;
mod hook;
mod logging;
mod notification;
#[cfg(test)]
mod test_server;
mod units;

use log::{error, info};

pub use cli::{Cli, LogLevel};
pub use config::{AuthConfig, MailConfig, TlsMode, DEFAULT_CONNECT_TIMEOUT};
pub use entry::{Entry, Severity};
pub use error::NotifyError;
pub use hook::{Hook, HookAppender};
pub use logging::init_logging;
pub use notification::{render_message, MailAuthNotifier, MailNotifier};
pub use units::Seconds;

/// Emits one error entry, which the installed mail hook picks up
pub fn run(cli: &Cli) -> anyhow::Result<()> {
    error!(origin = "cli", pid = std::process::id(); "{}", cli.message);
    log::logger().flush();
    info!("Completed");
    Ok(())
}
