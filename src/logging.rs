// Copied and edited based on https://github.com/estk/log4rs/pull/295

use anyhow::Context;
use log::LevelFilter;
use log4rs::Handle;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        rolling_file::{
            policy::compound::{
                roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
            },
            RollingFileAppender,
        },
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};

use crate::{Hook, HookAppender};

/// Sets up file and stderr logging, plus `hook` for error level records if supplied
pub fn init_logging(level: LevelFilter, hook: Option<Box<dyn Hook>>) -> anyhow::Result<Handle> {
    let config = build_config(level, hook, "log")?;

    // Use this to change log levels at runtime.
    // This means you can change the default log level to trace
    // if you are trying to debug an issue and need more logs on then turn it off
    // once you are done.
    let handle = log4rs::init_config(config).context("Failed to init_config")?;

    Ok(handle)
}

fn build_config(level: LevelFilter, hook: Option<Box<dyn Hook>>, log_dir: &str) -> anyhow::Result<Config> {
    let file_path = format!("{log_dir}/file.log");
    let archive_pattern = format!("{log_dir}/file_{{}}.log");
    // Pattern: https://docs.rs/log4rs/*/log4rs/append/rolling_file/policy/compound/roll/fixed_window/struct.FixedWindowRollerBuilder.html#method.build

    // Build a stderr logger.
    let stderr = ConsoleAppender::builder().target(Target::Stderr).build();

    // Create a policy to use with the file logging
    let trigger = SizeTrigger::new(2_097_152); // 2mb (2 * 1024 * 1024)
    let roller = FixedWindowRoller::builder()
        .build(&archive_pattern, 10) // Roll based on pattern and max 10 archive files
        .context("Failed to create FixedWindowRoller")?;
    let policy = CompoundPolicy::new(Box::new(trigger), Box::new(roller));

    // Logging to log file. (with rolling)
    let log_file = RollingFileAppender::builder()
        // Pattern: https://docs.rs/log4rs/*/log4rs/encode/pattern/index.html
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} {l} - {m}\n",
        )))
        .build(&file_path, Box::new(policy))
        .with_context(|| format!("Failed to create log file at {file_path:?}"))?;

    let mut builder = Config::builder()
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(level)))
                .build("log_file", Box::new(log_file)),
        )
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(level)))
                .build("stderr", Box::new(stderr)),
        );
    let mut root = Root::builder().appender("log_file").appender("stderr");

    // The hook must see errors even if everything else is turned down
    let root_level = match hook {
        Some(hook) => {
            builder = builder.appender(
                Appender::builder()
                    .filter(Box::new(ThresholdFilter::new(LevelFilter::Error)))
                    .build("mail", Box::new(HookAppender::new(hook))),
            );
            root = root.appender("mail");
            level.max(LevelFilter::Error)
        }
        None => level,
    };

    builder
        .build(root.build(root_level))
        .context("Failed to configure logging")
}
