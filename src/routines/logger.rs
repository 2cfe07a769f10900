use std::fs::File;
use std::sync::Mutex;
use std::time::Instant;

use crate::routines::settings::Settings;
use eyre::{eyre, Result, WrapErr};
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Setup logging for the library
///
/// This function sets up logging for the library. It uses the `tracing` crate, and the `tracing-subscriber` crate for formatting.
///
/// The log level is defined in the configuration file, and defaults to `INFO`.
///
/// Log messages are always written to stdout. If `log.file` is specified in the configuration file, a log file is created with the specified name and receives the same messages.
///
/// Fails if a global subscriber has already been installed, for example by an earlier call.
pub fn setup_log(settings: &Settings) -> Result<()> {
    // Use the log level defined in configuration file
    let log_level = settings.log.level.as_str();
    let env_filter = EnvFilter::try_new(log_level)
        .wrap_err_with(|| format!("Invalid log level: {}", log_level))?;

    let timestamper = CompactTimestamp {
        start: Instant::now(),
    };

    // Define layer for file
    let file_layer = match &settings.log.file {
        Some(path) => {
            let file = File::create(path)
                .wrap_err_with(|| format!("Could not create log file {}", path))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_timer(timestamper.clone()),
            )
        }
        None => None,
    };

    // Define layer for stdout
    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(false)
        .with_timer(timestamper);

    // Combine layers with a registry filtered at the configured level
    Registry::default()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| eyre!("Could not install the log subscriber: {}", e))?;

    Ok(())
}

/// Elapsed time since logging was set up, as `00h 00m 00s`
#[derive(Clone)]
struct CompactTimestamp {
    start: Instant,
}

impl FormatTime for CompactTimestamp {
    fn format_time(
        &self,
        w: &mut tracing_subscriber::fmt::format::Writer<'_>,
    ) -> Result<(), std::fmt::Error> {
        let elapsed = self.start.elapsed();
        let hours = elapsed.as_secs() / 3600;
        let minutes = (elapsed.as_secs() % 3600) / 60;
        let seconds = elapsed.as_secs() % 60;

        write!(w, "{:02}h {:02}m {:02}s", hours, minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_level() {
        let mut settings = Settings::new();
        settings.log.level = String::from("tncore=loud");
        assert!(setup_log(&settings).is_err());
    }
}
