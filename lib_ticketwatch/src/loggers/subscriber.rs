use std::io;
use std::path::PathBuf;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Where and how loudly to log.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Directory for the rolling JSON files; created if missing.
    pub log_dir: PathBuf,
    /// File name prefix, usually the binary name.
    pub file_prefix: String,
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info`.
    pub default_level: String,
}

/// # Init Tracing
///
/// Installs the global subscriber: an ANSI console layer plus a JSON layer
/// writing to a daily rolling file. `RUST_LOG` overrides `default_level`.
///
/// The returned guard flushes the file writer on drop; hold it in `main`.
pub fn init_tracing(settings: &LogSettings) -> io::Result<WorkerGuard> {
    std::fs::create_dir_all(&settings.log_dir)?;

    let file_appender = rolling::daily(&settings.log_dir, &settings.file_prefix);
    let (writer, guard) = non_blocking(file_appender);

    let console_layer = fmt::layer().with_target(true).with_ansi(true);
    let file_layer = fmt::layer().with_ansi(false).with_writer(writer).json();

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.default_level))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    info!(
        level = %settings.default_level,
        dir = %settings.log_dir.display(),
        "Logging initialized"
    );
    Ok(guard)
}
