use clap::Parser;
use lib_ticketwatch::retrieve::DEFAULT_BASE_URL;
use lib_ticketwatch::sync::policy::{MAX_POLL_SECS, MIN_POLL_SECS};
use lib_ticketwatch::{ActiveHours, SyncPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_PORT: u16 = 8880;
const DEFAULT_POLL_SECS: u64 = 30;
const DEFAULT_STATUS_SECS: u64 = 60;
const DEFAULT_API_START: u32 = 6;
const DEFAULT_API_END: u32 = 18;
const DEFAULT_CONFIG_FILE: &str = "server_tickets.json";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Live dashboard of unassigned Autotask tickets", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "TICKETS_PORT", help = "Port to serve the dashboard on.")]
    pub port: Option<u16>,

    #[clap(long, env = "TICKETS_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "TICKETS_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "TICKETS_LOG_LEVEL", help = "Default log filter when RUST_LOG is unset.")]
    pub log_level: Option<String>,

    #[clap(long = "pollrate", env = "TICKETS_POLL_RATE", help = "Seconds between API polls (1-7200).")]
    pub poll_rate_secs: Option<u64>,

    #[clap(long, env = "TICKETS_STATUS_INTERVAL", help = "Seconds between status heartbeats.")]
    pub status_interval_secs: Option<u64>,

    #[clap(long = "filepath", env = "TICKETS_VAULT_PATH", help = "Path of the encrypted credentials file.")]
    pub vault_path: Option<PathBuf>,

    #[clap(long = "apistart", env = "TICKETS_API_START", help = "First hour (0-22) the API is polled.")]
    pub api_start_hour: Option<u32>,

    #[clap(long = "apiend", env = "TICKETS_API_END", help = "Hour (1-23) polling stops.")]
    pub api_end_hour: Option<u32>,

    #[clap(
        long = "verboseapi",
        env = "TICKETS_VERBOSE_API",
        num_args = 0..=1,
        default_missing_value = "true",
        help = "Log every poll and skipped cycle."
    )]
    pub verbose_api: Option<bool>,

    #[clap(
        long = "loghttp",
        env = "TICKETS_LOG_HTTP",
        num_args = 0..=1,
        default_missing_value = "true",
        help = "Trace every HTTP request."
    )]
    pub log_http: Option<bool>,

    #[clap(long, env = "TICKETS_API_BASE_URL", help = "Autotask REST base URL.")]
    pub api_base_url: Option<String>,

    #[clap(long, env = "TICKETS_REQUEST_TIMEOUT", help = "Seconds before an API request is abandoned.")]
    pub request_timeout_secs: Option<u64>,

    #[clap(long, env = "TICKETS_WRITE_TIMEOUT", help = "Seconds before a stalled viewer is dropped.")]
    pub write_timeout_secs: Option<u64>,
}

/// Validated, fully-defaulted settings the server runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub vault_path: PathBuf,
    pub log_http: bool,
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub write_timeout: Duration,
    pub policy: SyncPolicy,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            poll_rate_secs: other.poll_rate_secs.or(self.poll_rate_secs),
            status_interval_secs: other.status_interval_secs.or(self.status_interval_secs),
            vault_path: other.vault_path.or(self.vault_path),
            api_start_hour: other.api_start_hour.or(self.api_start_hour),
            api_end_hour: other.api_end_hour.or(self.api_end_hour),
            verbose_api: other.verbose_api.or(self.verbose_api),
            log_http: other.log_http.or(self.log_http),
            api_base_url: other.api_base_url.or(self.api_base_url),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
            write_timeout_secs: other.write_timeout_secs.or(self.write_timeout_secs),
        }
    }

    fn defaults() -> Config {
        Config {
            port: Some(DEFAULT_PORT),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            poll_rate_secs: Some(DEFAULT_POLL_SECS),
            status_interval_secs: Some(DEFAULT_STATUS_SECS),
            vault_path: Some(PathBuf::from("secrets.bin")),
            api_start_hour: Some(DEFAULT_API_START),
            api_end_hour: Some(DEFAULT_API_END),
            verbose_api: Some(false),
            log_http: Some(false),
            api_base_url: Some(DEFAULT_BASE_URL.to_string()),
            request_timeout_secs: Some(10),
            write_timeout_secs: Some(5),
            ..Default::default()
        }
    }

    /// # Resolve
    ///
    /// Applies defaults and validation. Out-of-range values fall back to
    /// their defaults; each fallback adds a warning for the caller to log
    /// once tracing is up.
    pub fn resolve(&self) -> (Settings, Vec<String>) {
        let mut warnings = Vec::new();
        let merged = Config::defaults().merge(self.clone());

        let port = match merged.port {
            Some(0) | None => {
                warnings.push(format!("Invalid port, using default {}", DEFAULT_PORT));
                DEFAULT_PORT
            }
            Some(port) => port,
        };

        let poll_secs = match merged.poll_rate_secs {
            Some(secs) if (MIN_POLL_SECS..=MAX_POLL_SECS).contains(&secs) => secs,
            other => {
                warnings.push(format!(
                    "Invalid poll rate {:?}, must be {}-{} seconds; using default {}",
                    other, MIN_POLL_SECS, MAX_POLL_SECS, DEFAULT_POLL_SECS
                ));
                DEFAULT_POLL_SECS
            }
        };

        let status_secs = match merged.status_interval_secs {
            Some(secs) if secs > 0 => secs,
            _ => {
                warnings.push(format!("Invalid status interval, using default {}", DEFAULT_STATUS_SECS));
                DEFAULT_STATUS_SECS
            }
        };

        let start = merged.api_start_hour.unwrap_or(DEFAULT_API_START);
        let end = merged.api_end_hour.unwrap_or(DEFAULT_API_END);
        let active_hours = ActiveHours::new(start, end).unwrap_or_else(|e| {
            warnings.push(format!(
                "{}; using default active hours {}-{}",
                e, DEFAULT_API_START, DEFAULT_API_END
            ));
            ActiveHours::default()
        });

        let policy = SyncPolicy::new(
            Duration::from_secs(poll_secs),
            Duration::from_secs(status_secs),
            active_hours,
        )
        .unwrap_or_default()
        .with_verbose(merged.verbose_api.unwrap_or(false));

        let settings = Settings {
            port,
            log_dir: merged.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
            log_level: merged.log_level.unwrap_or_else(|| "info".to_string()),
            vault_path: merged.vault_path.unwrap_or_else(|| PathBuf::from("secrets.bin")),
            log_http: merged.log_http.unwrap_or(false),
            api_base_url: merged
                .api_base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            request_timeout: Duration::from_secs(merged.request_timeout_secs.unwrap_or(10).max(1)),
            write_timeout: Duration::from_secs(merged.write_timeout_secs.unwrap_or(5).max(1)),
            policy,
        };
        (settings, warnings)
    }
}

/// Reads a JSON config file. Missing files are normal; unreadable or
/// malformed ones produce a warning and are ignored.
fn read_config_file(path: &Path, warnings: &mut Vec<String>) -> Option<Config> {
    if !path.exists() {
        return None;
    }
    match fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str::<Config>(&text) {
            Ok(config) => Some(config),
            Err(e) => {
                warnings.push(format!("Failed to parse config file {}: {}", path.display(), e));
                None
            }
        },
        Err(e) => {
            warnings.push(format!("Failed to read config file {}: {}", path.display(), e));
            None
        }
    }
}

/// Layers file config under CLI/env values and resolves the result.
pub fn settings_from(cli: Config) -> (Settings, Vec<String>) {
    let mut file_warnings = Vec::new();
    let path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let layered = match read_config_file(&path, &mut file_warnings) {
        Some(file) => file.merge(cli),
        None => cli,
    };

    let (settings, mut warnings) = layered.resolve();
    file_warnings.append(&mut warnings);
    (settings, file_warnings)
}

/// Parses CLI arguments and environment, then layers the config file.
pub fn load_settings() -> (Settings, Vec<String>) {
    settings_from(Config::parse())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let (settings, warnings) = Config::default().resolve();

        assert!(warnings.is_empty());
        assert_eq!(settings.port, 8880);
        assert_eq!(settings.policy.poll_interval, Duration::from_secs(30));
        assert_eq!(settings.policy.status_interval, Duration::from_secs(60));
        assert_eq!(settings.policy.active_hours, ActiveHours::new(6, 18).unwrap());
        assert_eq!(settings.vault_path, PathBuf::from("secrets.bin"));
        assert!(!settings.log_http);
        assert!(!settings.policy.verbose);
    }

    #[test]
    fn test_invalid_poll_rate_keeps_port() {
        let config = Config {
            port: Some(9000),
            poll_rate_secs: Some(0),
            ..Default::default()
        };

        let (settings, warnings) = config.resolve();

        assert_eq!(settings.port, 9000);
        assert_eq!(settings.policy.poll_interval, Duration::from_secs(30));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_poll_rate_upper_bound() {
        let ok = Config {
            poll_rate_secs: Some(7200),
            ..Default::default()
        };
        let too_slow = Config {
            poll_rate_secs: Some(7201),
            ..Default::default()
        };

        assert_eq!(ok.resolve().0.policy.poll_interval, Duration::from_secs(7200));
        assert_eq!(too_slow.resolve().0.policy.poll_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_hours_reset_both() {
        for (start, end) in [(10, 10), (12, 8), (0, 24), (23, 23), (5, 0)] {
            let config = Config {
                api_start_hour: Some(start),
                api_end_hour: Some(end),
                ..Default::default()
            };

            let (settings, warnings) = config.resolve();

            assert_eq!(settings.policy.active_hours, ActiveHours::default(), "{start}-{end}");
            assert_eq!(warnings.len(), 1);
        }
    }

    #[test]
    fn test_valid_hours_kept() {
        let config = Config {
            api_start_hour: Some(0),
            api_end_hour: Some(23),
            ..Default::default()
        };

        let hours = config.resolve().0.policy.active_hours;

        assert_eq!((hours.start(), hours.end()), (0, 23));
    }

    #[test]
    fn test_cli_flags() {
        let cli = Config::try_parse_from([
            "server_tickets",
            "--port",
            "9100",
            "--pollrate",
            "45",
            "--loghttp",
            "--verboseapi",
            "--apistart",
            "7",
            "--apiend",
            "19",
            "--filepath",
            "/tmp/vault.bin",
        ])
        .unwrap();

        let (settings, _) = cli.resolve();

        assert_eq!(settings.port, 9100);
        assert_eq!(settings.policy.poll_interval, Duration::from_secs(45));
        assert!(settings.log_http);
        assert!(settings.policy.verbose);
        assert_eq!(settings.policy.active_hours, ActiveHours::new(7, 19).unwrap());
        assert_eq!(settings.vault_path, PathBuf::from("/tmp/vault.bin"));
    }

    #[test]
    fn test_file_values_sit_under_cli() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 7000, "pollRateSecs": 120, "logHttp": true}}"#).unwrap();

        let cli = Config {
            config_path: Some(file.path().to_path_buf()),
            port: Some(7100),
            ..Default::default()
        };

        let (settings, warnings) = settings_from(cli);

        assert!(warnings.is_empty());
        assert_eq!(settings.port, 7100);
        assert_eq!(settings.policy.poll_interval, Duration::from_secs(120));
        assert!(settings.log_http);
    }

    #[test]
    fn test_malformed_file_is_ignored() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let cli = Config {
            config_path: Some(file.path().to_path_buf()),
            ..Default::default()
        };

        let (settings, warnings) = settings_from(cli);

        assert_eq!(settings.port, 8880);
        assert_eq!(warnings.len(), 1);
    }
}
