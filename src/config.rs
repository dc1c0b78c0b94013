use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub channels: ChannelConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Last digits of an observed game number that open a prediction
    #[serde(default = "default_trigger_digits")]
    pub trigger_digits: Vec<u8>,
    /// Chance of skipping a trigger whose digit fired the previous prediction (0 disables)
    #[serde(default = "default_skip_probability")]
    pub variability_skip_probability: f64,
    /// Glyphs that mark an event as a result worth verifying
    #[serde(default = "default_verification_markers")]
    pub verification_markers: Vec<String>,
    /// Glyph meaning "more than two cards dealt, check again later"
    #[serde(default = "default_overflow_marker")]
    pub overflow_marker: String,
    /// Fixed RNG seed (tests, replays)
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_trigger_digits() -> Vec<u8> {
    vec![6, 7, 8, 9]
}

fn default_skip_probability() -> f64 {
    0.3
}

fn default_verification_markers() -> Vec<String> {
    ["✅", "🔰", "❌", "⭕", "⏰"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_overflow_marker() -> String {
    "⏰".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trigger_digits: default_trigger_digits(),
            variability_skip_probability: default_skip_probability(),
            verification_markers: default_verification_markers(),
            overflow_marker: default_overflow_marker(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Number of resolutions per batch report
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    20
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Run the autonomous timetable alongside the feed
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of entries in a freshly generated timetable
    #[serde(default = "default_horizon")]
    pub horizon: usize,
    /// Minutes between consecutive prediction times
    #[serde(default = "default_spacing_minutes")]
    pub spacing_minutes: i64,
    /// Lower bound of the randomized launch lead
    #[serde(default = "default_lead_min")]
    pub lead_min_minutes: i64,
    /// Upper bound of the randomized launch lead
    #[serde(default = "default_lead_max")]
    pub lead_max_minutes: i64,
    /// Seconds between launch polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Seconds to wait after a failed poll cycle
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,
    /// Fixed RNG seed (tests, replays)
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_horizon() -> usize {
    12
}

fn default_spacing_minutes() -> i64 {
    60
}

fn default_lead_min() -> i64 {
    1
}

fn default_lead_max() -> i64 {
    4
}

fn default_poll_interval() -> u64 {
    30
}

fn default_error_backoff() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            horizon: default_horizon(),
            spacing_minutes: default_spacing_minutes(),
            lead_min_minutes: default_lead_min(),
            lead_max_minutes: default_lead_max(),
            poll_interval_secs: default_poll_interval(),
            error_backoff_secs: default_error_backoff(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelConfig {
    /// Only feed messages from this channel are read when set
    #[serde(default)]
    pub stat_channel: Option<i64>,
    /// Channel predictions and reports are sent to
    #[serde(default)]
    pub display_channel: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// JSON file holding the day's timetable
    #[serde(default = "default_schedule_path")]
    pub schedule_path: PathBuf,
    /// PostgreSQL URL; when set the timetable is stored in the database instead
    #[serde(default)]
    pub database_url: Option<String>,
}

fn default_schedule_path() -> PathBuf {
    PathBuf::from("prediction.json")
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            schedule_path: default_schedule_path(),
            database_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Drop exact redeliveries of a message before processing
    #[serde(default)]
    pub dedupe_messages: bool,
    /// Number of message hashes remembered
    #[serde(default = "default_dedupe_capacity")]
    pub dedupe_capacity: usize,
}

fn default_dedupe_capacity() -> usize {
    1024
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            dedupe_messages: false,
            dedupe_capacity: default_dedupe_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("report.batch_size", 20)?
            .set_default("scheduler.poll_interval_secs", 30)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("TABLEAU_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (TABLEAU__ENGINE__SEED, etc.)
            .add_source(
                Environment::with_prefix("TABLEAU")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load from an explicit file, falling back to defaults when it is missing
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("TABLEAU")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.engine.trigger_digits.is_empty() {
            errors.push("engine.trigger_digits must not be empty".to_string());
        }
        if self.engine.trigger_digits.iter().any(|d| *d > 9) {
            errors.push("engine.trigger_digits must be decimal digits (0-9)".to_string());
        }
        let p = self.engine.variability_skip_probability;
        if !(0.0..=1.0).contains(&p) {
            errors.push("engine.variability_skip_probability must be between 0 and 1".to_string());
        }
        if self.engine.verification_markers.is_empty() {
            errors.push("engine.verification_markers must not be empty".to_string());
        }

        if self.report.batch_size == 0 {
            errors.push("report.batch_size must be > 0".to_string());
        }

        let s = &self.scheduler;
        if s.horizon == 0 {
            errors.push("scheduler.horizon must be > 0".to_string());
        }
        if s.spacing_minutes <= 0 {
            errors.push("scheduler.spacing_minutes must be > 0".to_string());
        }
        if s.lead_min_minutes < 0 || s.lead_min_minutes > s.lead_max_minutes {
            errors.push("scheduler lead bounds must satisfy 0 <= min <= max".to_string());
        }
        if s.lead_max_minutes >= s.spacing_minutes {
            errors.push("scheduler.lead_max_minutes must be below spacing_minutes".to_string());
        }
        if s.poll_interval_secs == 0 {
            errors.push("scheduler.poll_interval_secs must be > 0".to_string());
        }
        // Launches fire only inside their own minute slot
        if s.poll_interval_secs > 60 {
            errors.push("scheduler.poll_interval_secs must be <= 60".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            report: ReportConfig::default(),
            scheduler: SchedulerConfig::default(),
            channels: ChannelConfig::default(),
            persistence: PersistenceConfig::default(),
            feed: FeedConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
