use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Prefix of every environment override (`AUTOPATTERN_KIBANA_HOST`, ...).
pub const ENV_PREFIX: &str = "AUTOPATTERN";

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "autopattern.toml";

/// Characters Elasticsearch refuses in index names.
const FORBIDDEN_PATTERN_CHARS: &[char] = &['/', '\\', '#', '"', '<', '>', '|', ' ', ','];

const MAX_PATTERN_LEN: usize = 255;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub kibana: KibanaConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub auto_index_pattern: AutoIndexPatternConfig,
    #[serde(default)]
    pub refresh_index_pattern: RefreshIndexPatternConfig,
}

impl Config {
    /// Resolve the config source and load it.
    ///
    /// An explicit `path` must exist. Without one, `autopattern.toml` in the
    /// working directory is used when present; otherwise the defaults apply.
    /// Environment overrides and validation run in every case.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        match path {
            Some(p) => Self::from_file(p),
            None if default_path.exists() => Self::from_file(&default_path),
            None => {
                let mut config = Self::default();
                config.apply_overrides(env_opt)?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse config from a TOML string, then apply environment overrides.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Self::from_toml_with(toml_str, env_opt)
    }

    /// Same as [`from_toml`](Self::from_toml) with an explicit variable lookup.
    pub fn from_toml_with<F>(toml_str: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply `AUTOPATTERN_SECTION_KEY` overrides.
    ///
    /// Scalars are taken verbatim. List values accept a JSON array; refresh
    /// patterns also accept a comma separated list.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |section: &str, key: &str| -> Option<(String, String)> {
            let name = format!("{ENV_PREFIX}_{section}_{key}");
            lookup(&name).map(|v| (name, v))
        };

        if let Some((_, v)) = get("KIBANA", "HOST") {
            self.kibana.host = v;
        }
        if let Some((_, v)) = get("KIBANA", "USER") {
            self.kibana.user = Some(v);
        }
        if let Some((_, v)) = get("KIBANA", "PASSWORD") {
            self.kibana.password = Some(v);
        }
        if let Some((k, v)) = get("KIBANA", "TIMEOUT_SECS") {
            self.kibana.timeout_secs = parse_number(&k, &v)?;
        }
        if let Some((k, v)) = get("KIBANA", "CONNECT_RETRIES") {
            self.kibana.connect_retries = parse_number(&k, &v)?;
        }
        if let Some((k, v)) = get("KIBANA", "CONNECT_RETRY_WAIT_SECS") {
            self.kibana.connect_retry_wait_secs = parse_number(&k, &v)?;
        }

        if let Some((_, v)) = get("LOGGING", "LEVEL") {
            self.logging.level = v.to_lowercase();
        }
        if let Some((_, v)) = get("LOGGING", "FORMAT") {
            self.logging.format = v.to_lowercase();
        }

        if let Some((k, v)) = get("AUTO_INDEX_PATTERN", "ENABLED") {
            self.auto_index_pattern.enabled = parse_bool(&k, &v)?;
        }
        if let Some((_, v)) = get("AUTO_INDEX_PATTERN", "SCHEDULE") {
            self.auto_index_pattern.schedule = v;
        }
        if let Some((k, v)) = get("AUTO_INDEX_PATTERN", "CONCURRENCY") {
            self.auto_index_pattern.concurrency = parse_number(&k, &v)?;
        }
        if let Some((k, v)) = get("AUTO_INDEX_PATTERN", "GENERAL_PATTERNS") {
            self.auto_index_pattern.general_patterns =
                serde_json::from_str(&v).map_err(|e| ConfigError::Env {
                    key: k,
                    reason: e.to_string(),
                })?;
        }

        if let Some((k, v)) = get("REFRESH_INDEX_PATTERN", "ENABLED") {
            self.refresh_index_pattern.enabled = parse_bool(&k, &v)?;
        }
        if let Some((_, v)) = get("REFRESH_INDEX_PATTERN", "SCHEDULE") {
            self.refresh_index_pattern.schedule = v;
        }
        if let Some((k, v)) = get("REFRESH_INDEX_PATTERN", "CONCURRENCY") {
            self.refresh_index_pattern.concurrency = parse_number(&k, &v)?;
        }
        if let Some((_, v)) = get("REFRESH_INDEX_PATTERN", "PATTERNS") {
            self.refresh_index_pattern.patterns = parse_list(&v);
        }

        Ok(())
    }

    // ── Validation ──────────────────────────────────────────────────

    /// Validate every section. Cron expressions are checked later, when the
    /// tasks are registered with the scheduler.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.kibana.validate()?;
        self.logging.validate()?;
        self.auto_index_pattern.validate()?;
        self.refresh_index_pattern.validate()?;
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  kibana:                 host={}, user={}, timeout={}s",
            self.kibana.host,
            self.kibana.user.as_deref().unwrap_or("(none)"),
            self.kibana.timeout_secs
        );
        tracing::info!(
            "  logging:                level={}, format={}",
            self.logging.level,
            self.logging.format
        );
        tracing::info!(
            "  auto_index_pattern:     enabled={}, schedule='{}', concurrency={}, patterns={}",
            self.auto_index_pattern.enabled,
            self.auto_index_pattern.schedule,
            self.auto_index_pattern.concurrency,
            self.auto_index_pattern.general_patterns.len()
        );
        tracing::info!(
            "  refresh_index_pattern:  enabled={}, schedule='{}', concurrency={}, patterns={}",
            self.refresh_index_pattern.enabled,
            self.refresh_index_pattern.schedule,
            self.refresh_index_pattern.concurrency,
            self.refresh_index_pattern.patterns.len()
        );
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::Env {
            key: key.to_string(),
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

/// A JSON array of strings, or a comma separated list.
fn parse_list(value: &str) -> Vec<String> {
    serde_json::from_str::<Vec<String>>(value).unwrap_or_else(|_| {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

// ── Kibana ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KibanaConfig {
    #[serde(default = "default_kibana_host")]
    pub host: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra connection attempts at startup.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    #[serde(default = "default_connect_retry_wait_secs")]
    pub connect_retry_wait_secs: u64,
}

fn default_kibana_host() -> String {
    "http://localhost:5601".into()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_connect_retries() -> u32 {
    5
}

fn default_connect_retry_wait_secs() -> u64 {
    10
}

impl Default for KibanaConfig {
    fn default() -> Self {
        Self {
            host: default_kibana_host(),
            user: None,
            password: None,
            timeout_secs: default_timeout_secs(),
            connect_retries: default_connect_retries(),
            connect_retry_wait_secs: default_connect_retry_wait_secs(),
        }
    }
}

impl KibanaConfig {
    /// Host with a scheme, defaulting to plain HTTP.
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{host}")
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("kibana.host is required".into()));
        }
        if self.user.is_some() != self.password.is_some() {
            return Err(ConfigError::Invalid(
                "kibana.user and kibana.password must be set together".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("kibana.timeout_secs must be at least 1".into()));
        }
        Ok(())
    }
}

// ── Logging ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// pretty or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format == "json"
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "invalid logging.level '{other}', expected trace|debug|info|warn|error"
                )))
            }
        }
        match self.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(ConfigError::Invalid(format!(
                "invalid logging.format '{other}', expected 'pretty' or 'json'"
            ))),
        }
    }
}

// ── Auto index pattern ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoIndexPatternConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_auto_schedule")]
    pub schedule: String,
    /// Maximum templates inferred at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub general_patterns: Vec<GeneralPatternConfig>,
}

/// One wildcard template and the time field of the patterns derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralPatternConfig {
    pub pattern: String,
    #[serde(default = "default_time_field", alias = "timeFieldName")]
    pub time_field_name: String,
}

fn default_enabled() -> bool {
    true
}

fn default_auto_schedule() -> String {
    "*/5 * * * *".into()
}

fn default_concurrency() -> usize {
    10
}

fn default_time_field() -> String {
    "@timestamp".into()
}

impl Default for AutoIndexPatternConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            schedule: default_auto_schedule(),
            concurrency: default_concurrency(),
            general_patterns: Vec::new(),
        }
    }
}

impl AutoIndexPatternConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "auto_index_pattern.concurrency must be at least 1".into(),
            ));
        }
        for general in &self.general_patterns {
            validate_general_pattern(&general.pattern)?;
        }
        Ok(())
    }
}

/// Reject templates that can never name an index or that contain adjacent
/// wildcards.
pub fn validate_general_pattern(pattern: &str) -> Result<(), ConfigError> {
    let invalid = pattern.is_empty()
        || pattern.len() > MAX_PATTERN_LEN
        || pattern.contains(FORBIDDEN_PATTERN_CHARS)
        || pattern == "."
        || pattern == ".."
        || pattern.starts_with(['-', '_', '+'])
        || pattern != pattern.to_lowercase()
        || pattern.contains("**")
        || pattern.contains("??");

    if invalid {
        return Err(ConfigError::Invalid(format!("invalid general pattern [{pattern}]")));
    }
    Ok(())
}

// ── Refresh index pattern ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshIndexPatternConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_refresh_schedule")]
    pub schedule: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Wildcard filters selecting the patterns to refresh.
    #[serde(default)]
    pub patterns: Vec<String>,
}

fn default_refresh_schedule() -> String {
    "0 * * * *".into()
}

impl Default for RefreshIndexPatternConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            schedule: default_refresh_schedule(),
            concurrency: default_concurrency(),
            patterns: Vec::new(),
        }
    }
}

impl RefreshIndexPatternConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "refresh_index_pattern.concurrency must be at least 1".into(),
            ));
        }
        if self.patterns.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "refresh_index_pattern.patterns must not contain empty entries".into(),
            ));
        }
        Ok(())
    }
}
