//! Configuration and credential management.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Environment variable marking a managed-hosting deployment. When set,
/// credentials come from the environment instead of the local file.
pub const MANAGED_ENV_VAR: &str = "MIRRORBOT_MANAGED";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Filename of the persisted duplicate-guard set.
    pub guard_filename: String,
    /// Guard backend (None or "file" = local file, "redis://..." = redis).
    pub guard_backend: Option<String>,
    /// Path to the credentials file (ignored under managed hosting).
    pub credentials_path: PathBuf,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Delay between outbound service requests in milliseconds.
    pub request_delay_ms: u64,
    /// Channels to poll.
    pub channels: Vec<String>,
    /// Source domains eligible for mirroring.
    pub allowed_domains: Vec<String>,
    /// Extensions accepted regardless of domain.
    pub allowed_extensions: Vec<String>,
    /// Extensions never accepted (still images).
    pub disabled_extensions: Vec<String>,
    /// Posts fetched per channel listing.
    pub listing_limit: u32,
    /// Trailing window of post ages considered, in minutes.
    pub poll_window_minutes: i64,
    /// Sleep between poll cycles, in seconds.
    pub poll_interval_secs: u64,
    /// Pause after commenting on a post that needed a fresh primary-host
    /// conversion, in seconds. The primary host cools down rapid
    /// successive transcodes.
    pub primary_cooldown_secs: u64,
    /// Largest remote file the generic upload host accepts, in bytes.
    pub imgur_upload_limit: u64,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to ~/.mirrorbot/ for user data, falling back to CWD.
        let data_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mirrorbot");

        Self {
            data_dir,
            guard_filename: "processed.json".to_string(),
            guard_backend: None,
            credentials_path: PathBuf::from("credentials.json"),
            user_agent: "mirrorbot/0.3 (video mirror bot)".to_string(),
            request_timeout: 30,
            request_delay_ms: 500,
            channels: vec![
                "soccer".to_string(),
                "reddevils".to_string(),
                "LiverpoolFC".to_string(),
                "swanseacity".to_string(),
            ],
            allowed_domains: vec![
                "gfycat.com".to_string(),
                "giant.gfycat.com".to_string(),
                "zippy.gfycat.com".to_string(),
                "fat.gfycat.com".to_string(),
                "offsided.com".to_string(),
                "mediacru.sh".to_string(),
                "imgur.com".to_string(),
                "i.imgur.com".to_string(),
                "streamable.com".to_string(),
                "vine.co".to_string(),
                "v.cdn.vine.co".to_string(),
                "giffer.co".to_string(),
            ],
            allowed_extensions: vec![".gif".to_string(), ".mp4".to_string(), ".gifv".to_string()],
            disabled_extensions: vec![".jpg".to_string(), ".jpeg".to_string(), ".png".to_string()],
            listing_limit: 200,
            poll_window_minutes: 10,
            poll_interval_secs: 60,
            primary_cooldown_secs: 60,
            imgur_upload_limit: 10 * 1024 * 1024,
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Full path to the persisted guard file.
    pub fn guard_path(&self) -> PathBuf {
        self.data_dir.join(&self.guard_filename)
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)
    }
}

/// Configuration file structure. Every field is optional and overlays the
/// defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target directory for data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard_filename: Option<String>,
    /// Guard backend URL ("file" or "redis://host:port").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard_backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_window_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_cooldown_secs: Option<u64>,

    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific file path.
    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Discover a config file in the standard locations: `mirrorbot.toml`
    /// in the working directory, then the user config directory.
    pub fn discover() -> Option<Self> {
        let mut candidates = vec![PathBuf::from("mirrorbot.toml")];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("mirrorbot").join("config.toml"));
        }

        candidates
            .into_iter()
            .filter(|path| path.exists())
            .find_map(|path| Self::load_from_path(&path).ok())
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(Path::to_path_buf))
    }

    /// Resolve a path that may be relative to the config file.
    fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings. `base_dir` resolves relative paths
    /// (typically the config file directory or CWD).
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref target) = self.target {
            settings.data_dir = self.resolve_path(target, base_dir);
        }
        if let Some(ref filename) = self.guard_filename {
            settings.guard_filename = filename.clone();
        }
        if let Some(ref backend) = self.guard_backend {
            settings.guard_backend = Some(backend.clone());
        }
        if let Some(ref credentials) = self.credentials {
            settings.credentials_path = self.resolve_path(credentials, base_dir);
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(delay) = self.request_delay_ms {
            settings.request_delay_ms = delay;
        }
        if !self.channels.is_empty() {
            settings.channels = self.channels.clone();
        }
        if !self.allowed_domains.is_empty() {
            settings.allowed_domains = self.allowed_domains.clone();
        }
        if !self.allowed_extensions.is_empty() {
            settings.allowed_extensions = self.allowed_extensions.clone();
        }
        if !self.disabled_extensions.is_empty() {
            settings.disabled_extensions = self.disabled_extensions.clone();
        }
        if let Some(limit) = self.listing_limit {
            settings.listing_limit = limit;
        }
        if let Some(window) = self.poll_window_minutes {
            settings.poll_window_minutes = window;
        }
        if let Some(interval) = self.poll_interval_secs {
            settings.poll_interval_secs = interval;
        }
        if let Some(cooldown) = self.primary_cooldown_secs {
            settings.primary_cooldown_secs = cooldown;
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Override data directory (--data-dir flag).
    pub data_dir: Option<PathBuf>,
}

/// Load settings with explicit options.
pub fn load_settings_with_options(options: LoadOptions) -> anyhow::Result<Settings> {
    let config = match &options.config_path {
        Some(path) => Some(Config::load_from_path(path)?),
        None => Config::discover(),
    };

    let mut settings = Settings::default();

    if let Some(config) = config {
        let base_dir = config
            .base_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        config.apply_to_settings(&mut settings, &base_dir);
    }

    // --data-dir override takes precedence
    if let Some(data_dir) = options.data_dir {
        settings.data_dir = data_dir;
    }

    Ok(settings)
}

/// Credential bundle for the forum and the authenticated mirror services.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub forum_username: String,
    pub forum_password: String,
    pub streamable_password: String,
    pub imgur_client_id: String,
    pub imgur_client_secret: String,
}

impl Credentials {
    /// Load credentials: from the environment under managed hosting
    /// (selected by `MIRRORBOT_MANAGED`), otherwise from the local
    /// credentials file. Failure here is fatal at startup.
    pub fn load(settings: &Settings) -> anyhow::Result<Self> {
        if std::env::var_os(MANAGED_ENV_VAR).is_some() {
            return Self::from_env();
        }
        Self::from_file(&settings.credentials_path)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read credentials file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse credentials file {}", path.display()))
    }

    fn from_env() -> anyhow::Result<Self> {
        fn var(name: &str) -> anyhow::Result<String> {
            std::env::var(name).with_context(|| format!("missing environment variable {}", name))
        }

        Ok(Self {
            forum_username: var("FORUM_USERNAME")?,
            forum_password: var("FORUM_PASSWORD")?,
            streamable_password: var("STREAMABLE_PASSWORD")?,
            imgur_client_id: var("IMGUR_CLIENT_ID")?,
            imgur_client_secret: var("IMGUR_CLIENT_SECRET")?,
        })
    }
}
