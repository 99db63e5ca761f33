//! Configuration for the window cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Deserializer};

use crate::error::{SyncError, SyncResult};
use crate::settings::system_time_zone;

const ENV_PREFIX: &str = "CALDIR_WINDOW";
const DEFAULT_STORE_FILE: &str = "window-cache.json";

/// Configuration at ~/.config/caldir/window.toml, overridable through
/// `CALDIR_WINDOW__SECTION__KEY` environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Where the local cache lives. `~` is expanded.
    pub store_path: Option<String>,

    /// IANA time zone name. Defaults to the system zone.
    pub time_zone: Option<String>,

    pub remote: Option<RemoteSettings>,
}

/// Shape of the mirrored window and its prefetch policy, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub backward_days: u32,
    pub forward_days: u32,
    /// How far outside the cached window a visible date may land before it counts as a jump.
    pub jump_buffer_days: u32,
    /// Distance from a window edge at which the window is expanded.
    pub prefetch_threshold_days: u32,
    pub prefetch_chunk_days: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            backward_days: 30,
            forward_days: 30,
            jump_buffer_days: 10,
            prefetch_threshold_days: 2,
            prefetch_chunk_days: 14,
        }
    }
}

/// Retry policy for token acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Retries after the first attempt.
    pub token_retries: u32,
    #[serde(deserialize_with = "deserialize_duration")]
    pub token_retry_delay: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            token_retries: 3,
            token_retry_delay: Duration::from_millis(500),
        }
    }
}

/// Remote provider configuration (e.g., `provider = "google"` plus its own keys)
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSettings {
    pub provider: String,
    #[serde(flatten)]
    pub params: HashMap<String, toml::Value>,
}

impl RemoteSettings {
    /// The `{provider}_account` value, if the provider has an account concept.
    pub fn account_identifier(&self) -> Option<&str> {
        let key = format!("{}_account", self.provider);
        self.params.get(&key).and_then(|v| v.as_str())
    }
}

impl From<&RemoteSettings> for serde_json::Map<String, serde_json::Value> {
    fn from(settings: &RemoteSettings) -> Self {
        settings
            .params
            .iter()
            .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k.clone(), v)))
            .collect()
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

impl MirrorConfig {
    pub fn config_path() -> SyncResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SyncError::Config("Could not determine config directory".into()))?
            .join("caldir");

        Ok(config_dir.join("window.toml"))
    }

    /// Load from the default location, creating a commented template on first run.
    pub fn load() -> SyncResult<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            Self::create_default_config(&path)?;
        }

        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> SyncResult<Self> {
        let builder = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::finish(builder.build())
    }

    pub fn from_toml_str(contents: &str) -> SyncResult<Self> {
        let built = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build();

        Self::finish(built)
    }

    fn finish(built: Result<Config, config::ConfigError>) -> SyncResult<Self> {
        let config: MirrorConfig = built
            .map_err(|e| SyncError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| SyncError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> SyncResult<()> {
        if self.window.prefetch_chunk_days == 0 {
            return Err(SyncError::Config(
                "window.prefetch_chunk_days must be at least 1".into(),
            ));
        }
        if self.window.prefetch_threshold_days > self.window.backward_days.max(self.window.forward_days)
        {
            return Err(SyncError::Config(
                "window.prefetch_threshold_days must not exceed the window size".into(),
            ));
        }
        if let Some(name) = &self.time_zone {
            name.parse::<Tz>()
                .map_err(|_| SyncError::Config(format!("Unknown time zone '{name}'")))?;
        }
        Ok(())
    }

    pub fn store_path(&self) -> SyncResult<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(PathBuf::from(shellexpand::tilde(path).into_owned())),
            None => {
                let data_dir = dirs::data_dir().ok_or_else(|| {
                    SyncError::Config("Could not determine data directory".into())
                })?;
                Ok(data_dir.join("caldir").join(DEFAULT_STORE_FILE))
            }
        }
    }

    pub fn time_zone(&self) -> SyncResult<Tz> {
        match &self.time_zone {
            Some(name) => name
                .parse()
                .map_err(|_| SyncError::Config(format!("Unknown time zone '{name}'"))),
            None => Ok(system_time_zone()),
        }
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> SyncResult<()> {
        let defaults = WindowConfig::default();
        let auth = AuthConfig::default();
        let contents = format!(
            "\
# caldir-window configuration

# Where the mirrored events are cached:
# store_path = \"~/.local/share/caldir/{DEFAULT_STORE_FILE}\"

# Time zone used to turn dates into instants (defaults to the system zone):
# time_zone = \"Europe/Oslo\"

# [window]
# backward_days = {}
# forward_days = {}
# jump_buffer_days = {}
# prefetch_threshold_days = {}
# prefetch_chunk_days = {}

# [auth]
# token_retries = {}
# token_retry_delay = \"{}\"

# [remote]
# provider = \"google\"
# google_account = \"me@example.com\"
",
            defaults.backward_days,
            defaults.forward_days,
            defaults.jump_buffer_days,
            defaults.prefetch_threshold_days,
            defaults.prefetch_chunk_days,
            auth.token_retries,
            humantime::format_duration(auth.token_retry_delay),
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SyncError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| SyncError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}
