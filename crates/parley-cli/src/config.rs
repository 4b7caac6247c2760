use config::{Config as ConfigLoader, ConfigError, Environment, File};
use parley::{
    BatcherConfig, ContextConfig, HttpConfig, OpenAIConfig, ProviderConfig, ProviderDetails,
    SchedulerConfig, ThreadConfig, TurnConfig,
};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub provider: ProviderSection,
    #[serde(default)]
    pub batcher: BatcherSection,
    #[serde(default)]
    pub turn: TurnSection,
    #[serde(default)]
    pub summary: SummarySection,
    #[serde(default)]
    pub context: ContextSection,
    #[serde(default)]
    pub thread: ThreadSection,
    #[serde(default)]
    pub storage: StorageSection,
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub mongodb_uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSection {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl ProviderSection {
    /// Resolve the backend; the type is never guessed from other fields
    pub fn to_provider_config(&self, api_key: &str) -> Result<ProviderConfig, ConfigError> {
        let details = match self.kind.as_str() {
            "http" => {
                let endpoint = self.endpoint.clone().ok_or_else(|| {
                    ConfigError::Message("provider.endpoint is required for type = \"http\"".to_string())
                })?;
                let mut http = HttpConfig::new(endpoint);
                if !api_key.is_empty() {
                    http = http.with_api_key(api_key);
                }
                ProviderDetails::Http(http)
            }
            "openai" => {
                if api_key.is_empty() {
                    return Err(ConfigError::Message(
                        "PARLEY_API_KEY environment variable is required for type = \"openai\"".to_string(),
                    ));
                }
                let mut openai = OpenAIConfig::new(api_key);
                if let Some(base_url) = &self.base_url {
                    openai = openai.with_base_url(base_url);
                }
                if let Some(model) = &self.model {
                    openai = openai.with_model(model);
                }
                ProviderDetails::OpenAI(openai)
            }
            other => {
                return Err(ConfigError::Message(format!(
                    "unknown provider type \"{}\" (expected \"http\" or \"openai\")",
                    other
                )))
            }
        };
        Ok(ProviderConfig { details })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatcherSection {
    pub mode: String,
    #[serde(default)]
    pub window_secs: Option<u64>,
}

impl Default for BatcherSection {
    fn default() -> Self {
        Self {
            mode: "interactive".to_string(),
            window_secs: None,
        }
    }
}

impl From<&BatcherSection> for BatcherConfig {
    fn from(section: &BatcherSection) -> Self {
        let base = match section.mode.as_str() {
            "concatenation" => BatcherConfig::concatenation(),
            _ => BatcherConfig::interactive(),
        };
        match section.window_secs {
            Some(secs) => base.with_window(Duration::from_secs(secs)),
            None => base,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurnSection {
    pub timeout_secs: u64,
}

impl Default for TurnSection {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarySection {
    pub trigger: u64,
    pub retention: usize,
    pub timeout_secs: u64,
    #[serde(default)]
    pub delay_secs: u64,
    pub model: String,
}

impl Default for SummarySection {
    fn default() -> Self {
        Self {
            trigger: 5,
            retention: 5,
            timeout_secs: 15,
            delay_secs: 0,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

impl From<&SummarySection> for SchedulerConfig {
    fn from(section: &SummarySection) -> Self {
        SchedulerConfig::new()
            .with_trigger(section.trigger)
            .with_retention(section.retention)
            .with_timeout(Duration::from_secs(section.timeout_secs))
            .with_delay(Duration::from_secs(section.delay_secs))
            .with_model(section.model.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextSection {
    pub max_words: usize,
    pub recent_messages: usize,
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            max_words: 1200,
            recent_messages: 5,
        }
    }
}

impl From<&ContextSection> for ContextConfig {
    fn from(section: &ContextSection) -> Self {
        ContextConfig::new()
            .with_max_words(section.max_words)
            .with_recent_messages(section.recent_messages)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadSection {
    pub bot_name: String,
    pub user_name: String,
    #[serde(default)]
    pub rules: String,
}

impl Default for ThreadSection {
    fn default() -> Self {
        let defaults = ThreadConfig::default();
        Self {
            bot_name: defaults.bot_name,
            user_name: defaults.user_name,
            rules: defaults.rules,
        }
    }
}

impl From<&ThreadSection> for ThreadConfig {
    fn from(section: &ThreadSection) -> Self {
        ThreadConfig::new(section.bot_name.clone(), section.rules.clone())
            .with_user_name(section.user_name.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    pub database: String,
    pub page_size: usize,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database: "parley".to_string(),
            page_size: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. PARLEY_* environment variables, `__` separating sections
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            // 1. Load default config
            .add_source(File::with_name("config/default").required(false))
            // 2. Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // 3. Environment variables override everything
            .add_source(
                Environment::with_prefix("PARLEY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;

        let mut cfg: Config = config.try_deserialize()?;

        // Load secrets from ENV (not in TOML)
        cfg.api_key = std::env::var("PARLEY_API_KEY").unwrap_or_default();
        cfg.mongodb_uri = std::env::var("MONGODB_URI").ok().filter(|uri| !uri.is_empty());

        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn provider_config(&self) -> Result<ProviderConfig, ConfigError> {
        self.provider.to_provider_config(&self.api_key)
    }

    pub fn turn_config(&self) -> TurnConfig {
        let turn = TurnConfig::new().with_timeout(Duration::from_secs(self.turn.timeout_secs));
        match &self.provider.model {
            Some(model) => turn.with_model(model.clone()),
            None => turn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley::ProviderType;

    const SAMPLE: &str = r#"
        [provider]
        type = "http"
        endpoint = "https://bots.example.com/api/chat"

        [batcher]
        mode = "concatenation"

        [summary]
        trigger = 3
        retention = 4
        timeout_secs = 10
        model = "small"

        [thread]
        bot_name = "Mira"
        user_name = "Sam"
        rules = "Be kind"

        [logging]
        level = "debug"
        format = "json"
    "#;

    #[test]
    fn test_config_structure() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.provider.kind, "http");
        assert_eq!(config.turn.timeout_secs, 60);
        assert_eq!(config.storage.page_size, 20);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_sections_convert_to_runtime_configs() {
        let config: Config = toml::from_str(SAMPLE).unwrap();

        let batcher = BatcherConfig::from(&config.batcher);
        assert_eq!(batcher.window, Duration::from_secs(30));

        let scheduler = SchedulerConfig::from(&config.summary);
        assert_eq!(scheduler.trigger, 3);
        assert_eq!(scheduler.retention, 4);
        assert_eq!(scheduler.delay, Duration::ZERO);

        let thread = ThreadConfig::from(&config.thread);
        assert_eq!(thread.bot_name, "Mira");
        assert_eq!(thread.user_name, "Sam");
    }

    #[test]
    fn test_provider_selection_is_explicit() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let provider = config.provider_config().unwrap();
        assert_eq!(provider.provider_type(), ProviderType::Http);

        let openai = ProviderSection {
            kind: "openai".to_string(),
            endpoint: None,
            base_url: None,
            model: Some("gpt-4o".to_string()),
        };
        assert!(openai.to_provider_config("").is_err());
        assert_eq!(
            openai.to_provider_config("sk-test").unwrap().provider_type(),
            ProviderType::OpenAI
        );

        let unknown = ProviderSection {
            kind: "carrier-pigeon".to_string(),
            ..openai
        };
        assert!(unknown.to_provider_config("sk-test").is_err());
    }
}
