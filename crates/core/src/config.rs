use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub store: StoreConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// The external product source (a WooCommerce-style REST API).
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub base_url: String,
    pub consumer_key: SecretString,
    pub consumer_secret: SecretString,
    pub timeout_secs: u64,
    /// Page size used during bulk catalog refresh.
    pub refresh_page_size: u32,
    /// Optional JSON file mapping exact category/tag names to source ids.
    pub id_mapping_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Knobs of the search-resolution and session engine.
#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub max_message_len: usize,
    pub history_window: usize,
    pub page_size: u32,
    pub display_limit: usize,
    pub max_page_depth: u32,
    pub catalog_cap: usize,
    pub sample_size: usize,
    pub session_capacity: usize,
    pub session_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub store_base_url: Option<String>,
    pub store_consumer_key: Option<String>,
    pub store_consumer_secret: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://galleria.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            store: StoreConfig {
                base_url: "https://shop.example".to_string(),
                consumer_key: String::new().into(),
                consumer_secret: String::new().into(),
                timeout_secs: 60,
                refresh_page_size: 100,
                id_mapping_path: None,
            },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            chat: ChatConfig {
                max_message_len: 500,
                history_window: 10,
                page_size: 12,
                display_limit: 3,
                max_page_depth: 10,
                catalog_cap: 2000,
                sample_size: 60,
                session_capacity: 4096,
                session_ttl_secs: 3600,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("galleria.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(store) = patch.store {
            if let Some(base_url) = store.base_url {
                self.store.base_url = base_url;
            }
            if let Some(consumer_key_value) = store.consumer_key {
                self.store.consumer_key = secret_value(consumer_key_value);
            }
            if let Some(consumer_secret_value) = store.consumer_secret {
                self.store.consumer_secret = secret_value(consumer_secret_value);
            }
            if let Some(timeout_secs) = store.timeout_secs {
                self.store.timeout_secs = timeout_secs;
            }
            if let Some(refresh_page_size) = store.refresh_page_size {
                self.store.refresh_page_size = refresh_page_size;
            }
            if let Some(id_mapping_path) = store.id_mapping_path {
                self.store.id_mapping_path = Some(id_mapping_path);
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(chat) = patch.chat {
            if let Some(max_message_len) = chat.max_message_len {
                self.chat.max_message_len = max_message_len;
            }
            if let Some(history_window) = chat.history_window {
                self.chat.history_window = history_window;
            }
            if let Some(page_size) = chat.page_size {
                self.chat.page_size = page_size;
            }
            if let Some(display_limit) = chat.display_limit {
                self.chat.display_limit = display_limit;
            }
            if let Some(max_page_depth) = chat.max_page_depth {
                self.chat.max_page_depth = max_page_depth;
            }
            if let Some(catalog_cap) = chat.catalog_cap {
                self.chat.catalog_cap = catalog_cap;
            }
            if let Some(sample_size) = chat.sample_size {
                self.chat.sample_size = sample_size;
            }
            if let Some(session_capacity) = chat.session_capacity {
                self.chat.session_capacity = session_capacity;
            }
            if let Some(session_ttl_secs) = chat.session_ttl_secs {
                self.chat.session_ttl_secs = session_ttl_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("GALLERIA_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("GALLERIA_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("GALLERIA_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("GALLERIA_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("GALLERIA_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GALLERIA_STORE_BASE_URL") {
            self.store.base_url = value;
        }
        if let Some(value) = read_env("GALLERIA_STORE_CONSUMER_KEY") {
            self.store.consumer_key = secret_value(value);
        }
        if let Some(value) = read_env("GALLERIA_STORE_CONSUMER_SECRET") {
            self.store.consumer_secret = secret_value(value);
        }
        if let Some(value) = read_env("GALLERIA_STORE_TIMEOUT_SECS") {
            self.store.timeout_secs = parse_u64("GALLERIA_STORE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("GALLERIA_STORE_ID_MAPPING_PATH") {
            self.store.id_mapping_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("GALLERIA_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("GALLERIA_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("GALLERIA_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("GALLERIA_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("GALLERIA_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("GALLERIA_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("GALLERIA_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("GALLERIA_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("GALLERIA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("GALLERIA_SERVER_PORT") {
            self.server.port = parse_u16("GALLERIA_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("GALLERIA_CHAT_MAX_MESSAGE_LEN") {
            self.chat.max_message_len =
                parse_u32("GALLERIA_CHAT_MAX_MESSAGE_LEN", &value)? as usize;
        }
        if let Some(value) = read_env("GALLERIA_CHAT_SESSION_CAPACITY") {
            self.chat.session_capacity =
                parse_u32("GALLERIA_CHAT_SESSION_CAPACITY", &value)? as usize;
        }
        if let Some(value) = read_env("GALLERIA_CHAT_SESSION_TTL_SECS") {
            self.chat.session_ttl_secs = parse_u64("GALLERIA_CHAT_SESSION_TTL_SECS", &value)?;
        }

        let log_level =
            read_env("GALLERIA_LOGGING_LEVEL").or_else(|| read_env("GALLERIA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("GALLERIA_LOGGING_FORMAT").or_else(|| read_env("GALLERIA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(store_base_url) = overrides.store_base_url {
            self.store.base_url = store_base_url;
        }
        if let Some(store_consumer_key) = overrides.store_consumer_key {
            self.store.consumer_key = secret_value(store_consumer_key);
        }
        if let Some(store_consumer_secret) = overrides.store_consumer_secret {
            self.store.consumer_secret = secret_value(store_consumer_secret);
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_store(&self.store)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_chat(&self.chat)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("galleria.toml"), PathBuf::from("config/galleria.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_store(store: &StoreConfig) -> Result<(), ConfigError> {
    if !store.base_url.starts_with("http://") && !store.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "store.base_url must start with http:// or https://".to_string(),
        ));
    }

    if store.consumer_key.expose_secret().is_empty() {
        return Err(ConfigError::Validation(
            "store.consumer_key is required. Generate one under WooCommerce > Settings > Advanced > REST API"
                .to_string(),
        ));
    }
    if store.consumer_secret.expose_secret().is_empty() {
        return Err(ConfigError::Validation(
            "store.consumer_secret is required. Generate one under WooCommerce > Settings > Advanced > REST API"
                .to_string(),
        ));
    }

    if store.timeout_secs == 0 || store.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "store.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if store.refresh_page_size == 0 || store.refresh_page_size > 100 {
        return Err(ConfigError::Validation(
            "store.refresh_page_size must be in range 1..=100 (source API limit)".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_chat(chat: &ChatConfig) -> Result<(), ConfigError> {
    if chat.max_message_len == 0 {
        return Err(ConfigError::Validation(
            "chat.max_message_len must be greater than zero".to_string(),
        ));
    }
    if chat.page_size == 0 {
        return Err(ConfigError::Validation(
            "chat.page_size must be greater than zero".to_string(),
        ));
    }
    if chat.display_limit == 0 {
        return Err(ConfigError::Validation(
            "chat.display_limit must be greater than zero".to_string(),
        ));
    }
    if chat.max_page_depth == 0 {
        return Err(ConfigError::Validation(
            "chat.max_page_depth must be greater than zero".to_string(),
        ));
    }
    if chat.catalog_cap == 0 {
        return Err(ConfigError::Validation(
            "chat.catalog_cap must be greater than zero".to_string(),
        ));
    }
    if chat.sample_size == 0 {
        return Err(ConfigError::Validation(
            "chat.sample_size must be greater than zero".to_string(),
        ));
    }
    if chat.session_capacity == 0 {
        return Err(ConfigError::Validation(
            "chat.session_capacity must be greater than zero".to_string(),
        ));
    }
    if chat.session_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "chat.session_ttl_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    store: Option<StorePatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    chat: Option<ChatPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StorePatch {
    base_url: Option<String>,
    consumer_key: Option<String>,
    consumer_secret: Option<String>,
    timeout_secs: Option<u64>,
    refresh_page_size: Option<u32>,
    id_mapping_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatPatch {
    max_message_len: Option<usize>,
    history_window: Option<usize>,
    page_size: Option<u32>,
    display_limit: Option<usize>,
    max_page_depth: Option<u32>,
    catalog_cap: Option<usize>,
    sample_size: Option<usize>,
    session_capacity: Option<usize>,
    session_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
