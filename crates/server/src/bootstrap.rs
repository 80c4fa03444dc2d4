//! Wires configuration into the running application: database, catalog
//! snapshot, language model, session store, and the chat runtime.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::SecretString;
use tracing::{info, warn};

use galleria_agent::{ChatRuntime, OpenAiChatClient, SearchEngine};
use galleria_catalog::{CatalogStore, HttpProductSource};
use galleria_core::config::{AppConfig, LlmProvider};
use galleria_core::domain::session::SessionStore;
use galleria_core::search::concepts::{ConceptMap, IdentifierMap};
use galleria_db::{connect, migrations, DbPool, SqlConversationLogRepository, SqlLeadRepository};

pub struct App {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<ChatRuntime>,
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<App> {
    let db_pool = connect(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .with_context(|| format!("connecting to database `{}`", config.database.url))?;
    migrations::run_pending(&db_pool).await.context("running database migrations")?;

    let identifiers = Arc::new(load_identifier_map(&config).await?);

    let source = Arc::new(
        HttpProductSource::new(
            config.store.base_url.clone(),
            config.store.consumer_key.clone(),
            config.store.consumer_secret.clone(),
            Duration::from_secs(config.store.timeout_secs),
        )
        .context("building the store client")?,
    );

    let catalog =
        Arc::new(CatalogStore::new(config.chat.catalog_cap, config.store.refresh_page_size));
    match catalog.refresh(source.as_ref()).await {
        Ok(outcome) => info!(
            event_name = "bootstrap.catalog_ready",
            products = outcome.product_count,
            partial = outcome.partial,
        ),
        // The assistant can still converse and fast-path filtered fetches;
        // scoring just has nothing to rank yet.
        Err(error) => warn!(event_name = "bootstrap.catalog_refresh_failed", error = %error),
    }

    let llm = Arc::new(build_llm_client(&config)?);

    let engine = SearchEngine::new(
        source,
        catalog.clone(),
        ConceptMap::hebrew_defaults(),
        identifiers.clone(),
        config.chat.page_size,
        config.chat.max_page_depth,
        config.chat.sample_size,
    );

    let sessions = Arc::new(SessionStore::new(
        config.chat.session_capacity,
        Duration::from_secs(config.chat.session_ttl_secs),
    ));
    let leads = Arc::new(SqlLeadRepository::new(db_pool.clone()));
    let log = Arc::new(SqlConversationLogRepository::new(db_pool.clone()));

    let runtime = Arc::new(ChatRuntime::new(
        llm,
        engine,
        sessions,
        leads,
        log,
        catalog,
        identifiers,
        config.chat.max_message_len,
        config.chat.history_window,
        config.chat.display_limit,
    ));

    Ok(App { config, db_pool, runtime })
}

async fn load_identifier_map(config: &AppConfig) -> Result<IdentifierMap> {
    let Some(path) = &config.store.id_mapping_path else {
        return Ok(IdentifierMap::default());
    };

    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading identifier mapping `{}`", path.display()))?;
    let map = IdentifierMap::from_json(&raw)
        .with_context(|| format!("parsing identifier mapping `{}`", path.display()))?;
    Ok(map)
}

fn build_llm_client(config: &AppConfig) -> Result<OpenAiChatClient> {
    let llm = &config.llm;
    let (api_key, base_url) = match llm.provider {
        LlmProvider::OpenAi => (required_key(llm.api_key.as_ref())?, llm.base_url.clone()),
        LlmProvider::Anthropic => (
            required_key(llm.api_key.as_ref())?,
            Some(
                llm.base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.anthropic.com/v1".to_string()),
            ),
        ),
        // Ollama speaks the same chat-completions shape and ignores the key.
        LlmProvider::Ollama => (
            llm.api_key.clone().unwrap_or_else(|| String::from("ollama").into()),
            llm.base_url.clone(),
        ),
    };

    OpenAiChatClient::new(
        api_key,
        base_url,
        llm.model.clone(),
        Duration::from_secs(llm.timeout_secs),
        llm.max_retries,
    )
}

fn required_key(key: Option<&SecretString>) -> Result<SecretString> {
    key.cloned().context("llm.api_key is required for the configured provider")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use galleria_core::config::AppConfig;
    use galleria_core::ports::ProductFilter;

    use super::load_identifier_map;

    #[tokio::test]
    async fn missing_mapping_path_yields_an_empty_map() {
        let config = AppConfig::default();

        let map = load_identifier_map(&config).await.expect("empty map");

        assert!(map.lookup("אנימה").is_none());
    }

    #[tokio::test]
    async fn mapping_file_is_loaded_and_parsed() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("id_mapping.json");
        std::fs::write(&path, r#"{"categories": {"אנימה": 17}, "tags": {}}"#)
            .expect("write mapping");

        let mut config = AppConfig::default();
        config.store.id_mapping_path = Some(PathBuf::from(&path));

        let map = load_identifier_map(&config).await.expect("mapping loads");

        assert_eq!(map.lookup("אנימה"), Some(ProductFilter::Category(17)));
    }

    #[tokio::test]
    async fn malformed_mapping_file_fails_bootstrap() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("id_mapping.json");
        std::fs::write(&path, "not json").expect("write mapping");

        let mut config = AppConfig::default();
        config.store.id_mapping_path = Some(path);

        assert!(load_identifier_map(&config).await.is_err());
    }
}
