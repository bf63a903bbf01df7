//! Command handlers for the Lumen CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod chat;
pub mod filter;
pub mod prompts;
pub mod schema;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use filter::FilterCommand;
pub use prompts::PromptsCommand;
pub use schema::SchemaCommand;

use lumen_agent::{ModeRouter, RouterPrompts, RouterSettings};
use lumen_catalog::{Catalog, Schema};
use lumen_core::{config::AppConfig, AppResult};
use lumen_llm::{create_client, LlmExtractor};
use std::sync::Arc;
use std::time::Duration;

/// Schema the catalog is checked against; `None` when it is inferred.
pub fn declared_schema(config: &AppConfig) -> Option<Schema> {
    if config.infer_schema {
        None
    } else {
        Some(Schema::illuminants())
    }
}

/// Load the catalog file named by the configuration.
pub fn load_catalog(config: &AppConfig) -> AppResult<Catalog> {
    let path = config.catalog_file();
    tracing::debug!("Loading catalog from {:?}", path);
    Catalog::load(&path, declared_schema(config))
}

/// Wire catalog, model client, extractor and prompts into a router.
pub fn build_router(config: &AppConfig) -> AppResult<ModeRouter> {
    config.validate()?;

    let catalog = Arc::new(load_catalog(config)?);

    let endpoint = config.resolve_endpoint(&config.provider);
    let api_key = config.resolve_api_key(&config.provider);
    let client = create_client(
        &config.provider,
        endpoint.as_deref(),
        api_key.as_deref(),
        Duration::from_secs(config.timeout_secs),
    )?;

    let extractor = LlmExtractor::new(client.clone(), &config.model)
        .with_max_retries(config.max_retries);

    let settings = RouterSettings {
        model: config.model.clone(),
        language: config.language.clone(),
        temperature: config.temperature,
    };

    tracing::info!(
        "Router ready: provider {}, model {}, {} records",
        client.provider_name(),
        config.model,
        catalog.len()
    );

    Ok(ModeRouter::new(
        Arc::new(extractor),
        client,
        catalog,
        RouterPrompts::load(&config.workspace)?,
        settings,
    ))
}
