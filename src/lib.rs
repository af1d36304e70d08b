// Hero Atlas - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod db;
pub mod enrich;
pub mod error;
pub mod html;
pub mod image_search;
pub mod llm;
pub mod logging;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::Config;
pub use db::{
    Event, HistoricalFigure, NewFigure, Store,
    setup_database, find_figure_by_name, get_all_figures, insert_figure,
    update_figure_biography, count_figures, load_csv, insert_figures,
    insert_event, get_events_for_entity,
};
pub use enrich::{
    AnswerSource, Enricher, HeroAnswer, Lookup, TraceEvent, TraceOutcome,
    needs_description, FINAL_ANSWER_PREFIX,
};
pub use error::{ConfigError, ServiceError, StoreError};
pub use image_search::{DuckDuckGoImageSearch, ImageSearch};
pub use llm::{LlmProvider, OpenAiCompatProvider};

use std::sync::Arc;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the enrichment service described by `config` on top of `store`.
///
/// Fails when the LLM API key cannot be resolved.
pub fn build_enricher(config: &Config, store: Store) -> Result<Enricher, ServiceError> {
    let llm = OpenAiCompatProvider::from_config(&config.llm)?;
    let mut enricher = Enricher::new(
        store,
        Arc::new(llm),
        config.llm.clone(),
        config.enrichment.clone(),
    );

    if config.image_search.enabled {
        enricher = enricher.with_image_search(Arc::new(DuckDuckGoImageSearch::new(
            &config.image_search,
        )));
    }

    Ok(enricher)
}
