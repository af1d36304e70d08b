//! Biography enrichment workflow.
//!
//! A request names a figure. Stored figures with a long enough description
//! are answered straight from the database; everything else goes to the LLM
//! (and, when the LLM gives no usable picture, to image search) and the result
//! is written back. The same workflow powers the plain JSON lookup and the
//! streaming trace, which reports each step as it happens.

use crate::config::{EnrichmentConfig, LlmConfig};
use crate::db::{self, Event, HistoricalFigure, NewFigure, Store};
use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::image_search::{is_usable_picture_url, ImageSearch};
use crate::llm::prompt::{biography_prompt, description_prompt};
use crate::llm::retry::generate_with_retry;
use crate::llm::{parse_biography, LlmProvider, LlmRequest, ResponseFormat};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Prefix of the last trace message, followed by the JSON outcome.
pub const FINAL_ANSWER_PREFIX: &str = "FINAL_ANSWER::";

/// True when the description is absent or shorter than `min_words` words.
pub fn needs_description(description: Option<&str>, min_words: usize) -> bool {
    match description {
        None => true,
        Some(text) => text.split_whitespace().count() < min_words,
    }
}

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    Db,
    Llm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroAnswer {
    pub answer: String,
    pub picture_url: String,
    pub source: AnswerSource,
    pub hero: String,
}

impl HeroAnswer {
    fn from_figure(figure: &HistoricalFigure) -> Self {
        Self {
            answer: figure.description.clone().unwrap_or_default(),
            picture_url: figure.picture_url.clone().unwrap_or_default(),
            source: AnswerSource::Db,
            hero: figure.name.clone(),
        }
    }
}

/// State of a figure in the store, relative to the description threshold.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Sufficient(HistoricalFigure),
    TooShort(HistoricalFigure),
    Missing,
}

/// Terminal payload of a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraceOutcome {
    Answer(HeroAnswer),
    Error { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    Step(String),
    Final(TraceOutcome),
}

impl TraceEvent {
    /// Text sent to the client for this event.
    pub fn message(&self) -> String {
        match self {
            TraceEvent::Step(step) => step.clone(),
            TraceEvent::Final(outcome) => {
                let json = serde_json::to_string(outcome).unwrap_or_else(|e| {
                    serde_json::json!({ "error": format!("Failed to encode answer: {e}") })
                        .to_string()
                });
                format!("{FINAL_ANSWER_PREFIX}{json}")
            }
        }
    }
}

/// User-facing message for a failed enrichment.
pub fn failure_message(name: &str, err: &ServiceError) -> String {
    format!("Failed to generate description for {name}: {err}")
}

/// Progress reporting for a single workflow run. Silent for plain lookups.
struct Progress<'a> {
    sink: Option<&'a mpsc::Sender<TraceEvent>>,
    delay: Duration,
}

impl<'a> Progress<'a> {
    fn silent() -> Self {
        Self {
            sink: None,
            delay: Duration::ZERO,
        }
    }

    fn streaming(sink: &'a mpsc::Sender<TraceEvent>, delay: Duration) -> Self {
        Self {
            sink: Some(sink),
            delay,
        }
    }

    async fn step(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("{message}");
        if let Some(sink) = self.sink {
            // A closed receiver means the client went away; keep working quietly.
            let _ = sink.send(TraceEvent::Step(message)).await;
        }
    }

    async fn pause(&self) {
        if self.sink.is_some() && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// Enrichment service shared by the HTTP handlers and the CLI.
pub struct Enricher {
    store: Store,
    llm: Arc<dyn LlmProvider>,
    images: Option<Arc<dyn ImageSearch>>,
    llm_config: LlmConfig,
    options: EnrichmentConfig,
}

impl Enricher {
    pub fn new(
        store: Store,
        llm: Arc<dyn LlmProvider>,
        llm_config: LlmConfig,
        options: EnrichmentConfig,
    ) -> Self {
        Self {
            store,
            llm,
            images: None,
            llm_config,
            options,
        }
    }

    /// Enable the image-search fallback for pictures.
    pub fn with_image_search(mut self, images: Arc<dyn ImageSearch>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn lookup(&self, name: &str) -> ServiceResult<Lookup> {
        let figure = self
            .store
            .with_conn(|conn| db::find_figure_by_name(conn, name))?;

        Ok(match figure {
            None => Lookup::Missing,
            Some(figure)
                if needs_description(
                    figure.description.as_deref(),
                    self.options.min_description_words,
                ) =>
            {
                Lookup::TooShort(figure)
            }
            Some(figure) => Lookup::Sufficient(figure),
        })
    }

    /// Answer for `name`, enriching and persisting when needed.
    pub async fn hero_details(&self, name: &str) -> ServiceResult<HeroAnswer> {
        self.resolve(name, &Progress::silent()).await
    }

    /// Run the workflow for `name`, reporting each step to `sink`.
    ///
    /// Always ends with exactly one `TraceEvent::Final`.
    pub async fn run_trace(&self, name: &str, sink: mpsc::Sender<TraceEvent>) {
        let progress = Progress::streaming(
            &sink,
            Duration::from_millis(self.options.trace_step_delay_ms),
        );

        let outcome = match self.resolve(name, &progress).await {
            Ok(answer) => TraceOutcome::Answer(answer),
            Err(e) => {
                tracing::warn!(figure = name, "Trace failed: {e}");
                progress.step(format!("Error: {e}")).await;
                TraceOutcome::Error {
                    error: failure_message(name, &e),
                }
            }
        };

        let _ = sink.send(TraceEvent::Final(outcome)).await;
    }

    /// Spawn `run_trace` on the runtime and hand back the event stream.
    pub fn spawn_trace(self: Arc<Self>, name: String) -> mpsc::Receiver<TraceEvent> {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            self.run_trace(&name, tx).await;
        });
        rx
    }

    async fn resolve(&self, name: &str, progress: &Progress<'_>) -> ServiceResult<HeroAnswer> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidName(name.to_string()));
        }

        progress
            .step(format!("Looking up '{name}' in the database."))
            .await;
        let lookup = self.lookup(name)?;
        progress.pause().await;

        let existing = match lookup {
            Lookup::Sufficient(figure) => {
                progress
                    .step("Found hero in DB with sufficient description.")
                    .await;
                return Ok(HeroAnswer::from_figure(&figure));
            }
            Lookup::TooShort(figure) => {
                progress
                    .step(
                        "Found hero in DB, but description is too short. \
                         Calling the LLM to upgrade description.",
                    )
                    .await;
                Some(figure)
            }
            Lookup::Missing => {
                progress
                    .step(
                        "Hero not found in DB. \
                         Calling the LLM to generate description and picture_url.",
                    )
                    .await;
                None
            }
        };

        progress.step("Calling LLM...").await;
        let request = LlmRequest::new(biography_prompt(name), &self.llm_config);
        let response = generate_with_retry(
            self.llm.as_ref(),
            &request,
            self.llm_config.retry_attempts,
            self.llm_config.retry_delay_ms,
        )
        .await?;
        progress.pause().await;

        let mut parsed = parse_biography(&response.text);
        match parsed.format {
            ResponseFormat::Json => progress.step("Parsed JSON response from LLM.").await,
            ResponseFormat::RawText => {
                progress
                    .step("Failed to parse JSON from LLM, using raw response.")
                    .await
            }
        }

        if !is_usable_picture_url(&parsed.picture_url) {
            parsed.picture_url = self.search_picture(name, progress).await;
        }

        let update = NewFigure::new(name, &parsed.description, &parsed.picture_url);
        let stored = match existing {
            Some(_) => {
                let figure = self.save_update(&update, "figure_enriched")?;
                progress
                    .step("Updated hero in DB with new description and picture_url.")
                    .await;
                figure
            }
            None => {
                let figure = self.save_new(&update)?;
                progress.step("Added new hero to DB.").await;
                figure
            }
        };

        tracing::info!(
            figure = %stored.name,
            model = %response.model,
            latency_ms = response.latency_ms,
            "Enriched figure"
        );

        Ok(HeroAnswer {
            answer: parsed.description,
            picture_url: parsed.picture_url,
            source: AnswerSource::Llm,
            hero: name.to_string(),
        })
    }

    /// Picture from image search, or empty when disabled, missing or failing.
    async fn search_picture(&self, name: &str, progress: &Progress<'_>) -> String {
        let Some(images) = &self.images else {
            return String::new();
        };

        progress
            .step(format!("Searching images for '{name}'..."))
            .await;
        match images.search(name).await {
            Ok(Some(url)) if is_usable_picture_url(&url) => {
                progress.step("Found picture via image search.").await;
                url
            }
            Ok(_) => {
                progress.step("No picture found via image search.").await;
                String::new()
            }
            Err(e) => {
                tracing::warn!(figure = name, "Image search failed: {e}");
                progress.step("No picture found via image search.").await;
                String::new()
            }
        }
    }

    fn save_update(&self, figure: &NewFigure, event_type: &str) -> ServiceResult<HistoricalFigure> {
        let actor = self.llm.name().to_string();
        let stored = self.store.with_conn(|conn| {
            let stored = db::update_figure_biography(
                conn,
                &figure.name,
                figure.description.as_deref(),
                figure.picture_url.as_deref(),
            )?;
            db::insert_event(conn, &Event::figure(event_type, &stored, &actor))?;
            Ok(stored)
        })?;
        Ok(stored)
    }

    fn save_new(&self, figure: &NewFigure) -> ServiceResult<HistoricalFigure> {
        let actor = self.llm.name().to_string();
        let inserted = self.store.with_conn(|conn| {
            let stored = db::insert_figure(conn, figure)?;
            db::insert_event(conn, &Event::figure("figure_created", &stored, &actor))?;
            Ok(stored)
        });

        match inserted {
            Ok(stored) => Ok(stored),
            // Another request created the figure while the LLM was answering
            Err(StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _)))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                tracing::debug!(figure = %figure.name, "Figure created concurrently; updating");
                self.save_update(figure, "figure_enriched")
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Regenerate every stored description under the word threshold.
    ///
    /// Returns the names that were updated; failures are logged and skipped.
    pub async fn generate_descriptions(&self) -> ServiceResult<Vec<String>> {
        let figures = self.store.with_conn(db::get_all_figures)?;
        let mut updated = Vec::new();

        for figure in figures {
            if !needs_description(
                figure.description.as_deref(),
                self.options.min_description_words,
            ) {
                continue;
            }

            let request = LlmRequest::new(description_prompt(&figure.name), &self.llm_config);
            let response = match generate_with_retry(
                self.llm.as_ref(),
                &request,
                self.llm_config.retry_attempts,
                self.llm_config.retry_delay_ms,
            )
            .await
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(figure = %figure.name, "{}", failure_message(&figure.name, &e));
                    continue;
                }
            };

            if response.text.trim().is_empty() {
                tracing::warn!(figure = %figure.name, "LLM returned an empty description");
                continue;
            }

            let update = NewFigure {
                name: figure.name.clone(),
                description: Some(response.text.trim().to_string()),
                picture_url: figure.picture_url.clone(),
            };
            match self.save_update(&update, "description_generated") {
                Ok(_) => updated.push(figure.name),
                Err(e) => {
                    tracing::warn!(figure = %figure.name, "Failed to save description: {e}")
                }
            }
        }

        tracing::info!(updated = updated.len(), "Description generation finished");
        Ok(updated)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn seeded_store(figures: &[NewFigure]) -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|conn| db::insert_figures(conn, figures))
            .unwrap();
        store
    }

    async fn collect_trace(enricher: &Enricher, name: &str) -> Vec<TraceEvent> {
        let (tx, mut rx) = mpsc::channel(64);
        enricher.run_trace(name, tx).await;
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn steps(events: &[TraceEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                TraceEvent::Step(s) => Some(s.clone()),
                TraceEvent::Final(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_needs_description_threshold() {
        assert!(needs_description(None, 20));
        assert!(needs_description(Some(""), 20));
        assert!(needs_description(Some("A short note."), 20));
        assert!(!needs_description(Some(long_description().as_str()), 20));
        assert!(!needs_description(Some("one two three"), 3));
        assert!(needs_description(Some("one  two\n"), 3));
    }

    #[tokio::test]
    async fn test_sufficient_figure_served_from_db() {
        let store = seeded_store(&[NewFigure::new(
            "Hannibal",
            &long_description(),
            "https://example.org/hannibal.jpg",
        )]);
        let llm = ScriptedLlm::new(vec![]);
        let enricher = enricher(store, llm.clone());

        let answer = enricher.hero_details("Hannibal").await.unwrap();
        assert_eq!(answer.source, AnswerSource::Db);
        assert_eq!(answer.hero, "Hannibal");
        assert_eq!(answer.picture_url, "https://example.org/hannibal.jpg");
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_figure_is_created() {
        let store = Store::open_in_memory().unwrap();
        let llm = ScriptedLlm::new(vec![Ok(
            r#"{"description": "Mansa Musa ruled Mali.", "picture_url": "https://upload.wikimedia.org/musa.jpg"}"#,
        )]);
        let enricher = enricher(store.clone(), llm.clone());

        let answer = enricher.hero_details("Mansa Musa").await.unwrap();
        assert_eq!(answer.source, AnswerSource::Llm);
        assert_eq!(answer.answer, "Mansa Musa ruled Mali.");
        assert!(llm.prompts.lock().unwrap()[0].contains("Who was Mansa Musa?"));

        let stored = store
            .with_conn(|conn| db::find_figure_by_name(conn, "Mansa Musa"))
            .unwrap()
            .unwrap();
        assert_eq!(stored.description.as_deref(), Some("Mansa Musa ruled Mali."));

        let events = store
            .with_conn(|conn| db::get_events_for_entity(conn, "historical_figure", "Mansa Musa"))
            .unwrap();
        assert_eq!(events[0].event_type, "figure_created");
        assert_eq!(events[0].actor, "scripted");
    }

    #[tokio::test]
    async fn test_short_description_is_upgraded() {
        let store = seeded_store(&[NewFigure::new("Joan of Arc", "French heroine.", "")]);
        let llm = ScriptedLlm::new(vec![Ok("Joan of Arc led French forces at Orléans.")]);
        let enricher = enricher(store.clone(), llm);

        let answer = enricher.hero_details("Joan of Arc").await.unwrap();
        assert_eq!(answer.source, AnswerSource::Llm);
        assert_eq!(answer.answer, "Joan of Arc led French forces at Orléans.");
        assert_eq!(answer.picture_url, "");

        assert_eq!(store.with_conn(db::count_figures).unwrap(), 1);
        let stored = store
            .with_conn(|conn| db::find_figure_by_name(conn, "Joan of Arc"))
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.description.as_deref(),
            Some("Joan of Arc led French forces at Orléans.")
        );
    }

    #[tokio::test]
    async fn test_llm_failure_leaves_store_untouched() {
        let store = Store::open_in_memory().unwrap();
        let llm = ScriptedLlm::new(vec![Err(401)]);
        let enricher = enricher(store.clone(), llm);

        let err = enricher.hero_details("Saladin").await.unwrap_err();
        assert!(failure_message("Saladin", &err)
            .starts_with("Failed to generate description for Saladin: "));
        assert_eq!(store.with_conn(db::count_figures).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let enricher = enricher(Store::open_in_memory().unwrap(), ScriptedLlm::new(vec![]));
        assert!(matches!(
            enricher.hero_details("   ").await,
            Err(ServiceError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_image_search_fills_missing_picture() {
        let store = Store::open_in_memory().unwrap();
        let llm = ScriptedLlm::new(vec![Ok(r#"{"description": "Astronomer.", "picture_url": ""}"#)]);
        let enricher = enricher(store, llm).with_image_search(Arc::new(FixedImages(Ok(Some(
            "https://images.example.org/tycho.jpg".to_string(),
        )))));

        let answer = enricher.hero_details("Tycho Brahe").await.unwrap();
        assert_eq!(answer.picture_url, "https://images.example.org/tycho.jpg");
    }

    #[tokio::test]
    async fn test_image_search_failure_is_not_fatal() {
        let store = Store::open_in_memory().unwrap();
        let llm = ScriptedLlm::new(vec![Ok(r#"{"description": "Explorer.", "picture_url": "none"}"#)]);
        let enricher = enricher(store, llm)
            .with_image_search(Arc::new(FixedImages(Err("blocked".to_string()))));

        let answer = enricher.hero_details("Zheng He").await.unwrap();
        assert_eq!(answer.answer, "Explorer.");
        assert_eq!(answer.picture_url, "");
    }

    #[tokio::test]
    async fn test_trace_for_missing_figure() {
        let store = Store::open_in_memory().unwrap();
        let llm = ScriptedLlm::new(vec![Ok(
            r#"{"description": "Builder of pyramids.", "picture_url": "https://x.org/i.jpg"}"#,
        )]);
        let enricher = enricher(store, llm);

        let events = collect_trace(&enricher, "Imhotep").await;
        assert_eq!(
            steps(&events),
            vec![
                "Looking up 'Imhotep' in the database.",
                "Hero not found in DB. Calling the LLM to generate description and picture_url.",
                "Calling LLM...",
                "Parsed JSON response from LLM.",
                "Added new hero to DB.",
            ]
        );

        let last = events.last().unwrap();
        assert!(matches!(last, TraceEvent::Final(TraceOutcome::Answer(a)) if a.hero == "Imhotep"));
        assert!(last.message().starts_with("FINAL_ANSWER::{\"answer\":\"Builder of pyramids.\""));
    }

    #[tokio::test]
    async fn test_trace_for_short_description_with_raw_response() {
        let store = seeded_store(&[NewFigure::new("Ashoka", "Emperor.", "")]);
        let llm = ScriptedLlm::new(vec![Ok("Ashoka was a Mauryan emperor.")]);
        let enricher = enricher(store, llm);

        let events = collect_trace(&enricher, "Ashoka").await;
        assert_eq!(
            steps(&events),
            vec![
                "Looking up 'Ashoka' in the database.",
                "Found hero in DB, but description is too short. Calling the LLM to upgrade description.",
                "Calling LLM...",
                "Failed to parse JSON from LLM, using raw response.",
                "Updated hero in DB with new description and picture_url.",
            ]
        );
    }

    #[tokio::test]
    async fn test_trace_for_sufficient_figure() {
        let store = seeded_store(&[NewFigure::new("Pericles", &long_description(), "")]);
        let enricher = enricher(store, ScriptedLlm::new(vec![]));

        let events = collect_trace(&enricher, "Pericles").await;
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[1],
            TraceEvent::Step("Found hero in DB with sufficient description.".to_string())
        );
        assert!(events[2].message().contains("\"source\":\"db\""));
    }

    #[tokio::test]
    async fn test_trace_reports_errors_then_final() {
        let enricher = enricher(Store::open_in_memory().unwrap(), ScriptedLlm::new(vec![Err(400)]));

        let events = collect_trace(&enricher, "Attila").await;
        let all: Vec<String> = events.iter().map(TraceEvent::message).collect();
        assert!(all[all.len() - 2].starts_with("Error: "));
        assert!(all[all.len() - 1]
            .starts_with("FINAL_ANSWER::{\"error\":\"Failed to generate description for Attila: "));
    }

    #[tokio::test]
    async fn test_trace_reports_image_search_hit() {
        let llm = ScriptedLlm::new(vec![Ok(r#"{"description": "Astronomer.", "picture_url": ""}"#)]);
        let enricher = enricher(Store::open_in_memory().unwrap(), llm).with_image_search(Arc::new(
            FixedImages(Ok(Some("https://a.org/b.jpg".to_string()))),
        ));

        let events = collect_trace(&enricher, "Tycho").await;
        assert_eq!(
            steps(&events),
            vec![
                "Looking up 'Tycho' in the database.",
                "Hero not found in DB. Calling the LLM to generate description and picture_url.",
                "Calling LLM...",
                "Parsed JSON response from LLM.",
                "Searching images for 'Tycho'...",
                "Found picture via image search.",
                "Added new hero to DB.",
            ]
        );
        assert!(events
            .last()
            .unwrap()
            .message()
            .contains("\"picture_url\":\"https://a.org/b.jpg\""));
    }

    #[tokio::test]
    async fn test_trace_reports_image_search_miss() {
        let store = seeded_store(&[NewFigure::new("Zheng He", "Admiral.", "")]);
        let llm = ScriptedLlm::new(vec![Ok(r#"{"description": "Explorer.", "picture_url": "n/a"}"#)]);
        let enricher = enricher(store, llm)
            .with_image_search(Arc::new(FixedImages(Err("blocked".to_string()))));

        let events = collect_trace(&enricher, "Zheng He").await;
        assert_eq!(
            steps(&events),
            vec![
                "Looking up 'Zheng He' in the database.",
                "Found hero in DB, but description is too short. Calling the LLM to upgrade description.",
                "Calling LLM...",
                "Parsed JSON response from LLM.",
                "Searching images for 'Zheng He'...",
                "No picture found via image search.",
                "Updated hero in DB with new description and picture_url.",
            ]
        );
        assert!(matches!(
            events.last(),
            Some(TraceEvent::Final(TraceOutcome::Answer(a))) if a.picture_url.is_empty()
        ));
    }

    fn delayed_enricher(store: Store, llm: Arc<ScriptedLlm>, delay_ms: u64) -> Enricher {
        let llm_config = LlmConfig {
            retry_attempts: 0,
            ..LlmConfig::default()
        };
        let options = EnrichmentConfig {
            min_description_words: 20,
            trace_step_delay_ms: delay_ms,
        };
        Enricher::new(store, llm, llm_config, options)
    }

    #[tokio::test(start_paused = true)]
    async fn test_trace_pauses_after_lookup_and_llm() {
        let llm = ScriptedLlm::new(vec![Ok(r#"{"description": "Poet.", "picture_url": ""}"#)]);
        let enricher = delayed_enricher(Store::open_in_memory().unwrap(), llm, 200);

        let start = tokio::time::Instant::now();
        let events = collect_trace(&enricher, "Sappho").await;
        assert!(matches!(events.last(), Some(TraceEvent::Final(TraceOutcome::Answer(_)))));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(600), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_trace_from_db_pauses_once() {
        let store = seeded_store(&[NewFigure::new("Pericles", &long_description(), "")]);
        let enricher = delayed_enricher(store, ScriptedLlm::new(vec![]), 200);

        let start = tokio::time::Instant::now();
        collect_trace(&enricher, "Pericles").await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(400), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_plain_lookup_never_pauses() {
        let llm = ScriptedLlm::new(vec![Ok(r#"{"description": "Poet.", "picture_url": ""}"#)]);
        let enricher = delayed_enricher(Store::open_in_memory().unwrap(), llm, 200);

        let start = tokio::time::Instant::now();
        enricher.hero_details("Sappho").await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_trace_survives_dropped_receiver() {
        let store = Store::open_in_memory().unwrap();
        let llm = ScriptedLlm::new(vec![Ok(r#"{"description": "Poet.", "picture_url": ""}"#)]);
        let enricher = Arc::new(enricher(store.clone(), llm));

        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        enricher.run_trace("Rumi", tx).await;

        assert_eq!(store.with_conn(db::count_figures).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_spawned_trace_streams_to_completion() {
        let store = seeded_store(&[NewFigure::new("Homer", &long_description(), "")]);
        let enricher = Arc::new(enricher(store, ScriptedLlm::new(vec![])));

        let mut rx = enricher.spawn_trace("Homer".to_string());
        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        assert!(matches!(last, Some(TraceEvent::Final(TraceOutcome::Answer(_)))));
    }

    #[tokio::test]
    async fn test_generate_descriptions_upgrades_short_ones() {
        let store = seeded_store(&[
            NewFigure::new("Aristotle", &long_description(), ""),
            NewFigure::new("Boudica", "", "https://example.org/boudica.jpg"),
            NewFigure::new("Charlemagne", "King.", ""),
        ]);
        // Boudica succeeds, Charlemagne fails and is skipped
        let llm = ScriptedLlm::new(vec![Ok("Boudica led a revolt against Rome."), Err(401)]);
        let enricher = enricher(store.clone(), llm.clone());

        let updated = enricher.generate_descriptions().await.unwrap();
        assert_eq!(updated, vec!["Boudica".to_string()]);
        assert_eq!(llm.calls(), 2);
        assert!(llm.prompts.lock().unwrap()[0].contains("description about Boudica"));

        let boudica = store
            .with_conn(|conn| db::find_figure_by_name(conn, "Boudica"))
            .unwrap()
            .unwrap();
        assert_eq!(
            boudica.description.as_deref(),
            Some("Boudica led a revolt against Rome.")
        );
        assert_eq!(
            boudica.picture_url.as_deref(),
            Some("https://example.org/boudica.jpg")
        );
    }
}
