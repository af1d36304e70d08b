use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Stored biography record.
///
/// `name` is the only unique key. Description and picture are optional
/// because seed rows and failed lookups may leave them blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalFigure {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Figure that has not been persisted yet (seed rows, fresh enrichments).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFigure {
    #[serde(deserialize_with = "trimmed")]
    pub name: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub picture_url: Option<String>,
}

impl NewFigure {
    pub fn new(name: &str, description: &str, picture_url: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            description: non_empty(description),
            picture_url: non_empty(picture_url),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(non_empty))
}

/// Event for the audit trail: every create or update is recorded.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }

    /// Event describing a figure whose biography was written or rewritten.
    pub fn figure(event_type: &str, figure: &HistoricalFigure, actor: &str) -> Self {
        Self::new(
            event_type,
            "historical_figure",
            &figure.name,
            serde_json::json!({
                "id": figure.id,
                "description_words": figure
                    .description
                    .as_deref()
                    .map(|d| d.split_whitespace().count())
                    .unwrap_or(0),
                "picture_url": figure.picture_url,
            }),
            actor,
        )
    }
}

/// Thread-safe handle to the SQLite connection, shared by the async layers.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Wrap an existing connection, creating the schema if needed.
    pub fn new(conn: Connection) -> StoreResult<Self> {
        setup_database(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open (or create) the database file at `path`, creating missing parent directories.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::new(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Run `f` with exclusive access to the connection.
    ///
    /// Never hold the returned data across an `.await` that needs the lock again.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&conn)
    }
}

pub fn setup_database(conn: &Connection) -> StoreResult<()> {
    // WAL keeps readers unblocked while an enrichment writes
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS historical_figures (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            description TEXT,
            picture_url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_figures_name ON historical_figures(name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

const FIGURE_COLUMNS: &str = "id, name, description, picture_url, created_at, updated_at";

fn figure_from_row(row: &Row<'_>) -> rusqlite::Result<HistoricalFigure> {
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;

    Ok(HistoricalFigure {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        picture_url: row.get(3)?,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

pub fn find_figure_by_name(conn: &Connection, name: &str) -> StoreResult<Option<HistoricalFigure>> {
    let figure = conn
        .query_row(
            &format!("SELECT {FIGURE_COLUMNS} FROM historical_figures WHERE name = ?1"),
            [name],
            figure_from_row,
        )
        .optional()?;

    Ok(figure)
}

pub fn get_all_figures(conn: &Connection) -> StoreResult<Vec<HistoricalFigure>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FIGURE_COLUMNS} FROM historical_figures ORDER BY name"
    ))?;

    let figures = stmt
        .query_map([], figure_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(figures)
}

/// Insert a new figure. Fails with a constraint violation on a duplicate name.
pub fn insert_figure(conn: &Connection, figure: &NewFigure) -> StoreResult<HistoricalFigure> {
    let now = Utc::now();
    let now_str = now.to_rfc3339();

    conn.execute(
        "INSERT INTO historical_figures (name, description, picture_url, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![figure.name, figure.description, figure.picture_url, now_str],
    )?;

    Ok(HistoricalFigure {
        id: conn.last_insert_rowid(),
        name: figure.name.clone(),
        description: figure.description.clone(),
        picture_url: figure.picture_url.clone(),
        created_at: now,
        updated_at: now,
    })
}

/// Rewrite the description and picture of an existing figure.
pub fn update_figure_biography(
    conn: &Connection,
    name: &str,
    description: Option<&str>,
    picture_url: Option<&str>,
) -> StoreResult<HistoricalFigure> {
    let changed = conn.execute(
        "UPDATE historical_figures
         SET description = ?1, picture_url = ?2, updated_at = ?3
         WHERE name = ?4",
        params![description, picture_url, Utc::now().to_rfc3339(), name],
    )?;

    if changed == 0 {
        return Err(StoreError::NotFound(name.to_string()));
    }

    find_figure_by_name(conn, name)?.ok_or_else(|| StoreError::NotFound(name.to_string()))
}

pub fn count_figures(conn: &Connection) -> StoreResult<i64> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM historical_figures", [], |row| row.get(0))?;

    Ok(count)
}

/// Read seed figures from a CSV with `name,description,picture_url` columns.
pub fn load_csv(csv_path: &Path) -> StoreResult<Vec<NewFigure>> {
    let mut rdr = csv::Reader::from_path(csv_path)?;

    let mut figures = Vec::new();
    for result in rdr.deserialize() {
        let figure: NewFigure = result?;
        if figure.name.is_empty() {
            tracing::warn!("Skipping seed row with blank name");
            continue;
        }
        figures.push(figure);
    }

    Ok(figures)
}

/// Seed import. Existing names are skipped, so running it twice is harmless.
pub fn insert_figures(conn: &Connection, figures: &[NewFigure]) -> StoreResult<usize> {
    let mut inserted = 0;
    let mut duplicates = 0;

    for figure in figures {
        match insert_figure(conn, figure) {
            Ok(stored) => {
                inserted += 1;
                let event = Event::figure("figure_imported", &stored, "csv_importer");
                if let Err(e) = insert_event(conn, &event) {
                    tracing::warn!(figure = %stored.name, "Failed to record import event: {e}");
                }
            }
            Err(StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _)))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                duplicates += 1;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(inserted, duplicates, "Seed import finished");

    Ok(inserted)
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> StoreResult<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> StoreResult<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let rows = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp: String = row.get(1)?;
            let data_json: String = row.get(5)?;
            Ok((
                row.get::<_, String>(0)?,
                timestamp,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                data_json,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut events = Vec::with_capacity(rows.len());
    for (event_id, timestamp, event_type, entity_type, entity_id, data_json, actor) in rows {
        events.push(Event {
            event_id,
            timestamp: parse_timestamp(&timestamp),
            event_type,
            entity_type,
            entity_id,
            data: serde_json::from_str(&data_json)?,
            actor,
        });
    }

    Ok(events)
}
