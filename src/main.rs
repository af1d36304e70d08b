use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use hero_atlas::{
    build_enricher, count_figures, get_all_figures, get_events_for_entity, insert_figures,
    load_csv, logging, Config, Store,
};

/// Hero Atlas command line: seed, inspect and enrich the figure store.
#[derive(Parser)]
#[command(name = "hero-atlas", version, about)]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true, env = "HERO_ATLAS_CONFIG")]
    config: Option<PathBuf>,

    /// Override the database path from the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import figures from a CSV with name,description,picture_url columns
    Import { csv: PathBuf },
    /// List stored figures
    List,
    /// Look up a figure, enriching it through the LLM when needed
    Lookup { name: String },
    /// Regenerate every description under the word threshold
    Generate,
    /// Show the audit trail for a figure
    Events { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_or_default(cli.config.as_deref()).context("Failed to load config")?;
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path());
    let store = Store::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    tracing::debug!(path = %db_path.display(), "Database opened");

    match cli.command {
        Command::Import { csv } => run_import(&store, &csv),
        Command::List => run_list(&store),
        Command::Lookup { name } => run_lookup(&config, store, &name).await,
        Command::Generate => run_generate(&config, store).await,
        Command::Events { name } => run_events(&store, &name),
    }
}

fn run_import(store: &Store, csv_path: &Path) -> Result<()> {
    let figures = load_csv(csv_path)
        .with_context(|| format!("Failed to read seed CSV {}", csv_path.display()))?;
    println!("Loaded {} figures from CSV", figures.len());

    let inserted = store.with_conn(|conn| insert_figures(conn, &figures))?;
    let total = store.with_conn(count_figures)?;

    println!("Inserted: {inserted}");
    println!("Skipped duplicates: {}", figures.len() - inserted);
    println!("Database now holds {total} figures");

    Ok(())
}

fn run_list(store: &Store) -> Result<()> {
    let figures = store.with_conn(get_all_figures)?;

    for figure in &figures {
        let words = figure
            .description
            .as_deref()
            .map(|d| d.split_whitespace().count())
            .unwrap_or(0);
        let picture = if figure.picture_url.is_some() { "picture" } else { "no picture" };
        println!("{:<40} {:>4} words  {picture}", figure.name, words);
    }
    println!("{} figures", figures.len());

    Ok(())
}

async fn run_lookup(config: &Config, store: Store, name: &str) -> Result<()> {
    let enricher = build_enricher(config, store).context("Failed to set up LLM client")?;
    let answer = enricher
        .hero_details(name)
        .await
        .with_context(|| format!("Failed to generate description for {name}"))?;

    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}

async fn run_generate(config: &Config, store: Store) -> Result<()> {
    let enricher = build_enricher(config, store).context("Failed to set up LLM client")?;
    let updated = enricher.generate_descriptions().await?;

    println!("Updated {} descriptions", updated.len());
    for name in updated {
        println!("  {name}");
    }
    Ok(())
}

fn run_events(store: &Store, name: &str) -> Result<()> {
    let events = store.with_conn(|conn| get_events_for_entity(conn, "historical_figure", name))?;

    if events.is_empty() {
        println!("No events recorded for {name}");
    }
    for event in events {
        println!(
            "{}  {:<22} by {:<12} {}",
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.actor,
            event.data
        );
    }
    Ok(())
}
