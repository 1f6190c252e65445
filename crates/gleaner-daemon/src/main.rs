//! Gleaner daemon
//!
//! Thin application shell: loads configuration, initializes tracing, wires
//! the browser, LLM and database collaborators into an [`Orchestrator`] and
//! runs scrape cycles. Business logic lives in the `gleaner-*` crates.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, TriggerAction, TriggerList};
use gleaner_browser::BrowserEngine;
use gleaner_core::{AppConfig, RelevanceConfig, SourceId};
use gleaner_db::Database;
use gleaner_llm::{provider_from_config, LlmProvider};
use gleaner_scraper::relevance::load_trigger_file;
use gleaner_scraper::{
    add_trigger, register_source, remove_trigger, CycleReport, LlmSelectorInference,
    LlmSummarizer, Orchestrator, OrchestratorSettings, PromptTemplates, RefreshOutcome,
    RelevancePolicy, SourceOutcome, SourceStore,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,gleaner=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = path else {
        return AppConfig::load_with_env().context("failed to load configuration");
    };
    let mut config = AppConfig::load_from(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    config.apply_env();
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn build_orchestrator(config: &AppConfig, db: &Database) -> Result<Orchestrator<BrowserEngine>> {
    let provider = provider_from_config(&config.llm).context("failed to configure LLM provider")?;
    let templates =
        PromptTemplates::from_config(&config.inference).context("failed to load prompt templates")?;
    let inference = LlmSelectorInference::new(provider.clone(), templates).with_limits(&config.llm);
    let relevance =
        RelevancePolicy::from_config(&config.relevance).context("failed to load trigger files")?;

    let engine = BrowserEngine::launch(&config.browser)
        .await
        .context("failed to launch browser")?;

    let db = Arc::new(db.clone());
    let mut orchestrator = Orchestrator::new(
        engine,
        db.clone(),
        db.clone(),
        Arc::new(inference),
        Arc::new(relevance),
    )
    .with_settings(OrchestratorSettings::from(&config.scraping));

    if config.statistics.enabled {
        info!(name = %config.statistics.name, "Statistics refresh enabled");
        orchestrator = orchestrator.with_statistics(config.statistics.clone(), db.clone());
    }

    if config.scraping.summarize {
        info!(provider = provider.provider_id(), "Article summarization enabled");
        orchestrator =
            orchestrator.with_summarizer(Arc::new(LlmSummarizer::new(provider, &config.llm)));
    }
    Ok(orchestrator)
}

fn trigger_path(config: &RelevanceConfig, list: TriggerList) -> &Path {
    match list {
        TriggerList::AiWords => &config.ai_words,
        TriggerList::AiPhrases => &config.ai_phrases,
        TriggerList::RegionWords => &config.region_words,
        TriggerList::RegionPhrases => &config.region_phrases,
    }
}

fn edit_triggers(config: &RelevanceConfig, action: &TriggerAction) -> Result<()> {
    match action {
        TriggerAction::Add { list, entry } => {
            let path = trigger_path(config, *list);
            if !add_trigger(path, entry)? {
                println!("{entry:?} is already in {}", path.display());
            }
        }
        TriggerAction::Remove { list, entry } => {
            let path = trigger_path(config, *list);
            if !remove_trigger(path, entry)? {
                println!("{entry:?} is not in {}", path.display());
            }
        }
        TriggerAction::Show { list } => {
            for entry in load_trigger_file(trigger_path(config, *list))? {
                println!("{entry}");
            }
        }
    }
    Ok(())
}

fn log_outcome(outcome: &SourceOutcome) {
    info!(
        source_id = %outcome.source_id,
        url = %outcome.url,
        status = outcome.status.as_str(),
        attempts = outcome.attempts,
        articles = outcome.articles_stored,
        error = outcome.last_error.as_deref().unwrap_or(""),
        "Source outcome"
    );
}

fn log_report(report: &CycleReport) {
    for outcome in &report.sources {
        log_outcome(outcome);
    }
    info!(
        sources = report.sources.len(),
        articles = report.articles_stored(),
        failed = report.failed(),
        "Cycle complete"
    );
}

/// Run a cycle on every tick until Ctrl-C. A cycle in progress finishes
/// before shutdown.
async fn run_forever(orchestrator: &Orchestrator<BrowserEngine>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => match orchestrator.run_cycle().await {
                Ok(report) => log_report(&report),
                Err(e) => error!(error = %e, "Scrape cycle failed"),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    info!("Starting Gleaner v{}", env!("CARGO_PKG_VERSION"));
    let config = load_config(cli.config.as_deref())?;
    if let Command::Triggers { action } = &cli.command {
        return edit_triggers(&config.relevance, action);
    }

    let db = Database::open(&config)
        .await
        .context("failed to open database")?;

    match cli.command {
        Command::Add { url, ai, region } => {
            let id = register_source(&db, &url, ai, region).await?;
            println!("{id}");
        }
        Command::Sources => {
            for source in SourceStore::list_sources(&db).await? {
                println!(
                    "{}\t{}\t{}\tai={}\tregion={}\tselectors={}",
                    source.id,
                    source.status.as_str(),
                    source.url,
                    source.wants_ai,
                    source.wants_region,
                    source.selectors.is_some()
                );
            }
        }
        Command::Scrape { id } => {
            let orchestrator = build_orchestrator(&config, &db).await?;
            let outcome = orchestrator.scrape_source(SourceId::new(id)).await?;
            log_outcome(&outcome);
        }
        Command::Stats => {
            let mut config = config.clone();
            config.statistics.enabled = true;
            let orchestrator = build_orchestrator(&config, &db).await?;
            match orchestrator.refresh_statistics().await? {
                Some(RefreshOutcome::Stored { url, bytes }) => println!("stored {bytes} bytes from {url}"),
                Some(RefreshOutcome::Fresh { updated_at }) => println!("up to date (updated {updated_at})"),
                Some(RefreshOutcome::NoDownloadLink) | None => println!("no download link found"),
            }
        }
        Command::Run { once: true } => {
            let orchestrator = build_orchestrator(&config, &db).await?;
            log_report(&orchestrator.run_cycle().await?);
        }
        Command::Run { once: false } => {
            let orchestrator = build_orchestrator(&config, &db).await?;
            let minutes = config.general.cycle_interval_minutes.max(1);
            info!(minutes, "Running scrape cycles");
            run_forever(&orchestrator, Duration::from_secs(minutes * 60)).await;
        }
        Command::Triggers { .. } => {}
    }

    db.close().await;
    Ok(())
}
