use anyhow::{Context, Result};
use clap::Parser;
use imgsync_core::{Credentials, DatasetEntry};
use imgsync_local::aggregate::Aggregator;
use imgsync_local::dataset::DatasetStore;
use imgsync_local::knowledge::KnowledgeBase;
use imgsync_local::provenance::ProvenanceStore;
use imgsync_local::query::build_query_variants;
use imgsync_local::rank::{rank_candidates, Ranking};
use imgsync_local::search::{build_providers, ProviderSet};
use imgsync_local::sync::{SyncSummary, Syncer};
use imgsync_local::{http_client, visual, HttpImageFetcher};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

mod cli;
mod config;
mod review;

use cli::{Cli, Commands, DoctorCmd, LogFormat, OutputFormat, SearchCmd, SyncCmd};
use config::{LoadedConfig, Settings};

/// Optional env-file loader (opt-in through `IMGSYNC_ENV_FILE`). Keeps provider keys out of
/// shell profiles. Never overrides variables that are already set and never logs values.
fn load_env_file() {
    let Ok(p) = std::env::var("IMGSYNC_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v.trim().trim_matches('"'));
        }
    }
}

fn init_tracing(level: Option<&str>, format: LogFormat) -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match level {
        Some(l) => EnvFilter::try_new(l).with_context(|| format!("invalid log level {l:?}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
    }
    Ok(())
}

fn load_knowledge(path: Option<&Path>) -> Result<KnowledgeBase> {
    match path {
        Some(p) => Ok(KnowledgeBase::from_path(p)?),
        None => Ok(KnowledgeBase::builtin()?),
    }
}

fn aggregator_for(settings: &Settings, set: ProviderSet, creds: &Credentials) -> Aggregator {
    for (p, reason) in &set.skipped {
        warn!(provider = %p, reason = %reason, "provider skipped");
    }
    if set.providers.is_empty() {
        warn!("no provider is available; every entry will come back empty");
    }
    Aggregator::new(set.providers, settings.per_provider_limit, &creds.presence())
        .with_timeout_ms(settings.timeout_ms)
        .with_rate_limit_backoff(settings.rate_limit_backoff)
}

fn print_summary(summary: &SyncSummary, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "sync",
                "ok": true,
                "summary": summary,
            });
            println!("{v}");
        }
        OutputFormat::Text => {
            println!("summary{}", if summary.dry_run { " (dry run)" } else { "" });
            println!("- updated: {}", summary.updated);
            println!("- skipped: {}", summary.skipped);
            println!("- failed: {}", summary.failed);
            println!("- dataset: {}", summary.dataset);
            println!("- sources: {}", summary.sources);
            if summary.interrupted {
                println!("- interrupted: progress so far is saved");
            }
        }
    }
    Ok(())
}

async fn run_sync(cmd: SyncCmd, loaded: &LoadedConfig, output: OutputFormat) -> Result<()> {
    let settings = Settings::resolve(&cmd, &loaded.file);
    let dataset = DatasetStore::load(&settings.dataset)?;
    let provenance = ProvenanceStore::load(&settings.sources);
    let kb = load_knowledge(settings.knowledge.as_deref())?;
    info!(
        dataset = %settings.dataset.display(),
        items = dataset.len(),
        recorded = provenance.len(),
        "dataset loaded"
    );

    let client = http_client(Duration::from_millis(settings.timeout_ms))?;
    let creds = Credentials::from_env();
    let set = build_providers(&client, &settings.providers, &creds, &kb);
    let aggregator = aggregator_for(&settings, set, &creds);

    let mut syncer = Syncer::new(
        kb,
        aggregator,
        Box::new(HttpImageFetcher::new(client)),
        dataset,
        provenance,
        settings.sync.clone(),
    );
    if settings.interactive {
        syncer = syncer.with_reviewer(Box::new(review::PromptReviewer::new(
            std::io::stdin().lock(),
            std::io::stderr(),
        )));
    }

    // The run is only dropped at an await point; commits are synchronous, so an interrupt
    // always lands between entries or inside a network wait.
    let interrupted = tokio::select! {
        res = syncer.run() => {
            res?;
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };
    let summary = syncer.finish(interrupted)?;
    print_summary(&summary, output)
}

async fn run_search(cmd: SearchCmd, loaded: &LoadedConfig, output: OutputFormat) -> Result<()> {
    let settings = Settings::resolve(
        &SyncCmd {
            common: cmd.common.clone(),
            ..Default::default()
        },
        &loaded.file,
    );
    let kb = load_knowledge(settings.knowledge.as_deref())?;
    let client = http_client(Duration::from_millis(settings.timeout_ms))?;
    let creds = Credentials::from_env();
    let set = build_providers(&client, &settings.providers, &creds, &kb);
    let active: Vec<&str> = set.active().into_iter().map(|p| p.as_str()).collect();
    let mut aggregator = aggregator_for(&settings, set, &creds);

    let entry = DatasetEntry {
        id: cmd.word.trim().to_string(),
        word: Some(cmd.word.trim().to_string()),
        category: cmd.category.trim().to_string(),
        ..Default::default()
    };
    let queries = build_query_variants(&kb, &entry);
    let found = aggregator.collect(&queries).await;
    let found_count = found.len();
    let ranking = rank_candidates(&kb, &entry, found, &settings.sync.gate);
    let (outcome, rejected) = match &ranking {
        Ranking::NoValid => ("no_valid", 0),
        Ranking::OnlySuspicious { rejected } => ("only_suspicious", *rejected),
        Ranking::Ranked(_) => ("ranked", 0),
    };
    let top: Vec<_> = ranking.candidates().iter().take(cmd.top.max(1)).collect();

    match output {
        OutputFormat::Json => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "search",
                "word": entry.main_word(),
                "category": entry.category,
                "queries": queries,
                "providers": active,
                "found": found_count,
                "outcome": outcome,
                "rejected": rejected,
                "candidates": top,
            });
            println!("{v}");
        }
        OutputFormat::Text => {
            println!(
                "{} [{}]: {} found, {}",
                entry.main_word(),
                entry.category,
                found_count,
                outcome
            );
            for (i, c) in top.iter().enumerate() {
                println!(
                    "{:>2}) {:>7.2} {:<10} {} | {}",
                    i + 1,
                    c.score,
                    c.provider.as_str(),
                    c.license,
                    c.title
                );
                println!("    {}", c.image_url);
            }
        }
    }
    Ok(())
}

fn run_doctor(cmd: DoctorCmd, loaded: &LoadedConfig, output: OutputFormat, t0: Instant) -> Result<()> {
    let settings = Settings::resolve(
        &SyncCmd {
            common: cmd.common.clone(),
            ..Default::default()
        },
        &loaded.file,
    );
    let mut checks: Vec<serde_json::Value> = Vec::new();

    let dataset = DatasetStore::load(&settings.dataset);
    checks.push(serde_json::json!({
        "name": "dataset_readable",
        "ok": dataset.is_ok(),
        "message": match &dataset {
            Ok(ds) => format!("{} items", ds.len()),
            Err(e) => e.to_string(),
        },
        "hint": if dataset.is_ok() { "" } else { "Pass --root/--dataset or set them in the config file." },
    }));

    let kb = load_knowledge(settings.knowledge.as_deref());
    checks.push(serde_json::json!({
        "name": "knowledge_loaded",
        "ok": kb.is_ok(),
        "message": match &kb {
            Ok(_) => "knowledge tables parsed".to_string(),
            Err(e) => format!("{e:#}"),
        },
        "hint": if kb.is_ok() { "" } else { "Fix or drop --knowledge; the built-in tables are used by default." },
    }));
    let kb = kb.unwrap_or_default();

    let creds = Credentials::from_env();
    let client = http_client(Duration::from_millis(settings.timeout_ms))?;
    let set = build_providers(&client, &settings.providers, &creds, &kb);
    let active: Vec<&str> = set.active().into_iter().map(|p| p.as_str()).collect();
    checks.push(serde_json::json!({
        "name": "providers_active",
        "ok": !active.is_empty(),
        "message": format!("{} of {} requested providers active", active.len(), settings.providers.len()),
        "hint": if active.is_empty() { "Check --providers and the provider API keys." } else { "" },
    }));
    let skipped: Vec<_> = set
        .skipped
        .iter()
        .map(|(p, reason)| serde_json::json!({ "provider": p.as_str(), "reason": reason }))
        .collect();

    let images_dir = settings.root.join(&settings.sync.images_dir);
    let ok = checks.iter().all(|c| c["ok"].as_bool() == Some(true));
    let v = serde_json::json!({
        "schema_version": 1,
        "kind": "doctor",
        "ok": ok,
        "name": "imgsync",
        "version": env!("CARGO_PKG_VERSION"),
        "elapsed_ms": t0.elapsed().as_millis(),
        "config_file": loaded.path.as_ref().map(|p| p.display().to_string()),
        "paths": {
            "root": settings.root.display().to_string(),
            "dataset": { "path": settings.dataset.display().to_string(), "exists": settings.dataset.exists() },
            "sources": { "path": settings.sources.display().to_string(), "exists": settings.sources.exists() },
            "images_dir": { "path": images_dir.display().to_string(), "exists": images_dir.exists() },
        },
        "providers": {
            "requested": settings.providers.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            "active": active,
            "skipped": skipped,
        },
        // Presence only; values are never printed.
        "credentials": {
            "pexels": creds.pexels_api_key.is_some(),
            "google_cse_key": creds.google_api_key.is_some(),
            "google_cse_cx": creds.google_cx.is_some(),
        },
        "knowledge": {
            "source": settings.knowledge.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "builtin".to_string()),
            "word_hints": kb.word_object_hints.len(),
            "category_hints": kb.category_hints.len(),
            "category_keywords": kb.category_keywords.len(),
            "noisy_tokens": kb.noisy_tokens.len(),
            "hard_reject_tokens": kb.hard_reject_tokens.len(),
            "place_like_tokens": kb.place_like_tokens.len(),
            "inappropriate_tokens": kb.inappropriate_tokens.len(),
            "ambiguous_words": kb.ambiguous_words.len(),
            "arasaac_aliases": kb.arasaac_aliases.len(),
        },
        "features": { "visual": visual::available() },
        "checks": checks,
    });

    match output {
        OutputFormat::Json => println!("{v}"),
        OutputFormat::Text => {
            println!("imgsync {} doctor: {}", env!("CARGO_PKG_VERSION"), if ok { "ok" } else { "problems found" });
            for c in &checks {
                let mark = if c["ok"].as_bool() == Some(true) { "ok  " } else { "FAIL" };
                println!("{mark} {}: {}", c["name"].as_str().unwrap_or(""), c["message"].as_str().unwrap_or(""));
                if let Some(hint) = c["hint"].as_str().filter(|h| !h.is_empty()) {
                    println!("     hint: {hint}");
                }
            }
            println!("providers active: {}", v["providers"]["active"]);
            println!("visual detector: {}", visual::available());
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let t0 = Instant::now();
    load_env_file();
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref(), cli.log_format)?;

    if let Commands::Version = cli.command {
        match cli.output.unwrap_or(OutputFormat::Json) {
            OutputFormat::Text => println!("imgsync {}", env!("CARGO_PKG_VERSION")),
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({
                    "schema_version": 1,
                    "kind": "version",
                    "ok": true,
                    "name": "imgsync",
                    "version": env!("CARGO_PKG_VERSION"),
                })
            ),
        }
        return Ok(());
    }

    let loaded = config::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Sync(cmd) => run_sync(cmd, &loaded, cli.output.unwrap_or(OutputFormat::Text)).await?,
        Commands::Search(cmd) => run_search(cmd, &loaded, cli.output.unwrap_or(OutputFormat::Json)).await?,
        Commands::Doctor(cmd) => run_doctor(cmd, &loaded, cli.output.unwrap_or(OutputFormat::Json), t0)?,
        Commands::Version => {}
    }
    Ok(())
}
