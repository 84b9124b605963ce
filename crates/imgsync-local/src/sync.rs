//! Batch orchestrator: walks dataset entries in order and, for each eligible one, runs
//! query variants → aggregation → ranking → download with fallback → commit.
//!
//! Every successful resolution is a commit point: the dataset and provenance files are
//! rewritten before the next entry starts, so an interrupted run loses at most the entry in
//! flight.

use crate::aggregate::Aggregator;
use crate::assets::{asset_relative_path, effective_mime};
use crate::dataset::DatasetStore;
use crate::gate::GateConfig;
use crate::knowledge::KnowledgeBase;
use crate::provenance::{now_timestamp, ProvenanceStore};
use crate::query::build_query_variants;
use crate::rank::{rank_candidates, Ranking};
use crate::visual::{looks_like_text_document, DocumentThresholds};
use crate::write_atomic;
use imgsync_core::{Candidate, DatasetEntry, FetchRequest, ImageFetcher, ProvenanceRecord, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Base directory for relative asset paths (and existence checks of current assets).
    pub root: PathBuf,
    /// Asset directory relative to `root`, `/`-separated.
    pub images_dir: String,
    pub gate: GateConfig,
    pub max_bytes: u64,
    pub refresh_existing: bool,
    pub replace_svg: bool,
    /// Stop after this many updates; 0 = unlimited.
    pub limit: usize,
    pub levels: BTreeSet<i64>,
    pub item_ids: BTreeSet<String>,
    pub preview_candidates: usize,
    pub auto_retry_candidates: usize,
    pub dry_run: bool,
    pub sleep: Duration,
    pub timeout_ms: u64,
    pub document: DocumentThresholds,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            images_dir: "assets/images".to_string(),
            gate: GateConfig::default(),
            max_bytes: DEFAULT_MAX_BYTES,
            refresh_existing: false,
            replace_svg: true,
            limit: 0,
            levels: BTreeSet::new(),
            item_ids: BTreeSet::new(),
            preview_candidates: 5,
            auto_retry_candidates: 6,
            dry_run: false,
            sleep: Duration::from_millis(150),
            timeout_ms: 20_000,
            document: DocumentThresholds::default(),
        }
    }
}

/// Whether an entry needs an image: no asset yet, a forced refresh, an SVG placeholder to
/// replace, or an asset path that no longer exists on disk.
pub fn should_process(entry: &DatasetEntry, root: &Path, refresh_existing: bool, replace_svg: bool) -> bool {
    let Some(asset) = entry.image_asset.as_deref().map(str::trim).filter(|a| !a.is_empty()) else {
        return true;
    };
    if refresh_existing {
        return true;
    }
    if replace_svg && asset.to_lowercase().ends_with(".svg") {
        return true;
    }
    !root.join(asset).exists()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewChoice {
    /// Index into the previewed slice.
    Pick(usize),
    Skip,
}

/// Interactive hook: shown the top candidates for an entry before anything is downloaded.
pub trait Reviewer {
    fn review(&mut self, entry: &DatasetEntry, preview: &[Candidate]) -> ReviewChoice;
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedEntry {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub interrupted: bool,
    pub dry_run: bool,
    pub dataset: String,
    pub sources: String,
    pub failures: Vec<FailedEntry>,
}

enum Outcome {
    Updated,
    SkippedByReviewer,
    Failed(String),
}

pub struct Syncer {
    kb: KnowledgeBase,
    aggregator: Aggregator,
    fetcher: Box<dyn ImageFetcher>,
    dataset: DatasetStore,
    provenance: ProvenanceStore,
    opts: SyncOptions,
    reviewer: Option<Box<dyn Reviewer>>,
    summary: SyncSummary,
}

impl Syncer {
    pub fn new(
        kb: KnowledgeBase,
        aggregator: Aggregator,
        fetcher: Box<dyn ImageFetcher>,
        dataset: DatasetStore,
        provenance: ProvenanceStore,
        opts: SyncOptions,
    ) -> Self {
        let summary = SyncSummary {
            dry_run: opts.dry_run,
            dataset: dataset.path().display().to_string(),
            sources: provenance.path().display().to_string(),
            ..Default::default()
        };
        Self {
            kb,
            aggregator,
            fetcher,
            dataset,
            provenance,
            opts,
            reviewer: None,
            summary,
        }
    }

    pub fn with_reviewer(mut self, reviewer: Box<dyn Reviewer>) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    pub fn summary(&self) -> &SyncSummary {
        &self.summary
    }

    pub fn provenance(&self) -> &ProvenanceStore {
        &self.provenance
    }

    fn selected(&self, entry: &DatasetEntry) -> bool {
        if entry.id.trim().is_empty() {
            return false;
        }
        if !self.opts.item_ids.is_empty() && !self.opts.item_ids.contains(entry.id.trim()) {
            return false;
        }
        if !self.opts.levels.is_empty() && !self.opts.levels.contains(&entry.level) {
            return false;
        }
        should_process(
            entry,
            &self.opts.root,
            self.opts.refresh_existing,
            self.opts.replace_svg,
        )
    }

    /// Process every eligible entry. Safe to drop at any await point: completed entries are
    /// already on disk. Only I/O errors while committing are returned.
    pub async fn run(&mut self) -> Result<()> {
        for (index, entry) in self.dataset.entries().into_iter().enumerate() {
            if !self.selected(&entry) {
                self.summary.skipped += 1;
                continue;
            }
            match self.process(index, &entry).await? {
                Outcome::Updated => self.summary.updated += 1,
                Outcome::SkippedByReviewer => {
                    info!(entry = %entry.id, "skipped by reviewer");
                    self.summary.skipped += 1;
                }
                Outcome::Failed(reason) => {
                    warn!(entry = %entry.id, reason = %reason, "entry not resolved");
                    self.summary.failed += 1;
                    self.summary.failures.push(FailedEntry {
                        id: entry.id.clone(),
                        reason,
                    });
                }
            }
            if self.opts.limit > 0 && self.summary.updated >= self.opts.limit {
                info!(limit = self.opts.limit, "update limit reached");
                break;
            }
            if !self.opts.sleep.is_zero() {
                tokio::time::sleep(self.opts.sleep).await;
            }
        }
        Ok(())
    }

    async fn process(&mut self, index: usize, entry: &DatasetEntry) -> Result<Outcome> {
        let queries = build_query_variants(&self.kb, entry);
        info!(
            entry = %entry.id,
            query = queries.first().map(String::as_str).unwrap_or(entry.id.as_str()),
            variants = queries.len(),
            "searching"
        );
        let found = self.aggregator.collect(&queries).await;
        let mut ranked = match rank_candidates(&self.kb, entry, found, &self.opts.gate) {
            Ranking::NoValid => return Ok(Outcome::Failed("no valid candidates".to_string())),
            Ranking::OnlySuspicious { rejected } => {
                return Ok(Outcome::Failed(format!(
                    "only suspicious candidates ({rejected}); retry later"
                )))
            }
            Ranking::Ranked(v) => v,
        };

        if let Some(reviewer) = self.reviewer.as_mut() {
            let n = self.opts.preview_candidates.clamp(1, ranked.len());
            match reviewer.review(entry, &ranked[..n]) {
                ReviewChoice::Skip => return Ok(Outcome::SkippedByReviewer),
                ReviewChoice::Pick(i) if i < n => {
                    // The pick is tried first; the rest of the ranking stays as fallback.
                    let picked = ranked.remove(i);
                    ranked.insert(0, picked);
                }
                ReviewChoice::Pick(_) => {}
            }
        }

        if self.opts.dry_run {
            let chosen = &ranked[0];
            let rel = self.relative_path(entry, chosen);
            info!(
                entry = %entry.id,
                provider = %chosen.provider,
                stored_as = %rel,
                score = chosen.score,
                "dry run: would download"
            );
            return Ok(Outcome::Updated);
        }

        let pool = self.opts.auto_retry_candidates.max(1);
        let mut last_error = String::from("no candidate downloaded");
        for cand in ranked.into_iter().take(pool) {
            let req = FetchRequest {
                url: cand.image_url.clone(),
                timeout_ms: Some(self.opts.timeout_ms),
                max_bytes: Some(self.opts.max_bytes),
            };
            let img = match self.fetcher.fetch(&req).await {
                Ok(img) => img,
                Err(e) => {
                    debug!(entry = %entry.id, url = %cand.image_url, error = %e, "download failed");
                    last_error = e.to_string();
                    continue;
                }
            };
            if img.truncated {
                debug!(entry = %entry.id, url = %cand.image_url, "download over size cap");
                last_error = format!("image larger than {} bytes", self.opts.max_bytes);
                continue;
            }
            if !cand.provider.is_pictogram()
                && looks_like_text_document(&img.bytes, &self.opts.document)
            {
                info!(entry = %entry.id, title = %cand.title, "discarded: looks like a text document");
                last_error = "only document-like images".to_string();
                continue;
            }
            self.commit(index, entry, &cand, &img.bytes)?;
            return Ok(Outcome::Updated);
        }
        Ok(Outcome::Failed(last_error))
    }

    fn relative_path(&self, entry: &DatasetEntry, c: &Candidate) -> String {
        let mime = effective_mime(c).unwrap_or_else(|| "image/jpeg".to_string());
        asset_relative_path(&self.opts.images_dir, &entry.category, &entry.id, &mime)
    }

    fn commit(&mut self, index: usize, entry: &DatasetEntry, c: &Candidate, bytes: &[u8]) -> Result<()> {
        let mime = effective_mime(c).unwrap_or_else(|| "image/jpeg".to_string());
        let rel = asset_relative_path(&self.opts.images_dir, &entry.category, &entry.id, &mime);
        write_atomic(&self.opts.root.join(&rel), bytes)?;
        self.dataset.set_image_asset(index, &rel)?;
        self.provenance.upsert(ProvenanceRecord::from_candidate(
            &entry.id,
            c,
            &mime,
            now_timestamp(),
            rel.clone(),
        ));
        self.dataset.save()?;
        self.provenance.save()?;
        info!(entry = %entry.id, provider = %c.provider, stored_as = %rel, "updated");
        Ok(())
    }

    /// Final flush (skipped in dry-run) and the run summary.
    pub fn finish(&mut self, interrupted: bool) -> Result<SyncSummary> {
        self.summary.interrupted = interrupted;
        if interrupted {
            warn!("interrupted; progress so far is saved");
        }
        if !self.opts.dry_run {
            self.dataset.save()?;
            self.provenance.save()?;
        }
        info!(
            updated = self.summary.updated,
            skipped = self.summary.skipped,
            failed = self.summary.failed,
            "sync finished"
        );
        Ok(self.summary.clone())
    }
}
