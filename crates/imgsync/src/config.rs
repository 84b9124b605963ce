//! Configuration resolution: command-line flag, then config file, then built-in default.

use crate::cli::SyncCmd;
use anyhow::{Context, Result};
use imgsync_core::Provider;
use imgsync_local::aggregate::DEFAULT_RATE_LIMIT_BACKOFF;
use imgsync_local::gate::GateConfig;
use imgsync_local::sync::{SyncOptions, DEFAULT_MAX_BYTES};
use imgsync_local::visual::DocumentThresholds;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const CONFIG_ENV: &str = "IMGSYNC_CONFIG";
pub const DEFAULT_DATASET: &str = "assets/data/lectoescritura_dataset.json";
pub const DEFAULT_SOURCES: &str = "assets/data/image_sources.json";
pub const DEFAULT_PROVIDERS: [Provider; 5] = [
    Provider::Arasaac,
    Provider::Pexels,
    Provider::Openverse,
    Provider::Wikimedia,
    Provider::GoogleCse,
];

/// The TOML file. Every key is optional; keys mirror the long flag names with `_`.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub root: Option<PathBuf>,
    pub dataset: Option<PathBuf>,
    pub sources: Option<PathBuf>,
    pub images_dir: Option<String>,
    pub providers: Option<Vec<String>>,
    pub per_provider_limit: Option<usize>,
    pub min_width: Option<u32>,
    pub min_height: Option<u32>,
    pub max_bytes: Option<u64>,
    pub refresh_existing: Option<bool>,
    pub replace_svg: Option<bool>,
    pub require_free_license: Option<bool>,
    pub accept_google_rights_filter: Option<bool>,
    pub limit: Option<usize>,
    #[serde(alias = "level")]
    pub levels: Option<Vec<i64>>,
    #[serde(alias = "item_id")]
    pub item_ids: Option<Vec<String>>,
    pub interactive: Option<bool>,
    pub preview_candidates: Option<usize>,
    pub auto_retry_candidates: Option<usize>,
    pub dry_run: Option<bool>,
    pub sleep_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub rate_limit_backoff_ms: Option<u64>,
    pub knowledge: Option<PathBuf>,
    /// Document-detector thresholds; missing keys keep their defaults.
    pub document: Option<DocumentThresholds>,
}

#[derive(Debug, Default, Clone)]
pub struct LoadedConfig {
    pub path: Option<PathBuf>,
    pub file: FileConfig,
}

/// An explicit path (flag or `$IMGSYNC_CONFIG`) must be readable; the per-user default is
/// only used when it exists.
pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let from_env = std::env::var(CONFIG_ENV)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from);
    let (path, required) = match explicit.map(Path::to_path_buf).or(from_env) {
        Some(p) => (p, true),
        None => match dirs::config_dir() {
            Some(d) => (d.join("imgsync").join("config.toml"), false),
            None => return Ok(LoadedConfig::default()),
        },
    };
    if !required && !path.exists() {
        return Ok(LoadedConfig::default());
    }
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("read config file {}", path.display()))?;
    let file = parse(&raw).with_context(|| format!("parse config file {}", path.display()))?;
    Ok(LoadedConfig {
        path: Some(path),
        file,
    })
}

pub fn parse(raw: &str) -> Result<FileConfig> {
    Ok(toml::from_str(raw)?)
}

/// Parse provider names in order. Unknown names are logged once and dropped; repeats are
/// dropped silently.
pub fn parse_providers(names: &[String]) -> Vec<Provider> {
    let mut out = Vec::new();
    let mut unknown: Vec<&str> = Vec::new();
    for raw in names {
        let name = raw.trim();
        if name.is_empty() {
            continue;
        }
        match Provider::from_str(name) {
            Ok(p) if !out.contains(&p) => out.push(p),
            Ok(_) => {}
            Err(_) if !unknown.contains(&name) => {
                warn!(provider = %name, "unknown provider; ignored");
                unknown.push(name);
            }
            Err(_) => {}
        }
    }
    out
}

/// Fully resolved settings for one command invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub dataset: PathBuf,
    pub sources: PathBuf,
    pub providers: Vec<Provider>,
    pub per_provider_limit: usize,
    pub timeout_ms: u64,
    pub rate_limit_backoff: Duration,
    pub knowledge: Option<PathBuf>,
    pub interactive: bool,
    pub sync: SyncOptions,
}

impl Settings {
    pub fn resolve(cmd: &SyncCmd, file: &FileConfig) -> Self {
        let common = &cmd.common;
        let defaults = SyncOptions::default();

        let root = common
            .root
            .clone()
            .or_else(|| file.root.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        let dataset = root.join(
            common
                .dataset
                .clone()
                .or_else(|| file.dataset.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET)),
        );
        let sources = root.join(
            common
                .sources
                .clone()
                .or_else(|| file.sources.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCES)),
        );
        let providers = match common.providers.as_ref().or(file.providers.as_ref()) {
            Some(names) => parse_providers(names),
            None => DEFAULT_PROVIDERS.to_vec(),
        };

        let gate = GateConfig {
            min_width: common
                .min_width
                .or(file.min_width)
                .unwrap_or(defaults.gate.min_width),
            min_height: common
                .min_height
                .or(file.min_height)
                .unwrap_or(defaults.gate.min_height),
            require_free_license: !common.allow_any_license
                && file
                    .require_free_license
                    .unwrap_or(defaults.gate.require_free_license),
            accept_google_rights_filter: !common.strict_google_license
                && file
                    .accept_google_rights_filter
                    .unwrap_or(defaults.gate.accept_google_rights_filter),
        };

        let levels = if cmd.levels.is_empty() {
            file.levels.clone().unwrap_or_default()
        } else {
            cmd.levels.clone()
        };
        let item_ids = if cmd.item_ids.is_empty() {
            file.item_ids.clone().unwrap_or_default()
        } else {
            cmd.item_ids.clone()
        };
        let timeout_ms = common
            .timeout_ms
            .or(file.timeout_ms)
            .unwrap_or(defaults.timeout_ms);

        let sync = SyncOptions {
            root: root.clone(),
            images_dir: common
                .images_dir
                .clone()
                .or_else(|| file.images_dir.clone())
                .unwrap_or(defaults.images_dir),
            gate,
            max_bytes: cmd.max_bytes.or(file.max_bytes).unwrap_or(DEFAULT_MAX_BYTES),
            refresh_existing: cmd.refresh_existing || file.refresh_existing.unwrap_or(false),
            replace_svg: !cmd.no_replace_svg && file.replace_svg.unwrap_or(defaults.replace_svg),
            limit: cmd.limit.or(file.limit).unwrap_or(0),
            levels: levels.into_iter().filter(|l| *l > 0).collect(),
            item_ids: item_ids
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            preview_candidates: cmd
                .preview_candidates
                .or(file.preview_candidates)
                .unwrap_or(defaults.preview_candidates),
            auto_retry_candidates: cmd
                .auto_retry_candidates
                .or(file.auto_retry_candidates)
                .unwrap_or(defaults.auto_retry_candidates),
            dry_run: cmd.dry_run || file.dry_run.unwrap_or(false),
            sleep: cmd
                .sleep_ms
                .or(file.sleep_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.sleep),
            timeout_ms,
            document: file.document.unwrap_or_default(),
        };

        Self {
            root,
            dataset,
            sources,
            providers,
            per_provider_limit: common
                .per_provider_limit
                .or(file.per_provider_limit)
                .unwrap_or(10),
            timeout_ms,
            rate_limit_backoff: common
                .rate_limit_backoff_ms
                .or(file.rate_limit_backoff_ms)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_RATE_LIMIT_BACKOFF),
            knowledge: common.knowledge.clone().or_else(|| file.knowledge.clone()),
            interactive: cmd.interactive || file.interactive.unwrap_or(false),
            sync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn sync_cmd(args: &[&str]) -> SyncCmd {
        let argv = std::iter::once("imgsync")
            .chain(std::iter::once("sync"))
            .chain(args.iter().copied());
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Sync(cmd) => cmd,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn built_in_defaults() {
        let s = Settings::resolve(&sync_cmd(&[]), &FileConfig::default());
        assert_eq!(s.root, PathBuf::from("."));
        assert_eq!(s.dataset, Path::new(".").join(DEFAULT_DATASET));
        assert_eq!(s.sources, Path::new(".").join(DEFAULT_SOURCES));
        assert_eq!(s.providers, DEFAULT_PROVIDERS.to_vec());
        assert_eq!(s.per_provider_limit, 10);
        assert_eq!(s.timeout_ms, 20_000);
        assert_eq!(s.rate_limit_backoff, Duration::from_millis(2_500));
        assert_eq!(s.sync.gate, GateConfig::default());
        assert_eq!(s.sync.max_bytes, 8 * 1024 * 1024);
        assert_eq!(s.sync.sleep, Duration::from_millis(150));
        assert_eq!(s.sync.images_dir, "assets/images");
        assert!(s.sync.replace_svg && !s.sync.refresh_existing && !s.sync.dry_run);
        assert!(!s.interactive);
        assert!(s.knowledge.is_none());
    }

    #[test]
    fn flag_beats_file_beats_default() {
        let file = parse(
            r#"
root = "/data/app"
per_provider_limit = 4
min_width = 800
sleep_ms = 0
providers = ["wikimedia", "openverse"]
replace_svg = false
require_free_license = false

[document]
white_level = 240
"#,
        )
        .unwrap();
        let s = Settings::resolve(&sync_cmd(&["--per-provider-limit", "7"]), &file);
        assert_eq!(s.per_provider_limit, 7);
        assert_eq!(s.sync.gate.min_width, 800);
        assert_eq!(s.sync.gate.min_height, 480);
        assert!(!s.sync.gate.require_free_license);
        assert!(!s.sync.replace_svg);
        assert!(s.sync.sleep.is_zero());
        assert_eq!(s.providers, vec![Provider::Wikimedia, Provider::Openverse]);
        assert_eq!(s.dataset, Path::new("/data/app").join(DEFAULT_DATASET));
        assert_eq!(s.sync.document.white_level, 240);
        assert_eq!(s.sync.document.dark_level, DocumentThresholds::default().dark_level);

        let s = Settings::resolve(&sync_cmd(&["--root", "/elsewhere", "--providers", "arasaac"]), &file);
        assert_eq!(s.root, PathBuf::from("/elsewhere"));
        assert_eq!(s.providers, vec![Provider::Arasaac]);
    }

    #[test]
    fn negative_flags_override_file_booleans() {
        let file = parse("replace_svg = true\naccept_google_rights_filter = true\n").unwrap();
        let s = Settings::resolve(
            &sync_cmd(&["--no-replace-svg", "--strict-google-license", "--allow-any-license"]),
            &file,
        );
        assert!(!s.sync.replace_svg);
        assert!(!s.sync.gate.accept_google_rights_filter);
        assert!(!s.sync.gate.require_free_license);
    }

    #[test]
    fn filters_drop_non_positive_levels_and_blank_ids() {
        let s = Settings::resolve(
            &sync_cmd(&["--level", "0", "--level", "2", "--level", "-1", "--item-id", " ", "--item-id", "sol_01 "]),
            &FileConfig::default(),
        );
        assert_eq!(s.sync.levels.into_iter().collect::<Vec<_>>(), vec![2]);
        assert_eq!(s.sync.item_ids.into_iter().collect::<Vec<_>>(), vec!["sol_01"]);

        let file = parse("level = [3]\nitem_id = [\"mesa_01\"]\n").unwrap();
        let s = Settings::resolve(&sync_cmd(&[]), &file);
        assert!(s.sync.levels.contains(&3));
        assert!(s.sync.item_ids.contains("mesa_01"));
    }

    #[test]
    fn unknown_providers_are_dropped() {
        let names: Vec<String> = ["pexels", "flickr", " wikimedia ", "flickr", "pexels", ""]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(parse_providers(&names), vec![Provider::Pexels, Provider::Wikimedia]);
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        assert!(parse("per_provider_limt = 3\n").is_err());
        assert!(parse("min_width = \"wide\"\n").is_err());
    }

    #[test]
    fn unknown_document_threshold_keys_are_rejected() {
        assert!(parse("[document]\nwhite_levl = 240\n").is_err());
        let ok = parse("[document]\nwhite_level = 240\n").unwrap();
        assert_eq!(ok.document.unwrap().white_level, 240);
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load(Some(&tmp.path().join("missing.toml"))).is_err());

        let p = tmp.path().join("imgsync.toml");
        std::fs::write(&p, "limit = 3\n").unwrap();
        let loaded = load(Some(&p)).unwrap();
        assert_eq!(loaded.path.as_deref(), Some(p.as_path()));
        assert_eq!(loaded.file.limit, Some(3));
    }
}
