use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "imgsync")]
#[command(
    about = "Find, rank and download offline images for a reading-practice dataset",
    long_about = None
)]
pub struct Cli {
    /// TOML config file (default: $IMGSYNC_CONFIG, else <config dir>/imgsync/config.toml if present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Log filter, e.g. `info` or `imgsync_local=debug` (default: $RUST_LOG, else info).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    /// Log line format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
    /// Output format on stdout (default: text for `sync`, json otherwise).
    #[arg(long, global = true, value_enum, alias = "format")]
    pub output: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve images for dataset entries and record where they came from.
    Sync(SyncCmd),
    /// Rank candidates for one word without downloading or writing anything.
    Search(SearchCmd),
    /// Report the resolved configuration (never prints secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version,
}

/// Options shared by every command that talks to providers or reads the dataset.
///
/// Everything is optional here so the config file can fill what the command line leaves out.
#[derive(Args, Debug, Default, Clone)]
pub struct CommonArgs {
    /// Base directory; dataset, sources and image paths are resolved against it.
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Dataset JSON (relative to root).
    #[arg(long)]
    pub dataset: Option<PathBuf>,
    /// Provenance JSON (relative to root).
    #[arg(long)]
    pub sources: Option<PathBuf>,
    /// Image directory (relative to root, `/`-separated).
    #[arg(long)]
    pub images_dir: Option<String>,
    /// Provider order, comma separated. Allowed: arasaac, pexels, openverse, wikimedia, google_cse
    #[arg(long, value_delimiter = ',')]
    pub providers: Option<Vec<String>>,
    #[arg(long)]
    pub per_provider_limit: Option<usize>,
    #[arg(long)]
    pub min_width: Option<u32>,
    #[arg(long)]
    pub min_height: Option<u32>,
    /// Accept candidates regardless of their license string.
    #[arg(long)]
    pub allow_any_license: bool,
    /// Judge Google results by their license string instead of trusting the rights filter.
    #[arg(long)]
    pub strict_google_license: bool,
    /// Per-request timeout for searches and downloads (ms).
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Pause after an HTTP 429 before moving to the next provider (ms).
    #[arg(long)]
    pub rate_limit_backoff_ms: Option<u64>,
    /// JSON knowledge-base file replacing the built-in hint tables.
    #[arg(long)]
    pub knowledge: Option<PathBuf>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct SyncCmd {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Download size cap (bytes).
    #[arg(long)]
    pub max_bytes: Option<u64>,
    /// Re-resolve entries that already have a working asset.
    #[arg(long)]
    pub refresh_existing: bool,
    /// Keep existing SVG assets instead of replacing them.
    #[arg(long)]
    pub no_replace_svg: bool,
    /// Stop after this many updates (0 = unlimited).
    #[arg(long)]
    pub limit: Option<usize>,
    /// Only entries of this level (repeatable; non-positive values are ignored).
    #[arg(long = "level", allow_negative_numbers = true)]
    pub levels: Vec<i64>,
    /// Only this entry id (repeatable).
    #[arg(long = "item-id")]
    pub item_ids: Vec<String>,
    /// Show the top candidates and ask which one to download.
    #[arg(long)]
    pub interactive: bool,
    #[arg(long)]
    pub preview_candidates: Option<usize>,
    /// How many ranked candidates to try before giving up on an entry.
    #[arg(long)]
    pub auto_retry_candidates: Option<usize>,
    /// Rank and report, but download and write nothing.
    #[arg(long)]
    pub dry_run: bool,
    /// Pause between entries (ms).
    #[arg(long)]
    pub sleep_ms: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct SearchCmd {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Word to search for (as it appears in the dataset).
    pub word: String,
    /// Dataset category of the word, e.g. "COSAS DE CASA".
    #[arg(long, default_value = "")]
    pub category: String,
    /// How many ranked candidates to print.
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[derive(Args, Debug, Default, Clone)]
pub struct DoctorCmd {
    #[command(flatten)]
    pub common: CommonArgs,
}
