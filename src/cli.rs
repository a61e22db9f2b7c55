//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use imageset_core::DEFAULT_CONCURRENCY;
use imageset_core::task::{DEFAULT_MAX_IMAGES, DEFAULT_TASK_TIMEOUT, ImageFormat, SizeClass};

/// Default output root when neither the CLI nor the config file sets one.
pub const DEFAULT_ROOT: &str = "./data/download";

/// Build a labeled image dataset from a category/concept taxonomy.
///
/// Every concept in the taxonomy becomes one task that fetches images for its
/// search terms into `<root>/<category>/<concept>/`.
#[derive(Parser, Debug, Clone)]
#[command(name = "imageset")]
#[command(author, version, about)]
pub struct Args {
    /// Taxonomy JSON file (defaults to the bundled CinemaNet taxonomy)
    #[arg(short = 't', long, value_name = "FILE")]
    pub taxonomy: Option<PathBuf>,

    /// Output root directory [default: ./data/download]
    #[arg(long, value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Maximum concurrent tasks (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Skip concepts whose output directory already contains files
    #[arg(long)]
    pub resume: bool,

    /// Validate and flatten the taxonomy, print the task count, touch nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum images per search term
    #[arg(long, default_value_t = DEFAULT_MAX_IMAGES, value_parser = clap::value_parser!(u32).range(0..=10_000))]
    pub max_images: u32,

    /// Image format to request (jpg, png, gif, webp, any)
    #[arg(long = "format", value_name = "FORMAT", default_value_t = ImageFormat::default())]
    pub image_format: ImageFormat,

    /// Image size class to request (large, medium, icon, any)
    #[arg(long = "size", value_name = "SIZE", default_value_t = SizeClass::default())]
    pub size_class: SizeClass,

    /// Per-task timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TASK_TIMEOUT.as_secs(), value_parser = clap::value_parser!(u64).range(1..=86_400))]
    pub timeout_secs: u64,

    /// Image search endpoint URL (required unless --dry-run)
    #[arg(long, value_name = "URL")]
    pub search_endpoint: Option<String>,

    /// Write the run summary as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub summary_json: Option<PathBuf>,

    /// Config file (defaults to $XDG_CONFIG_HOME/imageset/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
