//! Configuration lifecycle: parse the CLI, load the config file, merge.
//!
//! Precedence is explicit CLI flag, then config file, then built-in default.
//! Flags with clap defaults are only treated as explicit when clap reports a
//! command-line value source.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgMatches, CommandFactory, FromArgMatches, parser::ValueSource};
use imageset_core::task::{ConfigOverride, DownloadConfig};

use crate::app::app_config::{FileConfig, VerbositySetting, load_file_config};
use crate::cli::{Args, DEFAULT_ROOT};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CliValueSources {
    pub(crate) concurrency: bool,
    pub(crate) max_images: bool,
    pub(crate) image_format: bool,
    pub(crate) size_class: bool,
    pub(crate) timeout_secs: bool,
    pub(crate) verbose: bool,
    pub(crate) quiet: bool,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub(crate) struct RunSettings {
    pub(crate) taxonomy: Option<PathBuf>,
    pub(crate) root: PathBuf,
    pub(crate) concurrency: usize,
    pub(crate) resume: bool,
    pub(crate) dry_run: bool,
    pub(crate) download: DownloadConfig,
    pub(crate) overrides: BTreeMap<String, ConfigOverride>,
    pub(crate) search_endpoint: Option<String>,
    pub(crate) summary_json: Option<PathBuf>,
    pub(crate) config_path: Option<PathBuf>,
    pub(crate) verbose: u8,
    pub(crate) quiet: bool,
}

pub(crate) fn parse_cli_with_sources() -> (Args, CliValueSources) {
    let command = Args::command();
    let matches = command.get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());

    let sources = CliValueSources {
        concurrency: is_commandline_value(&matches, "concurrency"),
        max_images: is_commandline_value(&matches, "max_images"),
        image_format: is_commandline_value(&matches, "image_format"),
        size_class: is_commandline_value(&matches, "size_class"),
        timeout_secs: is_commandline_value(&matches, "timeout_secs"),
        verbose: is_commandline_value(&matches, "verbose"),
        quiet: is_commandline_value(&matches, "quiet"),
    };
    (args, sources)
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Loads the config file named by `--config` (or the default one) and merges it.
pub(crate) fn resolve_config(args: Args, sources: &CliValueSources) -> Result<RunSettings> {
    let loaded = load_file_config(args.config.as_deref())?;
    let mut settings = merge_settings(args, sources, loaded.config.as_ref());
    if loaded.config.is_some() {
        settings.config_path = loaded.path;
    }
    Ok(settings)
}

pub(crate) fn merge_settings(
    args: Args,
    sources: &CliValueSources,
    file_config: Option<&FileConfig>,
) -> RunSettings {
    let explicit_root = args.root.is_some();
    let mut settings = RunSettings {
        taxonomy: args.taxonomy,
        root: args.root.unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT)),
        concurrency: usize::from(args.concurrency),
        resume: args.resume,
        dry_run: args.dry_run,
        download: DownloadConfig {
            max_images: args.max_images,
            image_format: args.image_format,
            size_class: args.size_class,
            timeout: Duration::from_secs(args.timeout_secs),
        },
        overrides: BTreeMap::new(),
        search_endpoint: args.search_endpoint,
        summary_json: args.summary_json,
        config_path: None,
        verbose: args.verbose,
        quiet: args.quiet,
    };

    let Some(file_config) = file_config else {
        return settings;
    };
    if !explicit_root && let Some(root) = &file_config.root {
        settings.root = root.clone();
    }
    if !sources.concurrency
        && let Some(concurrency) = file_config.concurrency
    {
        settings.concurrency = usize::from(concurrency);
    }
    if !sources.max_images
        && let Some(max_images) = file_config.max_images
    {
        settings.download.max_images = max_images;
    }
    if !sources.image_format
        && let Some(format) = file_config.image_format
    {
        settings.download.image_format = format;
    }
    if !sources.size_class
        && let Some(size) = file_config.size_class
    {
        settings.download.size_class = size;
    }
    if !sources.timeout_secs
        && let Some(secs) = file_config.timeout_secs
    {
        settings.download.timeout = Duration::from_secs(secs);
    }
    if settings.search_endpoint.is_none() {
        settings.search_endpoint.clone_from(&file_config.search_endpoint);
    }
    if !sources.verbose
        && !sources.quiet
        && let Some(verbosity) = file_config.verbosity
    {
        apply_config_verbosity(&mut settings, verbosity);
    }
    settings.overrides.clone_from(&file_config.overrides);

    settings
}

fn apply_config_verbosity(settings: &mut RunSettings, verbosity: VerbositySetting) {
    let (verbose, quiet) = match verbosity {
        VerbositySetting::Default => (0, false),
        VerbositySetting::Verbose => (1, false),
        VerbositySetting::Quiet => (0, true),
        VerbositySetting::Debug => (2, false),
    };
    settings.verbose = verbose;
    settings.quiet = quiet;
}

pub(crate) fn resolve_default_log_level(settings: &RunSettings) -> &'static str {
    if settings.quiet {
        "error"
    } else {
        match settings.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

pub(crate) fn should_force_cli_log_level(sources: &CliValueSources) -> bool {
    sources.verbose || sources.quiet
}
