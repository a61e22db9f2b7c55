use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result, bail};
use imageset_core::{
    DownloadClient, HttpSearchClient, PoolOptions, ResultAggregator, TaskBuilder, Taxonomy,
    TaxonomyLoader, WorkerPool,
};
use tracing::{debug, info, warn};

use crate::app::config_manager::{self, RunSettings};
use crate::app::{exit_handler, progress_manager, terminal};
use crate::{ProcessExit, output};

pub(crate) async fn run_imageset() -> Result<ProcessExit> {
    let (cli, cli_sources) = config_manager::parse_cli_with_sources();
    let settings = config_manager::resolve_config(cli, &cli_sources)?;

    let default_level = config_manager::resolve_default_log_level(&settings);
    let force_cli_log_level = config_manager::should_force_cli_log_level(&cli_sources);
    terminal::init_tracing(
        default_level,
        force_cli_log_level,
        terminal::is_no_color_requested(),
    );

    debug!(?settings, "settings resolved");
    if let Some(path) = &settings.config_path {
        info!(path = %path.display(), "loaded config file");
    }

    let taxonomy = load_taxonomy(&settings)?;
    let builder = settings.overrides.iter().fold(
        TaskBuilder::new(settings.root.clone(), settings.download.clone()),
        |builder, (category, over)| builder.with_override(category.clone(), over.clone()),
    );
    for category in builder.unknown_override_categories(&taxonomy) {
        warn!(category, "config override names a category missing from the taxonomy");
    }
    let tasks = builder.build(&taxonomy);

    if settings.dry_run {
        info!(tasks = tasks.len(), "dry run, nothing written");
        output::print_dry_run(&tasks, settings.verbose > 0);
        return Ok(ProcessExit::Success);
    }

    let Some(endpoint) = settings.search_endpoint.as_deref() else {
        bail!("no search endpoint configured; pass --search-endpoint or set search_endpoint in the config file");
    };
    let client: Arc<dyn DownloadClient> = Arc::new(
        HttpSearchClient::new(endpoint)
            .with_context(|| format!("invalid search endpoint {endpoint}"))?,
    );

    let pool = WorkerPool::new(settings.concurrency)?.with_options(PoolOptions {
        resume: settings.resume,
    });
    let aggregator = Arc::new(ResultAggregator::new(tasks.len()));

    info!(
        tasks = tasks.len(),
        concurrency = pool.concurrency(),
        root = %settings.root.display(),
        "starting downloads"
    );

    let cancel = pool.cancellation_token();
    let interrupt_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight tasks");
            cancel.cancel();
        }
    });

    let use_bar = terminal::should_use_progress_bar(
        io::stderr().is_terminal(),
        settings.quiet,
        terminal::is_dumb_terminal(),
    );
    let (progress_handle, progress_stop) =
        progress_manager::spawn_progress_ui(use_bar, pool.board(), Arc::clone(&aggregator));

    pool.run(tasks, client, &aggregator).await;

    progress_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }
    interrupt_task.abort();

    let summary = aggregator
        .finalize()
        .context("internal consistency error while aggregating results")?;

    if !settings.quiet {
        output::print_run_summary(&summary, &settings.root);
    }
    if let Some(path) = &settings.summary_json {
        output::write_summary_json(path, &summary)?;
        info!(path = %path.display(), "summary written");
    }

    Ok(exit_handler::determine_exit_outcome(&summary))
}

fn load_taxonomy(settings: &RunSettings) -> Result<Taxonomy> {
    let taxonomy = match &settings.taxonomy {
        Some(path) => TaxonomyLoader::from_path(path)
            .with_context(|| format!("loading taxonomy {}", path.display()))?,
        None => TaxonomyLoader::builtin().context("loading bundled taxonomy")?,
    };
    info!(
        categories = taxonomy.categories().len(),
        concepts = taxonomy.concept_count(),
        "taxonomy loaded"
    );
    Ok(taxonomy)
}
