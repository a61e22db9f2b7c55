//! Download tasks and taxonomy flattening.
//!
//! [`TaskBuilder`] walks a validated [`Taxonomy`] depth-first (categories, then
//! concepts, both in definition order) and produces one [`DownloadTask`] per
//! concept. The order is reproducible for a given taxonomy; it fixes dispatch
//! order, never completion order. Building tasks does not touch the filesystem.

mod config;

pub use config::{
    ConfigOverride, ConfigValueError, DEFAULT_MAX_IMAGES, DEFAULT_TASK_TIMEOUT, DownloadConfig,
    ImageFormat, SizeClass,
};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::taxonomy::Taxonomy;

/// One unit of work: fetch images for a single concept into its directory.
///
/// Created once by [`TaskBuilder`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    index: usize,
    category: String,
    concept: String,
    search_terms: Vec<String>,
    output_dir: PathBuf,
    config: Arc<DownloadConfig>,
}

impl DownloadTask {
    /// Position of this task in dispatch order (zero-based).
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Owning category name.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Concept name.
    #[must_use]
    pub fn concept(&self) -> &str {
        &self.concept
    }

    /// Search phrases for the concept.
    #[must_use]
    pub fn search_terms(&self) -> &[String] {
        &self.search_terms
    }

    /// Output directory, always `root/category/concept`.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Effective configuration for this task.
    #[must_use]
    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Returns `category/concept`, the label used in logs and summaries.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}/{}", self.category, self.concept)
    }
}

/// Flattens a taxonomy into an ordered task list.
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    root: PathBuf,
    config: Arc<DownloadConfig>,
    overrides: HashMap<String, ConfigOverride>,
}

impl TaskBuilder {
    /// Creates a builder writing under `root` with the run-wide `config`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, config: DownloadConfig) -> Self {
        Self {
            root: root.into(),
            config: Arc::new(config),
            overrides: HashMap::new(),
        }
    }

    /// Registers an override for every task in `category`.
    ///
    /// Registering a second override for the same category replaces the first.
    #[must_use]
    pub fn with_override(mut self, category: impl Into<String>, over: ConfigOverride) -> Self {
        self.overrides.insert(category.into(), over);
        self
    }

    /// Returns the output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns override categories that the taxonomy does not define, sorted.
    #[must_use]
    pub fn unknown_override_categories(&self, taxonomy: &Taxonomy) -> Vec<&str> {
        let mut unknown: Vec<&str> = self
            .overrides
            .keys()
            .map(String::as_str)
            .filter(|name| taxonomy.category(name).is_none())
            .collect();
        unknown.sort_unstable();
        unknown
    }

    /// Flattens `taxonomy` into tasks in depth-first definition order.
    #[must_use]
    pub fn build(&self, taxonomy: &Taxonomy) -> Vec<DownloadTask> {
        let mut tasks = Vec::with_capacity(taxonomy.concept_count());

        for category in taxonomy.categories() {
            let config = match self.overrides.get(category.name()) {
                Some(over) if !over.is_empty() => {
                    debug!(category = category.name(), ?over, "applying category override");
                    Arc::new(over.apply_to(&self.config))
                }
                _ => Arc::clone(&self.config),
            };
            let category_dir = self.root.join(category.name());

            for concept in category.concepts() {
                tasks.push(DownloadTask {
                    index: tasks.len(),
                    category: category.name().to_string(),
                    concept: concept.name().to_string(),
                    search_terms: concept.search_terms().to_vec(),
                    output_dir: category_dir.join(concept.name()),
                    config: Arc::clone(&config),
                });
            }
        }

        debug!(tasks = tasks.len(), root = %self.root.display(), "built download tasks");
        tasks
    }
}
