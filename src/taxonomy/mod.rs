//! Taxonomy loading and validation.
//!
//! A taxonomy is an ordered mapping of category names to ordered concept lists,
//! where every concept carries one or more human search phrases. It drives the
//! whole run: each concept becomes one download task and one output directory.
//!
//! # Sources
//!
//! - [`TaxonomyDefinition`] - in-memory definition, e.g. built in code or tests
//! - [`TaxonomyLoader::from_json_str`] / [`TaxonomyLoader::from_path`] - JSON files
//! - [`TaxonomyLoader::builtin`] - the bundled CinemaNet taxonomy
//!
//! Whatever the source, [`TaxonomyLoader::load`] validates the definition and
//! returns an immutable [`Taxonomy`], or the first [`ValidationError`] found.
//!
//! # Example
//!
//! ```
//! use imageset_core::taxonomy::{TaxonomyDefinition, TaxonomyLoader};
//!
//! let definition = TaxonomyDefinition::new().with_category(
//!     "shot_type",
//!     [("shot_type_closeup", ["closeup shot"]), ("shot_type_wide", ["wide shot"])],
//! );
//! let taxonomy = TaxonomyLoader::load(definition).unwrap();
//! assert_eq!(taxonomy.concept_count(), 2);
//! ```

mod document;
mod error;

pub use error::{TaxonomyError, ValidationError};

use std::collections::HashSet;
use std::path::{Component, Path};

use tracing::{debug, instrument};

use document::TaxonomyDocument;

/// The CinemaNet taxonomy bundled with the crate.
const BUILTIN_TAXONOMY: &str = include_str!("../../taxonomy/cinemanet.json");

/// An unvalidated taxonomy, in definition order.
///
/// May contain duplicates or empty lists; [`TaxonomyLoader::load`] rejects them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonomyDefinition {
    /// Categories in insertion order.
    pub categories: Vec<CategoryDefinition>,
}

/// An unvalidated category entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDefinition {
    /// Category name (becomes the first-level directory).
    pub name: String,
    /// Concepts in insertion order.
    pub concepts: Vec<ConceptDefinition>,
}

/// An unvalidated concept entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptDefinition {
    /// Concept name (becomes the second-level directory).
    pub name: String,
    /// Search phrases for this concept.
    pub search_terms: Vec<String>,
}

impl TaxonomyDefinition {
    /// Creates an empty definition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a category with `(concept, terms)` pairs, keeping order.
    #[must_use]
    pub fn with_category<I, N, T, S>(mut self, name: impl Into<String>, concepts: I) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let concepts = concepts
            .into_iter()
            .map(|(concept, terms)| ConceptDefinition {
                name: concept.into(),
                search_terms: terms.into_iter().map(Into::into).collect(),
            })
            .collect();
        self.categories.push(CategoryDefinition {
            name: name.into(),
            concepts,
        });
        self
    }
}

/// A named leaf of the taxonomy with its search phrases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concept {
    name: String,
    search_terms: Vec<String>,
}

impl Concept {
    /// Returns the concept name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the search phrases, in definition order. Never empty.
    #[must_use]
    pub fn search_terms(&self) -> &[String] {
        &self.search_terms
    }
}

/// A validated category and its concepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    name: String,
    concepts: Vec<Concept>,
}

impl Category {
    /// Returns the category name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the concepts, in definition order. Never empty.
    #[must_use]
    pub fn concepts(&self) -> &[Concept] {
        &self.concepts
    }
}

/// A validated, immutable taxonomy.
///
/// Category names are unique, concept names are unique within their category,
/// and every concept has at least one non-blank search term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    categories: Vec<Category>,
}

impl Taxonomy {
    /// Returns the categories, in definition order.
    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Looks up a category by exact name.
    #[must_use]
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Returns the total number of concepts across all categories.
    #[must_use]
    pub fn concept_count(&self) -> usize {
        self.categories.iter().map(|c| c.concepts.len()).sum()
    }

    /// Iterates `(category, concept)` pairs depth-first in definition order.
    pub fn concepts(&self) -> impl Iterator<Item = (&Category, &Concept)> {
        self.categories
            .iter()
            .flat_map(|category| category.concepts.iter().map(move |c| (category, c)))
    }
}

/// Parses and validates taxonomy definitions.
#[derive(Debug, Clone, Copy)]
pub struct TaxonomyLoader;

impl TaxonomyLoader {
    /// Validates a definition and returns the immutable taxonomy.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered, walking categories
    /// and concepts in definition order.
    #[instrument(level = "debug", skip(definition), fields(categories = definition.categories.len()))]
    pub fn load(definition: TaxonomyDefinition) -> Result<Taxonomy, ValidationError> {
        if definition.categories.is_empty() {
            return Err(ValidationError::EmptyTaxonomy);
        }

        let mut seen_categories = HashSet::with_capacity(definition.categories.len());
        let mut categories = Vec::with_capacity(definition.categories.len());

        for category in definition.categories {
            if let Some(reason) = invalid_segment_reason(&category.name) {
                return Err(ValidationError::InvalidName {
                    category: category.name.clone(),
                    concept: None,
                    name: category.name,
                    reason,
                });
            }
            if !seen_categories.insert(category.name.clone()) {
                return Err(ValidationError::DuplicateCategory {
                    category: category.name,
                });
            }
            if category.concepts.is_empty() {
                return Err(ValidationError::EmptyCategory {
                    category: category.name,
                });
            }

            let concepts = validate_concepts(&category.name, category.concepts)?;
            categories.push(Category {
                name: category.name,
                concepts,
            });
        }

        let taxonomy = Taxonomy { categories };
        debug!(
            categories = taxonomy.categories.len(),
            concepts = taxonomy.concept_count(),
            "taxonomy validated"
        );
        Ok(taxonomy)
    }

    /// Parses a JSON taxonomy document and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`TaxonomyError::Parse`] for malformed JSON and
    /// [`TaxonomyError::Validation`] for structural violations.
    pub fn from_json_str(raw: &str) -> Result<Taxonomy, TaxonomyError> {
        let document: TaxonomyDocument = serde_json::from_str(raw)?;
        let definition = document.into_definition()?;
        Ok(Self::load(definition)?)
    }

    /// Reads a JSON taxonomy file and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`TaxonomyError::Io`] when the file cannot be read, otherwise
    /// the same errors as [`Self::from_json_str`].
    #[instrument(level = "debug", fields(path = %path.display()))]
    pub fn from_path(path: &Path) -> Result<Taxonomy, TaxonomyError> {
        let raw = std::fs::read_to_string(path).map_err(|e| TaxonomyError::io(path, e))?;
        Self::from_json_str(&raw)
    }

    /// Loads the bundled CinemaNet taxonomy.
    ///
    /// # Errors
    ///
    /// Fails only if the bundled document is itself invalid.
    pub fn builtin() -> Result<Taxonomy, TaxonomyError> {
        Self::from_json_str(BUILTIN_TAXONOMY)
    }
}

fn validate_concepts(
    category: &str,
    definitions: Vec<ConceptDefinition>,
) -> Result<Vec<Concept>, ValidationError> {
    let mut seen = HashSet::with_capacity(definitions.len());
    let mut concepts = Vec::with_capacity(definitions.len());

    for concept in definitions {
        if let Some(reason) = invalid_segment_reason(&concept.name) {
            return Err(ValidationError::InvalidName {
                category: category.to_string(),
                concept: Some(concept.name.clone()),
                name: concept.name,
                reason,
            });
        }
        if !seen.insert(concept.name.clone()) {
            return Err(ValidationError::DuplicateConcept {
                category: category.to_string(),
                concept: concept.name,
            });
        }
        if concept.search_terms.is_empty() {
            return Err(ValidationError::EmptySearchTerms {
                category: category.to_string(),
                concept: concept.name,
            });
        }
        if let Some(position) = concept
            .search_terms
            .iter()
            .position(|term| term.trim().is_empty())
        {
            return Err(ValidationError::BlankSearchTerm {
                category: category.to_string(),
                concept: concept.name,
                position,
            });
        }

        concepts.push(Concept {
            name: concept.name,
            search_terms: concept.search_terms,
        });
    }

    Ok(concepts)
}

/// Returns why `name` cannot be a single directory name, or `None` if it can.
fn invalid_segment_reason(name: &str) -> Option<&'static str> {
    if name.trim().is_empty() {
        return Some("name is empty");
    }
    if name != name.trim() {
        return Some("name has leading or trailing whitespace");
    }
    if name.contains('/') || name.contains('\\') {
        return Some("name contains a path separator");
    }
    if name.chars().any(char::is_control) {
        return Some("name contains control characters");
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => None,
        _ => Some("name is not a plain directory name"),
    }
}
