//! Error types for taxonomy loading and validation.

use std::path::PathBuf;

use thiserror::Error;

/// A taxonomy definition violated one of the structural rules.
///
/// Validation stops at the first violation; the variant names the offending
/// category (and concept, where one is involved).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The definition contains no categories at all.
    #[error("taxonomy defines no categories")]
    EmptyTaxonomy,

    /// Two categories share the same (case-sensitive) name.
    #[error("duplicate category '{category}'")]
    DuplicateCategory {
        /// The repeated category name.
        category: String,
    },

    /// A category lists no concepts.
    #[error("category '{category}' defines no concepts")]
    EmptyCategory {
        /// The empty category.
        category: String,
    },

    /// Two concepts inside one category share the same name.
    #[error("duplicate concept '{category}/{concept}'")]
    DuplicateConcept {
        /// The owning category.
        category: String,
        /// The repeated concept name.
        concept: String,
    },

    /// A concept has an empty search-term list.
    #[error("concept '{category}/{concept}' has no search terms")]
    EmptySearchTerms {
        /// The owning category.
        category: String,
        /// The concept without terms.
        concept: String,
    },

    /// A search term is empty or whitespace only.
    #[error("concept '{category}/{concept}' has a blank search term at position {position}")]
    BlankSearchTerm {
        /// The owning category.
        category: String,
        /// The concept holding the blank term.
        concept: String,
        /// Zero-based index of the term.
        position: usize,
    },

    /// A category or concept name cannot be used as a directory name.
    #[error("invalid name '{name}' in category '{category}': {reason}")]
    InvalidName {
        /// The category being validated (the name itself for category names).
        category: String,
        /// The concept, when the invalid name is a concept name.
        concept: Option<String>,
        /// The rejected name.
        name: String,
        /// Why the name was rejected.
        reason: &'static str,
    },

    /// A concept entry in a taxonomy file was not a single-key object.
    #[error(
        "category '{category}' entry {position} must map exactly one concept name to its terms (found {keys} keys)"
    )]
    MalformedConceptEntry {
        /// The owning category.
        category: String,
        /// Zero-based index of the entry within the category.
        position: usize,
        /// Number of keys found in the entry.
        keys: usize,
    },
}

impl ValidationError {
    /// Returns the category named by this error, if any.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        match self {
            Self::EmptyTaxonomy => None,
            Self::DuplicateCategory { category }
            | Self::EmptyCategory { category }
            | Self::DuplicateConcept { category, .. }
            | Self::EmptySearchTerms { category, .. }
            | Self::BlankSearchTerm { category, .. }
            | Self::InvalidName { category, .. }
            | Self::MalformedConceptEntry { category, .. } => Some(category),
        }
    }

    /// Returns the concept named by this error, if any.
    #[must_use]
    pub fn concept(&self) -> Option<&str> {
        match self {
            Self::DuplicateConcept { concept, .. }
            | Self::EmptySearchTerms { concept, .. }
            | Self::BlankSearchTerm { concept, .. } => Some(concept),
            Self::InvalidName { concept, .. } => concept.as_deref(),
            _ => None,
        }
    }
}

/// Errors that can occur while loading a taxonomy from a file or string.
#[derive(Debug, Error)]
pub enum TaxonomyError {
    /// The taxonomy file could not be read.
    #[error("failed to read taxonomy file {path}: {source}")]
    Io {
        /// The file that failed to read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The taxonomy document is not well-formed JSON of the expected shape.
    #[error("malformed taxonomy document: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document parsed but failed structural validation.
    #[error("invalid taxonomy: {0}")]
    Validation(#[from] ValidationError),
}

impl TaxonomyError {
    /// Creates an IO error with the file path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_concept_display_names_both_levels() {
        let error = ValidationError::DuplicateConcept {
            category: "C".to_string(),
            concept: "c1".to_string(),
        };
        assert_eq!(error.to_string(), "duplicate concept 'C/c1'");
        assert_eq!(error.category(), Some("C"));
        assert_eq!(error.concept(), Some("c1"));
    }

    #[test]
    fn test_category_level_errors_have_no_concept() {
        let error = ValidationError::DuplicateCategory {
            category: "shot_type".to_string(),
        };
        assert_eq!(error.category(), Some("shot_type"));
        assert_eq!(error.concept(), None);
        assert_eq!(ValidationError::EmptyTaxonomy.category(), None);
    }

    #[test]
    fn test_taxonomy_error_wraps_validation() {
        let error = TaxonomyError::from(ValidationError::EmptyTaxonomy);
        assert!(error.to_string().contains("invalid taxonomy"));
        assert!(matches!(error, TaxonomyError::Validation(_)));
    }
}
