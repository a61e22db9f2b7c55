//! JSON document shape for taxonomy files.
//!
//! `serde_json` maps keep only the last value for a repeated key, which would
//! silently hide duplicate categories or concepts. These visitors keep every
//! entry in document order so validation can report duplicates instead.

use std::fmt;

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};

use super::error::ValidationError;
use super::{CategoryDefinition, ConceptDefinition, TaxonomyDefinition};

/// A parsed taxonomy file before validation.
#[derive(Debug)]
pub(super) struct TaxonomyDocument(Vec<(String, Vec<ConceptEntry>)>);

/// One `{ "<concept>": ["term", ...] }` entry of a category list.
#[derive(Debug)]
pub(super) struct ConceptEntry(Vec<(String, Vec<String>)>);

impl TaxonomyDocument {
    /// Converts the document into a definition, rejecting entries that do not
    /// hold exactly one concept.
    pub(super) fn into_definition(self) -> Result<TaxonomyDefinition, ValidationError> {
        let mut categories = Vec::with_capacity(self.0.len());
        for (category, entries) in self.0 {
            let mut concepts = Vec::with_capacity(entries.len());
            for (position, ConceptEntry(mut pairs)) in entries.into_iter().enumerate() {
                if pairs.len() != 1 {
                    return Err(ValidationError::MalformedConceptEntry {
                        category,
                        position,
                        keys: pairs.len(),
                    });
                }
                if let Some((name, search_terms)) = pairs.pop() {
                    concepts.push(ConceptDefinition { name, search_terms });
                }
            }
            categories.push(CategoryDefinition {
                name: category,
                concepts,
            });
        }
        Ok(TaxonomyDefinition { categories })
    }
}

impl<'de> Deserialize<'de> for TaxonomyDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DocumentVisitor;

        impl<'de> Visitor<'de> for DocumentVisitor {
            type Value = TaxonomyDocument;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an object mapping category names to concept lists")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut categories = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, Vec<ConceptEntry>>()? {
                    categories.push(entry);
                }
                Ok(TaxonomyDocument(categories))
            }
        }

        deserializer.deserialize_map(DocumentVisitor)
    }
}

impl<'de> Deserialize<'de> for ConceptEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntryVisitor;

        impl<'de> Visitor<'de> for EntryVisitor {
            type Value = ConceptEntry;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an object mapping a concept name to its search terms")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(1);
                while let Some(pair) = map.next_entry::<String, Vec<String>>()? {
                    pairs.push(pair);
                }
                Ok(ConceptEntry(pairs))
            }
        }

        deserializer.deserialize_map(EntryVisitor)
    }
}
