//! Keyed storage for Glyph sources.

use std::collections::BTreeMap;

use crate::error::CoreError;

/// A set of changes: `Some(text)` writes a source, `None` removes it.
pub type SourceDiff = BTreeMap<String, Option<String>>;

pub trait SourceStore {
    fn get(&self, id: &str) -> Option<String>;

    /// Apply every entry of `diff`. A failing entry stops the rest.
    fn apply(&mut self, diff: SourceDiff) -> Result<(), CoreError>;

    /// Stored ids in ascending order.
    fn ids(&self) -> Vec<String>;

    /// Like [`SourceStore::get`], but a missing id is an error.
    fn require(&self, id: &str) -> Result<String, CoreError> {
        self.get(id)
            .ok_or_else(|| CoreError::MissingSource(id.to_string()))
    }
}

/// Id of the test source that accompanies `id`.
pub fn test_source_id(id: &str) -> String {
    format!("{id}.test")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    sources: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FromIterator<(String, String)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        MemoryStore {
            sources: iter.into_iter().collect(),
        }
    }
}

impl SourceStore for MemoryStore {
    fn get(&self, id: &str) -> Option<String> {
        self.sources.get(id).cloned()
    }

    fn apply(&mut self, diff: SourceDiff) -> Result<(), CoreError> {
        for (id, change) in diff {
            match change {
                Some(text) => {
                    self.sources.insert(id, text);
                }
                None => {
                    self.sources.remove(&id);
                }
            }
        }
        Ok(())
    }

    fn ids(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }
}
