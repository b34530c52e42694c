use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ItemId, PageId};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DocumentError {
    #[error("progress document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Learned items per page.
///
/// Every page maps to a sorted, de-duplicated set, so two documents with the
/// same membership always serialize to the same bytes. Pages whose set is
/// empty are not stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressDocument {
    pages: BTreeMap<PageId, BTreeSet<ItemId>>,
}

/// Persisted shape: `{"pages": {"<page>": ["<item>", ...]}}`.
#[derive(Serialize)]
struct WrappedRef<'a> {
    pages: &'a BTreeMap<PageId, BTreeSet<ItemId>>,
}

// Read as plain strings so every id goes through the same trimming and
// validation as ids built from labels.
#[derive(Deserialize)]
#[serde(untagged)]
enum PersistedShape {
    Wrapped { pages: BTreeMap<String, Vec<String>> },
    // Older exports stored the page mapping without the wrapper.
    Legacy(BTreeMap<String, Vec<String>>),
}

impl ProgressDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current learned set for a page; empty if the page has never been touched.
    #[must_use]
    pub fn get_set(&self, page: &PageId) -> BTreeSet<ItemId> {
        self.pages.get(page).cloned().unwrap_or_default()
    }

    /// Replace the learned set for a page.
    pub fn set_set(&mut self, page: &PageId, items: impl IntoIterator<Item = ItemId>) {
        let set: BTreeSet<ItemId> = items.into_iter().collect();
        if set.is_empty() {
            self.pages.remove(page);
        } else {
            self.pages.insert(page.clone(), set);
        }
    }

    /// Flip membership of `item` on `page`. Returns whether it is now learned.
    pub fn toggle(&mut self, page: &PageId, item: &ItemId) -> bool {
        let set = self.pages.entry(page.clone()).or_default();
        let learned = if set.remove(item) {
            false
        } else {
            set.insert(item.clone());
            true
        };
        if set.is_empty() {
            self.pages.remove(page);
        }
        learned
    }

    #[must_use]
    pub fn contains(&self, page: &PageId, item: &ItemId) -> bool {
        self.pages.get(page).is_some_and(|set| set.contains(item))
    }

    #[must_use]
    pub fn learned_count(&self, page: &PageId) -> usize {
        self.pages.get(page).map_or(0, BTreeSet::len)
    }

    pub fn page_ids(&self) -> impl Iterator<Item = &PageId> {
        self.pages.keys()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Serialize into the wrapped, human-readable form.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError` if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(&WrappedRef { pages: &self.pages })?)
    }

    /// Serialize into the compact form used by the durable store.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError` if serialization fails.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(&WrappedRef { pages: &self.pages })?)
    }

    /// Parse either the wrapped form or a legacy bare page mapping.
    ///
    /// Ids are trimmed; blank page or item ids are dropped, and pages whose
    /// ids collide after trimming are merged.
    ///
    /// # Errors
    ///
    /// Returns `DocumentError::Parse` if `raw` matches neither shape.
    pub fn from_json(raw: &str) -> Result<Self, DocumentError> {
        let shape: PersistedShape = serde_json::from_str(raw)?;
        let pages = match shape {
            PersistedShape::Wrapped { pages } | PersistedShape::Legacy(pages) => pages,
        };
        let mut doc = Self::new();
        for (raw_page, raw_items) in pages {
            let Ok(page) = PageId::new(&raw_page) else {
                continue;
            };
            let items = raw_items
                .iter()
                .filter_map(|raw| ItemId::from_label(raw).ok());
            let mut set = doc.get_set(&page);
            set.extend(items);
            doc.set_set(&page, set);
        }
        Ok(doc)
    }
}
