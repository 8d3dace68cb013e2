//! Datastore access for review documents.
//!
//! The experiment engine only needs three things from a datastore, captured
//! by [`ReviewStore`]:
//!
//! - the raw prediction label of every review of the selected games (the
//!   sampling pool)
//! - documents for a batch of review IDs
//! - an index on the review ID
//!
//! [`Cursor`] streams documents for an arbitrary ID list in bounded batches,
//! yielding every requested ID exactly once and in request order.

use std::{collections::{BTreeSet, HashMap}, slice};

use crate::{document::ReviewDocument, game::Game, label::Label};

pub use self::{memory::MemoryStore, sqlite::SqliteStore};

mod memory;
mod sqlite;

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum StoreError {
    #[display("datastore query failed: {_0}")]
    Sqlite(rusqlite::Error),
    #[display("malformed review document: {_0}")]
    Json(serde_json::Error),
    #[display("review document not found: {id}")]
    #[from(ignore)]
    MissingDocument { id: String },
}

/// Fields to include when fetching documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    pub nlp_features: bool,
}

impl Projection {
    pub const ALL: Self = Self { nlp_features: true };
    pub const WITHOUT_NLP_FEATURES: Self = Self {
        nlp_features: false,
    };
}

pub trait ReviewStore {
    /// Returns `(id, raw label value)` for every review of `games` that has a
    /// value for `label`, ordered by ID.
    fn label_values(
        &self,
        games: &BTreeSet<Game>,
        label: Label,
    ) -> Result<Vec<(String, f64)>, StoreError>;

    /// Returns the documents for `ids`, in no particular order. IDs that do
    /// not exist are absent from the result.
    fn fetch_batch(
        &self,
        projection: Projection,
        ids: &[String],
    ) -> Result<Vec<ReviewDocument>, StoreError>;

    fn ensure_id_index(&self) -> Result<(), StoreError>;
}

/// Creates a cursor over the documents of `ids`, fetched `batch_size` at a time.
#[must_use]
pub fn make_cursor<'a>(
    store: &'a dyn ReviewStore,
    projection: Projection,
    batch_size: usize,
    ids: &'a [String],
) -> Cursor<'a> {
    Cursor {
        store,
        projection,
        batches: ids.chunks(batch_size.max(1)),
        buffered: Vec::new().into_iter(),
    }
}

pub struct Cursor<'a> {
    store: &'a dyn ReviewStore,
    projection: Projection,
    batches: slice::Chunks<'a, String>,
    buffered: std::vec::IntoIter<ReviewDocument>,
}

impl Cursor<'_> {
    fn fetch_ordered(&self, ids: &[String]) -> Result<Vec<ReviewDocument>, StoreError> {
        let mut by_id = self
            .store
            .fetch_batch(self.projection, ids)?
            .into_iter()
            .map(|doc| (doc.id.clone(), doc))
            .collect::<HashMap<_, _>>();
        ids.iter()
            .map(|id| {
                by_id
                    .remove(id)
                    .ok_or_else(|| StoreError::MissingDocument { id: id.clone() })
            })
            .collect()
    }
}

impl Iterator for Cursor<'_> {
    type Item = Result<ReviewDocument, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(doc) = self.buffered.next() {
                return Some(Ok(doc));
            }
            let batch = self.batches.next()?;
            match self.fetch_ordered(batch) {
                Ok(docs) => self.buffered = docs.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(n: usize) -> MemoryStore {
        MemoryStore::new((0..n).map(|i| {
            ReviewDocument::new(format!("r{i:02}"), Game::Dota2)
                .with_label(Label::TotalGameHours, f64::from(u32::try_from(i).unwrap()))
        }))
    }

    #[test]
    fn test_cursor_preserves_request_order() {
        let store = store_with(10);
        let ids = ["r07", "r01", "r09", "r03", "r00"].map(String::from);
        let docs = make_cursor(&store, Projection::ALL, 2, &ids)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let got = docs.iter().map(|d| d.id.as_str()).collect::<Vec<_>>();
        assert_eq!(got, ["r07", "r01", "r09", "r03", "r00"]);
        assert_eq!(store.fetch_count(), 3);
    }

    #[test]
    fn test_cursor_reports_missing_ids() {
        let store = store_with(3);
        let ids = ["r00", "nope"].map(String::from);
        let result = make_cursor(&store, Projection::ALL, 50, &ids).collect::<Result<Vec<_>, _>>();
        assert!(matches!(result, Err(StoreError::MissingDocument { id }) if id == "nope"));
    }

    #[test]
    fn test_cursor_over_no_ids_fetches_nothing() {
        let store = store_with(3);
        assert_eq!(make_cursor(&store, Projection::ALL, 50, &[]).count(), 0);
        assert_eq!(store.fetch_count(), 0);
    }
}
