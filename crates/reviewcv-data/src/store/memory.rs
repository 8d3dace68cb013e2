use std::{
    cell::Cell,
    collections::{BTreeSet, HashMap},
};

use super::{Projection, ReviewStore, StoreError};
use crate::{document::ReviewDocument, game::Game, label::Label};

/// Review store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Vec<ReviewDocument>,
    index: HashMap<String, usize>,
    fetches: Cell<usize>,
}

impl MemoryStore {
    /// Creates a store from `documents`. A later document replaces an earlier
    /// one with the same ID.
    pub fn new<I>(documents: I) -> Self
    where
        I: IntoIterator<Item = ReviewDocument>,
    {
        let mut store = Self::default();
        for doc in documents {
            store.insert(doc);
        }
        store
    }

    pub fn insert(&mut self, doc: ReviewDocument) {
        if let Some(&i) = self.index.get(&doc.id) {
            self.documents[i] = doc;
        } else {
            self.index.insert(doc.id.clone(), self.documents.len());
            self.documents.push(doc);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of queries answered so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

impl ReviewStore for MemoryStore {
    fn label_values(
        &self,
        games: &BTreeSet<Game>,
        label: Label,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        self.fetches.set(self.fetches.get() + 1);
        let mut values = self
            .documents
            .iter()
            .filter(|doc| games.contains(&doc.game))
            .filter_map(|doc| Some((doc.id.clone(), doc.label(label)?)))
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(values)
    }

    fn fetch_batch(
        &self,
        projection: Projection,
        ids: &[String],
    ) -> Result<Vec<ReviewDocument>, StoreError> {
        self.fetches.set(self.fetches.get() + 1);
        Ok(ids
            .iter()
            .filter_map(|id| self.index.get(id))
            .map(|&i| {
                let mut doc = self.documents[i].clone();
                if !projection.nlp_features {
                    doc.nlp_features.clear();
                }
                doc
            })
            .collect())
    }

    fn ensure_id_index(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_values_filters_games_and_missing_labels() {
        let store = MemoryStore::new([
            ReviewDocument::new("b", Game::Dota2).with_label(Label::NumFriends, 3.0),
            ReviewDocument::new("a", Game::Dota2).with_label(Label::NumFriends, 1.0),
            ReviewDocument::new("c", Game::Warframe).with_label(Label::NumFriends, 7.0),
            ReviewDocument::new("d", Game::Dota2),
        ]);
        let games = [Game::Dota2].into_iter().collect();
        let values = store.label_values(&games, Label::NumFriends).unwrap();
        assert_eq!(values, vec![("a".to_owned(), 1.0), ("b".to_owned(), 3.0)]);
    }

    #[test]
    fn test_projection_drops_nlp_features() {
        let store = MemoryStore::new([
            ReviewDocument::new("a", Game::Dota2).with_nlp_feature("gg", 1.0)
        ]);
        let ids = ["a".to_owned()];
        let docs = store
            .fetch_batch(Projection::WITHOUT_NLP_FEATURES, &ids)
            .unwrap();
        assert!(docs[0].nlp_features.is_empty());
        let docs = store.fetch_batch(Projection::ALL, &ids).unwrap();
        assert_eq!(docs[0].nlp_features.len(), 1);
    }

    #[test]
    fn test_insert_replaces_existing_id() {
        let mut store = MemoryStore::default();
        store.insert(ReviewDocument::new("a", Game::Dota2));
        store.insert(ReviewDocument::new("a", Game::Arma3));
        assert_eq!(store.len(), 1);
        let docs = store.fetch_batch(Projection::ALL, &["a".to_owned()]).unwrap();
        assert_eq!(docs[0].game, Game::Arma3);
    }
}
