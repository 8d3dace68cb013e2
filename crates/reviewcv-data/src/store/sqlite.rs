use std::{collections::BTreeSet, path::Path};

use rusqlite::{Connection, OptionalExtension as _, params, params_from_iter};

use super::{Projection, ReviewStore, StoreError};
use crate::{document::ReviewDocument, game::Game, label::Label};

const ID_INDEX_NAME: &str = "reviews_id_idx";

/// Review store backed by a SQLite database.
///
/// Reviews live in a single `reviews` table holding each document as JSON
/// along with its ID and game.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P>(path: P) -> Result<Self, StoreError>
    where
        P: AsRef<Path>,
    {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS reviews (
                id TEXT NOT NULL,
                game TEXT NOT NULL,
                document TEXT NOT NULL
             );",
        )?;
        Ok(Self { conn })
    }

    pub fn insert_documents<'a, I>(&mut self, docs: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = &'a ReviewDocument>,
    {
        let tx = self.conn.transaction()?;
        let mut count = 0;
        {
            let mut stmt =
                tx.prepare("INSERT INTO reviews (id, game, document) VALUES (?1, ?2, ?3)")?;
            for doc in docs {
                let json = serde_json::to_string(doc)?;
                stmt.execute(params![doc.id, doc.game.name(), json])?;
                count += 1;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    /// Whether the ID index has been created.
    pub fn has_id_index(&self) -> Result<bool, StoreError> {
        let found = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'index' AND name = ?1",
                params![ID_INDEX_NAME],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl ReviewStore for SqliteStore {
    fn label_values(
        &self,
        games: &BTreeSet<Game>,
        label: Label,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        if games.is_empty() {
            return Ok(vec![]);
        }
        let sql = format!(
            "SELECT id, json_extract(document, ?1) FROM reviews
             WHERE game IN ({}) ORDER BY id",
            placeholders(games.len())
        );
        let path = format!("$.labels.{}", label.as_str());
        let args = std::iter::once(path).chain(games.iter().map(|g| g.name().to_owned()));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<f64>>(1)?))
        })?;
        let mut values = vec![];
        for row in rows {
            if let (id, Some(value)) = row? {
                values.push((id, value));
            }
        }
        Ok(values)
    }

    fn fetch_batch(
        &self,
        projection: Projection,
        ids: &[String],
    ) -> Result<Vec<ReviewDocument>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let column = if projection.nlp_features {
            "document"
        } else {
            "json_remove(document, '$.nlp_features')"
        };
        let sql = format!(
            "SELECT {column} FROM reviews WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids), |row| row.get::<_, String>(0))?;
        let mut docs = Vec::with_capacity(ids.len());
        for json in rows {
            docs.push(serde_json::from_str(&json?)?);
        }
        Ok(docs)
    }

    fn ensure_id_index(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(&format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {ID_INDEX_NAME} ON reviews (id)"
        ))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::make_cursor;

    fn sample_docs() -> Vec<ReviewDocument> {
        vec![
            ReviewDocument::new("r1", Game::Dota2)
                .with_label(Label::TotalGameHours, 10.0)
                .with_nlp_feature("gg", 1.0),
            ReviewDocument::new("r2", Game::Arma3).with_label(Label::TotalGameHours, 20.0),
            ReviewDocument::new("r3", Game::Dota2).with_label(Label::NumFriends, 4.0),
        ]
    }

    #[test]
    fn test_label_values() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.insert_documents(&sample_docs()).unwrap(), 3);

        let games = [Game::Dota2, Game::Arma3].into_iter().collect();
        let values = store.label_values(&games, Label::TotalGameHours).unwrap();
        assert_eq!(
            values,
            vec![("r1".to_owned(), 10.0), ("r2".to_owned(), 20.0)]
        );
    }

    #[test]
    fn test_fetch_with_projection() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.insert_documents(&sample_docs()).unwrap();

        let ids = ["r1".to_owned()];
        let docs = store.fetch_batch(Projection::ALL, &ids).unwrap();
        assert_eq!(docs, vec![sample_docs().remove(0)]);
        let docs = store
            .fetch_batch(Projection::WITHOUT_NLP_FEATURES, &ids)
            .unwrap();
        assert!(docs[0].nlp_features.is_empty());
    }

    #[test]
    fn test_cursor_over_sqlite() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.insert_documents(&sample_docs()).unwrap();
        let ids = ["r3", "r1", "r2"].map(String::from);
        let docs = make_cursor(&store, Projection::ALL, 2, &ids)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(
            docs.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            ["r3", "r1", "r2"]
        );
    }

    #[test]
    fn test_ensure_id_index_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("reviews.db")).unwrap();
        assert!(!store.has_id_index().unwrap());
        store.ensure_id_index().unwrap();
        store.ensure_id_index().unwrap();
        assert!(store.has_id_index().unwrap());
    }
}
