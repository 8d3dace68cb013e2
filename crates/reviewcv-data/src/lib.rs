//! Review data access for cross-validation experiments.
//!
//! - [`game`] and [`label`]: registries of games and review attributes
//! - [`store`]: the datastore interface, its SQLite and in-memory
//!   implementations, and a batched cursor
//! - [`sample`]: conversion of documents into `(x, y, id)` samples
//! - [`vectorizer`]: sparse feature matrices from feature dictionaries
//! - [`experimental_data`]: drawing disjoint grid search and training folds
//! - [`context`]: the logging context of a run

pub mod context;
pub mod document;
pub mod experimental_data;
pub mod game;
pub mod label;
pub mod sample;
pub mod store;
pub mod vectorizer;
