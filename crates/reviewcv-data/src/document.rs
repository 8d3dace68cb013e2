//! Review documents as stored in the datastore

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{game::Game, label::Label};

/// Value of a single entry in a feature dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Feature name to value mapping for one review.
pub type FeatureDict = BTreeMap<String, FeatureValue>;

/// A single review.
///
/// `labels` holds the numeric review attributes (see [`Label`]).
/// `nlp_features` holds the precomputed text features of the review; it is
/// left empty when the document was fetched without NLP features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDocument {
    pub id: String,
    pub game: Game,
    #[serde(default)]
    pub labels: BTreeMap<Label, f64>,
    #[serde(default)]
    pub nlp_features: FeatureDict,
}

impl ReviewDocument {
    #[must_use]
    pub fn new(id: impl Into<String>, game: Game) -> Self {
        Self {
            id: id.into(),
            game,
            labels: BTreeMap::new(),
            nlp_features: FeatureDict::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: Label, value: f64) -> Self {
        self.labels.insert(label, value);
        self
    }

    #[must_use]
    pub fn with_nlp_feature(mut self, name: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.nlp_features.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn label(&self, label: Label) -> Option<f64> {
        self.labels.get(&label).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_layout() {
        let doc = ReviewDocument::new("r1", Game::Dota2)
            .with_label(Label::TotalGameHours, 12.5)
            .with_nlp_feature("gg", 2.0)
            .with_nlp_feature("lang", "en");
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["game"], "Dota_2");
        assert_eq!(json["labels"]["total_game_hours"], 12.5);
        assert_eq!(json["nlp_features"]["lang"], "en");

        let back: ReviewDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let doc: ReviewDocument =
            serde_json::from_str(r#"{"id": "r2", "game": "Warframe"}"#).unwrap();
        assert!(doc.labels.is_empty());
        assert!(doc.nlp_features.is_empty());
        assert_eq!(doc.label(Label::NumFriends), None);
    }
}
