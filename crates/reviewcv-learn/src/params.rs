//! Hyperparameter values, parameter sets and parameter grids.
//!
//! A [`ParamGrid`] maps each hyperparameter name to the list of values to try.
//! [`expand_grid`] turns it into the list of concrete [`ParamSet`]s, one per
//! combination.
//!
//! # Expansion order
//!
//! Names are visited in sorted order and the last name varies fastest:
//!
//! ```
//! use reviewcv_learn::params::{ParamGrid, ParamValue, expand_grid};
//!
//! let mut grid = ParamGrid::new();
//! grid.insert("a".into(), vec![ParamValue::Int(1), ParamValue::Int(2)]);
//! grid.insert("b".into(), vec![ParamValue::Float(0.5), ParamValue::Float(1.0)]);
//! let sets = expand_grid(&grid);
//! assert_eq!(sets.len(), 4);
//! assert_eq!(sets[1].get("a"), Some(&ParamValue::Int(1)));
//! assert_eq!(sets[1].get("b"), Some(&ParamValue::Float(1.0)));
//! ```

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// A single hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// Hyperparameter name to list of candidate values.
pub type ParamGrid = BTreeMap<String, Vec<ParamValue>>;

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ParamError {
    #[display("{learner} has no hyperparameter named {name}")]
    Unknown { learner: &'static str, name: String },
    #[display("invalid value for {learner} hyperparameter {name}: {value} (expected {expected})")]
    Invalid {
        learner: &'static str,
        name: String,
        value: String,
        expected: &'static str,
    },
}

/// Concrete hyperparameters of one learner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, ParamValue>);

impl ParamSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fails on the first name not in `known`.
    pub fn check_names(&self, learner: &'static str, known: &[&str]) -> Result<(), ParamError> {
        match self.0.keys().find(|name| !known.contains(&name.as_str())) {
            Some(name) => Err(ParamError::Unknown {
                learner,
                name: name.clone(),
            }),
            None => Ok(()),
        }
    }

    fn invalid(
        learner: &'static str,
        name: &str,
        value: &ParamValue,
        expected: &'static str,
    ) -> ParamError {
        ParamError::Invalid {
            learner,
            name: name.to_owned(),
            value: value.to_string(),
            expected,
        }
    }

    /// Reads a float, accepting integers too.
    #[expect(clippy::cast_precision_loss)]
    pub fn float(&self, learner: &'static str, name: &str, default: f64) -> Result<f64, ParamError> {
        match self.get(name) {
            None => Ok(default),
            Some(ParamValue::Float(x)) if x.is_finite() => Ok(*x),
            Some(ParamValue::Int(i)) => Ok(*i as f64),
            Some(v) => Err(Self::invalid(learner, name, v, "a finite number")),
        }
    }

    /// Reads a non-negative integer.
    pub fn count(&self, learner: &'static str, name: &str, default: usize) -> Result<usize, ParamError> {
        match self.get(name) {
            None => Ok(default),
            Some(v @ ParamValue::Int(i)) => {
                usize::try_from(*i).map_err(|_| Self::invalid(learner, name, v, "a non-negative integer"))
            }
            Some(v) => Err(Self::invalid(learner, name, v, "a non-negative integer")),
        }
    }

    /// Reads one of the strings in `choices`.
    pub fn choice(
        &self,
        learner: &'static str,
        name: &str,
        choices: &'static [&'static str],
        default: &'static str,
    ) -> Result<&'static str, ParamError> {
        match self.get(name) {
            None => Ok(default),
            Some(v @ ParamValue::Text(s)) => choices
                .iter()
                .copied()
                .find(|c| *c == s.as_str())
                .ok_or_else(|| Self::invalid(learner, name, v, "one of the listed choices")),
            Some(v) => Err(Self::invalid(learner, name, v, "a string")),
        }
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}

/// Every combination of the grid's values. An empty grid yields a single
/// empty parameter set; a name with no values yields no sets at all.
#[must_use]
pub fn expand_grid(grid: &ParamGrid) -> Vec<ParamSet> {
    let mut sets = vec![ParamSet::new()];
    for (name, values) in grid {
        sets = sets
            .into_iter()
            .flat_map(|set| {
                values
                    .iter()
                    .map(move |value| set.clone().with(name.clone(), value.clone()))
            })
            .collect();
    }
    sets
}
