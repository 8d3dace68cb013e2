//! Experiment configuration and its validation.
//!
//! A [`RawCvConfig`] holds parameters as they arrive from the command line or
//! a caller: names are plain strings and counts may be out of range.
//! [`RawCvConfig::validate`] checks every field, resolves defaults and
//! returns either an immutable [`CvConfig`] or a [`ConfigError`] listing all
//! violations at once.
//!
//! Validation never touches the datastore.

use std::{collections::BTreeSet, fmt};

use reviewcv_data::{
    experimental_data::{SamplingMode, SamplingRequest},
    game::Game,
    label::Label,
    sample::{LabelTransform, SampleSettings},
};
use reviewcv_learn::{learner::LearnerKind, params::ParamGrid, scoring::Objective};
use reviewcv_stats::binning::{BinRange, BinRangeError, validate_bin_ranges};
use serde::{Deserialize, Serialize};

/// Feature width used when hashing is requested with a width of 0.
pub const DEFAULT_HASHED_FEATURES: usize = reviewcv_data::vectorizer::DEFAULT_HASHED_FEATURES;

/// Largest number of documents fetched from the datastore at once.
pub const MAX_CURSOR_BATCH_SIZE: usize = 50;

/// Experiment parameters before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCvConfig {
    pub games: Vec<String>,
    /// Learner names or abbreviations.
    pub learners: Vec<String>,
    /// One grid per learner, in the same order. `None` selects each
    /// learner's default grid.
    pub param_grids: Option<Vec<ParamGrid>>,
    pub training_rounds: i64,
    pub training_samples_per_round: i64,
    pub grid_search_samples_per_fold: i64,
    pub grid_search_folds: i64,
    pub non_nlp_features: Vec<String>,
    pub prediction_label: String,
    pub objective: Option<String>,
    pub data_sampling: String,
    /// Feature hashing width; 0 selects [`DEFAULT_HASHED_FEATURES`] and
    /// `None` disables hashing.
    pub hashed_features: Option<i64>,
    pub nlp_features: bool,
    pub bin_ranges: Option<Vec<BinRange>>,
    pub lognormal: bool,
    pub power_transform: Option<f64>,
    pub majority_baseline: bool,
    pub rescale: bool,
}

impl Default for RawCvConfig {
    fn default() -> Self {
        Self {
            games: vec![],
            learners: vec![],
            param_grids: None,
            training_rounds: 3,
            training_samples_per_round: 100,
            grid_search_samples_per_fold: 1000,
            grid_search_folds: 5,
            non_nlp_features: vec![],
            prediction_label: Label::TotalGameHoursBin.as_str().to_owned(),
            objective: None,
            data_sampling: SamplingMode::Even.as_str().to_owned(),
            hashed_features: None,
            nlp_features: true,
            bin_ranges: None,
            lognormal: false,
            power_transform: None,
            majority_baseline: true,
            rescale: true,
        }
    }
}

/// One reason a configuration was rejected.
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum ConfigViolation {
    #[display("unrecognized learner: {name}")]
    UnknownLearner { name: String },
    #[display("learner {learner} is listed more than once")]
    DuplicateLearner { learner: LearnerKind },
    #[display("no learners were given")]
    NoLearners,
    #[display("unrecognized non-NLP feature: {name}")]
    UnknownNonNlpFeature { name: String },
    #[display("unrecognized prediction label: {name}")]
    UnknownPredictionLabel { name: String },
    #[display("prediction label {label} is also a non-NLP feature")]
    PredictionLabelIsFeature { label: Label },
    #[display("unrecognized game: {name}")]
    UnknownGame { name: String },
    #[display("the set of games is empty")]
    NoGames,
    #[display("unrecognized objective function: {name}")]
    UnknownObjective { name: String },
    #[display("unrecognized data sampling mode: {name}")]
    UnknownSamplingMode { name: String },
    #[display("{field} must be {requirement}, got {value}")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
        value: i64,
    },
    #[display("the lists of learners and parameter grids differ in length ({learners} vs {grids})")]
    LearnerGridMismatch { learners: usize, grids: usize },
    #[display("lognormal and power_transform cannot be set at the same time")]
    ConflictingTransforms,
    #[display("power_transform must not be 0")]
    ZeroPowerTransform,
    #[display("invalid bin ranges: {_0}")]
    InvalidBinRanges(BinRangeError),
}

#[derive(Debug, Clone, PartialEq, derive_more::Error)]
pub struct ConfigError {
    pub violations: Vec<ConfigViolation>,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid experiment configuration")?;
        for (i, violation) in self.violations.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{violation}")?;
        }
        Ok(())
    }
}

/// Validated experiment configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CvConfig {
    games: BTreeSet<Game>,
    learners: Vec<LearnerKind>,
    param_grids: Vec<ParamGrid>,
    training_rounds: usize,
    training_samples_per_round: usize,
    grid_search_samples_per_fold: usize,
    grid_search_folds: usize,
    non_nlp_features: BTreeSet<Label>,
    prediction_label: Label,
    objective: Option<Objective>,
    sampling: SamplingMode,
    hashed_features: Option<usize>,
    nlp_features: bool,
    bin_ranges: Option<Vec<BinRange>>,
    transform: LabelTransform,
    majority_baseline: bool,
    rescale: bool,
}

/// Collects violations while parsing the fields of a raw configuration.
#[derive(Debug, Default)]
struct Checker {
    violations: Vec<ConfigViolation>,
}

impl Checker {
    fn parse_all<T, F>(&mut self, names: &[String], violation: F) -> Vec<T>
    where
        T: std::str::FromStr,
        F: Fn(String) -> ConfigViolation,
    {
        names
            .iter()
            .filter_map(|name| match name.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    self.violations.push(violation(name.clone()));
                    None
                }
            })
            .collect()
    }

    fn count(&mut self, field: &'static str, value: i64, min: i64) -> usize {
        let requirement = if min == 1 {
            "greater than 0"
        } else {
            "greater than 1"
        };
        match usize::try_from(value) {
            Ok(count) if value >= min => count,
            _ => {
                self.violations.push(ConfigViolation::OutOfRange {
                    field,
                    requirement,
                    value,
                });
                0
            }
        }
    }

    fn check_grid_count(&mut self, learners: usize, grids: usize) {
        let violation = ConfigViolation::LearnerGridMismatch { learners, grids };
        if learners != grids && !self.violations.contains(&violation) {
            self.violations.push(violation);
        }
    }
}

impl RawCvConfig {
    /// Checks every field and resolves defaults.
    ///
    /// # Errors
    ///
    /// Returns every violated constraint.
    pub fn validate(&self) -> Result<CvConfig, ConfigError> {
        let mut check = Checker::default();

        let learners = check.parse_all::<LearnerKind, _>(&self.learners, |name| {
            ConfigViolation::UnknownLearner { name }
        });
        let mut seen = BTreeSet::new();
        for learner in &learners {
            if !seen.insert(*learner) {
                check
                    .violations
                    .push(ConfigViolation::DuplicateLearner { learner: *learner });
            }
        }
        if self.learners.is_empty() {
            check.violations.push(ConfigViolation::NoLearners);
        }

        let non_nlp_features = check
            .parse_all::<Label, _>(&self.non_nlp_features, |name| {
                ConfigViolation::UnknownNonNlpFeature { name }
            })
            .into_iter()
            .collect::<BTreeSet<_>>();
        let prediction_label = match self.prediction_label.parse::<Label>() {
            Ok(label) => {
                if non_nlp_features.contains(&label) {
                    check
                        .violations
                        .push(ConfigViolation::PredictionLabelIsFeature { label });
                }
                Some(label)
            }
            Err(_) => {
                check.violations.push(ConfigViolation::UnknownPredictionLabel {
                    name: self.prediction_label.clone(),
                });
                None
            }
        };

        let games = check
            .parse_all::<Game, _>(&self.games, |name| ConfigViolation::UnknownGame { name })
            .into_iter()
            .collect::<BTreeSet<_>>();
        if self.games.is_empty() {
            check.violations.push(ConfigViolation::NoGames);
        }

        let objective = match &self.objective {
            None => None,
            Some(name) => match name.parse::<Objective>() {
                Ok(objective) => Some(objective),
                Err(_) => {
                    check
                        .violations
                        .push(ConfigViolation::UnknownObjective { name: name.clone() });
                    None
                }
            },
        };
        let sampling = self.data_sampling.parse::<SamplingMode>().unwrap_or_else(|_| {
            check.violations.push(ConfigViolation::UnknownSamplingMode {
                name: self.data_sampling.clone(),
            });
            SamplingMode::default()
        });

        let training_rounds = check.count("training_rounds", self.training_rounds, 2);
        let training_samples_per_round =
            check.count("training_samples_per_round", self.training_samples_per_round, 1);
        let grid_search_folds = check.count("grid_search_folds", self.grid_search_folds, 2);
        let grid_search_samples_per_fold = check.count(
            "grid_search_samples_per_fold",
            self.grid_search_samples_per_fold,
            2,
        );

        if let Some(grids) = &self.param_grids {
            check.check_grid_count(self.learners.len(), grids.len());
        }

        let hashed_features = match self.hashed_features {
            None => None,
            Some(width) => match usize::try_from(width) {
                Ok(width) => Some(width),
                Err(_) => {
                    check.violations.push(ConfigViolation::OutOfRange {
                        field: "hashed_features",
                        requirement: "non-negative",
                        value: width,
                    });
                    None
                }
            },
        };

        if self.lognormal && self.power_transform.is_some() {
            check.violations.push(ConfigViolation::ConflictingTransforms);
        }
        if self.power_transform == Some(0.0) {
            check.violations.push(ConfigViolation::ZeroPowerTransform);
        }
        if let Some(ranges) = &self.bin_ranges
            && let Err(e) = validate_bin_ranges(ranges)
        {
            check.violations.push(ConfigViolation::InvalidBinRanges(e));
        }

        let param_grids = self.param_grids.clone().unwrap_or_else(|| {
            learners
                .iter()
                .map(|learner| learner.default_param_grid())
                .collect()
        });
        if learners.len() == self.learners.len() {
            check.check_grid_count(learners.len(), param_grids.len());
        }

        let Some(prediction_label) = prediction_label else {
            return Err(ConfigError {
                violations: check.violations,
            });
        };
        if !check.violations.is_empty() {
            return Err(ConfigError {
                violations: check.violations,
            });
        }

        Ok(CvConfig {
            games,
            learners,
            param_grids,
            training_rounds,
            training_samples_per_round,
            grid_search_samples_per_fold,
            grid_search_folds,
            non_nlp_features,
            prediction_label,
            objective,
            sampling,
            hashed_features: hashed_features.map(|width| {
                if width == 0 {
                    DEFAULT_HASHED_FEATURES
                } else {
                    width
                }
            }),
            nlp_features: self.nlp_features,
            bin_ranges: self.bin_ranges.clone(),
            transform: LabelTransform::new(self.lognormal, self.power_transform),
            majority_baseline: self.majority_baseline,
            rescale: self.rescale,
        })
    }
}

impl CvConfig {
    #[must_use]
    pub fn games(&self) -> &BTreeSet<Game> {
        &self.games
    }

    #[must_use]
    pub fn learners(&self) -> &[LearnerKind] {
        &self.learners
    }

    /// Parameter grids aligned with [`Self::learners`].
    #[must_use]
    pub fn param_grids(&self) -> &[ParamGrid] {
        &self.param_grids
    }

    #[must_use]
    pub fn training_rounds(&self) -> usize {
        self.training_rounds
    }

    #[must_use]
    pub fn training_samples_per_round(&self) -> usize {
        self.training_samples_per_round
    }

    #[must_use]
    pub fn grid_search_samples_per_fold(&self) -> usize {
        self.grid_search_samples_per_fold
    }

    #[must_use]
    pub fn grid_search_folds(&self) -> usize {
        self.grid_search_folds
    }

    #[must_use]
    pub fn non_nlp_features(&self) -> &BTreeSet<Label> {
        &self.non_nlp_features
    }

    #[must_use]
    pub fn prediction_label(&self) -> Label {
        self.prediction_label
    }

    #[must_use]
    pub fn objective(&self) -> Option<Objective> {
        self.objective
    }

    #[must_use]
    pub fn sampling(&self) -> SamplingMode {
        self.sampling
    }

    /// Resolved hashing width, never 0.
    #[must_use]
    pub fn hashed_features(&self) -> Option<usize> {
        self.hashed_features
    }

    #[must_use]
    pub fn nlp_features(&self) -> bool {
        self.nlp_features
    }

    #[must_use]
    pub fn bin_ranges(&self) -> Option<&[BinRange]> {
        self.bin_ranges.as_deref()
    }

    #[must_use]
    pub fn transform(&self) -> LabelTransform {
        self.transform
    }

    #[must_use]
    pub fn majority_baseline(&self) -> bool {
        self.majority_baseline
    }

    #[must_use]
    pub fn rescale(&self) -> bool {
        self.rescale
    }

    /// Number of documents fetched per datastore round trip.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.training_samples_per_round.min(MAX_CURSOR_BATCH_SIZE)
    }

    #[must_use]
    pub fn sample_settings(&self) -> SampleSettings {
        SampleSettings {
            prediction_label: self.prediction_label,
            nlp_features: self.nlp_features,
            non_nlp_features: self.non_nlp_features.clone(),
            transform: self.transform,
            bin_ranges: self.bin_ranges.clone(),
        }
    }

    #[must_use]
    pub fn sampling_request(&self) -> SamplingRequest {
        SamplingRequest {
            games: self.games.clone(),
            folds: self.training_rounds,
            fold_size: self.training_samples_per_round,
            grid_search_folds: self.grid_search_folds,
            grid_search_fold_size: self.grid_search_samples_per_fold,
            sampling: self.sampling,
        }
    }
}
