//! Online learners and hyperparameter search for review label prediction.
//!
//! # How a learner is selected
//!
//! 1. **Grid** ([`params::ParamGrid`]) - Candidate values per hyperparameter,
//!    either configured or [`learner::LearnerKind::default_param_grid`]
//! 2. **Splits** ([`kfold::stratified_k_fold`]) - Label-stratified folds of
//!    the grid search sample, shuffled with a fixed seed
//! 3. **Scoring** ([`scoring::Scorer`]) - An objective such as quadratic
//!    weighted kappa, or the learner's own default score
//! 4. **Search** ([`grid_search::GridSearch`]) - The best mean score wins and
//!    is refitted on all grid search data
//!
//! The resulting estimator is then cloned once per cross-validation fold and
//! updated with [`learner::IncrementallyFittable::partial_fit`].
//!
//! # Modules
//!
//! - [`learner`]: learner implementations and their capability traits
//! - [`params`]: hyperparameter values, sets and grids
//! - [`weights`]: lazily scaled weight vectors and feature ranking
//! - [`scoring`]: objective functions
//! - [`kfold`]: stratified k-fold splitting
//! - [`grid_search`]: exhaustive hyperparameter search

pub mod grid_search;
pub mod kfold;
pub mod learner;
pub mod params;
pub mod scoring;
pub mod weights;
