//! Incremental cross-validation experiments on review data.
//!
//! An experiment is described by a [`config::RawCvConfig`], validated into a
//! [`config::CvConfig`] and executed by [`runner::run_experiment`]. The
//! returned [`runner::CvResults`] hold per-fold evaluation records of every
//! learner, which [`report`] and [`feature_weights`] turn into files.
//!
//! # Modules
//!
//! - [`config`]: parameter validation
//! - [`runner`]: sampling, grid search and the cross-validation loop
//! - [`rescale`]: mapping raw predictions onto the label classes
//! - [`stats`]: evaluation records and cross-fold summaries
//! - [`bins`]: bin ranges from the stored label distribution
//! - [`report`]: CSV reports
//! - [`feature_weights`]: coefficient tables of introspectable learners

pub mod bins;
pub mod config;
pub mod feature_weights;
pub mod report;
pub mod rescale;
pub mod runner;
pub mod stats;
