//! Statistical utilities for review label experiments.
//!
//! This crate provides the numeric building blocks shared by the experiment
//! engine:
//!
//! - **Descriptive statistics**: mean, median and population standard deviation
//!   of label values (used to rescale predictions)
//! - **Binning**: validation and generation of bin ranges that collapse a
//!   continuous label into ordered classes
//! - **Metrics**: accuracy, precision/recall/F1, Pearson correlation and
//!   (weighted) kappa
//! - **Frequency**: first-seen ordered label counts (majority baseline)
//!
//! # Modules
//!
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`binning`]: Bin range validation, generation and lookup
//! - [`metrics`]: Evaluation metrics comparing true and predicted labels
//! - [`frequency`]: Label counts with deterministic tie-breaking
//!
//! # Examples
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use reviewcv_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! ```
//!
//! ## Evaluating predictions
//!
//! ```
//! use reviewcv_stats::metrics::compute_evaluation_metrics;
//!
//! let truth = [1.0, 2.0, 3.0, 3.0];
//! let preds = [1.0, 2.0, 3.0, 2.0];
//! let metrics = compute_evaluation_metrics(&truth, &preds, &[1.0, 2.0, 3.0]).unwrap();
//! assert_eq!(metrics.get("accuracy"), Some(0.75));
//! ```
//!
//! ## Finding the majority label
//!
//! ```
//! use reviewcv_stats::frequency::LabelCounts;
//!
//! let counts = LabelCounts::new([2.0, 1.0, 2.0]);
//! assert_eq!(counts.most_frequent(), Some(2.0));
//! ```

pub mod binning;
pub mod descriptive;
pub mod frequency;
pub mod metrics;
