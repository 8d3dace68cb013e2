//! Mapping raw predictions onto the class domain.
//!
//! Predictions are first snapped to the nearest class, which also clips them
//! to `[min class, max class]`. Two versions are derived from the snapped
//! values:
//!
//! - **fitted only**: the snapped predictions as they are
//! - **rescaled**: the snapped predictions standardized with their own mean
//!   and standard deviation, mapped onto the distribution of the training
//!   labels, then snapped again
//!
//! Neither version ever leaves the class domain.

use reviewcv_stats::descriptive::mean_std;

/// Nearest class to `value`; ties go to the smaller class. Values outside
/// the domain snap to the closest end. Without classes the value is only
/// rounded.
#[must_use]
pub fn snap_to_class(value: f64, classes: &[f64]) -> f64 {
    let mut best: Option<(f64, f64)> = None;
    for &class in classes {
        let distance = (class - value).abs();
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((class, distance));
        }
    }
    best.map_or_else(|| value.round(), |(class, _)| class)
}

/// The two candidate prediction arrays of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustedPredictions {
    pub rescaled: Vec<f64>,
    pub fitted_only: Vec<f64>,
}

impl AdjustedPredictions {
    /// The array selected by the `rescale` setting.
    #[must_use]
    pub fn select(self, rescale: bool) -> Vec<f64> {
        if rescale {
            self.rescaled
        } else {
            self.fitted_only
        }
    }
}

/// Computes both adjusted versions of `predictions`.
///
/// `train_mean` and `train_std` describe the labels the learner was trained
/// on. The mean and standard deviation used for rescaling are those of the
/// snapped predictions. When the snapped predictions have no spread they all
/// map to `train_mean`.
#[must_use]
pub fn rescale_predictions(
    predictions: &[f64],
    classes: &[f64],
    train_mean: f64,
    train_std: f64,
) -> AdjustedPredictions {
    let fitted_only = predictions
        .iter()
        .map(|&p| snap_to_class(p, classes))
        .collect::<Vec<_>>();

    let (pred_mean, pred_std) = mean_std(&fitted_only).unwrap_or((0.0, 0.0));
    let rescaled = fitted_only
        .iter()
        .map(|&p| {
            let z = if pred_std > 0.0 {
                (p - pred_mean) / pred_std
            } else {
                0.0
            };
            snap_to_class(z * train_std + train_mean, classes)
        })
        .collect();

    AdjustedPredictions {
        rescaled,
        fitted_only,
    }
}
