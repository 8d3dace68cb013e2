//! Dense weight vectors for linear learners and feature weight ranking.
//!
//! # Lazy scaling
//!
//! L2-regularized online updates shrink the whole weight vector after every
//! sample. With hashed features a vector can hold hundreds of thousands of
//! entries, so [`WeightVector`] stores `scale * w` and shrinking only touches
//! `scale`. The stored values are rescaled once `scale` gets too small to
//! keep precision.
//!
//! # Ranking
//!
//! [`rank_features`] sorts `(feature, coefficient)` pairs by descending
//! coefficient, which is how feature weight reports list them.

use reviewcv_data::vectorizer::FeatureMatrix;

const MIN_SCALE: f64 = 1e-9;

/// Weight vector represented as `scale * values`.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightVector {
    values: Vec<f64>,
    scale: f64,
}

impl WeightVector {
    #[must_use]
    pub fn zeros(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
            scale: 1.0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Dot product with row `row` of `x`.
    #[must_use]
    pub fn dot_row(&self, x: &FeatureMatrix, row: usize) -> f64 {
        self.scale * x.row_dot(row, &self.values)
    }

    /// Adds `factor * x[row]` to the vector.
    pub fn add_row(&mut self, x: &FeatureMatrix, row: usize, factor: f64) {
        let factor = factor / self.scale;
        for (col, value) in x.row(row) {
            self.values[col] += factor * value;
        }
    }

    /// Multiplies the vector by `factor`.
    pub fn scale_by(&mut self, factor: f64) {
        if factor == 0.0 {
            self.values.fill(0.0);
            self.scale = 1.0;
            return;
        }
        self.scale *= factor;
        if self.scale.abs() < MIN_SCALE {
            self.materialize();
        }
    }

    fn materialize(&mut self) {
        let scale = self.scale;
        for v in &mut self.values {
            *v *= scale;
        }
        self.scale = 1.0;
    }

    /// The actual weights.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().map(|v| v * self.scale).collect()
    }
}

/// Pairs feature names with coefficients, sorted by descending coefficient.
/// Ties keep the feature order.
#[must_use]
pub fn rank_features(names: &[String], coefficients: &[f64]) -> Vec<(String, f64)> {
    let mut ranked = names
        .iter()
        .cloned()
        .zip(coefficients.iter().copied())
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix() -> FeatureMatrix {
        FeatureMatrix::from_rows(3, vec![vec![(0, 1.0), (2, 2.0)], vec![(1, 4.0)]])
    }

    #[test]
    fn test_add_and_dot() {
        let x = matrix();
        let mut w = WeightVector::zeros(3);
        w.add_row(&x, 0, 0.5);
        assert_eq!(w.to_vec(), vec![0.5, 0.0, 1.0]);
        assert!((w.dot_row(&x, 0) - 2.5).abs() < 1e-12);
        assert_eq!(w.dot_row(&x, 1), 0.0);
    }

    #[test]
    fn test_lazy_scaling_matches_eager() {
        let x = matrix();
        let mut w = WeightVector::zeros(3);
        let mut eager = [0.0; 3];
        for _ in 0..2000 {
            w.scale_by(0.99);
            eager.iter_mut().for_each(|v| *v *= 0.99);
            w.add_row(&x, 1, 1.0);
            eager[1] += 4.0;
        }
        let lazy = w.to_vec();
        for (a, b) in lazy.iter().zip(eager) {
            assert!((a - b).abs() < 1e-6 * b.abs().max(1.0));
        }
    }

    #[test]
    fn test_scale_by_zero_resets() {
        let x = matrix();
        let mut w = WeightVector::zeros(3);
        w.add_row(&x, 0, 1.0);
        w.scale_by(0.0);
        assert_eq!(w.to_vec(), vec![0.0; 3]);
        w.add_row(&x, 1, 1.0);
        assert_eq!(w.to_vec(), vec![0.0, 4.0, 0.0]);
    }

    #[test]
    fn test_rank_features() {
        let names = ["a", "b", "c"].map(String::from);
        let ranked = rank_features(&names, &[0.5, -1.0, 2.0]);
        assert_eq!(
            ranked,
            vec![
                ("c".to_owned(), 2.0),
                ("a".to_owned(), 0.5),
                ("b".to_owned(), -1.0)
            ]
        );
    }
}
