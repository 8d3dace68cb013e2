use rand::{SeedableRng as _, seq::SliceRandom as _};
use rand_pcg::Pcg64;
use reviewcv_data::vectorizer::FeatureMatrix;

use super::{
    BoxedLearner, Coefficients, FitError, Fittable, IncrementallyFittable, Introspectable,
    IntrospectionError, Learner, LearnerKind, accuracy_of, argmax, check_features, check_lengths,
    class_index,
};
use crate::{params::ParamSet, weights::WeightVector};

const NAME: &str = "Perceptron";
const PARAMS: &[&str] = &["alpha", "penalty", "eta0", "n_iter", "random_state"];

/// One-vs-rest perceptron.
///
/// Each class has its own weight vector and intercept, updated whenever it
/// misclassifies a sample as belonging or not belonging to the class. With
/// the `l2` penalty every update first shrinks the weights by
/// `1 - eta0 * alpha`.
#[derive(Debug, Clone)]
pub struct Perceptron {
    params: ParamSet,
    classes: Vec<f64>,
    alpha: f64,
    l2: bool,
    eta0: f64,
    n_iter: usize,
    random_state: u64,
    weights: Vec<WeightVector>,
    intercepts: Vec<f64>,
}

impl Perceptron {
    pub fn new(params: &ParamSet, classes: &[f64]) -> Result<Self, FitError> {
        params.check_names(NAME, PARAMS)?;
        Ok(Self {
            params: params.clone(),
            classes: classes.to_vec(),
            alpha: params.float(NAME, "alpha", 0.0001)?,
            l2: params.choice(NAME, "penalty", &["none", "l2"], "none")? == "l2",
            eta0: params.float(NAME, "eta0", 1.0)?,
            n_iter: params.count(NAME, "n_iter", 5)?,
            random_state: params.count(NAME, "random_state", 0)? as u64,
            weights: vec![],
            intercepts: vec![],
        })
    }

    fn is_fitted(&self) -> bool {
        !self.weights.is_empty()
    }

    fn reset(&mut self, n_features: usize) {
        self.weights = vec![WeightVector::zeros(n_features); self.classes.len()];
        self.intercepts = vec![0.0; self.classes.len()];
    }

    fn targets(&self, x: &FeatureMatrix, y: &[f64]) -> Result<Vec<usize>, FitError> {
        check_lengths(x, y)?;
        y.iter().map(|&label| class_index(&self.classes, label)).collect()
    }

    fn epoch(&mut self, x: &FeatureMatrix, targets: &[usize], order: &[usize]) {
        let shrink = (1.0 - self.eta0 * self.alpha).max(0.0);
        for &row in order {
            for (k, (w, b)) in self.weights.iter_mut().zip(&mut self.intercepts).enumerate() {
                if self.l2 {
                    w.scale_by(shrink);
                }
                let sign = if targets[row] == k { 1.0 } else { -1.0 };
                if sign * (w.dot_row(x, row) + *b) <= 0.0 {
                    w.add_row(x, row, self.eta0 * sign);
                    *b += self.eta0 * sign;
                }
            }
        }
    }
}

impl Fittable for Perceptron {
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<(), FitError> {
        let targets = self.targets(x, y)?;
        self.reset(x.n_cols());
        let mut rng = Pcg64::seed_from_u64(self.random_state);
        let mut order = (0..x.n_rows()).collect::<Vec<_>>();
        for _ in 0..self.n_iter {
            order.shuffle(&mut rng);
            self.epoch(x, &targets, &order);
        }
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, FitError> {
        if !self.is_fitted() {
            return Err(FitError::NotFitted { learner: NAME });
        }
        check_features(self.weights[0].len(), x)?;
        Ok((0..x.n_rows())
            .map(|row| {
                let scores = self
                    .weights
                    .iter()
                    .zip(&self.intercepts)
                    .map(|(w, b)| w.dot_row(x, row) + b);
                argmax(scores).map_or(f64::NAN, |k| self.classes[k])
            })
            .collect())
    }

    fn default_score(&self, x: &FeatureMatrix, y: &[f64]) -> Result<f64, FitError> {
        Ok(accuracy_of(&self.predict(x)?, y))
    }
}

impl IncrementallyFittable for Perceptron {
    fn partial_fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<(), FitError> {
        let targets = self.targets(x, y)?;
        if self.is_fitted() {
            check_features(self.weights[0].len(), x)?;
        } else {
            self.reset(x.n_cols());
        }
        let order = (0..x.n_rows()).collect::<Vec<_>>();
        self.epoch(x, &targets, &order);
        Ok(())
    }
}

impl Introspectable for Perceptron {
    fn coefficients(&self) -> Result<Vec<Coefficients>, IntrospectionError> {
        if !self.is_fitted() {
            return Err(IntrospectionError::NotFitted { learner: NAME });
        }
        Ok(self
            .classes
            .iter()
            .zip(&self.weights)
            .map(|(&class, w)| Coefficients {
                class: Some(class),
                values: w.to_vec(),
            })
            .collect())
    }
}

impl Learner for Perceptron {
    fn kind(&self) -> LearnerKind {
        LearnerKind::Perceptron
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }

    fn clone_boxed(&self) -> BoxedLearner {
        Box::new(self.clone())
    }

    fn incremental(&mut self) -> Option<&mut dyn IncrementallyFittable> {
        Some(self)
    }

    fn introspectable(&self) -> Option<&dyn Introspectable> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Class 1 has feature 0, class 2 has feature 1.
    fn separable() -> (FeatureMatrix, Vec<f64>) {
        let rows = (0..20).map(|i| if i % 2 == 0 { vec![(0, 1.0)] } else { vec![(1, 1.0)] });
        let y = (0..20).map(|i| if i % 2 == 0 { 1.0 } else { 2.0 }).collect();
        (FeatureMatrix::from_rows(2, rows), y)
    }

    #[test]
    fn test_fit_separable() {
        let (x, y) = separable();
        let mut learner = Perceptron::new(&ParamSet::new(), &[1.0, 2.0]).unwrap();
        learner.fit(&x, &y).unwrap();
        assert_eq!(learner.predict(&x).unwrap(), y);
        assert_eq!(learner.default_score(&x, &y).unwrap(), 1.0);
    }

    #[test]
    fn test_partial_fit_accumulates() {
        let (x, y) = separable();
        let mut learner = Perceptron::new(&ParamSet::new(), &[1.0, 2.0]).unwrap();
        learner.partial_fit(&x, &y).unwrap();
        learner.partial_fit(&x, &y).unwrap();
        assert_eq!(learner.predict(&x).unwrap(), y);
        let coefs = learner.coefficients().unwrap();
        assert_eq!(coefs.len(), 2);
        assert!(coefs[0].values[0] > coefs[0].values[1]);
    }

    #[test]
    fn test_l2_penalty_shrinks_weights() {
        let (x, y) = separable();
        let plain_params = ParamSet::new();
        // eta0 * alpha == 1 wipes the weights before every update.
        let l2_params = ParamSet::new().with("penalty", "l2").with("alpha", 1.0);
        let mut plain = Perceptron::new(&plain_params, &[1.0, 2.0]).unwrap();
        let mut l2 = Perceptron::new(&l2_params, &[1.0, 2.0]).unwrap();
        plain.fit(&x, &y).unwrap();
        l2.fit(&x, &y).unwrap();
        let norm = |p: &Perceptron| {
            p.coefficients().unwrap()[0]
                .values
                .iter()
                .map(|v| v * v)
                .sum::<f64>()
        };
        assert!((norm(&plain) - 2.0).abs() < 1e-12);
        assert!(norm(&l2) <= 1.0);
    }

    #[test]
    fn test_errors() {
        let (x, y) = separable();
        let mut learner = Perceptron::new(&ParamSet::new(), &[1.0]).unwrap();
        assert!(matches!(learner.predict(&x), Err(FitError::NotFitted { .. })));
        assert!(matches!(
            learner.fit(&x, &y),
            Err(FitError::UnknownLabel { label }) if label == 2.0
        ));
        assert!(matches!(
            learner.fit(&x, &y[..3]),
            Err(FitError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_same_seed_same_model() {
        let (x, y) = separable();
        let params = ParamSet::new().with("random_state", 7_i64);
        let mut a = Perceptron::new(&params, &[1.0, 2.0]).unwrap();
        let mut b = a.clone();
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.coefficients().unwrap(), b.coefficients().unwrap());
    }
}
