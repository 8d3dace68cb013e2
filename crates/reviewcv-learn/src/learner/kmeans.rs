use rand::{Rng, SeedableRng as _, seq::SliceRandom as _};
use rand_pcg::Pcg64;
use reviewcv_data::vectorizer::FeatureMatrix;

use super::{
    BoxedLearner, FitError, Fittable, IncrementallyFittable, Learner, LearnerKind, argmax,
    check_features, check_lengths,
};
use crate::params::ParamSet;

const NAME: &str = "MiniBatchKMeans";
const PARAMS: &[&str] = &["n_clusters", "init", "batch_size", "max_iter", "random_state"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Init {
    KMeansPlusPlus,
    Random,
}

/// K-means clustering updated one mini-batch at a time.
///
/// Labels are ignored when fitting. Predictions are cluster indices, so the
/// learner only makes sense with objectives that compare orderings, or as a
/// point of comparison for the supervised learners.
#[derive(Debug, Clone)]
pub struct MiniBatchKMeans {
    params: ParamSet,
    n_clusters: usize,
    init: Init,
    batch_size: usize,
    max_iter: usize,
    random_state: u64,
    rng: Pcg64,
    centers: Vec<Vec<f64>>,
    counts: Vec<f64>,
}

impl MiniBatchKMeans {
    pub fn new(params: &ParamSet) -> Result<Self, FitError> {
        params.check_names(NAME, PARAMS)?;
        let init = match params.choice(NAME, "init", &["k-means++", "random"], "k-means++")? {
            "random" => Init::Random,
            _ => Init::KMeansPlusPlus,
        };
        let random_state = params.count(NAME, "random_state", 0)? as u64;
        Ok(Self {
            params: params.clone(),
            n_clusters: params.count(NAME, "n_clusters", 8)?.max(1),
            init,
            batch_size: params.count(NAME, "batch_size", 100)?.max(1),
            max_iter: params.count(NAME, "max_iter", 10)?,
            random_state,
            rng: Pcg64::seed_from_u64(random_state),
            centers: vec![],
            counts: vec![],
        })
    }

    fn is_fitted(&self) -> bool {
        !self.centers.is_empty()
    }

    /// Squared distance between row `row` of `x` and `center`.
    fn distance(x: &FeatureMatrix, row: usize, center: &[f64], center_norm: f64) -> f64 {
        (x.row_norm_squared(row) - 2.0 * x.row_dot(row, center) + center_norm).max(0.0)
    }

    fn center_norms(&self) -> Vec<f64> {
        self.centers
            .iter()
            .map(|c| c.iter().map(|v| v * v).sum())
            .collect()
    }

    fn nearest(&self, x: &FeatureMatrix, row: usize, norms: &[f64]) -> (usize, f64) {
        let distances = self
            .centers
            .iter()
            .zip(norms)
            .map(|(c, &norm)| Self::distance(x, row, c, norm))
            .collect::<Vec<_>>();
        let k = argmax(distances.iter().map(|d| -d)).unwrap_or_default();
        (k, distances[k])
    }

    fn dense_row(x: &FeatureMatrix, row: usize) -> Vec<f64> {
        let mut dense = vec![0.0; x.n_cols()];
        for (col, value) in x.row(row) {
            dense[col] = value;
        }
        dense
    }

    fn initialize(&mut self, x: &FeatureMatrix) -> Result<(), FitError> {
        if x.n_rows() < self.n_clusters {
            return Err(FitError::TooFewSamples {
                learner: NAME,
                needed: self.n_clusters,
                found: x.n_rows(),
            });
        }
        let rows = match self.init {
            Init::Random => {
                let mut order = (0..x.n_rows()).collect::<Vec<_>>();
                order.shuffle(&mut self.rng);
                order.truncate(self.n_clusters);
                order
            }
            Init::KMeansPlusPlus => kmeans_plus_plus(x, self.n_clusters, &mut self.rng),
        };
        self.centers = rows.iter().map(|&row| Self::dense_row(x, row)).collect();
        self.counts = vec![0.0; self.n_clusters];
        Ok(())
    }

    /// Moves every center to the running mean of the samples assigned to it.
    fn update(&mut self, x: &FeatureMatrix, rows: &[usize]) {
        let norms = self.center_norms();
        let assignments = rows
            .iter()
            .map(|&row| (row, self.nearest(x, row, &norms).0))
            .collect::<Vec<_>>();
        for (k, center) in self.centers.iter_mut().enumerate() {
            let assigned = assignments.iter().filter(|(_, a)| *a == k).count();
            if assigned == 0 {
                continue;
            }
            let old = self.counts[k];
            #[expect(clippy::cast_precision_loss)]
            let new = old + assigned as f64;
            for v in center.iter_mut() {
                *v *= old;
            }
            for &(row, _) in assignments.iter().filter(|(_, a)| *a == k) {
                for (col, value) in x.row(row) {
                    center[col] += value;
                }
            }
            for v in center.iter_mut() {
                *v /= new;
            }
            self.counts[k] = new;
        }
    }
}

/// Picks `k` distinct seed rows, each with probability proportional to its
/// squared distance from the closest seed chosen so far.
fn kmeans_plus_plus<R>(x: &FeatureMatrix, k: usize, rng: &mut R) -> Vec<usize>
where
    R: Rng + ?Sized,
{
    let n = x.n_rows();
    let mut chosen = vec![rng.random_range(0..n)];
    let dense = |row: usize| MiniBatchKMeans::dense_row(x, row);
    let mut seed = dense(chosen[0]);
    let mut seed_norm = x.row_norm_squared(chosen[0]);
    let mut closest = vec![f64::INFINITY; n];
    while chosen.len() < k {
        for (row, d) in closest.iter_mut().enumerate() {
            *d = d.min(MiniBatchKMeans::distance(x, row, &seed, seed_norm));
        }
        let total = (0..n)
            .filter(|row| !chosen.contains(row))
            .map(|row| closest[row])
            .sum::<f64>();
        let candidates = (0..n).filter(|row| !chosen.contains(row)).collect::<Vec<_>>();
        let next = if total > 0.0 {
            let mut target = rng.random_range(0.0..total);
            let mut pick = candidates[candidates.len() - 1];
            for &row in &candidates {
                if target < closest[row] {
                    pick = row;
                    break;
                }
                target -= closest[row];
            }
            pick
        } else {
            candidates[rng.random_range(0..candidates.len())]
        };
        chosen.push(next);
        seed = dense(next);
        seed_norm = x.row_norm_squared(next);
    }
    chosen
}

impl Fittable for MiniBatchKMeans {
    fn fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<(), FitError> {
        check_lengths(x, y)?;
        self.rng = Pcg64::seed_from_u64(self.random_state);
        self.initialize(x)?;
        let mut order = (0..x.n_rows()).collect::<Vec<_>>();
        for _ in 0..self.max_iter.max(1) {
            order.shuffle(&mut self.rng);
            let batch = &order[..self.batch_size.min(order.len())];
            self.update(x, batch);
        }
        Ok(())
    }

    /// Index of the nearest cluster center for each row.
    #[expect(clippy::cast_precision_loss)]
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, FitError> {
        if !self.is_fitted() {
            return Err(FitError::NotFitted { learner: NAME });
        }
        check_features(self.centers[0].len(), x)?;
        let norms = self.center_norms();
        Ok((0..x.n_rows())
            .map(|row| self.nearest(x, row, &norms).0 as f64)
            .collect())
    }

    /// Negative inertia: the closer the samples are to their centers the
    /// higher the score.
    fn default_score(&self, x: &FeatureMatrix, y: &[f64]) -> Result<f64, FitError> {
        check_lengths(x, y)?;
        if !self.is_fitted() {
            return Err(FitError::NotFitted { learner: NAME });
        }
        check_features(self.centers[0].len(), x)?;
        let norms = self.center_norms();
        Ok(-(0..x.n_rows())
            .map(|row| self.nearest(x, row, &norms).1)
            .sum::<f64>())
    }
}

impl IncrementallyFittable for MiniBatchKMeans {
    fn partial_fit(&mut self, x: &FeatureMatrix, y: &[f64]) -> Result<(), FitError> {
        check_lengths(x, y)?;
        if self.is_fitted() {
            check_features(self.centers[0].len(), x)?;
        } else {
            self.initialize(x)?;
        }
        let rows = (0..x.n_rows()).collect::<Vec<_>>();
        self.update(x, &rows);
        Ok(())
    }
}

impl Learner for MiniBatchKMeans {
    fn kind(&self) -> LearnerKind {
        LearnerKind::MiniBatchKMeans
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
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two tight blobs far apart along feature 0.
    fn blobs() -> FeatureMatrix {
        let rows = (0..20).map(|i| {
            let offset = if i < 10 { 0.0 } else { 100.0 };
            #[expect(clippy::cast_precision_loss)]
            let jitter = (i % 10) as f64 * 0.01;
            vec![(0, offset + jitter), (1, 1.0)]
        });
        FeatureMatrix::from_rows(2, rows)
    }

    #[test]
    fn test_separates_blobs() {
        let x = blobs();
        let y = vec![0.0; 20];
        for init in ["k-means++", "random"] {
            let params = ParamSet::new()
                .with("n_clusters", 2_i64)
                .with("init", init)
                .with("batch_size", 20_i64);
            let mut learner = MiniBatchKMeans::new(&params).unwrap();
            learner.fit(&x, &y).unwrap();
            let predicted = learner.predict(&x).unwrap();
            assert!(predicted.iter().all(|&p| p == 0.0 || p == 1.0));
            if init == "k-means++" {
                assert!(predicted[..10].iter().all(|&p| p == predicted[0]));
                assert!(predicted[10..].iter().all(|&p| p == predicted[10]));
                assert_ne!(predicted[0], predicted[10]);
                assert!(learner.default_score(&x, &y).unwrap() > -1.0);
            }
        }
    }

    #[test]
    fn test_partial_fit_needs_enough_samples() {
        let x = blobs().select_rows(&[0, 1]);
        let params = ParamSet::new().with("n_clusters", 3_i64);
        let mut learner = MiniBatchKMeans::new(&params).unwrap();
        assert!(matches!(
            learner.partial_fit(&x, &[0.0, 0.0]),
            Err(FitError::TooFewSamples { needed: 3, found: 2, .. })
        ));
    }

    #[test]
    fn test_partial_fit_moves_centers_to_mean() {
        let x = FeatureMatrix::from_rows(1, vec![vec![(0, 1.0)], vec![(0, 3.0)]]);
        let params = ParamSet::new().with("n_clusters", 1_i64);
        let mut learner = MiniBatchKMeans::new(&params).unwrap();
        learner.partial_fit(&x, &[0.0, 0.0]).unwrap();
        assert_eq!(learner.centers, vec![vec![2.0]]);
        assert_eq!(learner.predict(&x).unwrap(), vec![0.0, 0.0]);
    }
}
