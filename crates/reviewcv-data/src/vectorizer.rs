//! Conversion of feature dictionaries into sparse numeric matrices.
//!
//! Two strategies are available:
//!
//! - [`DictVectorizer`] learns a sorted vocabulary of feature names and maps
//!   each name to a column
//! - [`FeatureHasher`] hashes feature names into a fixed number of columns
//!   and needs no fitting
//!
//! Text-valued features are one-hot encoded as `name=value` with value `1.0`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use sprs::CsMat;

use crate::document::{FeatureDict, FeatureValue};

/// Column count used by the feature hasher when none is configured.
pub const DEFAULT_HASHED_FEATURES: usize = 262_144;

/// Sparse row-major matrix of samples by features.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix(CsMat<f64>);

impl FeatureMatrix {
    /// Builds a matrix from rows of `(column, value)` entries. Entries for the
    /// same column within a row are summed.
    #[must_use]
    pub fn from_rows<I, R>(n_cols: usize, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (usize, f64)>,
    {
        let mut indptr = vec![0];
        let mut indices = vec![];
        let mut data = vec![];
        for row in rows {
            let mut merged = BTreeMap::new();
            for (col, value) in row {
                debug_assert!(col < n_cols);
                *merged.entry(col).or_insert(0.0) += value;
            }
            for (col, value) in merged {
                indices.push(col);
                data.push(value);
            }
            indptr.push(indices.len());
        }
        let n_rows = indptr.len() - 1;
        Self(CsMat::new((n_rows, n_cols), indptr, indices, data))
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.0.rows()
    }

    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.0.cols()
    }

    /// Non-zero `(column, value)` entries of row `i`.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.0
            .outer_view(i)
            .into_iter()
            .flat_map(|row| {
                row.indices()
                    .iter()
                    .copied()
                    .zip(row.data().iter().copied())
                    .collect::<Vec<_>>()
            })
    }

    /// Dot product of row `i` with a dense weight vector.
    #[must_use]
    pub fn row_dot(&self, i: usize, weights: &[f64]) -> f64 {
        self.row(i).map(|(col, value)| value * weights[col]).sum()
    }

    /// Squared Euclidean norm of row `i`.
    #[must_use]
    pub fn row_norm_squared(&self, i: usize) -> f64 {
        self.row(i).map(|(_, value)| value * value).sum()
    }

    /// New matrix made of the given rows, in the given order.
    #[must_use]
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self::from_rows(
            self.n_cols(),
            rows.iter().map(|&i| self.row(i).collect::<Vec<_>>()),
        )
    }

    #[must_use]
    pub fn as_inner(&self) -> &CsMat<f64> {
        &self.0
    }
}

fn entries(dict: &FeatureDict) -> impl Iterator<Item = (String, f64)> + '_ {
    dict.iter().map(|(name, value)| match value {
        FeatureValue::Number(n) => (name.clone(), *n),
        FeatureValue::Text(s) => (format!("{name}={s}"), 1.0),
    })
}

/// Vectorizer with a learned vocabulary.
#[derive(Debug, Clone, Default)]
pub struct DictVectorizer {
    feature_names: Vec<String>,
    vocabulary: HashMap<String, usize>,
}

impl DictVectorizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Learns the vocabulary from `dicts`, replacing any previous one.
    pub fn fit<'a, I>(&mut self, dicts: I)
    where
        I: IntoIterator<Item = &'a FeatureDict>,
    {
        let names = dicts
            .into_iter()
            .flat_map(|d| entries(d).map(|(name, _)| name).collect::<Vec<_>>())
            .collect::<BTreeSet<_>>();
        self.feature_names = names.into_iter().collect();
        self.vocabulary = self
            .feature_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
    }

    /// Transforms `dicts`; features outside the vocabulary are ignored.
    #[must_use]
    pub fn transform(&self, dicts: &[FeatureDict]) -> FeatureMatrix {
        FeatureMatrix::from_rows(
            self.feature_names.len(),
            dicts.iter().map(|d| {
                entries(d)
                    .filter_map(|(name, value)| Some((*self.vocabulary.get(&name)?, value)))
                    .collect::<Vec<_>>()
            }),
        )
    }

    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

/// Stateless vectorizer mapping feature names to columns by hashing.
///
/// Values of features hashed to the same column are summed, and the
/// absolute value of the sum is stored, so every entry is non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureHasher {
    n_features: usize,
}

impl FeatureHasher {
    /// Creates a hasher with `n_features` columns; `0` selects
    /// [`DEFAULT_HASHED_FEATURES`].
    #[must_use]
    pub fn new(n_features: usize) -> Self {
        let n_features = if n_features == 0 {
            DEFAULT_HASHED_FEATURES
        } else {
            n_features
        };
        Self { n_features }
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[must_use]
    pub fn column(&self, name: &str) -> usize {
        let hash = blake3::hash(name.as_bytes());
        let mut bytes = [0; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        let n = self.n_features as u64;
        #[expect(clippy::cast_possible_truncation)]
        let col = (u64::from_le_bytes(bytes) % n) as usize;
        col
    }

    #[must_use]
    pub fn transform(&self, dicts: &[FeatureDict]) -> FeatureMatrix {
        FeatureMatrix::from_rows(
            self.n_features,
            dicts.iter().map(|d| {
                let mut summed = BTreeMap::<usize, f64>::new();
                for (name, value) in entries(d) {
                    *summed.entry(self.column(&name)).or_default() += value;
                }
                summed
                    .into_iter()
                    .map(|(col, value)| (col, value.abs()))
                    .collect::<Vec<_>>()
            }),
        )
    }
}

/// The vectorizer used for one experiment.
#[derive(Debug, Clone)]
pub enum Vectorizer {
    Dict(DictVectorizer),
    Hasher(FeatureHasher),
}

impl Vectorizer {
    /// A feature hasher when `hashed_features` is set, otherwise an unfitted
    /// dictionary vectorizer.
    #[must_use]
    pub fn new(hashed_features: Option<usize>) -> Self {
        match hashed_features {
            Some(n) => Self::Hasher(FeatureHasher::new(n)),
            None => Self::Dict(DictVectorizer::new()),
        }
    }

    pub fn fit<'a, I>(&mut self, dicts: I)
    where
        I: IntoIterator<Item = &'a FeatureDict>,
    {
        match self {
            Self::Dict(v) => v.fit(dicts),
            Self::Hasher(_) => {}
        }
    }

    #[must_use]
    pub fn transform(&self, dicts: &[FeatureDict]) -> FeatureMatrix {
        match self {
            Self::Dict(v) => v.transform(dicts),
            Self::Hasher(v) => v.transform(dicts),
        }
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        match self {
            Self::Dict(v) => v.feature_names().len(),
            Self::Hasher(v) => v.n_features(),
        }
    }

    /// Column names, available only for dictionary vectorizers.
    #[must_use]
    pub fn feature_names(&self) -> Option<&[String]> {
        match self {
            Self::Dict(v) => Some(v.feature_names()),
            Self::Hasher(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(entries: &[(&str, FeatureValue)]) -> FeatureDict {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn test_dict_vectorizer_vocabulary_is_sorted() {
        let dicts = vec![
            dict(&[("b", 1.0.into()), ("lang", "en".into())]),
            dict(&[("a", 2.0.into()), ("lang", "de".into())]),
        ];
        let mut vec = DictVectorizer::new();
        vec.fit(&dicts);
        assert_eq!(vec.feature_names(), ["a", "b", "lang=de", "lang=en"]);

        let x = vec.transform(&dicts);
        assert_eq!((x.n_rows(), x.n_cols()), (2, 4));
        assert_eq!(x.row(0).collect::<Vec<_>>(), vec![(1, 1.0), (3, 1.0)]);
        assert_eq!(x.row(1).collect::<Vec<_>>(), vec![(0, 2.0), (2, 1.0)]);
    }

    #[test]
    fn test_dict_vectorizer_ignores_unknown_features() {
        let mut vec = DictVectorizer::new();
        vec.fit(&[dict(&[("a", 1.0.into())])]);
        let x = vec.transform(&[dict(&[("a", 3.0.into()), ("z", 9.0.into())])]);
        assert_eq!(x.row(0).collect::<Vec<_>>(), vec![(0, 3.0)]);
    }

    #[test]
    fn test_hasher_is_deterministic_and_non_negative() {
        let hasher = FeatureHasher::new(16);
        let dicts = [dict(&[("a", (-2.0).into()), ("b", 1.0.into())])];
        let x1 = hasher.transform(&dicts);
        let x2 = hasher.transform(&dicts);
        assert_eq!(x1, x2);
        assert_eq!(x1.n_cols(), 16);
        assert!(x1.row(0).all(|(col, v)| col < 16 && v > 0.0));
        let expected = if hasher.column("a") == hasher.column("b") {
            1.0
        } else {
            3.0
        };
        assert!((x1.row(0).map(|(_, v)| v).sum::<f64>() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_hasher_takes_absolute_value_after_summing() {
        // a single column makes every feature collide
        let hasher = FeatureHasher::new(1);
        let x = hasher.transform(&[
            dict(&[("a", 2.0.into()), ("b", (-3.0).into())]),
            dict(&[("a", (-2.0).into()), ("lang", "en".into())]),
        ]);
        assert_eq!(x.row(0).collect::<Vec<_>>(), vec![(0, 1.0)]);
        assert_eq!(x.row(1).collect::<Vec<_>>(), vec![(0, 1.0)]);
    }

    #[test]
    fn test_hasher_zero_width_uses_default() {
        assert_eq!(FeatureHasher::new(0).n_features(), DEFAULT_HASHED_FEATURES);
        assert_eq!(Vectorizer::new(Some(0)).n_features(), 262_144);
        assert!(Vectorizer::new(Some(8)).feature_names().is_none());
    }

    #[test]
    fn test_select_rows() {
        let x = FeatureMatrix::from_rows(3, vec![vec![(0, 1.0)], vec![(2, 2.0), (2, 1.0)], vec![]]);
        let sub = x.select_rows(&[1, 0]);
        assert_eq!(sub.n_rows(), 2);
        assert_eq!(sub.row(0).collect::<Vec<_>>(), vec![(2, 3.0)]);
        assert_eq!(sub.row_dot(1, &[2.0, 0.0, 0.0]), 2.0);
        assert_eq!(sub.row_norm_squared(0), 9.0);
    }
}
