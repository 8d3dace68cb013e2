//! Sampling of review IDs into grid search and training folds

use std::{collections::BTreeSet, fmt, str::FromStr};

use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use crate::{
    context::ExperimentContext,
    game::{Game, games_label},
    sample::SampleSettings,
    store::{ReviewStore, StoreError},
};

/// How IDs are drawn from the pool of reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Equal share per label value, drawn round-robin.
    #[default]
    Even,
    /// Label proportions of the pool preserved.
    Stratified,
}

impl SamplingMode {
    pub const ALL: [Self; 2] = [Self::Even, Self::Stratified];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Even => "even",
            Self::Stratified => "stratified",
        }
    }
}

impl fmt::Display for SamplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unrecognized sampling mode: {name}")]
pub struct UnknownSamplingModeError {
    pub name: String,
}

impl FromStr for SamplingMode {
    type Err = UnknownSamplingModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| UnknownSamplingModeError { name: s.to_owned() })
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum DataError {
    #[display("failed to read the sampling pool: {_0}")]
    Store(StoreError),
}

/// Number and size of the folds to draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingRequest {
    pub games: BTreeSet<Game>,
    pub folds: usize,
    pub fold_size: usize,
    pub grid_search_folds: usize,
    pub grid_search_fold_size: usize,
    pub sampling: SamplingMode,
}

/// Review IDs of one experiment, split into disjoint folds.
///
/// Grid search folds are drawn first, then training folds, from a single
/// shuffled pool, so that no ID appears twice. When the pool runs out, the
/// last fold is kept only if it holds at least half the requested size and
/// no further folds are drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentalData {
    training_set: Vec<Vec<String>>,
    grid_search_set: Vec<Vec<String>>,
    classes: Vec<f64>,
}

impl ExperimentalData {
    #[expect(clippy::cast_precision_loss)]
    pub fn new<R>(
        store: &dyn ReviewStore,
        settings: &SampleSettings,
        request: &SamplingRequest,
        rng: &mut R,
        ctx: &ExperimentContext,
    ) -> Result<Self, DataError>
    where
        R: Rng + ?Sized,
    {
        let _span = ctx.stage("sampling").entered();

        let pool = store
            .label_values(&request.games, settings.prediction_label)?
            .into_iter()
            .filter_map(|(id, raw)| Some((id, settings.label_value(raw)?)))
            .collect::<Vec<_>>();
        tracing::info!(
            games = %games_label(&request.games),
            label = %settings.prediction_label,
            pool = pool.len(),
            "collected sampling pool"
        );

        let classes = match &settings.bin_ranges {
            Some(ranges) => (1..=ranges.len()).map(|i| i as f64).collect(),
            None => {
                let mut values = pool.iter().map(|(_, y)| *y).collect::<Vec<_>>();
                values.sort_by(f64::total_cmp);
                values.dedup();
                values
            }
        };

        let mut groups = LabelGroups::new(pool, rng);
        let grid_search_set = groups.draw_folds(
            request.sampling,
            request.grid_search_folds,
            request.grid_search_fold_size,
        );
        let training_set = groups.draw_folds(request.sampling, request.folds, request.fold_size);

        if grid_search_set.len() < request.grid_search_folds {
            tracing::warn!(
                requested = request.grid_search_folds,
                realized = grid_search_set.len(),
                "not enough data for the requested grid search folds"
            );
        }
        if training_set.len() < request.folds {
            tracing::warn!(
                requested = request.folds,
                realized = training_set.len(),
                "not enough data for the requested training folds"
            );
        }
        tracing::info!(
            grid_search_folds = grid_search_set.len(),
            training_folds = training_set.len(),
            classes = classes.len(),
            "drew experimental data"
        );

        Ok(Self {
            training_set,
            grid_search_set,
            classes,
        })
    }

    #[must_use]
    pub fn training_set(&self) -> &[Vec<String>] {
        &self.training_set
    }

    #[must_use]
    pub fn grid_search_set(&self) -> &[Vec<String>] {
        &self.grid_search_set
    }

    /// Realized number of training folds.
    #[must_use]
    pub fn folds(&self) -> usize {
        self.training_set.len()
    }

    /// Realized number of grid search folds.
    #[must_use]
    pub fn grid_search_folds(&self) -> usize {
        self.grid_search_set.len()
    }

    /// Sorted label values used for rounding and evaluation.
    #[must_use]
    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// All training IDs followed by all grid search IDs.
    #[must_use]
    pub fn all_ids(&self) -> Vec<String> {
        self.training_set
            .iter()
            .chain(&self.grid_search_set)
            .flatten()
            .cloned()
            .collect()
    }
}

/// Remaining pool IDs grouped by label value, each group shuffled.
struct LabelGroups {
    groups: Vec<Vec<String>>,
    next_group: usize,
}

impl LabelGroups {
    fn new<R>(mut pool: Vec<(String, f64)>, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        pool.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        let mut groups: Vec<(f64, Vec<String>)> = vec![];
        for (id, y) in pool {
            match groups.last_mut() {
                Some((last, ids)) if last.total_cmp(&y).is_eq() => ids.push(id),
                _ => groups.push((y, vec![id])),
            }
        }
        let mut groups = groups.into_iter().map(|(_, ids)| ids).collect::<Vec<_>>();
        for ids in &mut groups {
            ids.shuffle(rng);
        }
        Self {
            groups,
            next_group: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    fn draw_folds(&mut self, mode: SamplingMode, count: usize, size: usize) -> Vec<Vec<String>> {
        let min_size = size.div_ceil(2).max(1);
        let mut folds = vec![];
        for _ in 0..count {
            let fold = self.draw(mode, size);
            let full = fold.len() == size;
            if fold.len() >= min_size {
                folds.push(fold);
            }
            if !full {
                break;
            }
        }
        folds
    }

    fn draw(&mut self, mode: SamplingMode, n: usize) -> Vec<String> {
        match mode {
            SamplingMode::Even => self.draw_even(n),
            SamplingMode::Stratified => self.draw_stratified(n),
        }
    }

    fn draw_even(&mut self, n: usize) -> Vec<String> {
        let mut drawn = Vec::with_capacity(n);
        while drawn.len() < n && self.remaining() > 0 {
            let group = &mut self.groups[self.next_group];
            if let Some(id) = group.pop() {
                drawn.push(id);
            }
            self.next_group = (self.next_group + 1) % self.groups.len();
        }
        drawn
    }

    /// Largest remainder apportionment of `n` over the remaining group sizes.
    fn draw_stratified(&mut self, n: usize) -> Vec<String> {
        let total = self.remaining();
        if total == 0 {
            return vec![];
        }
        let n = n.min(total);
        let mut quotas = self
            .groups
            .iter()
            .map(|g| (n * g.len() / total, (n * g.len()) % total))
            .collect::<Vec<_>>();
        let assigned = quotas.iter().map(|(q, _)| q).sum::<usize>();
        let mut order = (0..quotas.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| quotas[b].1.cmp(&quotas[a].1).then(a.cmp(&b)));
        for &i in order.iter().take(n - assigned) {
            quotas[i].0 += 1;
        }

        let mut drawn = Vec::with_capacity(n);
        for (group, (quota, _)) in self.groups.iter_mut().zip(quotas) {
            let keep = group.len() - quota;
            drawn.extend(group.drain(keep..));
        }
        drawn
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng as _;
    use rand_pcg::Pcg64;

    use super::*;
    use crate::{document::ReviewDocument, label::Label, store::MemoryStore};
    use reviewcv_stats::binning::BinRange;

    fn store(n: usize) -> MemoryStore {
        MemoryStore::new((0..n).map(|i| {
            let hours = [1.0, 2.0, 2.0, 3.0][i % 4];
            ReviewDocument::new(format!("r{i:04}"), Game::Dota2)
                .with_label(Label::TotalGameHours, hours)
        }))
    }

    fn request(mode: SamplingMode) -> SamplingRequest {
        SamplingRequest {
            games: [Game::Dota2].into_iter().collect(),
            folds: 3,
            fold_size: 20,
            grid_search_folds: 2,
            grid_search_fold_size: 30,
            sampling: mode,
        }
    }

    fn draw(n: usize, mode: SamplingMode, seed: u64) -> ExperimentalData {
        let settings = SampleSettings::new(Label::TotalGameHours);
        let mut rng = Pcg64::seed_from_u64(seed);
        ExperimentalData::new(
            &store(n),
            &settings,
            &request(mode),
            &mut rng,
            &ExperimentContext::disabled(),
        )
        .unwrap()
    }

    #[test]
    fn test_folds_are_disjoint() {
        for mode in SamplingMode::ALL {
            let data = draw(400, mode, 1);
            assert_eq!(data.grid_search_folds(), 2);
            assert_eq!(data.folds(), 3);
            let ids = data.all_ids();
            assert_eq!(ids.len(), 2 * 30 + 3 * 20);
            assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());
        }
    }

    #[test]
    fn test_classes_are_sorted_unique_labels() {
        let data = draw(400, SamplingMode::Even, 1);
        assert_eq!(data.classes(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_even_sampling_balances_labels() {
        let data = draw(400, SamplingMode::Even, 7);
        let settings = SampleSettings::new(Label::TotalGameHours);
        let store = store(400);
        let fold = &data.grid_search_set()[0];
        let source = crate::sample::SampleSource::new(&store, &settings, 50);
        let labels = source.labels(fold).unwrap();
        for class in [1.0, 2.0, 3.0] {
            assert_eq!(labels.iter().filter(|&&y| y == class).count(), 10);
        }
    }

    #[test]
    fn test_stratified_sampling_keeps_proportions() {
        let data = draw(400, SamplingMode::Stratified, 7);
        let settings = SampleSettings::new(Label::TotalGameHours);
        let store = store(400);
        let source = crate::sample::SampleSource::new(&store, &settings, 50);
        let labels = source.labels(&data.training_set()[0]).unwrap();
        assert_eq!(labels.iter().filter(|&&y| y == 2.0).count(), 10);
        assert_eq!(labels.iter().filter(|&&y| y == 1.0).count(), 5);
    }

    #[test]
    fn test_scarce_data_shrinks_folds() {
        // 60 grid search IDs use up the pool except 25: one full training
        // fold and a partial one of 5, which is too small to keep.
        let data = draw(85, SamplingMode::Stratified, 3);
        assert_eq!(data.grid_search_folds(), 2);
        assert_eq!(data.folds(), 1);

        // A partial fold of at least half the size is kept.
        let data = draw(75, SamplingMode::Stratified, 3);
        assert_eq!(data.folds(), 1);
        let data = draw(95, SamplingMode::Stratified, 3);
        assert_eq!(data.folds(), 2);
        assert_eq!(data.training_set()[1].len(), 15);
    }

    #[test]
    fn test_same_seed_same_folds() {
        assert_eq!(draw(400, SamplingMode::Even, 9), draw(400, SamplingMode::Even, 9));
        assert_ne!(draw(400, SamplingMode::Even, 9), draw(400, SamplingMode::Even, 10));
    }

    #[test]
    fn test_bin_classes_and_unbinnable_labels() {
        let mut settings = SampleSettings::new(Label::TotalGameHours);
        settings.bin_ranges = Some(vec![BinRange::new(0.0, 1.5), BinRange::new(1.6, 2.5)]);
        let mut rng = Pcg64::seed_from_u64(0);
        let data = ExperimentalData::new(
            &store(400),
            &settings,
            &request(SamplingMode::Even),
            &mut rng,
            &ExperimentContext::disabled(),
        )
        .unwrap();
        assert_eq!(data.classes(), [1.0, 2.0]);
        // Labels of 3.0 fall outside the bins and are never drawn.
        let store = store(400);
        let source = crate::sample::SampleSource::new(&store, &settings, 50);
        let labels = source.labels(&data.all_ids()).unwrap();
        assert!(labels.iter().all(|&y| y == 1.0 || y == 2.0));
    }
}
