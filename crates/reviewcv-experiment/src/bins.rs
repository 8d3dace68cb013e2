//! Bin ranges derived from the stored label distribution.

use std::collections::BTreeSet;

use reviewcv_data::{
    game::Game,
    label::Label,
    sample::LabelTransform,
    store::{ReviewStore, StoreError},
};
use reviewcv_stats::{
    binning::{BinRange, BinRangeError, generate_bin_ranges},
    descriptive::DescriptiveStats,
};
use tracing::info;

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum LabelBinsError {
    #[display("{_0}")]
    Store(StoreError),
    #[display("{_0}")]
    Bins(BinRangeError),
    #[display("no usable {label} values for the selected games")]
    #[from(ignore)]
    NoValues { label: Label },
}

/// Splits the range of `label` over `games` into `nbins` bins whose widths
/// grow by `factor`.
///
/// The range is taken after `transform`, so the bins apply to transformed
/// values. Values the transform cannot handle are left out.
pub fn label_bin_ranges(
    store: &dyn ReviewStore,
    games: &BTreeSet<Game>,
    label: Label,
    transform: LabelTransform,
    nbins: usize,
    factor: f64,
) -> Result<Vec<BinRange>, LabelBinsError> {
    let values = store
        .label_values(games, label)?
        .into_iter()
        .filter_map(|(_, raw)| transform.apply(raw));
    let stats = DescriptiveStats::new(values).ok_or(LabelBinsError::NoValues { label })?;
    let ranges = generate_bin_ranges(stats.min, stats.max, nbins, factor)?;
    info!(
        %label,
        nbins,
        factor,
        %transform,
        min = stats.min,
        max = stats.max,
        "generated bin ranges"
    );
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use reviewcv_data::{document::ReviewDocument, store::MemoryStore};

    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new(
            [0.0, 10.0, 50.0, 100.0]
                .into_iter()
                .enumerate()
                .map(|(i, hours)| {
                    ReviewDocument::new(format!("r{i}"), Game::Warframe)
                        .with_label(Label::TotalGameHours, hours)
                }),
        )
    }

    #[test]
    fn test_bins_cover_label_range() {
        let games = BTreeSet::from([Game::Warframe]);
        let ranges = label_bin_ranges(
            &store(),
            &games,
            Label::TotalGameHours,
            LabelTransform::Identity,
            4,
            1.0,
        )
        .unwrap();
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0].min, 0.0);
        assert_eq!(ranges[3].max, 100.0);
    }

    #[test]
    fn test_transform_applies_before_binning() {
        let games = BTreeSet::from([Game::Warframe]);
        // ln(0) is unusable and left out
        let ranges = label_bin_ranges(
            &store(),
            &games,
            Label::TotalGameHours,
            LabelTransform::new(true, None),
            2,
            1.0,
        )
        .unwrap();
        assert!((ranges[1].max - 100.0_f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_no_values() {
        let games = BTreeSet::from([Game::Dota2]);
        let error = label_bin_ranges(
            &store(),
            &games,
            Label::TotalGameHours,
            LabelTransform::Identity,
            2,
            1.0,
        )
        .unwrap_err();
        assert!(matches!(error, LabelBinsError::NoValues { .. }));
    }
}
