//! Conversion of review documents into labelled samples

use std::{collections::BTreeSet, fmt};

use reviewcv_stats::binning::{BinRange, bin_index};

use crate::{
    document::{FeatureDict, FeatureValue, ReviewDocument},
    label::Label,
    store::{Projection, ReviewStore, StoreError, make_cursor},
};

/// Transformation applied to raw label values before binning.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LabelTransform {
    #[default]
    Identity,
    /// Natural logarithm.
    Log,
    /// Raise to the given power.
    Power(f64),
}

impl LabelTransform {
    #[must_use]
    pub fn new(lognormal: bool, power_transform: Option<f64>) -> Self {
        match (lognormal, power_transform) {
            (true, _) => Self::Log,
            (false, Some(p)) => Self::Power(p),
            (false, None) => Self::Identity,
        }
    }

    /// Applies the transformation. Returns `None` when the result is not a
    /// finite number, e.g. the logarithm of zero.
    #[must_use]
    pub fn apply(self, value: f64) -> Option<f64> {
        let transformed = match self {
            Self::Identity => value,
            Self::Log => value.ln(),
            Self::Power(p) => value.powf(p),
        };
        transformed.is_finite().then_some(transformed)
    }
}

/// Descriptor used in stats records: `None`, `ln` or `x**<power>`.
impl fmt::Display for LabelTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("None"),
            Self::Log => f.write_str("ln"),
            Self::Power(p) => write!(f, "x**{p:?}"),
        }
    }
}

/// How documents are turned into samples.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSettings {
    pub prediction_label: Label,
    pub nlp_features: bool,
    pub non_nlp_features: BTreeSet<Label>,
    pub transform: LabelTransform,
    pub bin_ranges: Option<Vec<BinRange>>,
}

impl SampleSettings {
    #[must_use]
    pub fn new(prediction_label: Label) -> Self {
        Self {
            prediction_label,
            nlp_features: true,
            non_nlp_features: BTreeSet::new(),
            transform: LabelTransform::Identity,
            bin_ranges: None,
        }
    }

    /// Maps a raw label value to the value learners are trained on: the
    /// transformed value, or its 1-based bin index when bin ranges are set.
    ///
    /// Returns `None` for values that cannot be used as a label.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn label_value(&self, raw: f64) -> Option<f64> {
        let value = self.transform.apply(raw)?;
        match &self.bin_ranges {
            Some(ranges) => bin_index(value, ranges).map(|i| i as f64),
            None => Some(value),
        }
    }

    #[must_use]
    pub fn projection(&self) -> Projection {
        if self.nlp_features {
            Projection::ALL
        } else {
            Projection::WITHOUT_NLP_FEATURES
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum SampleError {
    #[display("{_0}")]
    Store(StoreError),
    #[display("review {id} has no value for {label}")]
    #[from(ignore)]
    MissingLabel { id: String, label: Label },
    #[display("review {id} has an unusable {label} value: {value}")]
    #[from(ignore)]
    UnusableLabel { id: String, label: Label, value: f64 },
}

/// A review turned into features and a label.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    pub id: String,
    pub x: FeatureDict,
    pub y: f64,
}

/// Builds a data point from a document.
///
/// The feature dictionary holds the selected non-NLP attributes of the
/// review and, when enabled, its NLP features.
pub fn get_data_point(
    doc: ReviewDocument,
    settings: &SampleSettings,
) -> Result<DataPoint, SampleError> {
    let label = settings.prediction_label;
    let raw = doc.label(label).ok_or_else(|| SampleError::MissingLabel {
        id: doc.id.clone(),
        label,
    })?;
    let y = settings
        .label_value(raw)
        .ok_or_else(|| SampleError::UnusableLabel {
            id: doc.id.clone(),
            label,
            value: raw,
        })?;

    let mut x = if settings.nlp_features {
        doc.nlp_features
    } else {
        FeatureDict::new()
    };
    for feature in &settings.non_nlp_features {
        if let Some(value) = doc.labels.get(feature) {
            x.insert(feature.as_str().to_owned(), FeatureValue::Number(*value));
        }
    }

    Ok(DataPoint { id: doc.id, x, y })
}

/// Streams samples for lists of review IDs.
///
/// Each call issues a fresh pass over the datastore, so the same fold can be
/// read once for its labels and once for its features.
#[derive(Clone, Copy)]
pub struct SampleSource<'a> {
    store: &'a dyn ReviewStore,
    settings: &'a SampleSettings,
    batch_size: usize,
}

impl<'a> SampleSource<'a> {
    #[must_use]
    pub fn new(store: &'a dyn ReviewStore, settings: &'a SampleSettings, batch_size: usize) -> Self {
        Self {
            store,
            settings,
            batch_size,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &'a SampleSettings {
        self.settings
    }

    pub fn samples<'b>(
        &self,
        ids: &'b [String],
    ) -> impl Iterator<Item = Result<DataPoint, SampleError>> + use<'a, 'b>
    where
        'a: 'b,
    {
        let settings = self.settings;
        let store: &'b dyn ReviewStore = self.store;
        make_cursor(store, settings.projection(), self.batch_size, ids)
            .map(move |doc| get_data_point(doc?, settings))
    }

    pub fn labels(&self, ids: &[String]) -> Result<Vec<f64>, SampleError> {
        self.samples(ids).map(|s| s.map(|s| s.y)).collect()
    }

    pub fn features(&self, ids: &[String]) -> Result<Vec<FeatureDict>, SampleError> {
        self.samples(ids).map(|s| s.map(|s| s.x)).collect()
    }

    pub fn ids(&self, ids: &[String]) -> Result<Vec<String>, SampleError> {
        self.samples(ids).map(|s| s.map(|s| s.id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{game::Game, store::MemoryStore};

    fn doc(id: &str, hours: f64) -> ReviewDocument {
        ReviewDocument::new(id, Game::Dota2)
            .with_label(Label::TotalGameHours, hours)
            .with_label(Label::NumFriends, 12.0)
            .with_nlp_feature("gg", 2.0)
    }

    #[test]
    fn test_transform_descriptor() {
        assert_eq!(LabelTransform::Identity.to_string(), "None");
        assert_eq!(LabelTransform::Log.to_string(), "ln");
        assert_eq!(LabelTransform::Power(2.0).to_string(), "x**2.0");
        assert_eq!(LabelTransform::new(false, Some(0.5)), LabelTransform::Power(0.5));
    }

    #[test]
    fn test_log_of_zero_is_unusable() {
        assert_eq!(LabelTransform::Log.apply(0.0), None);
        assert_eq!(LabelTransform::Log.apply(1.0), Some(0.0));
    }

    #[test]
    fn test_label_value_with_bins() {
        let mut settings = SampleSettings::new(Label::TotalGameHours);
        settings.bin_ranges = Some(vec![BinRange::new(0.0, 10.0), BinRange::new(10.1, 100.0)]);
        assert_eq!(settings.label_value(5.0), Some(1.0));
        assert_eq!(settings.label_value(50.0), Some(2.0));
        assert_eq!(settings.label_value(500.0), None);
    }

    #[test]
    fn test_get_data_point_features() {
        let mut settings = SampleSettings::new(Label::TotalGameHours);
        settings.non_nlp_features.insert(Label::NumFriends);
        let point = get_data_point(doc("a", 3.0), &settings).unwrap();
        assert_eq!(point.y, 3.0);
        assert_eq!(point.x.len(), 2);
        assert_eq!(point.x["num_friends"], FeatureValue::Number(12.0));

        settings.nlp_features = false;
        let point = get_data_point(doc("a", 3.0), &settings).unwrap();
        assert_eq!(point.x.keys().collect::<Vec<_>>(), ["num_friends"]);
    }

    #[test]
    fn test_get_data_point_missing_label() {
        let settings = SampleSettings::new(Label::NumBadges);
        let err = get_data_point(doc("a", 3.0), &settings).unwrap_err();
        assert!(matches!(err, SampleError::MissingLabel { .. }));
    }

    #[test]
    fn test_sample_source_passes() {
        let store = MemoryStore::new([doc("a", 1.0), doc("b", 2.0), doc("c", 3.0)]);
        let settings = SampleSettings::new(Label::TotalGameHours);
        let source = SampleSource::new(&store, &settings, 2);
        let ids = ["c", "a"].map(String::from);
        assert_eq!(source.labels(&ids).unwrap(), vec![3.0, 1.0]);
        assert_eq!(source.ids(&ids).unwrap(), ids.to_vec());
        assert_eq!(source.features(&ids).unwrap().len(), 2);
    }
}
