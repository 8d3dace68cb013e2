//! Bin ranges for collapsing a continuous label into ordinal classes
//!
//! A prediction label such as total hours played is heavily skewed, so
//! experiments can collapse it into a small number of ordered bins. A bin
//! set is a list of `(min, max)` pairs that must be finite, non-empty,
//! strictly ascending and non-overlapping.
//!
//! Bins are numbered from 1. The first bin covers `[min, max]`; every later
//! bin covers `(previous.max, max]`, so the small gaps left between
//! rounded boundaries are absorbed by the next bin.
//!
//! # Examples
//!
//! ```
//! use reviewcv_stats::binning::{BinRange, bin_index, generate_bin_ranges, validate_bin_ranges};
//!
//! let ranges = generate_bin_ranges(0.0, 100.0, 4, 1.0).unwrap();
//! assert_eq!(ranges.len(), 4);
//! assert!(validate_bin_ranges(&ranges).is_ok());
//! assert_eq!(bin_index(0.0, &ranges), Some(1));
//! assert_eq!(bin_index(100.0, &ranges), Some(4));
//! assert_eq!(bin_index(100.5, &ranges), None);
//!
//! let overlapping = [BinRange::new(0.0, 10.0), BinRange::new(5.0, 20.0)];
//! assert!(validate_bin_ranges(&overlapping).is_err());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusive range of raw label values that collapse into one bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinRange {
    pub min: f64,
    pub max: f64,
}

impl BinRange {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl fmt::Display for BinRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.min, self.max)
    }
}

/// Formats a bin set the way it appears in logs and reports.
#[must_use]
pub fn format_bin_ranges(ranges: &[BinRange]) -> String {
    let items = ranges.iter().map(ToString::to_string).collect::<Vec<_>>();
    format!("[{}]", items.join(", "))
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum BinRangeError {
    #[display("bin ranges must contain at least one range")]
    Empty,
    #[display("bin range #{index} contains a non-finite boundary")]
    NonFinite { index: usize },
    #[display("bin range #{index} has a minimum that is not below its maximum")]
    Inverted { index: usize },
    #[display("bin range #{index} starts at or below the end of the previous range")]
    Overlapping { index: usize },
    #[display("cannot split [{min}, {max}] into {nbins} bins with factor {factor}")]
    InvalidSplit {
        min: f64,
        max: f64,
        nbins: usize,
        factor: f64,
    },
}

/// Checks that a bin set is non-empty, finite, ascending and disjoint.
///
/// # Errors
///
/// Returns the first violated constraint.
pub fn validate_bin_ranges(ranges: &[BinRange]) -> Result<(), BinRangeError> {
    if ranges.is_empty() {
        return Err(BinRangeError::Empty);
    }
    for (index, range) in ranges.iter().enumerate() {
        if !range.min.is_finite() || !range.max.is_finite() {
            return Err(BinRangeError::NonFinite { index });
        }
        if range.min >= range.max {
            return Err(BinRangeError::Inverted { index });
        }
        if index > 0 && range.min <= ranges[index - 1].max {
            return Err(BinRangeError::Overlapping { index });
        }
    }
    Ok(())
}

/// Returns the 1-based bin number of `value`, or `None` when it falls
/// outside the covered domain.
#[must_use]
pub fn bin_index(value: f64, ranges: &[BinRange]) -> Option<usize> {
    let first = ranges.first()?;
    if value < first.min {
        return None;
    }
    ranges.iter().position(|r| value <= r.max).map(|i| i + 1)
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Splits `[min, max]` into `nbins` ranges whose widths grow by `factor`.
///
/// With `factor == 1.0` all bins have (about) the same width; with a factor
/// above one each bin is `factor` times wider than the one before it, which
/// suits long-tailed labels. Boundaries are rounded to one decimal place and
/// each bin starts 0.1 above the end of the previous one. The last bin
/// always ends at `max`.
///
/// # Errors
///
/// Returns [`BinRangeError::InvalidSplit`] when the parameters cannot
/// produce a valid bin set (empty domain, zero bins, non-positive factor or
/// bins too narrow to survive rounding).
pub fn generate_bin_ranges(
    min: f64,
    max: f64,
    nbins: usize,
    factor: f64,
) -> Result<Vec<BinRange>, BinRangeError> {
    let invalid = || BinRangeError::InvalidSplit {
        min,
        max,
        nbins,
        factor,
    };
    if !(min.is_finite() && max.is_finite()) || min >= max || nbins == 0 || factor <= 0.0 {
        return Err(invalid());
    }

    let widths = (0..nbins)
        .scan(1.0, |w, _| {
            let current = *w;
            *w *= factor;
            Some(current)
        })
        .collect::<Vec<f64>>();
    let unit = (max - min) / widths.iter().sum::<f64>();

    let mut ranges = Vec::with_capacity(nbins);
    let mut start = round_tenth(min);
    let mut upper = min;
    for (i, width) in widths.iter().enumerate() {
        upper += unit * width;
        let end = if i + 1 == nbins {
            max
        } else {
            round_tenth(upper)
        };
        ranges.push(BinRange::new(start, end));
        start = round_tenth(end + 0.1);
    }

    validate_bin_ranges(&ranges).map_err(|_| invalid())?;
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_inverted_range() {
        let ranges = [BinRange::new(5.0, 1.0)];
        assert_eq!(
            validate_bin_ranges(&ranges),
            Err(BinRangeError::Inverted { index: 0 })
        );
    }

    #[test]
    fn test_validate_rejects_touching_ranges() {
        let ranges = [BinRange::new(0.0, 10.0), BinRange::new(10.0, 20.0)];
        assert_eq!(
            validate_bin_ranges(&ranges),
            Err(BinRangeError::Overlapping { index: 1 })
        );
    }

    #[test]
    fn test_validate_rejects_nan() {
        let ranges = [BinRange::new(0.0, f64::NAN)];
        assert_eq!(
            validate_bin_ranges(&ranges),
            Err(BinRangeError::NonFinite { index: 0 })
        );
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert_eq!(validate_bin_ranges(&[]), Err(BinRangeError::Empty));
    }

    #[test]
    fn test_equal_width_bins() {
        let ranges = generate_bin_ranges(0.0, 40.0, 4, 1.0).unwrap();
        assert_eq!(
            ranges,
            vec![
                BinRange::new(0.0, 10.0),
                BinRange::new(10.1, 20.0),
                BinRange::new(20.1, 30.0),
                BinRange::new(30.1, 40.0),
            ]
        );
    }

    #[test]
    fn test_growing_bins_widen() {
        let ranges = generate_bin_ranges(0.0, 700.0, 3, 2.0).unwrap();
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0], BinRange::new(0.0, 100.0));
        assert_eq!(ranges[1], BinRange::new(100.1, 300.0));
        assert_eq!(ranges[2], BinRange::new(300.1, 700.0));
    }

    #[test]
    fn test_generate_rejects_bad_parameters() {
        assert!(generate_bin_ranges(5.0, 5.0, 3, 1.0).is_err());
        assert!(generate_bin_ranges(0.0, 5.0, 0, 1.0).is_err());
        assert!(generate_bin_ranges(0.0, 5.0, 3, 0.0).is_err());
        assert!(generate_bin_ranges(0.0, 0.2, 5, 1.0).is_err());
    }

    #[test]
    fn test_bin_index_absorbs_gaps() {
        let ranges = [BinRange::new(0.0, 10.0), BinRange::new(10.1, 20.0)];
        assert_eq!(bin_index(-0.5, &ranges), None);
        assert_eq!(bin_index(10.0, &ranges), Some(1));
        assert_eq!(bin_index(10.05, &ranges), Some(2));
        assert_eq!(bin_index(20.0, &ranges), Some(2));
        assert_eq!(bin_index(20.01, &ranges), None);
    }

    #[test]
    fn test_format_bin_ranges() {
        let ranges = [BinRange::new(0.0, 1.5), BinRange::new(1.6, 3.0)];
        assert_eq!(format_bin_ranges(&ranges), "[(0, 1.5), (1.6, 3)]");
    }
}
