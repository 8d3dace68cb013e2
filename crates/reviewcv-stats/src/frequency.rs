//! Label frequency counting in first-seen order

/// Occurrence counts of label values, kept in the order labels were first
/// encountered.
///
/// The ordering makes "most frequent" deterministic: among labels tied for
/// the highest count, the one seen first wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelCounts {
    entries: Vec<(f64, usize)>,
}

impl LabelCounts {
    #[must_use]
    pub fn new<I>(labels: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut counts = Self::default();
        for label in labels {
            counts.add(label);
        }
        counts
    }

    #[expect(clippy::float_cmp)]
    pub fn add(&mut self, label: f64) {
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some((_, count)) => *count += 1,
            None => self.entries.push((label, 1)),
        }
    }

    /// Number of labels counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    /// `(label, count)` pairs in first-seen order.
    #[must_use]
    pub fn entries(&self) -> &[(f64, usize)] {
        &self.entries
    }

    /// The label with the strictly highest count; ties go to the label seen first.
    ///
    /// Returns `None` when nothing has been counted.
    #[must_use]
    pub fn most_frequent(&self) -> Option<f64> {
        let mut best: Option<(f64, usize)> = None;
        for &(label, count) in &self.entries {
            if best.is_none_or(|(_, best_count)| count > best_count) {
                best = Some((label, count));
            }
        }
        best.map(|(label, _)| label)
    }
}
