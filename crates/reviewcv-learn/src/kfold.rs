//! Stratified k-fold splitting.

use rand::{Rng, seq::SliceRandom as _};

/// One train/test split of sample indices. Both lists are ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Splits sample indices into `k` folds keeping each label's share roughly
/// equal across folds.
///
/// Samples of each label are shuffled and dealt to the folds in turn. The
/// dealing continues where the previous label stopped, so fold sizes differ
/// by at most one. Folds that end up empty (fewer samples than folds) are
/// not returned.
pub fn stratified_k_fold<R>(labels: &[f64], k: usize, rng: &mut R) -> Vec<Split>
where
    R: Rng + ?Sized,
{
    let k = k.max(1);
    let mut order = (0..labels.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| labels[a].total_cmp(&labels[b]).then(a.cmp(&b)));

    let mut fold_of = vec![0; labels.len()];
    let mut next_fold = 0;
    for group in order.chunk_by_mut(|&a, &b| labels[a].total_cmp(&labels[b]).is_eq()) {
        group.shuffle(rng);
        for &index in &*group {
            fold_of[index] = next_fold;
            next_fold = (next_fold + 1) % k;
        }
    }

    (0..k)
        .filter_map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&i| fold_of[i] == fold);
            (!test.is_empty()).then_some(Split { train, test })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64;

    use super::*;

    #[test]
    fn test_folds_partition_samples() {
        let labels = [1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0, 3.0];
        let mut rng = Pcg64::seed_from_u64(12345);
        let splits = stratified_k_fold(&labels, 3, &mut rng);
        assert_eq!(splits.len(), 3);

        let mut seen = splits.iter().flat_map(|s| s.test.clone()).collect::<Vec<_>>();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());

        for split in &splits {
            assert_eq!(split.train.len() + split.test.len(), 10);
            assert!(split.test.iter().all(|i| !split.train.contains(i)));
            assert!((3..=4).contains(&split.test.len()));
            // every label appears in every test fold
            for label in [1.0, 2.0, 3.0] {
                assert!(split.test.iter().any(|&i| labels[i] == label));
            }
        }
    }

    #[test]
    fn test_same_seed_same_folds() {
        let labels = (0..30).map(|i| f64::from(i % 4)).collect::<Vec<_>>();
        let a = stratified_k_fold(&labels, 5, &mut Pcg64::seed_from_u64(12345));
        let b = stratified_k_fold(&labels, 5, &mut Pcg64::seed_from_u64(12345));
        assert_eq!(a, b);
    }

    #[test]
    fn test_more_folds_than_samples() {
        let splits = stratified_k_fold(&[1.0, 2.0], 4, &mut Pcg64::seed_from_u64(0));
        assert_eq!(splits.len(), 2);
    }
}
