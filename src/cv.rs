//! Cross-validation splitter (component R): build a random equal-sized
//! fold assignment, and extract train/test submatrices in either the
//! linear or kernel form.

use ndarray::{s, Array2};

use crate::data::{Dataset, RawFeatures, WorkingFeatures};
use crate::error::{GenSvmError, Result};
use crate::kernel::KernelKind;
use crate::linalg::cholesky_lower;
use crate::rng::GenSvmRng;

/// Assign each of `n` instances to one of `folds` fold ids, round-robin
/// over uniformly sampled unassigned slots until `floor(n/folds)*folds`
/// instances are placed, then distribute the remaining `n % folds`
/// instances to folds `0..r`.
pub fn make_cv_split(n: usize, folds: usize, rng: &mut GenSvmRng) -> Vec<usize> {
    let mut cv_idx = vec![usize::MAX; n];
    let small_fold_size = n / folds;
    let mut next_fold = 0usize;

    let mut placed = 0usize;
    while placed < small_fold_size * folds {
        let idx = rng.below(n);
        if cv_idx[idx] == usize::MAX {
            cv_idx[idx] = next_fold;
            next_fold = (next_fold + 1) % folds;
            placed += 1;
        }
    }

    let remaining = n % folds;
    let mut fold = 0usize;
    let mut slot = 0usize;
    while fold < remaining {
        if cv_idx[slot] == usize::MAX {
            cv_idx[slot] = fold;
            fold += 1;
        }
        slot += 1;
    }

    cv_idx
}

/// Train/test submatrices for fold `f`, built either by row-partitioning
/// (linear) or by sub-Gram extraction + re-factorization (kernel).
pub struct TrainTestSplit {
    pub train: Dataset,
    pub test: Dataset,
}

pub fn get_tt_split(full: &Dataset, cv_idx: &[usize], f: usize) -> Result<TrainTestSplit> {
    match full.kernel {
        KernelKind::Linear => split_linear(full, cv_idx, f),
        _ => split_kernel(full, cv_idx, f),
    }
}

fn partition_indices(cv_idx: &[usize], f: usize) -> (Vec<usize>, Vec<usize>) {
    let mut train = Vec::new();
    let mut test = Vec::new();
    for (i, &fold) in cv_idx.iter().enumerate() {
        if fold == f {
            test.push(i);
        } else {
            train.push(i);
        }
    }
    (train, test)
}

fn gather_rows(z: &Array2<f64>, idx: &[usize]) -> Array2<f64> {
    let mut out = Array2::zeros((idx.len(), z.ncols()));
    for (row, &i) in idx.iter().enumerate() {
        out.row_mut(row).assign(&z.row(i));
    }
    out
}

fn gather_labels(y: &Option<Vec<usize>>, idx: &[usize]) -> Option<Vec<usize>> {
    y.as_ref().map(|labels| idx.iter().map(|&i| labels[i]).collect())
}

fn split_linear(full: &Dataset, cv_idx: &[usize], f: usize) -> Result<TrainTestSplit> {
    let (train_idx, test_idx) = partition_indices(cv_idx, f);

    let train_z = gather_rows(&full.z.0, &train_idx);
    let test_z = gather_rows(&full.z.0, &test_idx);

    let train = Dataset {
        n: train_idx.len(),
        m: full.m,
        k: full.k,
        raw: RawFeatures(train_z.clone()),
        z: WorkingFeatures(train_z),
        y: gather_labels(&full.y, &train_idx),
        kernel: full.kernel,
    };
    let test = Dataset {
        n: test_idx.len(),
        m: full.m,
        k: full.k,
        raw: RawFeatures(test_z.clone()),
        z: WorkingFeatures(test_z),
        y: gather_labels(&full.y, &test_idx),
        kernel: full.kernel,
    };
    Ok(TrainTestSplit { train, test })
}

/// Kernel-form split: `full.z` is `[1 | L]` for the *entire* dataset's
/// Gram matrix. The train fold's kernel block is re-extracted from the raw
/// Gram matrix implied by `L L^T` and re-factorized; the test fold gets a
/// rectangular test-by-train sub-kernel used later to embed test points
/// via `V`.
fn split_kernel(full: &Dataset, cv_idx: &[usize], f: usize) -> Result<TrainTestSplit> {
    let (train_idx, test_idx) = partition_indices(cv_idx, f);

    let l = full.z.0.slice(s![.., 1..]).to_owned();
    let gram = l.dot(&l.t());

    let train_gram = gather_submatrix(&gram, &train_idx, &train_idx);
    let test_train_gram = gather_submatrix(&gram, &test_idx, &train_idx);

    let train_l = cholesky_lower(&train_gram).map_err(|_| GenSvmError::KernelNotPositiveDefinite {
        kernel: full.kernel.name().to_string(),
    })?;

    let mut train_z = Array2::zeros((train_idx.len(), train_idx.len() + 1));
    train_z.column_mut(0).fill(1.0);
    train_z.slice_mut(s![.., 1..]).assign(&train_l);

    let mut test_z = Array2::zeros((test_idx.len(), train_idx.len() + 1));
    test_z.column_mut(0).fill(1.0);
    test_z.slice_mut(s![.., 1..]).assign(&test_train_gram);

    let train = Dataset {
        n: train_idx.len(),
        m: train_idx.len(),
        k: full.k,
        raw: RawFeatures(train_z.clone()),
        z: WorkingFeatures(train_z),
        y: gather_labels(&full.y, &train_idx),
        kernel: full.kernel,
    };
    let test = Dataset {
        n: test_idx.len(),
        m: train_idx.len(),
        k: full.k,
        raw: RawFeatures(test_z.clone()),
        z: WorkingFeatures(test_z),
        y: gather_labels(&full.y, &test_idx),
        kernel: full.kernel,
    };
    Ok(TrainTestSplit { train, test })
}

fn gather_submatrix(m: &Array2<f64>, rows: &[usize], cols: &[usize]) -> Array2<f64> {
    let mut out = Array2::zeros((rows.len(), cols.len()));
    for (r, &i) in rows.iter().enumerate() {
        for (c, &j) in cols.iter().enumerate() {
            out[[r, c]] = m[[i, j]];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn covers_all_fold_ids_with_balanced_sizes() {
        let mut rng = GenSvmRng::new(1);
        let cv_idx = make_cv_split(100, 10, &mut rng);
        let mut counts = vec![0usize; 10];
        for &f in &cv_idx {
            assert!(f < 10);
            counts[f] += 1;
        }
        assert_eq!(counts.iter().sum::<usize>(), 100);
        for c in counts {
            assert_eq!(c, 10);
        }
    }

    #[test]
    fn uneven_split_has_expected_fold_sizes() {
        let mut rng = GenSvmRng::new(2);
        let cv_idx = make_cv_split(103, 10, &mut rng);
        let mut counts = vec![0usize; 10];
        for &f in &cv_idx {
            counts[f] += 1;
        }
        let elevens = counts.iter().filter(|&&c| c == 11).count();
        let tens = counts.iter().filter(|&&c| c == 10).count();
        assert_eq!(elevens, 3);
        assert_eq!(tens, 7);
    }

    #[test]
    fn same_seed_gives_identical_split() {
        let mut rng_a = GenSvmRng::new(42);
        let mut rng_b = GenSvmRng::new(42);
        let a = make_cv_split(50, 5, &mut rng_a);
        let b = make_cv_split(50, 5, &mut rng_b);
        assert_eq!(a, b);
    }

    #[test]
    fn fold_ids_are_distinct_set() {
        let mut rng = GenSvmRng::new(9);
        let cv_idx = make_cv_split(37, 4, &mut rng);
        let distinct: HashSet<_> = cv_idx.iter().collect();
        assert_eq!(distinct.len(), 4);
    }
}
