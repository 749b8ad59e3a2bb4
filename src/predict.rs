//! Predictor (component P): map new points into simplex space via `V` and
//! pick the nearest simplex vertex.

use ndarray::Array2;

use crate::data::Dataset;
use crate::linalg::{self, nrm2};
use crate::simplex;

/// Predict 1-based class labels for `data` using the trained weight
/// matrix `v` and simplex size `k`.
pub fn predict_labels(data: &Dataset, v: &Array2<f64>, k: usize) -> Vec<usize> {
    let u = simplex::simplex(k);
    let zv = linalg::zv(&data.z.0.view(), v);

    (0..data.n)
        .map(|i| {
            let row = zv.row(i);
            let mut best_label = 1usize;
            let mut best_dist = f64::INFINITY;
            for j in 0..k {
                let diff = &row - &u.row(j);
                let dist = nrm2(diff.view());
                if dist < best_dist {
                    best_dist = dist;
                    best_label = j + 1;
                }
            }
            best_label
        })
        .collect()
}

/// Percentage of `predicted` that match `data.y`. Callers should skip this
/// call entirely when `data.y` is absent (unlabeled test data).
pub fn prediction_perf(y_true: &[usize], predicted: &[usize]) -> f64 {
    let correct = y_true
        .iter()
        .zip(predicted.iter())
        .filter(|(a, b)| a == b)
        .count();
    100.0 * correct as f64 / y_true.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Dataset, RawFeatures, WorkingFeatures};
    use crate::kernel::KernelKind;
    use ndarray::arr2;
    use std::f64::consts::PI;

    #[test]
    fn prediction_perf_matches_expected_percentages() {
        let y_true = vec![1usize, 1, 1, 1, 2, 2, 2, 3];
        assert_eq!(prediction_perf(&y_true, &vec![1; 8]), 50.0);
        assert_eq!(prediction_perf(&y_true, &vec![2; 8]), 37.5);
        assert_eq!(prediction_perf(&y_true, &vec![3; 8]), 12.5);
    }

    #[test]
    fn labeled_round_trip_is_perfect() {
        let y = vec![1usize, 2, 3, 1, 2, 3];
        assert_eq!(prediction_perf(&y, &y), 100.0);
    }

    /// Twelve points arranged uniformly on the unit circle in a 2-D
    /// simplex embedding, with `Z` and `V` constructed so `ZV` reproduces
    /// those points exactly and `U` is the regular 3-simplex.
    #[test]
    fn tiny_three_class_predicts_expected_labels() {
        let k = 3usize;
        let n = 12usize;
        let mut z = Array2::zeros((n, 3)); // bias + 2 coordinates
        for i in 0..n {
            let theta = PI / 12.0 + (i as f64) * PI / 6.0;
            z[[i, 0]] = 1.0;
            z[[i, 1]] = theta.cos();
            z[[i, 2]] = theta.sin();
        }
        // V maps [bias, x, y] -> [x, y] directly (identity on coordinates).
        let v = arr2(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);

        let data = Dataset {
            n,
            m: 2,
            k,
            raw: RawFeatures(z.clone()),
            z: WorkingFeatures(z),
            y: None,
            kernel: KernelKind::Linear,
        };

        let predicted = predict_labels(&data, &v, k);
        assert_eq!(predicted, vec![2, 3, 3, 3, 3, 1, 1, 1, 1, 2, 2, 2]);
    }
}
