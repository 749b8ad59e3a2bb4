//! The fitted model `M` (§3): scalar hyperparameters, the optimization
//! variable `V`, and the working buffers derived from a dataset's `n, m, K`.

use ndarray::{Array1, Array2, Array3};

use crate::data::Dataset;
use crate::kernel::KernelKind;
use crate::rng::GenSvmRng;
use crate::simplex;

/// How instance weights `rho` are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightScheme {
    /// `rho[i] = 1` for all `i`.
    Unit,
    /// `rho[i] = n / (K * |class(y[i])|)`, rebalancing small classes up.
    GroupRebalanced,
}

/// Hyperparameters of a single GenSVM configuration, copyable between
/// tasks/folds the way `gensvm_copy_model` copies them in the reference.
#[derive(Debug, Clone, Copy)]
pub struct Hyperparams {
    pub p: f64,
    pub lambda: f64,
    pub kappa: f64,
    pub epsilon: f64,
    pub weights: WeightScheme,
}

impl Default for Hyperparams {
    fn default() -> Self {
        Hyperparams {
            p: 1.0,
            lambda: 1e-8,
            kappa: 0.0,
            epsilon: 1e-6,
            weights: WeightScheme::Unit,
        }
    }
}

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Converged,
    IterationCapped,
}

/// The solver's state machine: `Seeded -> Iterating -> {Converged,
/// IterationCapped}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Seeded,
    Iterating,
    Converged,
    IterationCapped,
}

pub const MAX_ITER: usize = 1_000_000;

/// A GenSVM model: hyperparameters plus the `(m+1) x (K-1)` weight matrix
/// `V` and the working buffers sized from the dataset it was seeded
/// against.
pub struct Model {
    pub params: Hyperparams,
    pub kernel: KernelKind,

    pub n: usize,
    pub m: usize,
    pub k: usize,

    pub v: Array2<f64>,
    pub v_bar: Array2<f64>,

    pub u: Array2<f64>,
    pub uu: Array3<f64>,
    pub r: Array2<f64>,
    pub q: Array2<f64>,
    pub h: Array2<f64>,
    pub rho: Array1<f64>,

    pub training_error: f64,
    pub state: SolverState,
    pub exit_reason: Option<ExitReason>,
}

impl Model {
    /// Allocate a model sized against `data`, seed `V` to zero, and
    /// precompute the simplex geometry (`U`, `UU`, `R`) per the design's
    /// "these three must run before the first loss evaluation" rule.
    pub fn allocate(data: &Dataset, params: Hyperparams, kernel: KernelKind) -> Self {
        let n = data.n;
        let m = data.m;
        let k = data.k;
        let y = data.y_or_err().expect("labeled dataset required to allocate a model");

        let u = simplex::simplex(k);
        let uu = simplex::simplex_diff(&u, y);
        let r = simplex::category_matrix(n, k, y);
        let rho = compute_weights(params.weights, n, k, y);

        Model {
            params,
            kernel,
            n,
            m,
            k,
            v: Array2::zeros((m + 1, k - 1)),
            v_bar: Array2::zeros((m + 1, k - 1)),
            u,
            uu,
            r,
            q: Array2::zeros((n, k)),
            h: Array2::zeros((n, k)),
            rho,
            training_error: f64::INFINITY,
            state: SolverState::Seeded,
            exit_reason: None,
        }
    }

    /// Seed `V` from another model's solution, used for warm-starting.
    /// When shapes differ (e.g. a kernelized fold changes `m`), falls back
    /// to zero-seeding rather than panicking.
    pub fn seed_from(&mut self, other: &Array2<f64>) {
        if other.shape() == self.v.shape() {
            self.v.assign(other);
        }
    }

    /// Randomize `V` in `[-1, 1]`, used for the grid-search queue's initial
    /// seed model.
    pub fn randomize_v(&mut self, rng: &mut GenSvmRng) {
        for elem in self.v.iter_mut() {
            let u = rng.below(1_000_001) as f64 / 1_000_000.0;
            *elem = 2.0 * u - 1.0;
        }
    }

    /// Split `V` into the bias term `t` (row 0) and the weight block `W`
    /// (remaining rows), per the terminal-state exposure in the design.
    pub fn t_and_w(&self) -> (Array1<f64>, Array2<f64>) {
        let t = self.v.row(0).to_owned();
        let w = self.v.slice(ndarray::s![1.., ..]).to_owned();
        (t, w)
    }
}

/// `rho[i] = 1` (unit) or `n / (K * |class(y[i])|)` (group-rebalanced); in
/// both cases `sum(rho) == n`.
fn compute_weights(scheme: WeightScheme, n: usize, k: usize, y: &[usize]) -> Array1<f64> {
    match scheme {
        WeightScheme::Unit => Array1::ones(n),
        WeightScheme::GroupRebalanced => {
            let mut counts = vec![0usize; k];
            for &label in y {
                counts[label - 1] += 1;
            }
            let mut rho = Array1::zeros(n);
            for i in 0..n {
                let class_size = counts[y[i] - 1] as f64;
                rho[i] = (n as f64) / (k as f64 * class_size);
            }
            rho
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_weights_sum_to_n() {
        let y = vec![1usize, 2, 3, 1, 2];
        let rho = compute_weights(WeightScheme::Unit, 5, 3, &y);
        assert_eq!(rho.sum(), 5.0);
    }

    #[test]
    fn group_weights_sum_to_n() {
        let y = vec![1usize, 1, 1, 2, 3];
        let rho = compute_weights(WeightScheme::GroupRebalanced, 5, 3, &y);
        assert!((rho.sum() - 5.0).abs() < 1e-9);
    }
}
