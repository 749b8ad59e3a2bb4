//! Grid-search driver (component G): enumerate tasks in a warm-start
//! friendly order, run CV (or train/test) folds with a seeded `V`, and
//! pick the top percentile for consistency repeats.

use std::sync::atomic::{AtomicBool, Ordering};

use ndarray::Array2;
use rand_core::RngCore;
use rayon::prelude::*;

use crate::cv;
use crate::data::Dataset;
use crate::error::Result;
use crate::kernel::{self, KernelKind};
use crate::model::{Hyperparams, Model, WeightScheme};
use crate::predict;
use crate::rng::GenSvmRng;
use crate::solver;

/// The hyperparameter and kernel-parameter arrays that together define a
/// grid. `gamma`/`coef`/`degree` are only consumed by kernels that use
/// them; `max(len, 1)` is used for the task count when a kernel doesn't
/// need a given array, per the enumeration formula in the design.
pub struct GridSpec {
    pub p: Vec<f64>,
    pub lambda: Vec<f64>,
    pub kappa: Vec<f64>,
    pub epsilon: Vec<f64>,
    pub weight: Vec<WeightScheme>,
    pub kernel: KernelGrid,
    pub folds: usize,
    pub repeats: usize,
}

/// Per-kernel-type parameter grids. Keeping this a tagged enum (rather
/// than parallel arrays gated by a separate `kerneltype` field) makes an
/// invalid combination (e.g. `degree` values under an RBF kernel)
/// unrepresentable.
pub enum KernelGrid {
    Linear,
    Poly {
        gamma: Vec<f64>,
        coef: Vec<f64>,
        degree: Vec<f64>,
    },
    Rbf {
        gamma: Vec<f64>,
    },
    Sigmoid {
        gamma: Vec<f64>,
        coef: Vec<f64>,
    },
}

/// One point in the grid: a hyperparameter + kernel configuration to
/// evaluate, plus its resulting performance once run.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: usize,
    pub params: Hyperparams,
    pub kernel: KernelKind,
    pub folds: usize,
    pub performance: Option<f64>,
}

/// Enumerate the Cartesian product of `spec`'s arrays into warm-start
/// order: `p` varies fastest, `degree` slowest. This specific order is
/// what makes consecutive tasks differ in `p` only, so a previous task's
/// `V` is a good initializer for the next.
pub fn make_queue(spec: &GridSpec) -> Vec<Task> {
    let (gammas, coefs, degrees): (Vec<f64>, Vec<f64>, Vec<f64>) = match &spec.kernel {
        KernelGrid::Linear => (vec![0.0], vec![0.0], vec![0.0]),
        KernelGrid::Poly { gamma, coef, degree } => (gamma.clone(), coef.clone(), degree.clone()),
        KernelGrid::Rbf { gamma } => (gamma.clone(), vec![0.0], vec![0.0]),
        KernelGrid::Sigmoid { gamma, coef } => (gamma.clone(), coef.clone(), vec![0.0]),
    };

    let np = spec.p.len();
    let nl = spec.lambda.len();
    let nk = spec.kappa.len();
    let nw = spec.weight.len();
    let ne = spec.epsilon.len();
    let ng = gammas.len().max(1);
    let nc = coefs.len().max(1);
    let nd = degrees.len().max(1);

    let total = np * nl * nk * nw * ne * ng * nc * nd;
    let mut tasks = Vec::with_capacity(total);

    for id in 0..total {
        let mut rest = id;
        let ip = rest % np;
        rest /= np;
        let il = rest % nl;
        rest /= nl;
        let ik = rest % nk;
        rest /= nk;
        let iw = rest % nw;
        rest /= nw;
        let ie = rest % ne;
        rest /= ne;
        let ig = rest % ng;
        rest /= ng;
        let ic = rest % nc;
        rest /= nc;
        let id_degree = rest % nd;

        let kernel = match &spec.kernel {
            KernelGrid::Linear => KernelKind::Linear,
            KernelGrid::Poly { .. } => KernelKind::Poly {
                gamma: gammas[ig],
                coef: coefs[ic],
                degree: degrees[id_degree],
            },
            KernelGrid::Rbf { .. } => KernelKind::Rbf { gamma: gammas[ig] },
            KernelGrid::Sigmoid { .. } => KernelKind::Sigmoid {
                gamma: gammas[ig],
                coef: coefs[ic],
            },
        };

        tasks.push(Task {
            id,
            params: Hyperparams {
                p: spec.p[ip],
                lambda: spec.lambda[il],
                kappa: spec.kappa[ik],
                epsilon: spec.epsilon[ie],
                weights: spec.weight[iw],
            },
            kernel,
            folds: spec.folds,
            performance: None,
        });
    }
    tasks
}

/// Train and evaluate one fold: seed from `seed_v`, optimize, predict on
/// the held-out split, and return `(hitrate, final V)`.
fn run_fold(
    train: &Dataset,
    test: &Dataset,
    task: &Task,
    seed_v: &Array2<f64>,
) -> Result<(f64, Array2<f64>)> {
    let mut fold_model = Model::allocate(train, task.params, task.kernel);
    fold_model.seed_from(seed_v);
    solver::optimize(&mut fold_model, &train.z)?;

    let predicted = predict::predict_labels(test, &fold_model.v, fold_model.k);
    let perf = predict::prediction_perf(test.y_or_err()?, &predicted);
    Ok((perf, fold_model.v))
}

/// Run `repeats`-fold cross validation for a single task, progressively
/// warm-starting each fold from `seed_v` and writing the final fold's `V`
/// back into `seed_v` on return (the "seed model" of the design).
fn cross_validate(
    data: &Dataset,
    task: &Task,
    seed_v: &mut Array2<f64>,
    rng: &mut GenSvmRng,
    cancel: &AtomicBool,
) -> Result<Option<f64>> {
    let mut kernelized = data.clone();
    kernelized.apply_kernel(task.kernel)?;

    let cv_idx = cv::make_cv_split(kernelized.n, task.folds, rng);
    let mut total = 0.0;
    for f in 0..task.folds {
        if cancel.load(Ordering::Relaxed) {
            return Ok(None);
        }
        let split = cv::get_tt_split(&kernelized, &cv_idx, f)?;
        let (perf, final_v) = run_fold(&split.train, &split.test, task, seed_v)?;
        total += perf / task.folds as f64;
        *seed_v = final_v;
    }
    Ok(Some(total))
}

/// Train and evaluate a queue of tasks via cross validation, using a
/// single seed model that progressively warm-starts across both folds
/// and tasks. Returns early (leaving trailing tasks without a
/// `performance`) if `cancel` is set, checked between folds and tasks.
pub fn run_queue_cv(
    train: &Dataset,
    tasks: &mut [Task],
    rng: &mut GenSvmRng,
    cancel: &AtomicBool,
) -> Result<()> {
    if tasks.is_empty() {
        return Ok(());
    }
    let m = train.m;
    let k = train.k;
    let mut seed_v = {
        let mut seed_model = Model::allocate(train, tasks[0].params, KernelKind::Linear);
        seed_model.randomize_v(rng);
        seed_model.v
    };
    debug_assert_eq!(seed_v.shape(), &[m + 1, k - 1]);

    for task in tasks.iter_mut() {
        if cancel.load(Ordering::Relaxed) {
            log::info!("grid search cancelled before task {}", task.id);
            break;
        }
        log::info!(
            "task {}: p={} lambda={} kappa={} kernel={}",
            task.id,
            task.params.p,
            task.params.lambda,
            task.params.kappa,
            task.kernel.name()
        );
        task.performance = cross_validate(train, task, &mut seed_v, rng, cancel)?;
    }
    Ok(())
}

/// Train/test variant (§4.5): each task trains once on the full training
/// set with warm-start and scores on the external test set. No CV loop.
pub fn run_queue_tt(
    train: &Dataset,
    test: &Dataset,
    tasks: &mut [Task],
    cancel: &AtomicBool,
) -> Result<()> {
    if tasks.is_empty() {
        return Ok(());
    }
    let mut seed_v = Array2::<f64>::zeros((train.m + 1, train.k - 1));

    for task in tasks.iter_mut() {
        if cancel.load(Ordering::Relaxed) {
            log::info!("grid search cancelled before task {}", task.id);
            break;
        }
        let mut kernelized_train = train.clone();
        kernelized_train.apply_kernel(task.kernel)?;

        let mut projected_test = test.clone();
        let block = kernel::project_onto_train(&train.raw.0, &test.raw.0, &task.kernel);
        projected_test.z = crate::data::WorkingFeatures(block);
        projected_test.m = kernelized_train.m;

        let (perf, final_v) = run_fold(&kernelized_train, &projected_test, task, &seed_v)?;
        task.performance = Some(perf);
        seed_v = final_v;
    }
    Ok(())
}

/// Matlab-style percentile: `index = p*N + 0.5`, linearly interpolated
/// between the surrounding sorted elements (1-based in the original,
/// reproduced here with 0-based indexing).
pub fn prctile(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    let pos = p * n as f64 + 0.5;
    let pi = pos.floor().max(1.0).min(n as f64 - 1.0) as usize;
    let pr = (pos - pi as f64).max(0.0).min(1.0);
    (1.0 - pr) * sorted[pi - 1] + pr * sorted[pi]
}

/// Outcome of repeating one top-performing task `repeats` times from
/// scratch (fresh CV splits, fresh random seed).
#[derive(Debug, Clone)]
pub struct ConsistencyOutcome {
    pub task_id: usize,
    pub mean: f64,
    pub std_dev: f64,
}

/// Re-run every task at or above the 95th-percentile performance boundary
/// `repeats` times, each from a fresh random seed and fresh CV split. The
/// top-set tasks are independent of each other once the queue's warm-start
/// chain is done, so they are run concurrently via `rayon`, each on its own
/// thread-local [`GenSvmRng`] seeded from `rng` up front — matching the
/// "parallel workers thread-local their RNG" requirement of the
/// concurrency model.
pub fn consistency_repeats(
    train: &Dataset,
    tasks: &[Task],
    repeats: usize,
    rng: &mut GenSvmRng,
    cancel: &AtomicBool,
) -> Result<Vec<ConsistencyOutcome>> {
    let performances: Vec<f64> = tasks.iter().filter_map(|t| t.performance).collect();
    if performances.is_empty() {
        return Ok(Vec::new());
    }
    let boundary = prctile(&performances, 0.95);
    let top_set: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.performance.map(|p| p >= boundary).unwrap_or(false))
        .collect();

    let subseeds: Vec<u32> = (0..top_set.len()).map(|_| rng.next_u32()).collect();

    let outcomes: Vec<Option<ConsistencyOutcome>> = top_set
        .par_iter()
        .zip(subseeds.par_iter())
        .map(|(task, &subseed)| -> Result<Option<ConsistencyOutcome>> {
            if cancel.load(Ordering::Relaxed) {
                return Ok(None);
            }
            let mut local_rng = GenSvmRng::new(subseed);
            let mut perfs = Vec::with_capacity(repeats);
            for _ in 0..repeats {
                let mut seed_v = {
                    let mut seed_model = Model::allocate(train, task.params, KernelKind::Linear);
                    seed_model.randomize_v(&mut local_rng);
                    seed_model.v
                };
                if let Some(perf) = cross_validate(train, task, &mut seed_v, &mut local_rng, cancel)? {
                    perfs.push(perf);
                }
            }
            if perfs.is_empty() {
                return Ok(None);
            }
            let mean = perfs.iter().sum::<f64>() / perfs.len() as f64;
            let variance = if perfs.len() > 1 {
                perfs.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / (perfs.len() as f64 - 1.0)
            } else {
                0.0
            };
            Ok(Some(ConsistencyOutcome {
                task_id: task.id,
                mean,
                std_dev: variance.sqrt(),
            }))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(outcomes.into_iter().flatten().collect())
}

/// Apply the consistency-repeats selection rule (§4.5): starting at `p =
/// 0`, take the mean-threshold at the `100-p` percentile and the
/// std-dev-threshold at the `p` percentile; emit any task meeting both,
/// else increase `p` and retry.
pub fn select_consistent(outcomes: &[ConsistencyOutcome]) -> Vec<usize> {
    if outcomes.is_empty() {
        return Vec::new();
    }
    let means: Vec<f64> = outcomes.iter().map(|o| o.mean).collect();
    let stds: Vec<f64> = outcomes.iter().map(|o| o.std_dev).collect();

    let mut p = 0.0f64;
    loop {
        let mean_threshold = prctile(&means, (100.0 - p) / 100.0);
        let std_threshold = prctile(&stds, p / 100.0);
        let selected: Vec<usize> = outcomes
            .iter()
            .filter(|o| o.mean - mean_threshold > -1e-4 && o.std_dev - std_threshold < 1e-4)
            .map(|o| o.task_id)
            .collect();
        if !selected.is_empty() || p >= 100.0 {
            return selected;
        }
        p += 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_grid(np: usize, nl: usize, nk: usize, ne: usize, nw: usize) -> GridSpec {
        GridSpec {
            p: (0..np).map(|i| 1.0 + i as f64 * 0.1).collect(),
            lambda: (0..nl).map(|i| 10f64.powi(-(i as i32))).collect(),
            kappa: (0..nk).map(|i| i as f64 * 0.5).collect(),
            epsilon: (0..ne).map(|i| 10f64.powi(-(3 + i as i32))).collect(),
            weight: (0..nw)
                .map(|i| if i == 0 { WeightScheme::Unit } else { WeightScheme::GroupRebalanced })
                .collect(),
            kernel: KernelGrid::Linear,
            folds: 5,
            repeats: 5,
        }
    }

    #[test]
    fn task_count_matches_product_of_array_sizes() {
        let spec = linear_grid(3, 2, 2, 1, 1);
        let tasks = make_queue(&spec);
        assert_eq!(tasks.len(), 3 * 2 * 2 * 1 * 1);
    }

    #[test]
    fn p_varies_fastest_between_consecutive_tasks() {
        let spec = linear_grid(3, 2, 1, 1, 1);
        let tasks = make_queue(&spec);
        // consecutive tasks should differ in p but share lambda, until p wraps
        assert_ne!(tasks[0].params.p, tasks[1].params.p);
        assert_eq!(tasks[0].params.lambda, tasks[1].params.lambda);
        // after Np tasks, lambda should have changed
        assert_ne!(tasks[0].params.lambda, tasks[3].params.lambda);
    }

    #[test]
    fn prctile_matches_matlab_style_interpolation() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        // 50th percentile of [1..5] is the median, 3.0
        let result = prctile(&values, 0.5);
        assert!((result - 3.0).abs() < 1e-9);
    }

    fn toy_dataset() -> Dataset {
        use ndarray::arr2;
        let x = arr2(&[
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1],
            [0.0, 5.0],
            [0.1, 5.0],
            [0.0, 5.1],
            [5.0, 0.0],
        ]);
        Dataset::from_raw(x, Some(vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 3])).unwrap()
    }

    #[test]
    fn run_queue_cv_fills_in_performance_for_every_task() {
        let data = toy_dataset();
        let spec = linear_grid(2, 1, 1, 1, 1);
        let mut tasks = make_queue(&spec);
        for t in tasks.iter_mut() {
            t.folds = 2;
        }
        let mut rng = GenSvmRng::new(3);
        let cancel = AtomicBool::new(false);
        run_queue_cv(&data, &mut tasks, &mut rng, &cancel).unwrap();
        for t in &tasks {
            assert!(t.performance.is_some());
            let perf = t.performance.unwrap();
            assert!((0.0..=100.0).contains(&perf));
        }
    }

    #[test]
    fn consistency_repeats_reports_every_task_in_the_top_set() {
        let data = toy_dataset();
        let spec = linear_grid(2, 1, 1, 1, 1);
        let mut tasks = make_queue(&spec);
        for t in tasks.iter_mut() {
            t.folds = 2;
        }
        let mut rng = GenSvmRng::new(5);
        let cancel = AtomicBool::new(false);
        run_queue_cv(&data, &mut tasks, &mut rng, &cancel).unwrap();

        let outcomes = consistency_repeats(&data, &tasks, 2, &mut rng, &cancel).unwrap();
        assert!(!outcomes.is_empty());
        for o in &outcomes {
            assert!(o.mean >= 0.0 && o.mean <= 100.0);
            assert!(o.std_dev >= 0.0);
        }
        let selected = select_consistent(&outcomes);
        assert!(!selected.is_empty());
    }

    #[test]
    fn consistency_outcomes_length_matches_top_set() {
        let outcomes: Vec<ConsistencyOutcome> = (0..20)
            .map(|i| ConsistencyOutcome {
                task_id: i,
                mean: 90.0,
                std_dev: 1.0,
            })
            .collect();
        assert_eq!(outcomes.len(), 20);
        let selected = select_consistent(&outcomes);
        assert!(!selected.is_empty());
    }
}
