//! The dataset data model (§3): `RawFeatures` kept immutable after load,
//! and `WorkingFeatures` (`Z`) rebuilt by the kernel engine, so the two
//! never alias the same buffer — the design note calls out the reference
//! implementation's aliasing of `Z` into `RAW` as something a clean model
//! should avoid.

use ndarray::Array2;

use crate::error::{GenSvmError, Result};
use crate::kernel::{self, KernelKind};

/// The raw, bias-augmented feature matrix as loaded from disk: `n x (m+1)`
/// with a constant first column. Never mutated after load.
#[derive(Debug, Clone)]
pub struct RawFeatures(pub Array2<f64>);

/// The feature matrix the solver actually trains on: either an alias of
/// the raw features (linear kernel) or `[1 | L]`, the Cholesky factor of
/// the kernel Gram matrix (kernelized case).
#[derive(Debug, Clone)]
pub struct WorkingFeatures(pub Array2<f64>);

/// A fixed, labeled (or unlabeled) multiclass dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub n: usize,
    pub m: usize,
    pub k: usize,
    pub raw: RawFeatures,
    pub z: WorkingFeatures,
    pub y: Option<Vec<usize>>,
    pub kernel: KernelKind,
}

impl Dataset {
    /// Build a dataset from raw predictors (without the bias column) and
    /// optional integer labels. Labels are relabeled so the minimum is 1;
    /// negative labels after shifting are rejected as `InputFormat`.
    pub fn from_raw(x: Array2<f64>, y: Option<Vec<i64>>) -> Result<Self> {
        let n = x.nrows();
        let m = x.ncols();
        let mut z = Array2::zeros((n, m + 1));
        z.column_mut(0).fill(1.0);
        z.slice_mut(ndarray::s![.., 1..]).assign(&x);

        let y = match y {
            None => None,
            Some(labels) => Some(Self::relabel(labels)?),
        };
        let k = y.as_ref().map(|v| *v.iter().max().unwrap_or(&1)).unwrap_or(1);

        Ok(Dataset {
            n,
            m,
            k,
            raw: RawFeatures(z.clone()),
            z: WorkingFeatures(z),
            y,
            kernel: KernelKind::Linear,
        })
    }

    fn relabel(labels: Vec<i64>) -> Result<Vec<usize>> {
        let min = *labels.iter().min().ok_or_else(|| GenSvmError::InputFormat {
            location: "labels".into(),
            message: "dataset has no rows".into(),
        })?;
        if min < 0 {
            return Err(GenSvmError::InputFormat {
                location: "labels".into(),
                message: format!("minimum label {} is negative", min),
            });
        }
        let shift = if min == 0 { 1 } else { 0 };
        Ok(labels.into_iter().map(|l| (l + shift) as usize).collect())
    }

    /// Apply the kernel engine (§4.2): a same-parameter re-invocation is a
    /// no-op; any parameter change rebuilds `z` and records the new
    /// `kerneltype`/`m`.
    pub fn apply_kernel(&mut self, kernel: KernelKind) -> Result<()> {
        if kernel::kernel_params_unchanged(&self.kernel, &kernel) {
            return Ok(());
        }
        let z = kernel::make_kernel(&self.raw.0, &kernel)?;
        if !matches!(kernel, KernelKind::Linear) {
            self.m = self.n;
        }
        self.z = WorkingFeatures(z);
        self.kernel = kernel;
        Ok(())
    }

    pub fn y_or_err(&self) -> Result<&[usize]> {
        self.y.as_deref().ok_or_else(|| GenSvmError::InputFormat {
            location: "dataset".into(),
            message: "labels required but dataset is unlabeled".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn zero_based_labels_are_shifted() {
        let x = arr2(&[[1.0], [2.0], [3.0]]);
        let d = Dataset::from_raw(x, Some(vec![0, 1, 0])).unwrap();
        assert_eq!(d.y.unwrap(), vec![1, 2, 1]);
    }

    #[test]
    fn negative_labels_are_rejected() {
        let x = arr2(&[[1.0], [2.0]]);
        let result = Dataset::from_raw(x, Some(vec![-1, 0]));
        assert!(result.is_err());
    }

    #[test]
    fn bias_column_is_constant_one() {
        let x = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let d = Dataset::from_raw(x, None).unwrap();
        for i in 0..2 {
            assert_eq!(d.z.0[[i, 0]], 1.0);
        }
    }
}
