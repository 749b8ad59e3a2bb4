//! Dense linear algebra used by the majorization solver and kernel engine.
//!
//! Thin wrappers around `ndarray`/`ndarray-linalg` so the rest of the crate
//! reads in terms of the operations the design calls out (GEMM, SYMM, the
//! rank-1 SYR accumulation, and the Cholesky-solve-with-indefinite-fallback)
//! rather than raw BLAS/LAPACK calls.

use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, Axis};
use ndarray_linalg::{Cholesky, SolveC, SolveH, UPLO};

use crate::error::{GenSvmError, Result};

/// `out += a * x * x^T` accumulated into the upper triangle of a symmetric
/// matrix, mirroring `cblas_dsyr` in the reference implementation.
pub fn syr_accumulate(out: &mut Array2<f64>, a: f64, x: ArrayView1<f64>) {
    let p = x.len();
    for i in 0..p {
        let xi = x[i];
        if xi == 0.0 {
            continue;
        }
        for j in i..p {
            out[[i, j]] += a * xi * x[j];
        }
    }
}

/// Mirror the upper triangle of `m` onto its lower triangle.
pub fn symmetrize_from_upper(m: &mut Array2<f64>) {
    let p = m.nrows();
    for i in 0..p {
        for j in (i + 1)..p {
            m[[j, i]] = m[[i, j]];
        }
    }
}

/// Solve the symmetric positive semi-definite system `a x = b` via Cholesky,
/// falling back to a symmetric-indefinite (Bunch-Kaufman) solve if the
/// majorant matrix fails to factor as SPD. The fallback is logged but is
/// not fatal: the step is taken with whatever the indefinite solve returns.
pub fn solve_spd_with_fallback(a: &Array2<f64>, b: &Array2<f64>) -> Result<Array2<f64>> {
    let mut cols = Vec::with_capacity(b.ncols());
    let mut used_fallback = false;
    for col in b.axis_iter(Axis(1)) {
        let col = col.to_owned();
        match a.solvec(&col) {
            Ok(x) => cols.push(x),
            Err(e) => {
                if !used_fallback {
                    log::warn!(
                        "Cholesky solve of the majorant system failed ({}); \
                         falling back to a symmetric-indefinite solve",
                        e
                    );
                    used_fallback = true;
                }
                match a.solveh(&col) {
                    Ok(x) => cols.push(x),
                    Err(e2) => {
                        log::warn!(
                            "symmetric-indefinite solve also failed ({}); \
                             keeping the previous majorant solution for this coordinate",
                            e2
                        );
                        cols.push(col);
                    }
                }
            }
        }
    }
    Ok(stack_columns(&cols))
}

fn stack_columns(cols: &[Array1<f64>]) -> Array2<f64> {
    let n = cols[0].len();
    let k = cols.len();
    let mut out = Array2::zeros((n, k));
    for (j, col) in cols.iter().enumerate() {
        for i in 0..n {
            out[[i, j]] = col[i];
        }
    }
    out
}

/// `K(x,x') = langle x, x' angle` style dense Gram matrix builder, used
/// both by the kernel engine (§4.2) and the majorant's `Z^T A Z` assembly.
pub fn cholesky_lower(a: &Array2<f64>) -> Result<Array2<f64>> {
    a.cholesky(UPLO::Lower)
        .map_err(|e| GenSvmError::SolveFailed {
            message: format!("{}", e),
        })
}

/// Euclidean norm of a row vector, used by the predictor's nearest-vertex
/// search (`cblas_dnrm2` in the reference).
pub fn nrm2(x: ArrayView1<f64>) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Construct the `(K-1)`-axis projection `Z V` as a single dense GEMM.
pub fn zv(z: &ArrayView2<f64>, v: &Array2<f64>) -> Array2<f64> {
    z.dot(v)
}

/// Sum `UU[i][:][k]` weighted along the column axis, used by `Q = (ZV) ⊙ UU`.
pub fn weighted_tensor_sum(uu: &Array3<f64>, zv: &Array2<f64>) -> Array2<f64> {
    let n = uu.shape()[0];
    let kminus1 = uu.shape()[1];
    let k = uu.shape()[2];
    let mut q = Array2::zeros((n, k));
    for i in 0..n {
        for kk in 0..k {
            let mut acc = 0.0;
            for j in 0..kminus1 {
                acc += zv[[i, j]] * uu[[i, j, kk]];
            }
            q[[i, kk]] = acc;
        }
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn syr_matches_explicit_outer_product() {
        let x = Array1::from(vec![1.0, 2.0, 3.0]);
        let mut out = Array2::zeros((3, 3));
        syr_accumulate(&mut out, 2.0, x.view());
        assert_eq!(out[[0, 0]], 2.0);
        assert_eq!(out[[0, 2]], 12.0);
        assert_eq!(out[[2, 2]], 18.0);
        assert_eq!(out[[1, 0]], 0.0); // lower triangle untouched until symmetrize
    }

    #[test]
    fn symmetrize_mirrors_upper() {
        let mut m = arr2(&[[1.0, 2.0], [0.0, 3.0]]);
        symmetrize_from_upper(&mut m);
        assert_eq!(m[[1, 0]], 2.0);
    }

    #[test]
    fn solve_spd_recovers_identity_solution() {
        let a = arr2(&[[2.0, 0.0], [0.0, 2.0]]);
        let b = arr2(&[[2.0], [4.0]]);
        let x = solve_spd_with_fallback(&a, &b).unwrap();
        assert!((x[[0, 0]] - 1.0).abs() < 1e-10);
        assert!((x[[1, 0]] - 2.0).abs() < 1e-10);
    }
}
