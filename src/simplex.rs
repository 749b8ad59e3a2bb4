//! Simplex geometry (component S): the `K`-vertex regular simplex in
//! `(K-1)`-space, and the per-instance precomputables `UU` and `R` built
//! from it.

use ndarray::{Array2, Array3};

/// Build the `K x (K-1)` matrix whose rows are the vertices of a regular
/// `(K-1)`-simplex with unit edge length.
///
/// Row `i`, column `j` (`0 <= j < K-1`) is
/// * `-1/sqrt(2(j+1)(j+2))` if `i <= j`,
/// * `sqrt((j+1)/(2(j+2)))` if `i == j+1`,
/// * `0` otherwise.
pub fn simplex(k: usize) -> Array2<f64> {
    let kminus1 = k - 1;
    let mut u = Array2::zeros((k, kminus1));
    for j in 0..kminus1 {
        let jf = (j + 1) as f64;
        let off_diag = -1.0 / (2.0 * jf * (jf + 1.0)).sqrt();
        let on_diag = (jf / (2.0 * (jf + 1.0))).sqrt();
        for i in 0..k {
            u[[i, j]] = if i <= j {
                off_diag
            } else if i == j + 1 {
                on_diag
            } else {
                0.0
            };
        }
    }
    u
}

/// Per-instance vertex-difference tensor: `UU[i][j][k] = U[y[i]-1][j] - U[k][j]`.
///
/// `y` is 1-based, as loaded by `Dataset`.
pub fn simplex_diff(u: &Array2<f64>, y: &[usize]) -> Array3<f64> {
    let n = y.len();
    let k = u.nrows();
    let kminus1 = u.ncols();
    let mut uu = Array3::zeros((n, kminus1, k));
    for i in 0..n {
        let own_vertex = y[i] - 1;
        for j in 0..kminus1 {
            let u_own = u[[own_vertex, j]];
            for kk in 0..k {
                uu[[i, j, kk]] = u_own - u[[kk, j]];
            }
        }
    }
    uu
}

/// Category indicator: `R[i][j] = 1` unless `j+1 == y[i]`, in which case it
/// is `0` — exactly one zero per row, at the instance's own class.
pub fn category_matrix(n: usize, k: usize, y: &[usize]) -> Array2<f64> {
    let mut r = Array2::from_elem((n, k), 1.0);
    for i in 0..n {
        r[[i, y[i] - 1]] = 0.0;
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::nrm2;

    #[test]
    fn rows_are_unit_distance_apart_k3() {
        let u = simplex(3);
        for i in 0..3 {
            for j in (i + 1)..3 {
                let diff = &u.row(i) - &u.row(j);
                assert!((nrm2(diff.view()) - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn rows_are_unit_distance_apart_k4() {
        let u = simplex(4);
        for i in 0..4 {
            for j in (i + 1)..4 {
                let diff = &u.row(i) - &u.row(j);
                assert!((nrm2(diff.view()) - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn category_matrix_has_one_zero_per_row() {
        let y = vec![1usize, 2, 3, 1];
        let r = category_matrix(4, 3, &y);
        for i in 0..4 {
            let row = r.row(i);
            let zeros: usize = row.iter().filter(|v| **v == 0.0).count();
            assert_eq!(zeros, 1);
            assert_eq!(row[y[i] - 1], 0.0);
            let sum: f64 = row.sum();
            assert_eq!(sum, 2.0); // K - 1
        }
    }
}
