//! Two-sided Jacobi singular value decomposition.
//!
//! Square inputs are diagonalized directly by sweeps of closed-form 2×2
//! rotations. Rectangular inputs are reduced first: a tall matrix is
//! QR-preconditioned so the Jacobi iteration runs on the small square `R`
//! factor, and a wide matrix is transposed with the roles of `U` and `V`
//! swapped on the way out.

use denmat_core::{ops, Matrix};
use log::{debug, warn};
use num_traits::Float;

use crate::qr::{qr_decompose, QrMode};
use crate::LinalgError;

/// Sweep cap; the iteration converges quadratically, so hitting this means
/// the input is pathological.
const MAX_SWEEPS: usize = 32;

/// A singular value decomposition `A = U·Σ·Vᵀ`.
///
/// `U` is `m × k` and `V` is `n × k` with orthonormal columns,
/// `k = min(m, n)`; the singular values are nonnegative and sorted in
/// descending order.
#[derive(Debug, Clone)]
pub struct Svd<T> {
    u: Matrix<T>,
    s: Vec<T>,
    v: Matrix<T>,
}

impl<T: Float + Default> Svd<T> {
    /// The left singular vectors.
    pub fn u(&self) -> &Matrix<T> {
        &self.u
    }

    /// The singular values, descending.
    pub fn s(&self) -> &[T] {
        &self.s
    }

    /// The right singular vectors.
    pub fn v(&self) -> &Matrix<T> {
        &self.v
    }

    /// Number of singular values above `tol`.
    pub fn rank(&self, tol: T) -> usize {
        self.s.iter().take_while(|&&sv| sv > tol).count()
    }

    /// Rebuilds `U·Σ·Vᵀ`.
    pub fn recompose(&self) -> Result<Matrix<T>, LinalgError> {
        // scale the columns of U by Σ, then multiply by Vᵀ
        let mut us = self.u.clone();
        for (j, &sv) in self.s.iter().enumerate() {
            for i in 0..us.rows() {
                us[(i, j)] = us[(i, j)] * sv;
            }
        }
        Ok(ops::matmul_views(&us.view(), &self.v.transpose())?)
    }
}

/// Computes the singular value decomposition of an arbitrary dense matrix.
pub fn sv_decompose<T: Float + Default>(a: &Matrix<T>) -> Result<Svd<T>, LinalgError> {
    let (m, n) = a.shape();
    if m < n {
        // decompose the transpose and swap the factor roles
        let t = sv_decompose(&ops::transposed(a))?;
        return Ok(Svd {
            u: t.v,
            s: t.s,
            v: t.u,
        });
    }
    if n == 0 {
        return Ok(Svd {
            u: Matrix::zeros(m, 0),
            s: Vec::new(),
            v: Matrix::zeros(0, 0),
        });
    }

    if m > n {
        // tall: run Jacobi on the n×n triangular factor
        let qr = qr_decompose(a)?;
        let q = qr.q(QrMode::Economy);
        let inner = jacobi_square(qr.r())?;
        let u = ops::matmul(&q, &inner.u)?;
        return Ok(Svd {
            u,
            s: inner.s,
            v: inner.v,
        });
    }

    jacobi_square(a.to_contiguous())
}

/// Two-sided Jacobi on a square matrix: accumulate left and right rotations
/// until every off-diagonal pair is negligible against the diagonal.
fn jacobi_square<T: Float + Default>(mut w: Matrix<T>) -> Result<Svd<T>, LinalgError> {
    let n = w.rows();
    let mut u = Matrix::<T>::identity(n);
    let mut v = Matrix::<T>::identity(n);
    let two = T::one() + T::one();

    let mut converged = false;
    for sweep in 0..MAX_SWEEPS {
        let mut maxdiag = T::zero();
        for i in 0..n {
            maxdiag = maxdiag.max(w[(i, i)].abs());
        }
        let threshold = two * T::epsilon() * maxdiag;

        let mut rotated = false;
        for p in 0..n.saturating_sub(1) {
            for q in p + 1..n {
                if w[(p, q)].abs().max(w[(q, p)].abs()) <= threshold {
                    continue;
                }
                rotated = true;
                let (theta_l, theta_r) = split_angles(w[(p, p)], w[(p, q)], w[(q, p)], w[(q, q)]);
                rotate_rows(&mut w, p, q, theta_l);
                rotate_cols(&mut w, p, q, theta_r);
                rotate_cols(&mut u, p, q, theta_l);
                rotate_cols(&mut v, p, q, theta_r);
            }
        }
        if !rotated {
            debug!("jacobi svd converged after {sweep} sweeps (n = {n})");
            converged = true;
            break;
        }
    }
    if !converged && n > 1 {
        warn!("jacobi svd did not converge within {MAX_SWEEPS} sweeps (n = {n})");
    }

    // collect the diagonal, folding signs into U
    let mut s: Vec<T> = (0..n).map(|i| w[(i, i)]).collect();
    for (i, sv) in s.iter_mut().enumerate() {
        if *sv < T::zero() {
            *sv = -*sv;
            for r in 0..n {
                u[(r, i)] = -u[(r, i)];
            }
        }
    }

    // sort descending with synchronized column permutation
    for i in 0..n {
        let mut best = i;
        for j in i + 1..n {
            if s[j] > s[best] {
                best = j;
            }
        }
        if best != i {
            s.swap(i, best);
            swap_cols(&mut u, i, best);
            swap_cols(&mut v, i, best);
        }
    }

    Ok(Svd { u, s, v })
}

/// Closed-form angles diagonalizing the 2×2 block `[[a, b], [c, d]]`:
/// `R(θl)ᵀ · W · R(θr)` is diagonal with `R(θ) = [[cos, -sin], [sin, cos]]`.
fn split_angles<T: Float>(a: T, b: T, c: T, d: T) -> (T, T) {
    let two = T::one() + T::one();
    let e = (a + d) / two;
    let f = (a - d) / two;
    let g = (c + b) / two;
    let h = (c - b) / two;
    let sum = g.atan2(f); // θl + θr
    let diff = h.atan2(e); // θl - θr
    ((sum + diff) / two, (sum - diff) / two)
}

/// Applies `R(θ)ᵀ` to rows `p` and `q`.
fn rotate_rows<T: Float + Default>(w: &mut Matrix<T>, p: usize, q: usize, theta: T) {
    let (cos, sin) = (theta.cos(), theta.sin());
    let (n, stride) = (w.cols(), w.row_stride());
    let s = w.as_strided_slice_mut();
    for j in 0..n {
        let wp = s[p * stride + j];
        let wq = s[q * stride + j];
        s[p * stride + j] = cos * wp + sin * wq;
        s[q * stride + j] = cos * wq - sin * wp;
    }
}

/// Applies `R(θ)` to columns `p` and `q`.
fn rotate_cols<T: Float + Default>(w: &mut Matrix<T>, p: usize, q: usize, theta: T) {
    let (cos, sin) = (theta.cos(), theta.sin());
    let (rows, stride) = (w.rows(), w.row_stride());
    let s = w.as_strided_slice_mut();
    for i in 0..rows {
        let wp = s[i * stride + p];
        let wq = s[i * stride + q];
        s[i * stride + p] = cos * wp + sin * wq;
        s[i * stride + q] = cos * wq - sin * wp;
    }
}

fn swap_cols<T: Float + Default>(m: &mut Matrix<T>, a: usize, b: usize) {
    let (rows, stride) = (m.rows(), m.row_stride());
    let s = m.as_strided_slice_mut();
    for i in 0..rows {
        s.swap(i * stride + a, i * stride + b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_matrix(rows: usize, cols: usize, seed: u64) -> Matrix<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..rows * cols)
            .map(|_| rng.random_range(-5.0..5.0))
            .collect();
        Matrix::from_vec(rows, cols, data).unwrap()
    }

    fn assert_close(a: &Matrix<f64>, b: &Matrix<f64>, tol: f64) {
        assert_eq!(a.shape(), b.shape());
        for r in 0..a.rows() {
            for c in 0..a.cols() {
                assert_relative_eq!(a[(r, c)], b[(r, c)], epsilon = tol, max_relative = tol);
            }
        }
    }

    fn verify_svd_properties(a: &Matrix<f64>) {
        let svd = sv_decompose(a).unwrap();
        let k = a.rows().min(a.cols());
        assert_eq!(svd.u().shape(), (a.rows(), k));
        assert_eq!(svd.v().shape(), (a.cols(), k));
        assert_eq!(svd.s().len(), k);

        // nonnegative, descending
        for pair in svd.s().windows(2) {
            assert!(pair[0] >= pair[1]);
        }
        for &sv in svd.s() {
            assert!(sv >= 0.0);
        }

        // orthonormal columns
        let utu = ops::matmul_views(&svd.u().transpose(), &svd.u().view()).unwrap();
        assert_close(&utu, &Matrix::identity(k), 1e-8);
        let vtv = ops::matmul_views(&svd.v().transpose(), &svd.v().view()).unwrap();
        assert_close(&vtv, &Matrix::identity(k), 1e-8);

        // reconstruction
        let back = svd.recompose().unwrap();
        assert_close(&back, a, 1e-6);
    }

    #[test]
    fn square_matrices() {
        verify_svd_properties(&random_matrix(2, 2, 21));
        verify_svd_properties(&random_matrix(5, 5, 22));
        verify_svd_properties(&random_matrix(12, 12, 23));
    }

    #[test]
    fn tall_matrices() {
        verify_svd_properties(&random_matrix(8, 3, 24));
        verify_svd_properties(&random_matrix(20, 7, 25));
    }

    #[test]
    fn wide_matrices() {
        verify_svd_properties(&random_matrix(3, 8, 26));
        verify_svd_properties(&random_matrix(7, 20, 27));
    }

    #[test]
    fn known_diagonal() {
        let a = Matrix::from_rows(&[[3.0, 0.0], [0.0, -2.0]]);
        let svd = sv_decompose(&a).unwrap();
        assert_relative_eq!(svd.s()[0], 3.0, max_relative = 1e-12);
        assert_relative_eq!(svd.s()[1], 2.0, max_relative = 1e-12);
    }

    #[test]
    fn known_rotation_is_orthogonal() {
        let (c, s) = (0.6, 0.8);
        let a = Matrix::from_rows(&[[c, -s], [s, c]]);
        let svd = sv_decompose(&a).unwrap();
        assert_relative_eq!(svd.s()[0], 1.0, max_relative = 1e-12);
        assert_relative_eq!(svd.s()[1], 1.0, max_relative = 1e-12);
    }

    #[test]
    fn rank_deficient() {
        // outer product: rank 1
        let a = Matrix::from_rows(&[[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]]);
        let svd = sv_decompose(&a).unwrap();
        assert!(svd.s()[0] > 1.0);
        assert_relative_eq!(svd.s()[1], 0.0, epsilon = 1e-10);
        assert_eq!(svd.rank(1e-8), 1);
        let back = svd.recompose().unwrap();
        assert_close(&back, &a, 1e-8);
    }

    #[test]
    fn singular_values_match_gram_eigenvalues() {
        let a = random_matrix(6, 4, 28);
        let svd = sv_decompose(&a).unwrap();
        // ‖A‖_F² == Σ σᵢ²
        let frob2: f64 = a.iter().map(|x| x * x).sum();
        let sum2: f64 = svd.s().iter().map(|s| s * s).sum();
        assert_relative_eq!(frob2, sum2, max_relative = 1e-9);
    }

    #[test]
    fn empty_and_vector_inputs() {
        let svd = sv_decompose(&Matrix::<f64>::zeros(0, 0)).unwrap();
        assert!(svd.s().is_empty());

        let col = Matrix::from_rows(&[[3.0], [4.0]]);
        let svd = sv_decompose(&col).unwrap();
        assert_relative_eq!(svd.s()[0], 5.0, max_relative = 1e-12);

        let row = Matrix::from_rows(&[[3.0, 4.0]]);
        let svd = sv_decompose(&row).unwrap();
        assert_relative_eq!(svd.s()[0], 5.0, max_relative = 1e-12);
    }

    #[test]
    fn zero_matrix() {
        let a = Matrix::<f64>::zeros(3, 3);
        let svd = sv_decompose(&a).unwrap();
        assert_eq!(svd.s(), &[0.0, 0.0, 0.0]);
        assert_eq!(svd.rank(0.0), 0);
    }
}
