//! Householder QR factorization, unblocked and blocked.
//!
//! The factorization is stored packed: the upper triangle of `factors`
//! holds `R`, the strict lower triangle holds the reflector tails, and
//! `taus` holds one scaling per reflector. The blocked driver factors
//! panels of eight columns and folds each panel into the trailing matrix
//! through the compact WY form, so the bulk of the work is two matrix
//! multiplications per panel.

use denmat_core::{ops, Matrix};
use num_traits::Float;

use crate::householder::{
    approx_count, householder, reflect_cols, unpack_reflectors, ReflectorLayout,
};
use crate::LinalgError;

/// Panel width of the blocked driver.
const PANEL: usize = 8;

/// Which `Q` to materialize from a packed factorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrMode {
    /// `Q` is `m × min(m, n)`: just enough columns to reproduce `A`.
    Economy,
    /// `Q` is the full `m × m` orthogonal factor.
    Full,
}

/// A packed QR factorization `A = Q·R`.
#[derive(Debug, Clone)]
pub struct QrDecomposition<T> {
    factors: Matrix<T>,
    taus: Vec<T>,
}

impl<T: Float + Default> QrDecomposition<T> {
    /// The packed factor matrix: `R` on and above the diagonal, reflector
    /// tails below it.
    pub fn factors(&self) -> &Matrix<T> {
        &self.factors
    }

    /// Reflector scalings, one per annihilated column.
    pub fn taus(&self) -> &[T] {
        &self.taus
    }

    /// The upper-triangular factor `R`, `min(m, n) × n`.
    pub fn r(&self) -> Matrix<T> {
        let (_, n) = self.factors.shape();
        let k = self.taus.len();
        let mut r = Matrix::<T>::zeros(k, n);
        for i in 0..k {
            for j in i..n {
                r[(i, j)] = self.factors[(i, j)];
            }
        }
        r
    }

    /// Materializes `Q` by applying the reflectors to identity columns,
    /// last reflector first.
    pub fn q(&self, mode: QrMode) -> Matrix<T> {
        let m = self.factors.rows();
        let k = self.taus.len();
        let qcols = match mode {
            QrMode::Economy => k,
            QrMode::Full => m,
        };
        let mut q = Matrix::<T>::zeros(m, qcols);
        for i in 0..m.min(qcols) {
            q[(i, i)] = T::one();
        }
        let mut v = vec![T::zero(); m];
        for i in (0..k).rev() {
            let tail = m - i;
            v[0] = T::one();
            for r in 1..tail {
                v[r] = self.factors[(i + r, i)];
            }
            reflect_cols(&mut q, i, 0..qcols, &v[..tail], self.taus[i]);
        }
        q
    }

    /// `(Q, R)` with `R` shaped to match the requested `Q`.
    pub fn unpack(&self, mode: QrMode) -> (Matrix<T>, Matrix<T>) {
        let q = self.q(mode);
        let r = match mode {
            QrMode::Economy => self.r(),
            QrMode::Full => {
                let (m, n) = self.factors.shape();
                let econ = self.r();
                let mut r = Matrix::<T>::zeros(m, n);
                for i in 0..econ.rows() {
                    for j in 0..n {
                        r[(i, j)] = econ[(i, j)];
                    }
                }
                r
            }
        };
        (q, r)
    }

    /// Solves `A·x = b` in the least-squares sense (exactly for square
    /// full-rank `A`) via `Qᵀ·b` followed by back-substitution.
    ///
    /// Requires `A` with at least as many rows as columns. Returns
    /// [`LinalgError::Singular`] when a diagonal of `R` is numerically
    /// zero relative to the largest one.
    pub fn solve(&self, b: &Matrix<T>) -> Result<Matrix<T>, LinalgError> {
        let (m, n) = self.factors.shape();
        if m < n {
            return Err(LinalgError::InvalidDimensions {
                op: "qr solve",
                rows: m,
                cols: n,
            });
        }
        if b.rows() != m {
            return Err(LinalgError::InvalidDimensions {
                op: "qr solve rhs",
                rows: b.rows(),
                cols: b.cols(),
            });
        }
        let nrhs = b.cols();

        // y = Qᵀ·b, applying reflectors first to last
        let mut y = b.to_contiguous();
        let mut v = vec![T::zero(); m];
        for i in 0..n {
            let tail = m - i;
            v[0] = T::one();
            for r in 1..tail {
                v[r] = self.factors[(i + r, i)];
            }
            reflect_cols(&mut y, i, 0..nrhs, &v[..tail], self.taus[i]);
        }

        // back-substitute R·x = y[..n]
        let mut maxdiag = T::zero();
        for i in 0..n {
            maxdiag = maxdiag.max(self.factors[(i, i)].abs());
        }
        let tol = maxdiag * T::epsilon() * approx_count::<T>(n.max(1));

        let mut x = Matrix::<T>::zeros(n, nrhs);
        for j in 0..nrhs {
            for i in (0..n).rev() {
                let rii = self.factors[(i, i)];
                if rii.abs() <= tol {
                    return Err(LinalgError::Singular);
                }
                let mut acc = y[(i, j)];
                for p in i + 1..n {
                    acc = acc - self.factors[(i, p)] * x[(p, j)];
                }
                x[(i, j)] = acc / rii;
            }
        }
        Ok(x)
    }

    /// Inverse of a square `A` by solving against the identity.
    pub fn inverse(&self) -> Result<Matrix<T>, LinalgError> {
        let (m, n) = self.factors.shape();
        if m != n {
            return Err(LinalgError::InvalidDimensions {
                op: "qr inverse",
                rows: m,
                cols: n,
            });
        }
        self.solve(&Matrix::identity(n))
    }
}

/// Unblocked Householder QR: one reflector per column, each applied
/// directly to the trailing columns.
pub fn qr_decompose_unblocked<T: Float + Default>(a: &Matrix<T>) -> QrDecomposition<T> {
    let (m, n) = a.shape();
    let k = m.min(n);
    let mut factors = a.to_contiguous();
    let mut taus = Vec::with_capacity(k);
    let mut v = vec![T::zero(); m];
    for i in 0..k {
        let tau = factor_column(&mut factors, i, i..n, &mut v);
        taus.push(tau);
    }
    QrDecomposition { factors, taus }
}

/// Blocked Householder QR with panel width 8 and compact WY trailing
/// updates.
pub fn qr_decompose<T: Float + Default>(a: &Matrix<T>) -> Result<QrDecomposition<T>, LinalgError> {
    let (m, n) = a.shape();
    let k = m.min(n);
    if k <= PANEL {
        return Ok(qr_decompose_unblocked(a));
    }

    let mut factors = a.to_contiguous();
    let mut taus = Vec::with_capacity(k);
    let mut v = vec![T::zero(); m];
    let mut j = 0;
    while j < k {
        let ib = PANEL.min(k - j);
        for ii in 0..ib {
            let tau = factor_column(&mut factors, j + ii, j + ii..j + ib, &mut v);
            taus.push(tau);
        }

        if j + ib < n {
            // trailing update A₂ ← QᵀA₂ = A₂ + V·(Tᵀ·(Vᵀ·A₂))
            let panel = factors.window(j as isize, j as isize, (m - j) as isize, ib as isize)?;
            let t = unpack_reflectors(&panel, &taus[j..j + ib], ReflectorLayout::Columns);

            let mut vmat = Matrix::<T>::zeros(m - j, ib);
            for c in 0..ib {
                vmat[(c, c)] = T::one();
                for r in c + 1..m - j {
                    vmat[(r, c)] = panel[(r, c)];
                }
            }

            let a2 = factors.window(
                j as isize,
                (j + ib) as isize,
                (m - j) as isize,
                (n - j - ib) as isize,
            )?;
            let w = ops::matmul_views(&vmat.transpose(), &a2.view())?;
            let tw = ops::matmul_views(&t.transpose(), &w.view())?;
            let update = ops::matmul(&vmat, &tw)?;

            // release the shared windows before mutating the factors
            drop(a2);
            drop(panel);

            let stride = factors.row_stride();
            let s = factors.as_strided_slice_mut();
            for r in 0..m - j {
                let base = (j + r) * stride + j + ib;
                let urow = update.row(r);
                for (c, &u) in urow.iter().enumerate() {
                    s[base + c] = s[base + c] + u;
                }
            }
        }
        j += ib;
    }
    Ok(QrDecomposition { factors, taus })
}

/// Generates the reflector for column `i` (rows `i..`) in place and applies
/// it to columns `i+1..apply.end`. Returns `τ`.
fn factor_column<T: Float + Default>(
    factors: &mut Matrix<T>,
    i: usize,
    apply: std::ops::Range<usize>,
    v: &mut [T],
) -> T {
    let m = factors.rows();
    let tail = m - i;
    {
        let stride = factors.row_stride();
        let s = factors.as_strided_slice();
        for r in 0..tail {
            v[r] = s[(i + r) * stride + i];
        }
    }
    let (tau, beta) = householder(&mut v[..tail]);
    {
        let stride = factors.row_stride();
        let s = factors.as_strided_slice_mut();
        for r in 0..tail {
            s[(i + r) * stride + i] = v[r];
        }
    }
    if tau != T::zero() && i + 1 < apply.end {
        v[0] = T::one();
        reflect_cols(factors, i, i + 1..apply.end, &v[..tail], tau);
        v[0] = beta;
    }
    tau
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

    fn check_reconstruction(rows: usize, cols: usize, seed: u64) {
        let a = random_matrix(rows, cols, seed);
        let qr = qr_decompose(&a).unwrap();
        let (q, r) = qr.unpack(QrMode::Economy);
        let qr_product = ops::matmul(&q, &r).unwrap();
        assert_close(&qr_product, &a, 1e-6);

        // QᵀQ == I
        let qtq = ops::matmul_views(&q.transpose(), &q.view()).unwrap();
        let identity = Matrix::<f64>::identity(q.cols());
        assert_close(&qtq, &identity, 1e-9);

        // R upper triangular
        for i in 0..r.rows() {
            for j in 0..i.min(r.cols()) {
                assert_relative_eq!(r[(i, j)], 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn reconstructs_square() {
        check_reconstruction(6, 6, 1);
        check_reconstruction(12, 12, 2);
    }

    #[test]
    fn reconstructs_tall() {
        check_reconstruction(10, 4, 3);
        check_reconstruction(25, 11, 4);
    }

    #[test]
    fn reconstructs_wide() {
        check_reconstruction(4, 10, 5);
        check_reconstruction(9, 21, 6);
    }

    #[test]
    fn blocked_matches_unblocked() {
        // 20 columns forces two full panels plus a remainder
        let a = random_matrix(24, 20, 7);
        let blocked = qr_decompose(&a).unwrap();
        let unblocked = qr_decompose_unblocked(&a);
        assert_eq!(blocked.taus().len(), unblocked.taus().len());
        for (x, y) in blocked.taus().iter().zip(unblocked.taus()) {
            assert_relative_eq!(*x, *y, max_relative = 1e-9, epsilon = 1e-12);
        }
        assert_close(blocked.factors(), unblocked.factors(), 1e-9);
    }

    #[test]
    fn full_q_is_square_orthogonal() {
        let a = random_matrix(7, 3, 8);
        let qr = qr_decompose(&a).unwrap();
        let q = qr.q(QrMode::Full);
        assert_eq!(q.shape(), (7, 7));
        let qtq = ops::matmul_views(&q.transpose(), &q.view()).unwrap();
        assert_close(&qtq, &Matrix::identity(7), 1e-9);
    }

    #[test]
    fn solves_square_system() {
        let a = Matrix::from_rows(&[[4.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 2.0]]);
        let x_true = Matrix::from_rows(&[[1.0], [-2.0], [3.0]]);
        let b = ops::matmul(&a, &x_true).unwrap();
        let x = qr_decompose(&a).unwrap().solve(&b).unwrap();
        assert_close(&x, &x_true, 1e-10);
    }

    #[test]
    fn least_squares_residual_is_orthogonal() {
        let a = random_matrix(12, 5, 9);
        let b = random_matrix(12, 1, 10);
        let x = qr_decompose(&a).unwrap().solve(&b).unwrap();
        // Aᵀ(A·x − b) == 0 characterizes the least-squares minimizer
        let residual = ops::sub(&ops::matmul(&a, &x).unwrap(), &b).unwrap();
        let normal = ops::matmul_views(&a.transpose(), &residual.view()).unwrap();
        for r in 0..normal.rows() {
            assert_relative_eq!(normal[(r, 0)], 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn inverse_of_square() {
        let a = random_matrix(8, 8, 11);
        let inv = qr_decompose(&a).unwrap().inverse().unwrap();
        let prod = ops::matmul(&a, &inv).unwrap();
        assert_close(&prod, &Matrix::identity(8), 1e-8);
    }

    #[test]
    fn singular_matrix_detected() {
        // rank 1: every row a multiple of the first
        let a = Matrix::from_rows(&[[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [-1.0, -2.0, -3.0]]);
        let qr = qr_decompose(&a).unwrap();
        let b = Matrix::from_rows(&[[1.0], [1.0], [1.0]]);
        assert!(matches!(qr.solve(&b), Err(LinalgError::Singular)));
        assert!(matches!(qr.inverse(), Err(LinalgError::Singular)));
    }

    #[test]
    fn inverse_rejects_rectangular() {
        let a = random_matrix(5, 3, 12);
        let qr = qr_decompose(&a).unwrap();
        assert!(matches!(
            qr.inverse(),
            Err(LinalgError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn solve_rejects_underdetermined() {
        let a = random_matrix(3, 5, 13);
        let qr = qr_decompose(&a).unwrap();
        let b = random_matrix(3, 1, 14);
        assert!(matches!(
            qr.solve(&b),
            Err(LinalgError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn empty_and_single() {
        let empty = Matrix::<f64>::zeros(0, 0);
        let qr = qr_decompose(&empty).unwrap();
        assert!(qr.taus().is_empty());
        assert_eq!(qr.q(QrMode::Full).shape(), (0, 0));

        let single = Matrix::from_rows(&[[-3.0]]);
        let qr = qr_decompose(&single).unwrap();
        let (q, r) = qr.unpack(QrMode::Economy);
        let back = ops::matmul(&q, &r).unwrap();
        assert_relative_eq!(back[(0, 0)], -3.0, max_relative = 1e-12);
    }

    #[test]
    fn factorizing_shared_input_leaves_it_intact() {
        let a = random_matrix(6, 4, 15);
        let keep = a.clone();
        let _qr = qr_decompose(&a).unwrap();
        assert_close(&a, &keep, 0.0);
        assert_eq!(a.as_ptr(), keep.as_ptr());
    }
}
