//! Moore-Penrose pseudoinverse via the singular value decomposition.

use denmat_core::{ops, Matrix};
use num_traits::Float;

use crate::householder::approx_count;
use crate::svd::sv_decompose;
use crate::LinalgError;

/// Computes the Moore-Penrose pseudoinverse `A⁺ = V·Σ⁺·Uᵀ`.
///
/// Singular values below `max(m, n)·ε·σ_max` are treated as exactly zero,
/// so rank-deficient inputs invert cleanly instead of amplifying noise.
/// The result satisfies the four Penrose identities:
/// `A·A⁺·A = A`, `A⁺·A·A⁺ = A⁺`, and both `A·A⁺` and `A⁺·A` symmetric.
pub fn pseudo_inverse<T: Float + Default>(a: &Matrix<T>) -> Result<Matrix<T>, LinalgError> {
    let (m, n) = a.shape();
    let svd = sv_decompose(a)?;
    let s = svd.s();

    let sigma_max = s.first().copied().unwrap_or_else(T::zero);
    let tol = approx_count::<T>(m.max(n)) * T::epsilon() * sigma_max;

    // V with each column scaled by the reciprocal singular value
    let mut vs = svd.v().to_contiguous();
    for (j, &sv) in s.iter().enumerate() {
        let inv = if sv > tol { sv.recip() } else { T::zero() };
        for i in 0..vs.rows() {
            vs[(i, j)] = vs[(i, j)] * inv;
        }
    }

    Ok(ops::matmul_views(&vs.view(), &svd.u().transpose())?)
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

    fn verify_penrose_identities(a: &Matrix<f64>) {
        let p = pseudo_inverse(a).unwrap();
        assert_eq!(p.shape(), (a.cols(), a.rows()));

        let ap = ops::matmul(a, &p).unwrap();
        let pa = ops::matmul(&p, a).unwrap();

        // A·A⁺·A == A
        assert_close(&ops::matmul(&ap, a).unwrap(), a, 1e-8);
        // A⁺·A·A⁺ == A⁺
        assert_close(&ops::matmul(&pa, &p).unwrap(), &p, 1e-8);
        // A·A⁺ and A⁺·A symmetric
        assert_close(&ops::transposed(&ap), &ap, 1e-8);
        assert_close(&ops::transposed(&pa), &pa, 1e-8);
    }

    #[test]
    fn penrose_identities_hold() {
        verify_penrose_identities(&random_matrix(5, 5, 31));
        verify_penrose_identities(&random_matrix(9, 4, 32));
        verify_penrose_identities(&random_matrix(4, 9, 33));
    }

    #[test]
    fn inverts_nonsingular_square() {
        let a = random_matrix(6, 6, 34);
        let p = pseudo_inverse(&a).unwrap();
        assert_close(&ops::matmul(&a, &p).unwrap(), &Matrix::identity(6), 1e-7);
    }

    #[test]
    fn rank_deficient_is_stable() {
        // rank 1 outer product; a plain inverse would blow up
        let a = Matrix::from_rows(&[[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]]);
        verify_penrose_identities(&a);
        let p = pseudo_inverse(&a).unwrap();
        for r in 0..p.rows() {
            for c in 0..p.cols() {
                assert!(p[(r, c)].abs() < 1.0);
            }
        }
    }

    #[test]
    fn zero_matrix_maps_to_zero() {
        let a = Matrix::<f64>::zeros(3, 2);
        let p = pseudo_inverse(&a).unwrap();
        assert_eq!(p.shape(), (2, 3));
        for x in p.iter() {
            assert_eq!(*x, 0.0);
        }
    }
}
