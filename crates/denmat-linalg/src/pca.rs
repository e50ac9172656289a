//! Principal component analysis over row-sample data matrices.
//!
//! Samples are rows, features are columns. The components come from the
//! SVD of the column-mean-centered data, so no covariance matrix is ever
//! formed explicitly.

use denmat_core::{ops, Matrix};
use num_traits::Float;

use crate::householder::approx_count;
use crate::svd::sv_decompose;
use crate::LinalgError;

/// A fitted principal component basis.
#[derive(Debug, Clone)]
pub struct Pca<T> {
    mean: Matrix<T>,
    components: Matrix<T>,
    singular_values: Vec<T>,
}

impl<T: Float + Default> Pca<T> {
    /// Column means of the training data, `1 × n`.
    pub fn mean(&self) -> &Matrix<T> {
        &self.mean
    }

    /// Principal axes as columns, `n × k`, ordered by decreasing variance.
    pub fn components(&self) -> &Matrix<T> {
        &self.components
    }

    /// Singular values of the centered data, descending.
    pub fn singular_values(&self) -> &[T] {
        &self.singular_values
    }

    /// Projects `data` onto the first `k` components, producing scores of
    /// shape `samples × k`.
    pub fn project(&self, data: &Matrix<T>, k: usize) -> Result<Matrix<T>, LinalgError> {
        if data.cols() != self.mean.cols() || k > self.components.cols() {
            return Err(LinalgError::InvalidDimensions {
                op: "pca project",
                rows: data.rows(),
                cols: data.cols(),
            });
        }
        let centered = center(data, &self.mean);
        let basis = self
            .components
            .window(0, 0, self.components.rows() as isize, k as isize)
            .map_err(LinalgError::Matrix)?;
        Ok(ops::matmul(&centered, &basis)?)
    }
}

/// Fits a principal component basis to `data` (rows are samples).
pub fn principal_components<T: Float + Default>(data: &Matrix<T>) -> Result<Pca<T>, LinalgError> {
    let (m, n) = data.shape();
    if m == 0 {
        return Err(LinalgError::InvalidDimensions {
            op: "pca fit",
            rows: m,
            cols: n,
        });
    }
    let mean = column_means(data);
    let centered = center(data, &mean);
    let svd = sv_decompose(&centered)?;
    Ok(Pca {
        mean,
        components: svd.v().to_contiguous(),
        singular_values: svd.s().to_vec(),
    })
}

/// Rotates `data` into its own principal component basis, returning the
/// full decorrelated scores (`samples × min(samples, features)`).
pub fn pca_decorrelate<T: Float + Default>(data: &Matrix<T>) -> Result<Matrix<T>, LinalgError> {
    let pca = principal_components(data)?;
    pca.project(data, pca.components().cols())
}

fn column_means<T: Float + Default>(data: &Matrix<T>) -> Matrix<T> {
    let (m, n) = data.shape();
    let inv_m = approx_count::<T>(m).recip();
    let mut mean = Matrix::<T>::zeros(1, n);
    for r in 0..m {
        for (j, &x) in data.row(r).iter().enumerate() {
            mean[(0, j)] = mean[(0, j)] + x;
        }
    }
    for j in 0..n {
        mean[(0, j)] = mean[(0, j)] * inv_m;
    }
    mean
}

fn center<T: Float + Default>(data: &Matrix<T>, mean: &Matrix<T>) -> Matrix<T> {
    let mut centered = data.to_contiguous();
    for r in 0..centered.rows() {
        for j in 0..centered.cols() {
            centered[(r, j)] = centered[(r, j)] - mean[(0, j)];
        }
    }
    centered
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn mean_is_removed() {
        let data = Matrix::from_rows(&[[1.0, 10.0], [3.0, 14.0], [5.0, 18.0]]);
        let pca = principal_components(&data).unwrap();
        assert_relative_eq!(pca.mean()[(0, 0)], 3.0, max_relative = 1e-12);
        assert_relative_eq!(pca.mean()[(0, 1)], 14.0, max_relative = 1e-12);
    }

    #[test]
    fn collinear_data_has_one_component() {
        // y == 2x + 1: all variance along one axis
        let data = Matrix::from_rows(&[[0.0, 1.0], [1.0, 3.0], [2.0, 5.0], [3.0, 7.0]]);
        let pca = principal_components(&data).unwrap();
        assert!(pca.singular_values()[0] > 1.0);
        assert_relative_eq!(pca.singular_values()[1], 0.0, epsilon = 1e-10);

        // the dominant axis has slope 2
        let axis_x = pca.components()[(0, 0)];
        let axis_y = pca.components()[(1, 0)];
        assert_relative_eq!(axis_y / axis_x, 2.0, max_relative = 1e-10);
    }

    #[test]
    fn scores_are_decorrelated() {
        let mut rng = StdRng::seed_from_u64(41);
        // correlated features: second column leaks from the first
        let mut rows = Vec::new();
        for _ in 0..50 {
            let x: f64 = rng.random_range(-1.0..1.0);
            let noise: f64 = rng.random_range(-0.1..0.1);
            rows.push([x, 0.5 * x + noise, rng.random_range(-1.0..1.0)]);
        }
        let data = Matrix::from_rows(&rows);
        let scores = pca_decorrelate(&data).unwrap();
        assert_eq!(scores.shape(), (50, 3));

        // off-diagonal covariance of the scores vanishes
        let cov = ops::matmul_views(&scores.transpose(), &scores.view()).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                if i != j {
                    assert_relative_eq!(cov[(i, j)], 0.0, epsilon = 1e-8);
                }
            }
        }
    }

    #[test]
    fn projection_reduces_dimension() {
        let data = Matrix::from_rows(&[[1.0, 0.0, 0.1], [0.0, 1.0, -0.1], [1.0, 1.0, 0.05], [0.5, 0.5, 0.0]]);
        let pca = principal_components(&data).unwrap();
        let reduced = pca.project(&data, 2).unwrap();
        assert_eq!(reduced.shape(), (4, 2));

        assert!(pca.project(&data, 7).is_err());
        let wrong = Matrix::<f64>::zeros(2, 5);
        assert!(pca.project(&wrong, 1).is_err());
    }

    #[test]
    fn empty_data_rejected() {
        let data = Matrix::<f64>::zeros(0, 3);
        assert!(matches!(
            principal_components(&data),
            Err(LinalgError::InvalidDimensions { .. })
        ));
    }
}
