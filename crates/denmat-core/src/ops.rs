//! Matrix arithmetic as free functions.
//!
//! Every operation validates dimensions up front and returns a
//! [`MatrixError::DimensionMismatch`] before touching any output, so a
//! failed call never leaves a partially written matrix behind.

use std::ops::{Add, Mul, Sub};

use num_traits::Zero;

use crate::matrix::{Matrix, MatrixError};
use crate::view::MatrixView;

/// Element-wise sum `a + b`.
pub fn add<T>(a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>, MatrixError>
where
    T: Copy + Add<Output = T>,
{
    if a.shape() != b.shape() {
        return Err(MatrixError::dimension_mismatch(
            "Element-wise add requires equal shapes",
            a.shape(),
            b.shape(),
        ));
    }
    let mut data = Vec::with_capacity(a.numel());
    for (x, y) in a.iter().zip(b.iter()) {
        data.push(*x + *y);
    }
    Matrix::from_vec(a.rows(), a.cols(), data)
}

/// Element-wise difference `a - b`.
pub fn sub<T>(a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>, MatrixError>
where
    T: Copy + Sub<Output = T>,
{
    if a.shape() != b.shape() {
        return Err(MatrixError::dimension_mismatch(
            "Element-wise sub requires equal shapes",
            a.shape(),
            b.shape(),
        ));
    }
    let mut data = Vec::with_capacity(a.numel());
    for (x, y) in a.iter().zip(b.iter()) {
        data.push(*x - *y);
    }
    Matrix::from_vec(a.rows(), a.cols(), data)
}

/// Scalar multiple `a * k`.
pub fn scale<T>(a: &Matrix<T>, k: T) -> Matrix<T>
where
    T: Copy + Mul<Output = T>,
{
    a.map(|&x| x * k)
}

/// Matrix product `a · b`.
///
/// `a` must be `m × k` and `b` `k × n`; the result is `m × n`.
pub fn matmul<T>(a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>, MatrixError>
where
    T: Copy + Zero + Add<Output = T> + Mul<Output = T>,
{
    matmul_views(&a.view(), &b.view())
}

/// Matrix product over strided views, so transposed operands multiply
/// without materializing the transpose.
pub fn matmul_views<T>(
    a: &MatrixView<'_, T>,
    b: &MatrixView<'_, T>,
) -> Result<Matrix<T>, MatrixError>
where
    T: Copy + Zero + Add<Output = T> + Mul<Output = T>,
{
    if a.cols() != b.rows() {
        return Err(MatrixError::dimension_mismatch(
            "Matrix product requires inner dimensions to agree",
            a.shape(),
            b.shape(),
        ));
    }
    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    let mut data = vec![T::zero(); m * n];
    for i in 0..m {
        for p in 0..k {
            let aip = a[(i, p)];
            let out = &mut data[i * n..(i + 1) * n];
            for (j, slot) in out.iter_mut().enumerate() {
                *slot = *slot + aip * b[(p, j)];
            }
        }
    }
    Matrix::from_vec(m, n, data)
}

/// Materialized transpose of `a`.
pub fn transposed<T: Clone>(a: &Matrix<T>) -> Matrix<T> {
    a.transpose().to_matrix()
}

/// Horizontal concatenation `[a | b]`.
pub fn hstack<T: Clone>(a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>, MatrixError> {
    if a.rows() != b.rows() {
        return Err(MatrixError::dimension_mismatch(
            "Horizontal stack requires equal row counts",
            a.shape(),
            b.shape(),
        ));
    }
    let cols = a.cols() + b.cols();
    let mut data = Vec::with_capacity(a.rows() * cols);
    for r in 0..a.rows() {
        data.extend_from_slice(a.row(r));
        data.extend_from_slice(b.row(r));
    }
    Matrix::from_vec(a.rows(), cols, data)
}

/// Vertical concatenation `[a; b]`.
pub fn vstack<T: Clone>(a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>, MatrixError> {
    if a.cols() != b.cols() {
        return Err(MatrixError::dimension_mismatch(
            "Vertical stack requires equal column counts",
            a.shape(),
            b.shape(),
        ));
    }
    let rows = a.rows() + b.rows();
    let mut data = Vec::with_capacity(rows * a.cols());
    for r in 0..a.rows() {
        data.extend_from_slice(a.row(r));
    }
    for r in 0..b.rows() {
        data.extend_from_slice(b.row(r));
    }
    Matrix::from_vec(rows, a.cols(), data)
}

/// Frobenius inner product: the sum of element-wise products of two
/// equal-shape matrices. For row or column vectors this is the usual dot
/// product.
pub fn dot<T>(a: &Matrix<T>, b: &Matrix<T>) -> Result<T, MatrixError>
where
    T: Copy + Zero + Add<Output = T> + Mul<Output = T>,
{
    if a.shape() != b.shape() {
        return Err(MatrixError::dimension_mismatch(
            "Dot product requires equal shapes",
            a.shape(),
            b.shape(),
        ));
    }
    let mut acc = T::zero();
    for (x, y) in a.iter().zip(b.iter()) {
        acc = acc + *x * *y;
    }
    Ok(acc)
}
