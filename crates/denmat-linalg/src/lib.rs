#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Overview
//!
//! `denmat-linalg` implements dense decompositions over
//! [`denmat_core::Matrix`]: Householder reflectors, blocked QR, two-sided
//! Jacobi SVD, the Moore-Penrose pseudoinverse and principal component
//! analysis. Factorizations never mutate their input; they work on a
//! detached copy, so callers keep sharing the original buffer.

use thiserror::Error;

/// Module for elementary Householder reflectors and the block WY form.
pub mod householder;
/// Module for the Householder QR factorization and triangular solves.
pub mod qr;
/// Module for the two-sided Jacobi singular value decomposition.
pub mod svd;

/// Module for the Moore-Penrose pseudoinverse.
pub mod pinv;

/// Module for principal component analysis.
pub mod pca;

pub use crate::householder::{householder, reflect_cols, reflect_rows, unpack_reflectors, ReflectorLayout};
pub use crate::pca::{pca_decorrelate, principal_components, Pca};
pub use crate::pinv::pseudo_inverse;
pub use crate::qr::{qr_decompose, qr_decompose_unblocked, QrDecomposition, QrMode};
pub use crate::svd::{sv_decompose, Svd};

/// An error type for linear algebra operations.
#[derive(Debug, Error)]
pub enum LinalgError {
    /// The operand shape does not admit the requested operation.
    #[error("Invalid dimensions for {op}: {rows}x{cols}")]
    InvalidDimensions {
        /// The operation that rejected the shape.
        op: &'static str,
        /// Rows of the offending operand.
        rows: usize,
        /// Columns of the offending operand.
        cols: usize,
    },

    /// The matrix is singular to working precision.
    #[error("Matrix is singular to working precision")]
    Singular,

    /// An underlying matrix operation failed.
    #[error(transparent)]
    Matrix(#[from] denmat_core::MatrixError),
}
