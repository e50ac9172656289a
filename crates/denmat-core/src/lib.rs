#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Overview
//!
//! `denmat-core` is a dense, row-major matrix engine built around shared,
//! reference-counted storage with copy-on-write semantics. Handles, windows
//! and shallow clones are cheap; a handle deep-copies its buffer only when
//! it is about to write while others still reference the data.
//!
//! # Architecture
//!
//! The crate is organized into several key components:
//!
//! - **Matrix**: The main data structure, a row-major matrix with an element
//!   stride between rows and amortized row-append capacity
//! - **MatStorage**: Low-level reference-counted buffer with owned and
//!   external (borrowed or adopted) memory modes
//! - **MatrixView / MatrixViewMut**: Lifetime-bound strided views; transposes
//!   are stride swaps, not copies
//! - **Masked**: Filtered iteration driven by a boolean mask matrix
//!
//! # Key Features
//!
//! - **Copy-on-write sharing**: `Clone` and `window` are O(1); mutation
//!   detaches automatically, so no handle ever observes another's writes
//! - **Strided layout**: column removal and windowing leave rows padded
//!   instead of repacking the buffer
//! - **Amortized growth**: appending N rows costs O(log N) reallocations
//! - **External memory**: wrap caller buffers borrowed or adopted, without
//!   copying until the first shared write
//!
//! # Quick Start
//!
//! ```rust
//! use denmat_core::Matrix;
//!
//! let m = Matrix::from_rows(&[[1, 2, 3], [4, 5, 6], [7, 8, 9]]);
//!
//! // O(1) submatrix sharing the buffer; negative indices count from the end
//! let w = m.window(0, 1, 1, 2).unwrap();
//! assert_eq!(w.row(0), &[2, 3]);
//!
//! // writing to a clone leaves the original untouched
//! let mut c = m.clone();
//! c[(0, 0)] = 42;
//! assert_eq!(m[(0, 0)], 1);
//! ```

/// Storage module containing the reference-counted buffer implementation.
///
/// This module provides [`storage::MatStorage`], the shared memory region
/// behind every [`Matrix`], with owned and external ownership modes.
pub mod storage;

/// Matrix module containing the main matrix implementation and error types.
pub mod matrix;

/// View module containing lifetime-bound strided view implementations.
///
/// This module provides [`view::MatrixView`] and [`view::MatrixViewMut`] for
/// zero-copy access to regions and transposes of existing matrix data.
pub mod view;

/// Iterator module: random-access element iteration, row and column walks.
pub mod iter;

/// Mask module: filtered views selected by a boolean mask matrix.
pub mod mask;

/// Ops module: matrix arithmetic (`add`, `matmul`, stacking, dot products).
pub mod ops;

/// Io module: raw little-endian binary persistence for scalar matrices.
pub mod io;

/// Serde module for JSON/other format serialization and deserialization.
///
/// Available when the `serde` feature is enabled.
#[cfg(feature = "serde")]
pub mod serde;

pub use crate::io::RawScalar;
pub use crate::iter::{ColIter, ElemIter, RowsIter, ViewIter};
pub use crate::mask::Masked;
pub use crate::matrix::{Matrix, MatrixError};
pub use crate::storage::{MatStorage, StorageError, StorageOwnership};
pub use crate::view::{MatrixView, MatrixViewMut};
