//! Masked views: filtered iteration over the elements selected by a
//! boolean mask matrix of the same shape.

use std::cell::Cell;

use crate::matrix::{Matrix, MatrixError};

/// A filtered, forward-only view over the elements of a matrix whose mask
/// entry is `true`.
///
/// The selected element count is not known up front; it is computed on the
/// first call to [`Masked::count`] and cached for the lifetime of the view.
pub struct Masked<'a, T> {
    matrix: &'a Matrix<T>,
    mask: &'a Matrix<bool>,
    count: Cell<Option<usize>>,
}

impl<'a, T> Masked<'a, T> {
    pub(crate) fn new(
        matrix: &'a Matrix<T>,
        mask: &'a Matrix<bool>,
    ) -> Result<Self, MatrixError> {
        if matrix.shape() != mask.shape() {
            return Err(MatrixError::dimension_mismatch(
                "Mask shape must match matrix shape",
                matrix.shape(),
                mask.shape(),
            ));
        }
        Ok(Self {
            matrix,
            mask,
            count: Cell::new(None),
        })
    }

    /// Number of selected elements. Lazily computed, then cached.
    pub fn count(&self) -> usize {
        if let Some(n) = self.count.get() {
            return n;
        }
        let n = self.mask.iter().filter(|&&keep| keep).count();
        self.count.set(Some(n));
        n
    }

    /// Returns true if the mask selects nothing.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Forward-only iterator over the selected elements, in row-major order.
    pub fn iter(&self) -> MaskedIter<'a, T> {
        MaskedIter {
            matrix: self.matrix,
            mask: self.mask,
            next: 0,
        }
    }

    /// Forward-only iterator yielding `((row, col), &value)` for each
    /// selected element.
    pub fn indexed_iter(&self) -> MaskedIndexedIter<'a, T> {
        MaskedIndexedIter {
            matrix: self.matrix,
            mask: self.mask,
            next: 0,
        }
    }
}

impl<T: Clone> Masked<'_, T> {
    /// Collects the selected elements into a vector, row-major.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

/// Iterator over the selected elements of a [`Masked`] view.
pub struct MaskedIter<'a, T> {
    matrix: &'a Matrix<T>,
    mask: &'a Matrix<bool>,
    next: usize,
}

impl<'a, T> Iterator for MaskedIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let (rows, cols) = self.matrix.shape();
        while self.next < rows * cols {
            let (r, c) = (self.next / cols, self.next % cols);
            self.next += 1;
            if self.mask[(r, c)] {
                // shape equality was checked at construction
                return self.matrix.get(r, c);
            }
        }
        None
    }
}

/// Iterator over `((row, col), &value)` pairs of a [`Masked`] view.
pub struct MaskedIndexedIter<'a, T> {
    matrix: &'a Matrix<T>,
    mask: &'a Matrix<bool>,
    next: usize,
}

impl<'a, T> Iterator for MaskedIndexedIter<'a, T> {
    type Item = ((usize, usize), &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let (rows, cols) = self.matrix.shape();
        while self.next < rows * cols {
            let (r, c) = (self.next / cols, self.next % cols);
            self.next += 1;
            if self.mask[(r, c)] {
                return self.matrix.get(r, c).map(|v| ((r, c), v));
            }
        }
        None
    }
}
