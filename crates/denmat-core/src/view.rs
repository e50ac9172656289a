//! Lifetime-bound strided views over matrix storage.
//!
//! A view borrows a region of a [`crate::Matrix`] without touching the
//! reference count: the borrow checker, not the copy-on-write machinery,
//! keeps it sound. Views carry independent row and column strides, so a
//! transpose is a stride swap rather than a copy.

use crate::iter::ViewIter;
use crate::matrix::Matrix;
use crate::storage::MatStorage;

/// An immutable strided view of matrix data.
///
/// Element `(r, c)` lives at `r * row_stride + c * col_stride` of the
/// borrowed slice. A plain matrix view has `col_stride == 1`; a transposed
/// view swaps the strides.
#[derive(Clone, Copy)]
pub struct MatrixView<'a, T> {
    data: &'a [T],
    rows: usize,
    cols: usize,
    row_stride: usize,
    col_stride: usize,
}

impl<'a, T> MatrixView<'a, T> {
    pub(crate) fn new(
        data: &'a [T],
        rows: usize,
        cols: usize,
        row_stride: usize,
        col_stride: usize,
    ) -> Self {
        Self {
            data,
            rows,
            cols,
            row_stride,
            col_stride,
        }
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Shape as a `(rows, cols)` pair.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Elements between consecutive rows.
    #[inline]
    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// Elements between consecutive columns.
    #[inline]
    pub fn col_stride(&self) -> usize {
        self.col_stride
    }

    /// Returns true if either dimension is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Checked element access.
    #[inline]
    pub fn get(&self, r: usize, c: usize) -> Option<&'a T> {
        if r < self.rows && c < self.cols {
            Some(&self.data[r * self.row_stride + c * self.col_stride])
        } else {
            None
        }
    }

    /// Element access without bounds checking.
    ///
    /// # Safety
    ///
    /// The caller must ensure `r < rows` and `c < cols`.
    #[inline]
    pub unsafe fn get_unchecked(&self, r: usize, c: usize) -> &'a T {
        debug_assert!(r < self.rows && c < self.cols);
        self.data
            .get_unchecked(r * self.row_stride + c * self.col_stride)
    }

    /// The transposed view: rows and columns swap roles by swapping the
    /// strides. Zero-copy.
    pub fn transpose(self) -> MatrixView<'a, T> {
        MatrixView {
            data: self.data,
            rows: self.cols,
            cols: self.rows,
            row_stride: self.col_stride,
            col_stride: self.row_stride,
        }
    }

    /// A sub-view of the region starting at `(r, c)` spanning `rows × cols`.
    ///
    /// # Panics
    ///
    /// Panics if the region does not fit.
    pub fn subview(&self, r: usize, c: usize, rows: usize, cols: usize) -> MatrixView<'a, T> {
        assert!(r + rows <= self.rows && c + cols <= self.cols, "subview out of bounds");
        if rows == 0 || cols == 0 {
            return MatrixView {
                data: &[],
                rows,
                cols,
                row_stride: self.row_stride,
                col_stride: self.col_stride,
            };
        }
        let offset = r * self.row_stride + c * self.col_stride;
        MatrixView {
            data: &self.data[offset..],
            rows,
            cols,
            row_stride: self.row_stride,
            col_stride: self.col_stride,
        }
    }

    /// Row-major iterator over the viewed elements, honoring both strides.
    /// Iterating a transposed view's rows walks the parent's columns.
    pub fn iter(&self) -> ViewIter<'a, T> {
        ViewIter::new(self.data, self.rows, self.cols, self.row_stride, self.col_stride)
    }
}

impl<T: Clone> MatrixView<'_, T> {
    /// Copies the viewed elements into a compact owned matrix.
    pub fn to_matrix(&self) -> Matrix<T> {
        let mut data = Vec::with_capacity(self.rows * self.cols);
        data.extend(self.iter().cloned());
        Matrix {
            storage: MatStorage::from_vec(data),
            rows: self.rows,
            cols: self.cols,
            row_stride: self.cols,
            capacity_rows: self.rows,
        }
    }
}

impl<T> std::ops::Index<(usize, usize)> for MatrixView<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, (r, c): (usize, usize)) -> &T {
        debug_assert!(r < self.rows && c < self.cols, "index ({r}, {c}) out of bounds");
        &self.data[r * self.row_stride + c * self.col_stride]
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for MatrixView<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "MatrixView {}x{} (strides {}, {})",
            self.rows, self.cols, self.row_stride, self.col_stride
        )?;
        for r in 0..self.rows {
            write!(f, "  [")?;
            for c in 0..self.cols {
                if c > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:?}", self[(r, c)])?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}

/// A mutable strided view of matrix data.
///
/// Obtained from [`Matrix::view_mut`], which detaches shared storage first,
/// so writes through the view never leak into sibling handles. The exclusive
/// borrow statically rules out overlapping mutable views.
pub struct MatrixViewMut<'a, T> {
    data: &'a mut [T],
    rows: usize,
    cols: usize,
    row_stride: usize,
    col_stride: usize,
}

impl<'a, T> MatrixViewMut<'a, T> {
    pub(crate) fn new(
        data: &'a mut [T],
        rows: usize,
        cols: usize,
        row_stride: usize,
        col_stride: usize,
    ) -> Self {
        Self {
            data,
            rows,
            cols,
            row_stride,
            col_stride,
        }
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Shape as a `(rows, cols)` pair.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Checked element access.
    #[inline]
    pub fn get(&self, r: usize, c: usize) -> Option<&T> {
        if r < self.rows && c < self.cols {
            Some(&self.data[r * self.row_stride + c * self.col_stride])
        } else {
            None
        }
    }

    /// Checked mutable element access.
    #[inline]
    pub fn get_mut(&mut self, r: usize, c: usize) -> Option<&mut T> {
        if r < self.rows && c < self.cols {
            Some(&mut self.data[r * self.row_stride + c * self.col_stride])
        } else {
            None
        }
    }

    /// The transposed mutable view, reborrowing the same region with the
    /// strides swapped.
    pub fn transpose(self) -> MatrixViewMut<'a, T> {
        MatrixViewMut {
            data: self.data,
            rows: self.cols,
            cols: self.rows,
            row_stride: self.col_stride,
            col_stride: self.row_stride,
        }
    }

    /// An immutable view of the same region.
    pub fn as_view(&self) -> MatrixView<'_, T> {
        MatrixView::new(self.data, self.rows, self.cols, self.row_stride, self.col_stride)
    }
}

impl<T: Clone> MatrixViewMut<'_, T> {
    /// Overwrites every viewed element with a clone of `value`.
    pub fn fill(&mut self, value: T) {
        for r in 0..self.rows {
            for c in 0..self.cols {
                self.data[r * self.row_stride + c * self.col_stride] = value.clone();
            }
        }
    }

    /// Copies the elements of `src` into this view.
    ///
    /// # Panics
    ///
    /// Panics if the shapes differ.
    pub fn copy_from(&mut self, src: &MatrixView<'_, T>) {
        assert_eq!(self.shape(), src.shape(), "copy_from shape mismatch");
        for r in 0..self.rows {
            for c in 0..self.cols {
                self.data[r * self.row_stride + c * self.col_stride] = src[(r, c)].clone();
            }
        }
    }
}

impl<T> std::ops::Index<(usize, usize)> for MatrixViewMut<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, (r, c): (usize, usize)) -> &T {
        debug_assert!(r < self.rows && c < self.cols, "index ({r}, {c}) out of bounds");
        &self.data[r * self.row_stride + c * self.col_stride]
    }
}

impl<T> std::ops::IndexMut<(usize, usize)> for MatrixViewMut<'_, T> {
    #[inline]
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut T {
        debug_assert!(r < self.rows && c < self.cols, "index ({r}, {c}) out of bounds");
        &mut self.data[r * self.row_stride + c * self.col_stride]
    }
}

#[cfg(test)]
mod tests {
    use crate::matrix::Matrix;

    #[test]
    fn view_matches_matrix() {
        let m = Matrix::from_rows(&[[1, 2, 3], [4, 5, 6]]);
        let v = m.view();
        assert_eq!(v.shape(), (2, 3));
        assert_eq!(v[(1, 2)], 6);
        assert_eq!(v.get(2, 0), None);
    }

    #[test]
    fn transpose_swaps_strides() {
        let m = Matrix::from_rows(&[[1, 2, 3], [4, 5, 6]]);
        let t = m.transpose();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t[(0, 1)], 4);
        assert_eq!(t[(2, 0)], 3);
        // transposed row iteration walks a parent column
        let first_two: Vec<i32> = t.iter().take(2).cloned().collect();
        assert_eq!(first_two, vec![1, 4]);
    }

    #[test]
    fn double_transpose_roundtrips() {
        let m = Matrix::from_rows(&[[1, 2], [3, 4], [5, 6]]);
        let tt = m.transpose().transpose();
        assert_eq!(tt.to_matrix(), m);
    }

    #[test]
    fn transpose_of_window_sees_parent_stride() {
        let m = Matrix::from_rows(&[[1, 2, 3], [4, 5, 6], [7, 8, 9]]);
        let w = m.window(1, 1, 2, 2).unwrap();
        let t = w.transpose();
        assert_eq!(t[(0, 1)], 8);
        assert_eq!(t[(1, 0)], 6);
        assert_eq!(t.to_matrix().to_vec(), vec![5, 8, 6, 9]);
    }

    #[test]
    fn view_at_region() {
        let m = Matrix::from_rows(&[[1, 2, 3], [4, 5, 6], [7, 8, 9]]);
        let v = m.view_at(0, 1, 2, 2).unwrap();
        assert_eq!(v[(0, 0)], 2);
        assert_eq!(v[(1, 1)], 6);
        assert!(m.view_at(2, 2, 2, 2).is_err());
    }

    #[test]
    fn subview_of_transpose() {
        let m = Matrix::from_rows(&[[1, 2, 3], [4, 5, 6], [7, 8, 9]]);
        let s = m.transpose().subview(1, 1, 2, 2);
        // columns 1..3 of rows 1..3, transposed
        assert_eq!(s[(0, 0)], 5);
        assert_eq!(s[(0, 1)], 8);
        assert_eq!(s[(1, 0)], 6);
    }

    #[test]
    fn view_mut_writes_through() {
        let mut m = Matrix::from_rows(&[[1, 2], [3, 4]]);
        {
            let mut v = m.view_mut();
            v[(0, 1)] = 20;
            if let Some(x) = v.get_mut(1, 0) {
                *x = 30;
            }
        }
        assert_eq!(m.to_vec(), vec![1, 20, 30, 4]);
    }

    #[test]
    fn view_mut_detaches_shared() {
        let mut a = Matrix::from_rows(&[[1, 2], [3, 4]]);
        let b = a.clone();
        a.view_mut().fill(0);
        assert_eq!(b.to_vec(), vec![1, 2, 3, 4]);
        assert_eq!(a.to_vec(), vec![0; 4]);
    }

    #[test]
    fn copy_from_transposed() {
        let src = Matrix::from_rows(&[[1, 2, 3], [4, 5, 6]]);
        let mut dst = Matrix::<i32>::zeros(3, 2);
        dst.view_mut().copy_from(&src.transpose());
        assert_eq!(dst.to_vec(), vec![1, 4, 2, 5, 3, 6]);
    }
}
