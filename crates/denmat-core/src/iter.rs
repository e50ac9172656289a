//! Iterators over strided matrix storage.
//!
//! The element iterator is random access: it keeps a *linear* row-major
//! index and converts it to a storage offset on demand, so `nth`, reverse
//! iteration and exact sizing are all O(1) even across padded rows.

/// Random-access row-major iterator over the elements of a strided matrix.
///
/// Linear index `i` maps to element `(i / cols, i % cols)` at storage offset
/// `(i / cols) * row_stride + (i % cols)`.
#[derive(Clone)]
pub struct ElemIter<'a, T> {
    data: &'a [T],
    cols: usize,
    row_stride: usize,
    front: usize,
    back: usize,
}

impl<'a, T> ElemIter<'a, T> {
    pub(crate) fn new(data: &'a [T], rows: usize, cols: usize, row_stride: usize) -> Self {
        Self {
            data,
            cols,
            row_stride,
            front: 0,
            back: rows * cols,
        }
    }

    #[inline]
    fn at(&self, linear: usize) -> &'a T {
        let r = linear / self.cols;
        let c = linear % self.cols;
        &self.data[r * self.row_stride + c]
    }
}

impl<'a, T> Iterator for ElemIter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        if self.front >= self.back {
            return None;
        }
        let item = self.at(self.front);
        self.front += 1;
        Some(item)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back - self.front;
        (n, Some(n))
    }

    #[inline]
    fn nth(&mut self, n: usize) -> Option<&'a T> {
        self.front = self.front.saturating_add(n);
        self.next()
    }
}

impl<'a, T> DoubleEndedIterator for ElemIter<'a, T> {
    #[inline]
    fn next_back(&mut self) -> Option<&'a T> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(self.at(self.back))
    }
}

impl<T> ExactSizeIterator for ElemIter<'_, T> {}

/// Row-major iterator over a two-stride view; also covers transposed views,
/// where row iteration walks a column of the parent.
#[derive(Clone)]
pub struct ViewIter<'a, T> {
    data: &'a [T],
    cols: usize,
    row_stride: usize,
    col_stride: usize,
    front: usize,
    back: usize,
}

impl<'a, T> ViewIter<'a, T> {
    pub(crate) fn new(
        data: &'a [T],
        rows: usize,
        cols: usize,
        row_stride: usize,
        col_stride: usize,
    ) -> Self {
        Self {
            data,
            cols,
            row_stride,
            col_stride,
            front: 0,
            back: rows * cols,
        }
    }
}

impl<'a, T> Iterator for ViewIter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        if self.front >= self.back {
            return None;
        }
        let r = self.front / self.cols;
        let c = self.front % self.cols;
        self.front += 1;
        Some(&self.data[r * self.row_stride + c * self.col_stride])
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back - self.front;
        (n, Some(n))
    }
}

impl<T> ExactSizeIterator for ViewIter<'_, T> {}

/// Iterator over the rows of a matrix as contiguous slices.
pub struct RowsIter<'a, T> {
    data: &'a [T],
    rows: usize,
    cols: usize,
    row_stride: usize,
    next_row: usize,
}

impl<'a, T> RowsIter<'a, T> {
    pub(crate) fn new(data: &'a [T], rows: usize, cols: usize, row_stride: usize) -> Self {
        Self {
            data,
            rows,
            cols,
            row_stride,
            next_row: 0,
        }
    }
}

impl<'a, T> Iterator for RowsIter<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<&'a [T]> {
        if self.next_row >= self.rows {
            return None;
        }
        let start = self.next_row * self.row_stride;
        self.next_row += 1;
        Some(&self.data[start..start + self.cols])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.rows - self.next_row;
        (n, Some(n))
    }
}

impl<T> ExactSizeIterator for RowsIter<'_, T> {}

/// Iterator over one column: a fixed-stride pointer walk down the rows.
pub struct ColIter<'a, T> {
    data: &'a [T],
    row_stride: usize,
    next_row: usize,
    rows: usize,
    col: usize,
}

impl<'a, T> ColIter<'a, T> {
    pub(crate) fn new(data: &'a [T], col: usize, rows: usize, row_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            next_row: 0,
            rows,
            col,
        }
    }
}

impl<'a, T> Iterator for ColIter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        if self.next_row >= self.rows {
            return None;
        }
        let idx = self.next_row * self.row_stride + self.col;
        self.next_row += 1;
        Some(&self.data[idx])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.rows - self.next_row;
        (n, Some(n))
    }
}

impl<T> ExactSizeIterator for ColIter<'_, T> {}

#[cfg(test)]
mod tests {
    use crate::matrix::Matrix;

    fn m3() -> Matrix<i32> {
        Matrix::from_rows(&[[1, 2, 3], [4, 5, 6], [7, 8, 9]])
    }

    #[test]
    fn row_major_order() {
        let m = m3();
        let elems: Vec<i32> = m.iter().cloned().collect();
        assert_eq!(elems, (1..=9).collect::<Vec<_>>());
        assert_eq!(m.iter().len(), 9);
    }

    #[test]
    fn strides_across_padding() {
        // remove_col keeps the stride, so rows are padded
        let mut m = m3();
        m.remove_col(1).unwrap();
        let elems: Vec<i32> = m.iter().cloned().collect();
        assert_eq!(elems, vec![1, 3, 4, 6, 7, 9]);
    }

    #[test]
    fn reverse_iteration() {
        let m = m3();
        let rev: Vec<i32> = m.iter().rev().cloned().collect();
        assert_eq!(rev, (1..=9).rev().collect::<Vec<_>>());
    }

    #[test]
    fn nth_is_random_access() {
        let m = m3();
        let mut it = m.iter();
        assert_eq!(it.nth(4), Some(&5));
        assert_eq!(it.next(), Some(&6));
        assert_eq!(it.len(), 3);
    }

    #[test]
    fn mixed_ends() {
        let m = m3();
        let mut it = m.iter();
        assert_eq!(it.next(), Some(&1));
        assert_eq!(it.next_back(), Some(&9));
        assert_eq!(it.len(), 7);
        assert_eq!(it.last(), Some(&8));
    }

    #[test]
    fn window_iteration() {
        let m = m3();
        let w = m.window(1, 1, 2, 2).unwrap();
        let elems: Vec<i32> = w.iter().cloned().collect();
        assert_eq!(elems, vec![5, 6, 8, 9]);
    }

    #[test]
    fn rows_and_col_iters() {
        let m = m3();
        let rows: Vec<&[i32]> = m.rows_iter().collect();
        assert_eq!(rows, vec![&[1, 2, 3][..], &[4, 5, 6][..], &[7, 8, 9][..]]);

        let col: Vec<i32> = m.col_iter(2).cloned().collect();
        assert_eq!(col, vec![3, 6, 9]);
    }

    #[test]
    fn transposed_view_iter_is_column_order() {
        let m = m3();
        let elems: Vec<i32> = m.transpose().iter().cloned().collect();
        assert_eq!(elems, vec![1, 4, 7, 2, 5, 8, 3, 6, 9]);
    }

    #[test]
    fn empty_iterators() {
        let m = Matrix::<i32>::zeros(0, 3);
        assert_eq!(m.iter().count(), 0);
        assert_eq!(m.rows_iter().count(), 0);
        let m = Matrix::<i32>::zeros(3, 0);
        assert_eq!(m.iter().count(), 0);
    }
}
