use thiserror::Error;

use crate::{
    iter::{ColIter, ElemIter, RowsIter},
    mask::Masked,
    storage::{MatStorage, StorageError, StorageOwnership},
    view::MatrixView,
};

/// An error type for matrix operations.
#[derive(Debug, Error)]
pub enum MatrixError {
    /// The provided data does not match the requested shape.
    #[error("Shape mismatch: expected {expected} elements for shape, but got {actual}")]
    InvalidShape {
        /// Expected number of elements based on the shape.
        expected: usize,
        /// Actual number of elements in the data.
        actual: usize,
    },

    /// An element index exceeded the matrix bounds.
    #[error("Index ({row}, {col}) out of bounds for {rows}x{cols} matrix")]
    IndexOutOfBounds {
        /// The requested row.
        row: usize,
        /// The requested column.
        col: usize,
        /// Number of rows in the matrix.
        rows: usize,
        /// Number of columns in the matrix.
        cols: usize,
    },

    /// Matrix dimensions incompatible for the requested operation.
    ///
    /// Raised before any partial mutation occurs.
    #[error("Dimension mismatch: {message}. Expected: {expected}, got: {actual}")]
    DimensionMismatch {
        /// Human-readable description of the mismatch.
        message: String,
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        actual: String,
    },

    /// A window request fell outside the matrix, after negative-index
    /// normalization.
    #[error("Window (r={row}, c={col}, rows={rows}, cols={cols}) out of range")]
    WindowOutOfRange {
        /// Requested row offset as given by the caller.
        row: isize,
        /// Requested column offset as given by the caller.
        col: isize,
        /// Requested row count as given by the caller.
        rows: isize,
        /// Requested column count as given by the caller.
        cols: isize,
    },

    /// Underlying storage operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// An I/O error during matrix (de)serialization.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MatrixError {
    /// Creates an `InvalidShape` error with clear context.
    pub fn invalid_shape(expected: usize, actual: usize) -> Self {
        Self::InvalidShape { expected, actual }
    }

    /// Creates an `IndexOutOfBounds` error for element `(row, col)`.
    pub fn index_out_of_bounds(row: usize, col: usize, rows: usize, cols: usize) -> Self {
        Self::IndexOutOfBounds {
            row,
            col,
            rows,
            cols,
        }
    }

    /// Creates a `DimensionMismatch` error with formatted shapes.
    pub fn dimension_mismatch(
        message: impl Into<String>,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Self {
        Self::DimensionMismatch {
            message: message.into(),
            expected: format!("{}x{}", expected.0, expected.1),
            actual: format!("{}x{}", actual.0, actual.1),
        }
    }
}

/// A dense, row-major matrix over reference-counted storage.
///
/// `Matrix` is an owning handle over a [`MatStorage`] buffer plus its shape:
/// `rows`, `cols`, a `row_stride` (elements between starts of consecutive
/// rows; may exceed `cols` for padded or windowed matrices) and a row
/// capacity used by the amortized append path.
///
/// # Copy-on-write
///
/// `Clone` is O(1) and shares the buffer. Every mutating operation first
/// *detaches*: when the buffer is shared (any other handle, window or clone
/// holds a reference) the buffer is deep-copied before the write, so handles
/// never observe each other's mutations.
///
/// # Layout
///
/// Element `(r, c)` lives at offset `r * row_stride + c` of the storage view.
/// Padding between rows and the capacity tail are always initialized, so safe
/// slices can be formed over the whole addressable region.
///
/// # Examples
///
/// ```
/// use denmat_core::Matrix;
///
/// let a = Matrix::<f64>::from_rows(&[[1.0, 2.0], [3.0, 4.0]]);
/// let mut b = a.clone(); // shares storage
/// b.set(0, 0, 9.0).unwrap(); // detaches; `a` is unchanged
/// assert_eq!(a[(0, 0)], 1.0);
/// assert_eq!(b[(0, 0)], 9.0);
/// ```
pub struct Matrix<T> {
    pub(crate) storage: MatStorage<T>,
    pub(crate) rows: usize,
    pub(crate) cols: usize,
    pub(crate) row_stride: usize,
    pub(crate) capacity_rows: usize,
}

impl<T> Matrix<T> {
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

    /// Elements between the starts of consecutive rows.
    #[inline]
    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// Number of rows the buffer can hold before reallocating.
    #[inline]
    pub fn capacity_rows(&self) -> usize {
        self.capacity_rows
    }

    /// Total number of logical elements (`rows * cols`).
    #[inline]
    pub fn numel(&self) -> usize {
        self.rows * self.cols
    }

    /// Returns true if either dimension is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Returns true if rows are stored back to back with no padding.
    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.row_stride == self.cols || self.rows <= 1
    }

    /// Returns true if no other handle shares this buffer.
    #[inline]
    pub fn is_unique(&self) -> bool {
        self.storage.is_unique()
    }

    /// Number of handles sharing this buffer (including this one).
    #[inline]
    pub fn ref_count(&self) -> usize {
        self.storage.ref_count()
    }

    /// How the underlying memory is owned.
    pub fn ownership(&self) -> StorageOwnership {
        self.storage.ownership()
    }

    /// Pointer to the first element. Used by tests observing reallocation.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.storage.as_ptr()
    }

    /// The addressable storage region (rows, padding and capacity tail) as a
    /// slice. Element `(r, c)` is at index `r * row_stride + c`.
    #[inline]
    pub fn as_strided_slice(&self) -> &[T] {
        self.storage.as_slice()
    }

    /// Row `i` as a contiguous slice of `cols` elements.
    ///
    /// # Panics
    ///
    /// Panics if `i >= rows`.
    #[inline]
    pub fn row(&self, i: usize) -> &[T] {
        assert!(i < self.rows, "row {i} out of bounds for {} rows", self.rows);
        let start = i * self.row_stride;
        &self.storage.as_slice()[start..start + self.cols]
    }

    /// Checked element access.
    #[inline]
    pub fn get(&self, r: usize, c: usize) -> Option<&T> {
        if r < self.rows && c < self.cols {
            Some(&self.storage.as_slice()[r * self.row_stride + c])
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
    pub unsafe fn get_unchecked(&self, r: usize, c: usize) -> &T {
        debug_assert!(r < self.rows && c < self.cols);
        self.storage
            .as_slice()
            .get_unchecked(r * self.row_stride + c)
    }

    /// Random-access row-major iterator over all elements, striding across
    /// padded rows in O(1) per step.
    pub fn iter(&self) -> ElemIter<'_, T> {
        ElemIter::new(self.storage.as_slice(), self.rows, self.cols, self.row_stride)
    }

    /// Iterator over the rows as contiguous slices.
    pub fn rows_iter(&self) -> RowsIter<'_, T> {
        RowsIter::new(self.storage.as_slice(), self.rows, self.cols, self.row_stride)
    }

    /// Fixed-stride iterator over column `j`.
    ///
    /// # Panics
    ///
    /// Panics if `j >= cols`.
    pub fn col_iter(&self, j: usize) -> ColIter<'_, T> {
        assert!(j < self.cols, "column {j} out of bounds for {} cols", self.cols);
        ColIter::new(self.storage.as_slice(), j, self.rows, self.row_stride)
    }

    /// A borrowed view of the whole matrix.
    pub fn view(&self) -> MatrixView<'_, T> {
        MatrixView::new(self.storage.as_slice(), self.rows, self.cols, self.row_stride, 1)
    }

    /// A borrowed view of the region starting at `(r, c)` spanning
    /// `rows × cols`.
    pub fn view_at(
        &self,
        r: usize,
        c: usize,
        rows: usize,
        cols: usize,
    ) -> Result<MatrixView<'_, T>, MatrixError> {
        if r + rows > self.rows || c + cols > self.cols {
            return Err(MatrixError::WindowOutOfRange {
                row: r as isize,
                col: c as isize,
                rows: rows as isize,
                cols: cols as isize,
            });
        }
        if rows == 0 || cols == 0 {
            return Ok(MatrixView::new(&[], rows, cols, self.row_stride, 1));
        }
        let offset = r * self.row_stride + c;
        let span = (rows - 1) * self.row_stride + cols;
        let base = self.storage.as_slice();
        Ok(MatrixView::new(
            &base[offset..offset + span],
            rows,
            cols,
            self.row_stride,
            1,
        ))
    }

    /// Transposed view: rows and columns swap roles without copying, so row
    /// iteration of the transpose walks a column of `self`.
    pub fn transpose(&self) -> MatrixView<'_, T> {
        self.view().transpose()
    }

    /// Filtered view exposing the elements whose mask entry is `true`.
    ///
    /// Iteration is forward-only; the selected element count is computed
    /// lazily on first query and cached for the view's lifetime.
    pub fn masked<'a>(&'a self, mask: &'a Matrix<bool>) -> Result<Masked<'a, T>, MatrixError> {
        Masked::new(self, mask)
    }
}

impl<T: Clone> Matrix<T> {
    /// A mutable borrowed view of the whole matrix. Detaches first.
    pub fn view_mut(&mut self) -> crate::view::MatrixViewMut<'_, T> {
        self.detach();
        let (rows, cols, stride) = (self.rows, self.cols, self.row_stride);
        crate::view::MatrixViewMut::new(self.storage.as_mut_slice(), rows, cols, stride, 1)
    }

    /// Creates a `rows × cols` matrix with every element a clone of `value`.
    pub fn from_shape_val(rows: usize, cols: usize, value: T) -> Self {
        Self {
            storage: MatStorage::alloc_filled(rows * cols, value),
            rows,
            cols,
            row_stride: cols,
            capacity_rows: rows,
        }
    }

    /// Creates a matrix from a row-major vector of `rows * cols` elements.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, MatrixError> {
        if data.len() != rows * cols {
            return Err(MatrixError::invalid_shape(rows * cols, data.len()));
        }
        Ok(Self {
            storage: MatStorage::from_vec(data),
            rows,
            cols,
            row_stride: cols,
            capacity_rows: rows,
        })
    }

    /// Creates a matrix from fixed-size rows.
    ///
    /// # Examples
    ///
    /// ```
    /// use denmat_core::Matrix;
    /// let m = Matrix::from_rows(&[[1, 2, 3], [4, 5, 6]]);
    /// assert_eq!(m.shape(), (2, 3));
    /// assert_eq!(m[(1, 2)], 6);
    /// ```
    pub fn from_rows<const N: usize>(rows: &[[T; N]]) -> Self {
        let mut data = Vec::with_capacity(rows.len() * N);
        for row in rows {
            data.extend_from_slice(row);
        }
        Self {
            storage: MatStorage::from_vec(data),
            rows: rows.len(),
            cols: N,
            row_stride: N,
            capacity_rows: rows.len(),
        }
    }

    /// Wraps caller memory of `rows * cols` contiguous elements.
    ///
    /// With [`StorageOwnership::ExternalBorrowed`] the matrix never frees the
    /// memory and never writes through it either: the first mutation detaches
    /// into owned storage even when no other handle exists, so the borrowed
    /// memory may be read-only. With [`StorageOwnership::ExternalOwned`] the
    /// matrix frees the memory on final drop and mutates it in place while
    /// the handle is unique.
    ///
    /// # Safety
    ///
    /// See [`MatStorage::from_raw_parts`].
    pub unsafe fn from_raw_parts(
        rows: usize,
        cols: usize,
        ptr: *const T,
        ownership: StorageOwnership,
    ) -> Result<Self, MatrixError> {
        let storage = MatStorage::from_raw_parts(ptr, rows * cols, ownership)?;
        Ok(Self {
            storage,
            rows,
            cols,
            row_stride: cols,
            capacity_rows: rows,
        })
    }

    /// Detaches this handle from shared storage: if any other handle
    /// references the buffer, or the buffer wraps borrowed external memory
    /// (which may be read-only), deep-copies the addressable region so
    /// subsequent writes touch only owned memory.
    ///
    /// Called automatically by every mutating operation.
    pub fn detach(&mut self) {
        if !self.is_writable_in_place() {
            self.storage = self.storage.detach_clone();
        }
    }

    /// True when writes may go through the buffer directly: unique and not
    /// borrowed (possibly read-only) external memory.
    fn is_writable_in_place(&self) -> bool {
        self.storage.is_unique()
            && self.storage.ownership() != StorageOwnership::ExternalBorrowed
    }

    /// Row `i` as a mutable contiguous slice. Detaches first.
    ///
    /// # Panics
    ///
    /// Panics if `i >= rows`.
    pub fn row_mut(&mut self, i: usize) -> &mut [T] {
        assert!(i < self.rows, "row {i} out of bounds for {} rows", self.rows);
        self.detach();
        let start = i * self.row_stride;
        let cols = self.cols;
        &mut self.storage.as_mut_slice()[start..start + cols]
    }

    /// Checked mutable element access. Detaches first.
    pub fn get_mut(&mut self, r: usize, c: usize) -> Option<&mut T> {
        if r < self.rows && c < self.cols {
            self.detach();
            let idx = r * self.row_stride + c;
            Some(&mut self.storage.as_mut_slice()[idx])
        } else {
            None
        }
    }

    /// Sets element `(r, c)`. Detaches first; the bounds check happens
    /// before any mutation.
    pub fn set(&mut self, r: usize, c: usize, value: T) -> Result<(), MatrixError> {
        if r >= self.rows || c >= self.cols {
            return Err(MatrixError::index_out_of_bounds(r, c, self.rows, self.cols));
        }
        self.detach();
        let idx = r * self.row_stride + c;
        self.storage.as_mut_slice()[idx] = value;
        Ok(())
    }

    /// Overwrites every logical element with a clone of `value`.
    pub fn fill(&mut self, value: T) {
        self.detach();
        let (rows, cols, stride) = (self.rows, self.cols, self.row_stride);
        let region = self.storage.as_mut_slice();
        for r in 0..rows {
            for x in &mut region[r * stride..r * stride + cols] {
                *x = value.clone();
            }
        }
    }

    /// The addressable storage region as a mutable slice. Detaches first.
    ///
    /// Element `(r, c)` is at index `r * row_stride + c`; slots between
    /// `cols` and `row_stride` are padding.
    pub fn as_strided_slice_mut(&mut self) -> &mut [T] {
        self.detach();
        self.storage.as_mut_slice()
    }

    /// Copies the logical elements into a compact row-major vector.
    pub fn to_vec(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.numel());
        for r in 0..self.rows {
            out.extend_from_slice(self.row(r));
        }
        out
    }

    /// Returns a compact (unpadded, unshared) copy of this matrix.
    pub fn to_contiguous(&self) -> Self {
        Self {
            storage: MatStorage::from_vec(self.to_vec()),
            rows: self.rows,
            cols: self.cols,
            row_stride: self.cols,
            capacity_rows: self.rows,
        }
    }

    /// Applies `f` to each element, producing a new compact matrix.
    pub fn map<U, F>(&self, f: F) -> Matrix<U>
    where
        F: Fn(&T) -> U,
    {
        let mut data = Vec::with_capacity(self.numel());
        for r in 0..self.rows {
            data.extend(self.row(r).iter().map(&f));
        }
        Matrix {
            storage: MatStorage::from_vec(data),
            rows: self.rows,
            cols: self.cols,
            row_stride: self.cols,
            capacity_rows: self.rows,
        }
    }

    /// Deep cast-copy into a differently-typed matrix, converting each
    /// element into a freshly allocated buffer.
    pub fn cast<U: From<T>>(&self) -> Matrix<U> {
        self.map(|x| U::from(x.clone()))
    }

    /// Submatrix window sharing storage with this matrix.
    ///
    /// Negative `r`/`c` count from the end (`r + rows` for `r < 0`).
    /// Negative `rows`/`cols` mean "up to the nth-from-last row/column":
    /// `rows + self.rows() - r + 1` for `rows < 0` (after `r` has been
    /// normalized), and likewise for columns.
    ///
    /// For `M = [[1,2,3],[4,5,6],[7,8,9]]`, `M.window(0, 1, 1, 2)` selects
    /// `[[2, 3]]` and `M.window(-2, -2, -1, 1)` selects `[[5], [8]]`.
    ///
    /// The window pins the parent buffer via its reference count; mutating
    /// either handle detaches it, so the other keeps its values.
    pub fn window(
        &self,
        r: isize,
        c: isize,
        rows: isize,
        cols: isize,
    ) -> Result<Self, MatrixError> {
        let oob = MatrixError::WindowOutOfRange { row: r, col: c, rows, cols };

        let mut wr = r;
        if wr < 0 {
            wr += self.rows as isize;
        }
        let mut wc = c;
        if wc < 0 {
            wc += self.cols as isize;
        }
        if wr < 0 || wc < 0 {
            return Err(oob);
        }
        let mut nr = rows;
        if nr < 0 {
            nr += self.rows as isize - wr + 1;
        }
        let mut nc = cols;
        if nc < 0 {
            nc += self.cols as isize - wc + 1;
        }
        if nr < 0 || nc < 0 {
            return Err(oob);
        }
        let (wr, wc, nr, nc) = (wr as usize, wc as usize, nr as usize, nc as usize);
        if wr + nr > self.rows || wc + nc > self.cols {
            return Err(oob);
        }

        // a zero-sized window addresses nothing; its offset would otherwise
        // land past the buffer for corner requests like (rows, cols, 0, 0)
        let (offset, span) = if nr == 0 || nc == 0 {
            (0, 0)
        } else {
            (wr * self.row_stride + wc, (nr - 1) * self.row_stride + nc)
        };
        Ok(Self {
            storage: self.storage.view(offset, span)?,
            rows: nr,
            cols: nc,
            row_stride: self.row_stride,
            capacity_rows: nr,
        })
    }
}

impl<T: Clone + Default> Matrix<T> {
    /// Makes sure the buffer is unique and can hold `min_cap` rows,
    /// growing capacity geometrically (×2) when it must reallocate.
    fn ensure_row_capacity(&mut self, min_cap: usize) {
        if self.is_writable_in_place() && min_cap <= self.capacity_rows {
            return;
        }
        let stride = self.row_stride;
        let new_cap = if min_cap > self.capacity_rows {
            min_cap.max(self.capacity_rows.saturating_mul(2)).max(4)
        } else {
            self.capacity_rows
        };
        if min_cap > self.capacity_rows && self.storage.grow(new_cap * stride, T::default()) {
            self.capacity_rows = new_cap;
            return;
        }
        let mut data = vec![T::default(); new_cap * stride];
        for r in 0..self.rows {
            data[r * stride..r * stride + self.cols].clone_from_slice(self.row(r));
        }
        self.storage = MatStorage::from_vec(data);
        self.capacity_rows = new_cap;
    }

    /// Reserves capacity for at least `additional` more rows.
    pub fn reserve_rows(&mut self, additional: usize) {
        self.ensure_row_capacity(self.rows + additional);
    }

    /// Resizes to `rows × cols`, preserving the overlapping region and
    /// filling newly added cells with `T::default()`.
    ///
    /// Reallocates only when the capacity or stride is insufficient or the
    /// buffer is shared.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        let in_place = self.is_writable_in_place()
            && cols <= self.row_stride
            && (rows == 0 || (rows - 1) * self.row_stride + cols <= self.storage.len());
        if in_place {
            let (old_rows, old_cols, stride) = (self.rows, self.cols, self.row_stride);
            let region = self.storage.as_mut_slice();
            // wipe cells that enter the logical shape
            for r in 0..rows.min(old_rows) {
                for x in &mut region[r * stride + old_cols.min(cols)..r * stride + cols] {
                    *x = T::default();
                }
            }
            for r in old_rows..rows {
                for x in &mut region[r * stride..r * stride + cols] {
                    *x = T::default();
                }
            }
            self.rows = rows;
            self.cols = cols;
            self.capacity_rows = self.capacity_rows.max(rows);
            return;
        }

        let mut data = vec![T::default(); rows * cols];
        for r in 0..rows.min(self.rows) {
            let src = self.row(r);
            let keep = cols.min(self.cols);
            data[r * cols..r * cols + keep].clone_from_slice(&src[..keep]);
        }
        self.storage = MatStorage::from_vec(data);
        self.rows = rows;
        self.cols = cols;
        self.row_stride = cols;
        self.capacity_rows = rows;
    }

    /// Appends a row, amortized O(1) through geometric capacity growth.
    pub fn push_row(&mut self, row: &[T]) -> Result<(), MatrixError> {
        if self.rows == 0 && self.cols == 0 {
            self.cols = row.len();
            self.row_stride = row.len();
        }
        if row.len() != self.cols {
            return Err(MatrixError::dimension_mismatch(
                "Appended row must match column count",
                (1, self.cols),
                (1, row.len()),
            ));
        }
        self.ensure_row_capacity(self.rows + 1);
        let (r, cols, stride) = (self.rows, self.cols, self.row_stride);
        self.storage.as_mut_slice()[r * stride..r * stride + cols].clone_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    /// Inserts a row before index `idx`, shifting later rows down. O(n).
    pub fn insert_row(&mut self, idx: usize, row: &[T]) -> Result<(), MatrixError> {
        if idx > self.rows {
            return Err(MatrixError::index_out_of_bounds(idx, 0, self.rows, self.cols));
        }
        if self.rows == 0 && self.cols == 0 {
            self.cols = row.len();
            self.row_stride = row.len();
        }
        if row.len() != self.cols {
            return Err(MatrixError::dimension_mismatch(
                "Inserted row must match column count",
                (1, self.cols),
                (1, row.len()),
            ));
        }
        self.ensure_row_capacity(self.rows + 1);
        let (rows, cols, stride) = (self.rows, self.cols, self.row_stride);
        let region = self.storage.as_mut_slice();
        region[idx * stride..(rows + 1) * stride].rotate_right(stride);
        region[idx * stride..idx * stride + cols].clone_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    /// Removes row `idx`, shifting later rows up. O(n). Capacity is kept.
    pub fn remove_row(&mut self, idx: usize) -> Result<(), MatrixError> {
        if idx >= self.rows {
            return Err(MatrixError::index_out_of_bounds(idx, 0, self.rows, self.cols));
        }
        self.detach();
        let (rows, stride) = (self.rows, self.row_stride);
        self.storage.as_mut_slice()[idx * stride..rows * stride].rotate_left(stride);
        self.rows -= 1;
        Ok(())
    }

    /// Appends a column on the right.
    pub fn push_col(&mut self, col: &[T]) -> Result<(), MatrixError> {
        let at = self.cols;
        self.insert_col(at, col)
    }

    /// Inserts a column before index `idx`, shifting later columns right.
    ///
    /// Reuses stride padding in place when the buffer has slack and is
    /// unshared; otherwise rebuilds with a one-element wider stride.
    pub fn insert_col(&mut self, idx: usize, col: &[T]) -> Result<(), MatrixError> {
        if idx > self.cols {
            return Err(MatrixError::index_out_of_bounds(0, idx, self.rows, self.cols));
        }
        if self.rows == 0 && self.cols == 0 {
            self.rows = col.len();
            self.capacity_rows = col.len();
        }
        if col.len() != self.rows {
            return Err(MatrixError::dimension_mismatch(
                "Inserted column must match row count",
                (self.rows, 1),
                (col.len(), 1),
            ));
        }

        let slack = self.cols < self.row_stride
            && (self.rows == 0
                || (self.rows - 1) * self.row_stride + self.cols + 1 <= self.storage.len());
        if self.is_writable_in_place() && slack {
            let (cols, stride) = (self.cols, self.row_stride);
            let region = self.storage.as_mut_slice();
            for (r, value) in col.iter().enumerate() {
                let base = r * stride;
                region[base + idx..base + cols + 1].rotate_right(1);
                region[base + idx] = value.clone();
            }
            self.cols += 1;
            return Ok(());
        }

        let new_cols = self.cols + 1;
        let mut data = vec![T::default(); self.rows * new_cols];
        for r in 0..self.rows {
            let src = self.row(r);
            let dst = &mut data[r * new_cols..(r + 1) * new_cols];
            dst[..idx].clone_from_slice(&src[..idx]);
            dst[idx] = col[r].clone();
            dst[idx + 1..].clone_from_slice(&src[idx..]);
        }
        self.storage = MatStorage::from_vec(data);
        self.cols = new_cols;
        self.row_stride = new_cols;
        self.capacity_rows = self.rows;
        Ok(())
    }

    /// Removes column `idx`, shifting later columns left in place. The
    /// stride is kept, which leaves one element of padding per row.
    pub fn remove_col(&mut self, idx: usize) -> Result<(), MatrixError> {
        if idx >= self.cols {
            return Err(MatrixError::index_out_of_bounds(0, idx, self.rows, self.cols));
        }
        self.detach();
        let (rows, cols, stride) = (self.rows, self.cols, self.row_stride);
        let region = self.storage.as_mut_slice();
        for r in 0..rows {
            let base = r * stride;
            region[base + idx..base + cols].rotate_left(1);
        }
        self.cols -= 1;
        Ok(())
    }
}

impl<T: num_traits::Zero + Clone> Matrix<T> {
    /// Creates a `rows × cols` matrix of zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::from_shape_val(rows, cols, T::zero())
    }
}

impl<T: num_traits::Zero + num_traits::One + Clone> Matrix<T> {
    /// Creates the `n × n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            let idx = i * m.row_stride + i;
            m.storage.as_mut_slice()[idx] = T::one();
        }
        m
    }
}

impl<T> Default for Matrix<T> {
    /// An empty `0 × 0` matrix with a zero-size exclusive buffer.
    fn default() -> Self {
        Self {
            storage: MatStorage::from_vec(Vec::new()),
            rows: 0,
            cols: 0,
            row_stride: 0,
            capacity_rows: 0,
        }
    }
}

impl<T> Clone for Matrix<T> {
    /// Shallow O(1) copy sharing the buffer; either handle detaches on its
    /// next mutation.
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            rows: self.rows,
            cols: self.cols,
            row_stride: self.row_stride,
            capacity_rows: self.capacity_rows,
        }
    }
}

impl<T> std::ops::Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    #[inline]
    fn index(&self, (r, c): (usize, usize)) -> &T {
        debug_assert!(r < self.rows && c < self.cols, "index ({r}, {c}) out of bounds");
        &self.storage.as_slice()[r * self.row_stride + c]
    }
}

impl<T: Clone> std::ops::IndexMut<(usize, usize)> for Matrix<T> {
    #[inline]
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut T {
        debug_assert!(r < self.rows && c < self.cols, "index ({r}, {c}) out of bounds");
        self.detach();
        let idx = r * self.row_stride + c;
        &mut self.storage.as_mut_slice()[idx]
    }
}

impl<T: PartialEq> PartialEq for Matrix<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.shape() != other.shape() {
            return false;
        }
        (0..self.rows).all(|r| self.row(r) == other.row(r))
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Matrix<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Matrix {}x{} (stride {})", self.rows, self.cols, self.row_stride)?;
        for r in 0..self.rows {
            writeln!(f, "  {:?}", self.row(r))?;
        }
        Ok(())
    }
}
