//! Raw binary persistence for matrices of plain scalar elements.
//!
//! The on-wire layout is a fixed header followed by the element payload:
//!
//! ```text
//! rows: i32 little-endian
//! cols: i32 little-endian
//! rows × (cols * size_of::<T>()) element bytes, row-major, little-endian
//! ```
//!
//! Stride padding is never written: a padded or windowed matrix serializes
//! to the same bytes as its compact copy. A `0 × 0` matrix is just the
//! eight-byte header.

use std::io::{Read, Write};

use crate::matrix::{Matrix, MatrixError};

mod private {
    pub trait Sealed {}
}

/// A plain fixed-width scalar with a defined little-endian byte encoding.
///
/// Sealed: implemented for the primitive integer and float types only, which
/// is what keeps the raw payload sound and portable.
pub trait RawScalar: private::Sealed + Copy + Default {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Writes the little-endian encoding into `buf[..WIDTH]`.
    fn encode_le(&self, buf: &mut [u8]);

    /// Decodes a value from the little-endian bytes in `buf[..WIDTH]`.
    fn decode_le(buf: &[u8]) -> Self;
}

macro_rules! impl_raw_scalar {
    ($($t:ty),* $(,)?) => {
        $(
            impl private::Sealed for $t {}

            impl RawScalar for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();

                #[inline]
                fn encode_le(&self, buf: &mut [u8]) {
                    buf[..Self::WIDTH].copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn decode_le(buf: &[u8]) -> Self {
                    let mut bytes = [0u8; std::mem::size_of::<$t>()];
                    bytes.copy_from_slice(&buf[..Self::WIDTH]);
                    <$t>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_raw_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl<T: RawScalar> Matrix<T> {
    /// Serializes the matrix into `writer` using the raw binary layout.
    pub fn write_into<W: Write>(&self, writer: &mut W) -> Result<(), MatrixError> {
        let rows = i32::try_from(self.rows()).map_err(|_| {
            MatrixError::invalid_shape(i32::MAX as usize, self.rows())
        })?;
        let cols = i32::try_from(self.cols()).map_err(|_| {
            MatrixError::invalid_shape(i32::MAX as usize, self.cols())
        })?;
        writer.write_all(&rows.to_le_bytes())?;
        writer.write_all(&cols.to_le_bytes())?;

        let mut row_buf = vec![0u8; self.cols() * T::WIDTH];
        for r in 0..self.rows() {
            for (value, chunk) in self.row(r).iter().zip(row_buf.chunks_exact_mut(T::WIDTH)) {
                value.encode_le(chunk);
            }
            writer.write_all(&row_buf)?;
        }
        Ok(())
    }

    /// Deserializes a matrix written by [`Matrix::write_into`].
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, MatrixError> {
        let mut header = [0u8; 4];
        reader.read_exact(&mut header)?;
        let rows = i32::from_le_bytes(header);
        reader.read_exact(&mut header)?;
        let cols = i32::from_le_bytes(header);
        if rows < 0 || cols < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("negative matrix dimensions {rows}x{cols}"),
            )
            .into());
        }
        let (rows, cols) = (rows as usize, cols as usize);

        let mut row_buf = vec![0u8; cols * T::WIDTH];
        let mut data = Vec::with_capacity(rows * cols);
        for _ in 0..rows {
            reader.read_exact(&mut row_buf)?;
            data.extend(row_buf.chunks_exact(T::WIDTH).map(T::decode_le));
        }
        Matrix::from_vec(rows, cols, data)
    }
}
