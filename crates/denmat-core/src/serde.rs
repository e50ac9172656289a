use crate::{storage::MatStorage, Matrix};

use serde::ser::SerializeStruct;
use serde::Deserialize;

impl<T> serde::Serialize for Matrix<T>
where
    T: serde::Serialize + Clone,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // compact row-major data; stride padding is not serialized
        let mut state = serializer.serialize_struct("Matrix", 3)?;
        state.serialize_field("rows", &self.rows())?;
        state.serialize_field("cols", &self.cols())?;
        state.serialize_field("data", &self.to_vec())?;
        state.end()
    }
}

impl<'de, T> serde::Deserialize<'de> for Matrix<T>
where
    T: serde::Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct MatrixData<T> {
            rows: usize,
            cols: usize,
            data: Vec<T>,
        }

        let MatrixData { rows, cols, data } = MatrixData::deserialize(deserializer)?;

        if data.len() != rows * cols {
            return Err(serde::de::Error::custom("Invalid shape"));
        }

        Ok(Matrix {
            storage: MatStorage::from_vec(data),
            rows,
            cols,
            row_stride: cols,
            capacity_rows: rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::Matrix;

    #[test]
    fn serde_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let m = Matrix::from_vec(2, 3, vec![1u8, 2, 3, 4, 5, 6])?;
        let serialized = serde_json::to_string(&m)?;
        let deserialized: Matrix<u8> = serde_json::from_str(&serialized)?;
        assert_eq!(m, deserialized);
        Ok(())
    }

    #[test]
    fn serde_compacts_padded_rows() -> Result<(), Box<dyn std::error::Error>> {
        let mut m = Matrix::from_vec(2, 3, vec![1i32, 9, 2, 3, 9, 4])?;
        m.remove_col(1)?;
        let serialized = serde_json::to_string(&m)?;
        let deserialized: Matrix<i32> = serde_json::from_str(&serialized)?;
        assert_eq!(deserialized.to_vec(), vec![1, 2, 3, 4]);
        assert!(deserialized.is_contiguous());
        Ok(())
    }

    #[test]
    fn serde_rejects_bad_shape() {
        let res: Result<Matrix<i32>, _> =
            serde_json::from_str(r#"{"rows":2,"cols":2,"data":[1,2,3]}"#);
        assert!(res.is_err());
    }
}
