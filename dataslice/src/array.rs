//! Realized arrays with a dynamic element type
//!
//! A slice read produces an [`ndarray`] array whose element type is only
//! known at runtime from the file header; [`DynamicArray`] carries one
//! typed array per supported element type, in the same way the storage
//! layer dispatches on the header's data-type tag.

use dataslice_core::{CoreError, DataType};
use ndarray::{ArrayD, IxDyn};

use crate::error::Result;

/// Apply an expression to the typed array inside any variant
macro_rules! with_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            DynamicArray::I8($arr) => $body,
            DynamicArray::I16($arr) => $body,
            DynamicArray::I32($arr) => $body,
            DynamicArray::I64($arr) => $body,
            DynamicArray::U8($arr) => $body,
            DynamicArray::U16($arr) => $body,
            DynamicArray::U32($arr) => $body,
            DynamicArray::U64($arr) => $body,
            DynamicArray::F32($arr) => $body,
            DynamicArray::F64($arr) => $body,
        }
    };
}

/// Realized n-dimensional array holding any supported element type
#[derive(Debug, Clone, PartialEq)]
pub enum DynamicArray {
    I8(ArrayD<i8>),
    I16(ArrayD<i16>),
    I32(ArrayD<i32>),
    I64(ArrayD<i64>),
    U8(ArrayD<u8>),
    U16(ArrayD<u16>),
    U32(ArrayD<u32>),
    U64(ArrayD<u64>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

impl DynamicArray {
    /// The element type of this array
    pub fn data_type(&self) -> DataType {
        match self {
            DynamicArray::I8(_) => DataType::I8,
            DynamicArray::I16(_) => DataType::I16,
            DynamicArray::I32(_) => DataType::I32,
            DynamicArray::I64(_) => DataType::I64,
            DynamicArray::U8(_) => DataType::U8,
            DynamicArray::U16(_) => DataType::U16,
            DynamicArray::U32(_) => DataType::U32,
            DynamicArray::U64(_) => DataType::U64,
            DynamicArray::F32(_) => DataType::F32,
            DynamicArray::F64(_) => DataType::F64,
        }
    }

    /// Axis extents
    pub fn shape(&self) -> &[usize] {
        with_array!(self, arr => arr.shape())
    }

    /// Number of axes
    pub fn ndim(&self) -> usize {
        with_array!(self, arr => arr.ndim())
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        with_array!(self, arr => arr.len())
    }

    /// Whether the array holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the element data in bytes
    pub fn byte_len(&self) -> usize {
        self.len() * self.data_type().size_bytes()
    }

    /// Reshape to `shape` without changing the element order.
    ///
    /// The element count must match; used to present a physical read
    /// under its logical shape.
    pub fn into_shape(self, shape: &[usize]) -> Result<Self> {
        let reshape = IxDyn(shape);
        Ok(match self {
            DynamicArray::I8(arr) => {
                DynamicArray::I8(arr.into_shape(reshape).map_err(|_| CoreError::ShapeMismatch)?)
            }
            DynamicArray::I16(arr) => {
                DynamicArray::I16(arr.into_shape(reshape).map_err(|_| CoreError::ShapeMismatch)?)
            }
            DynamicArray::I32(arr) => {
                DynamicArray::I32(arr.into_shape(reshape).map_err(|_| CoreError::ShapeMismatch)?)
            }
            DynamicArray::I64(arr) => {
                DynamicArray::I64(arr.into_shape(reshape).map_err(|_| CoreError::ShapeMismatch)?)
            }
            DynamicArray::U8(arr) => {
                DynamicArray::U8(arr.into_shape(reshape).map_err(|_| CoreError::ShapeMismatch)?)
            }
            DynamicArray::U16(arr) => {
                DynamicArray::U16(arr.into_shape(reshape).map_err(|_| CoreError::ShapeMismatch)?)
            }
            DynamicArray::U32(arr) => {
                DynamicArray::U32(arr.into_shape(reshape).map_err(|_| CoreError::ShapeMismatch)?)
            }
            DynamicArray::U64(arr) => {
                DynamicArray::U64(arr.into_shape(reshape).map_err(|_| CoreError::ShapeMismatch)?)
            }
            DynamicArray::F32(arr) => {
                DynamicArray::F32(arr.into_shape(reshape).map_err(|_| CoreError::ShapeMismatch)?)
            }
            DynamicArray::F64(arr) => {
                DynamicArray::F64(arr.into_shape(reshape).map_err(|_| CoreError::ShapeMismatch)?)
            }
        })
    }

    /// Reinterpret signed integer elements as the unsigned type of the
    /// same width, bit-exactly. Unsigned and float arrays are returned
    /// unchanged.
    pub fn extend_unsigned(self) -> Self {
        match self {
            DynamicArray::I8(arr) => DynamicArray::U8(arr.mapv(|v| v as u8)),
            DynamicArray::I16(arr) => DynamicArray::U16(arr.mapv(|v| v as u16)),
            DynamicArray::I32(arr) => DynamicArray::U32(arr.mapv(|v| v as u32)),
            DynamicArray::I64(arr) => DynamicArray::U64(arr.mapv(|v| v as u64)),
            other => other,
        }
    }

    /// Element at `index` widened to f64, for inspection and tests
    pub fn get_f64(&self, index: &[usize]) -> Option<f64> {
        match self {
            DynamicArray::I8(arr) => arr.get(index).map(|&v| v as f64),
            DynamicArray::I16(arr) => arr.get(index).map(|&v| v as f64),
            DynamicArray::I32(arr) => arr.get(index).map(|&v| v as f64),
            DynamicArray::I64(arr) => arr.get(index).map(|&v| v as f64),
            DynamicArray::U8(arr) => arr.get(index).map(|&v| v as f64),
            DynamicArray::U16(arr) => arr.get(index).map(|&v| v as f64),
            DynamicArray::U32(arr) => arr.get(index).map(|&v| v as f64),
            DynamicArray::U64(arr) => arr.get(index).map(|&v| v as f64),
            DynamicArray::F32(arr) => arr.get(index).map(|&v| v as f64),
            DynamicArray::F64(arr) => arr.get(index).copied(),
        }
    }
}

/// Conversions from typed arrays
macro_rules! impl_from_array {
    ($elem:ty, $variant:ident) => {
        impl From<ArrayD<$elem>> for DynamicArray {
            fn from(arr: ArrayD<$elem>) -> Self {
                DynamicArray::$variant(arr)
            }
        }
    };
}

impl_from_array!(i8, I8);
impl_from_array!(i16, I16);
impl_from_array!(i32, I32);
impl_from_array!(i64, I64);
impl_from_array!(u8, U8);
impl_from_array!(u16, U16);
impl_from_array!(u32, U32);
impl_from_array!(u64, U64);
impl_from_array!(f32, F32);
impl_from_array!(f64, F64);

/// A realized slice result: the dataset name and its data
#[derive(Debug, Clone, PartialEq)]
pub struct RealizedDataset {
    name: String,
    data: DynamicArray,
}

impl RealizedDataset {
    /// Pair a dataset name with realized data
    pub fn new(name: impl Into<String>, data: DynamicArray) -> Self {
        RealizedDataset {
            name: name.into(),
            data,
        }
    }

    /// The dataset name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The realized data
    pub fn data(&self) -> &DynamicArray {
        &self.data
    }

    /// Consume into the realized data
    pub fn into_data(self) -> DynamicArray {
        self.data
    }

    /// Axis extents of the realized data
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Element type of the realized data
    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::ArrayD;

    #[test]
    fn test_dynamic_round_trip() {
        let arr = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0f64; 6]).unwrap();
        let dynamic = DynamicArray::from(arr);
        assert_eq!(dynamic.data_type(), DataType::F64);
        assert_eq!(dynamic.shape(), &[2, 3]);
        assert_eq!(dynamic.len(), 6);
        assert_eq!(dynamic.byte_len(), 48);
    }

    #[test]
    fn test_into_shape() {
        let arr = ArrayD::from_shape_vec(IxDyn(&[1, 4]), (0..4u32).collect()).unwrap();
        let reshaped = DynamicArray::from(arr).into_shape(&[4]).unwrap();
        assert_eq!(reshaped.shape(), &[4]);
        assert_eq!(reshaped.get_f64(&[3]), Some(3.0));
    }

    #[test]
    fn test_into_shape_count_mismatch() {
        let arr = ArrayD::from_shape_vec(IxDyn(&[4]), vec![0i16; 4]).unwrap();
        assert!(DynamicArray::from(arr).into_shape(&[5]).is_err());
    }

    #[test]
    fn test_extend_unsigned() {
        let arr = ArrayD::from_shape_vec(IxDyn(&[2]), vec![-1i16, 4]).unwrap();
        let extended = DynamicArray::from(arr).extend_unsigned();
        assert_eq!(extended.data_type(), DataType::U16);
        assert_eq!(extended.get_f64(&[0]), Some(65535.0));
        assert_eq!(extended.get_f64(&[1]), Some(4.0));
    }

    #[test]
    fn test_unsigned_left_alone() {
        let arr = ArrayD::from_shape_vec(IxDyn(&[1]), vec![7.5f32]).unwrap();
        let same = DynamicArray::from(arr).extend_unsigned();
        assert_eq!(same.data_type(), DataType::F32);
    }
}
