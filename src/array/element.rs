//! Element data types.

use serde::{Deserialize, Serialize};

/// A data type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[rustfmt::skip]
pub enum DataType {
    /// `int8` Integer in `[-2^7, 2^7-1]`.
    Int8,
    /// `int16` Integer in `[-2^15, 2^15-1]`.
    Int16,
    /// `int32` Integer in `[-2^31, 2^31-1]`.
    Int32,
    /// `int64` Integer in `[-2^63, 2^63-1]`.
    Int64,
    /// `uint8` Integer in `[0, 2^8-1]`.
    UInt8,
    /// `uint16` Integer in `[0, 2^16-1]`.
    UInt16,
    /// `uint32` Integer in `[0, 2^32-1]`.
    UInt32,
    /// `uint64` Integer in `[0, 2^64-1]`.
    UInt64,
    /// `float32` IEEE 754 single-precision floating point.
    Float32,
    /// `float64` IEEE 754 double-precision floating point.
    Float64,
}

impl DataType {
    /// Returns the size in bytes of an element of this data type.
    #[must_use]
    pub const fn size(&self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }
}

/// A type that can be held in a cell.
///
/// Elements are plain old data, so cell buffers convert to and from native-endian bytes without copying element by element.
pub trait Element:
    bytemuck::Pod + Default + PartialEq + std::fmt::Debug + Send + Sync + 'static
{
    /// The data type of the element.
    const DATA_TYPE: DataType;
}

macro_rules! impl_element {
    ($t:ty, $data_type:expr) => {
        impl Element for $t {
            const DATA_TYPE: DataType = $data_type;
        }
    };
}

impl_element!(i8, DataType::Int8);
impl_element!(i16, DataType::Int16);
impl_element!(i32, DataType::Int32);
impl_element!(i64, DataType::Int64);
impl_element!(u8, DataType::UInt8);
impl_element!(u16, DataType::UInt16);
impl_element!(u32, DataType::UInt32);
impl_element!(u64, DataType::UInt64);
impl_element!(f32, DataType::Float32);
impl_element!(f64, DataType::Float64);

/// Convert native-endian `bytes` to elements.
///
/// Returns [`None`] if the length of `bytes` is not a multiple of the element size.
#[must_use]
pub fn elements_from_bytes<T: Element>(bytes: &[u8]) -> Option<Vec<T>> {
    if bytes.len() % std::mem::size_of::<T>() == 0 {
        Some(bytemuck::pod_collect_to_vec(bytes))
    } else {
        None
    }
}

/// Convert elements to native-endian bytes.
#[must_use]
pub fn elements_to_bytes<T: Element>(elements: &[T]) -> Vec<u8> {
    bytemuck::cast_slice(elements).to_vec()
}
