//! Wire field type definitions

use serde::{Deserialize, Serialize};

use super::WireValue;
use crate::Result;

/// Numeric encodings used by MAVLink payload fields.
/// All values are little-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// 8-bit signed integer
    Int8,
    /// 8-bit unsigned integer
    UInt8,
    /// 16-bit signed integer
    Int16,
    /// 16-bit unsigned integer
    UInt16,
    /// 32-bit signed integer
    Int32,
    /// 32-bit unsigned integer
    UInt32,
    /// IEEE-754 32-bit floating point
    Float32,
}

impl FieldType {
    /// Returns the size in bytes of this data type.
    pub const fn size(&self) -> usize {
        match self {
            FieldType::Int8 | FieldType::UInt8 => 1,
            FieldType::Int16 | FieldType::UInt16 => 2,
            FieldType::Int32 | FieldType::UInt32 | FieldType::Float32 => 4,
        }
    }

    /// Read a value of this type at `offset` and widen it to `f64`.
    ///
    /// Every supported type widens losslessly.
    pub fn read(&self, data: &[u8], offset: usize) -> Result<f64> {
        match self {
            FieldType::Int8 => i8::read_le(data, offset).map(f64::from),
            FieldType::UInt8 => u8::read_le(data, offset).map(f64::from),
            FieldType::Int16 => i16::read_le(data, offset).map(f64::from),
            FieldType::UInt16 => u16::read_le(data, offset).map(f64::from),
            FieldType::Int32 => i32::read_le(data, offset).map(f64::from),
            FieldType::UInt32 => u32::read_le(data, offset).map(f64::from),
            FieldType::Float32 => f32::read_le(data, offset).map(f64::from),
        }
    }
}
