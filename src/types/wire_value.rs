//! Little-endian scalar reads from raw byte buffers

use crate::{Result, TelemetryError};

/// Trait for scalars that can be read from a little-endian byte buffer.
pub trait WireValue: Sized {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Read this type from `data` at `offset`.
    ///
    /// Returns [`TelemetryError::Memory`] when the read would run past the
    /// end of `data`; never panics.
    fn read_le(data: &[u8], offset: usize) -> Result<Self>;
}

macro_rules! impl_wire_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WireValue for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn read_le(data: &[u8], offset: usize) -> Result<Self> {
                    let bytes = offset
                        .checked_add(Self::SIZE)
                        .and_then(|end| data.get(offset..end))
                        .ok_or(TelemetryError::Memory { offset, source: None })?;

                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    Ok(<$ty>::from_le_bytes(raw))
                }
            }
        )*
    };
}

impl_wire_value!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);
