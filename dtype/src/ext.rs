use super::*;

mod sealed {
    pub trait Sealed {}
}

/// Rust element types that can back a tensor.
///
/// The associated tag is what a tensor built from `&[Self]` reports as its data type, and
/// `size_of::<Self>()` is its per-element byte width. The trait is sealed: every implementor is a
/// padding-free primitive, which is what makes [`as_bytes`] sound.
pub trait HasDataType: sealed::Sealed + Copy + Default + PartialEq + std::fmt::Debug + 'static {
    const DATA_TYPE: DataType;

    /// Decode one element from the first `size_of::<Self>()` native-endian bytes.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than one element.
    fn from_ne_bytes(bytes: &[u8]) -> Self;
}

macro_rules! impl_data_type_ext {
    ($($ty:ty => $dtype:expr),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl HasDataType for $ty {
                const DATA_TYPE: DataType = $dtype;

                fn from_ne_bytes(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..size_of::<$ty>()]);
                    <$ty>::from_ne_bytes(raw)
                }
            }
        )*
    };
}

impl_data_type_ext! {
    i32 => DataType::Int,
    u32 => DataType::UnsignedInt,
    f32 => DataType::Float,
    f64 => DataType::Double,
}

impl sealed::Sealed for bool {}

impl HasDataType for bool {
    const DATA_TYPE: DataType = DataType::Bool;

    // Any non-zero byte reads as `true`, so arbitrary tensor bytes never produce an invalid bool.
    fn from_ne_bytes(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// View a slice of elements as its underlying bytes.
pub fn as_bytes<T: HasDataType>(values: &[T]) -> &[u8] {
    // SAFETY: implementors are sealed primitives without padding, so every byte is initialized.
    unsafe { std::slice::from_raw_parts(values.as_ptr().cast::<u8>(), size_of_val(values)) }
}

/// Decode a byte run into elements. Trailing bytes that do not fill a whole element are ignored.
pub fn from_bytes<T: HasDataType>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(size_of::<T>()).map(T::from_ne_bytes).collect()
}
