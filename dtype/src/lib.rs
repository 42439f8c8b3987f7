//! Element data types carried by halyard tensors.
//!
//! A tensor stores a flat run of elements that all share one [`DataType`]. The tag travels with the
//! tensor so that shader-side consumers know how to interpret the bytes; the per-element byte width
//! is stored separately on the tensor and for the built-in element types matches [`DataType::bytes`].

pub mod ext;


pub use ext::HasDataType;

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::FromRepr, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DataType {
    #[strum(to_string = "bool")]
    Bool = 0,
    #[strum(to_string = "int")]
    Int = 1,
    #[strum(to_string = "uint")]
    UnsignedInt = 2,
    #[strum(to_string = "float")]
    Float = 3,
    #[strum(to_string = "double")]
    Double = 4,
}

impl DataType {
    /// Width in bytes of one element of this type as laid out in host memory.
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Bool => 1,
            Self::Int => 4,
            Self::UnsignedInt => 4,
            Self::Float => 4,
            Self::Double => 8,
        }
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::Double)
    }

    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int | Self::UnsignedInt)
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Name of the matching scalar type in GLSL compute shaders.
    pub const fn glsl_style(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UnsignedInt => "uint",
            Self::Float => "float",
            Self::Double => "double",
        }
    }
}
