use halyard_dtype::DataType;
use snafu::Snafu;

use crate::TensorTier;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("device error: {source}"))]
    Device { source: halyard_device::Error },

    /// Supplied data does not cover the tensor's extent exactly.
    #[snafu(display("size mismatch: expected {expected}, got {actual}"))]
    SizeMismatch { expected: usize, actual: usize },

    #[snafu(display("{element_count} elements of {element_size} bytes overflow the address space"))]
    ExtentOverflow { element_count: usize, element_size: usize },

    #[snafu(display("tensor must have at least one element"))]
    EmptyTensor,

    #[snafu(display("index {index} is out of bounds for tensor of {len} elements"))]
    IndexOutOfBounds { index: usize, len: usize },

    #[snafu(display("tensor holds {expected} elements, requested {actual}"))]
    DataTypeMismatch { expected: DataType, actual: DataType },

    #[snafu(display("tensor elements are {expected} bytes wide, requested {actual}"))]
    ElementSizeMismatch { expected: usize, actual: usize },

    /// The tensor was destroyed or never finished allocating.
    #[snafu(display("tensor is not initialized"))]
    NotInitialized,

    #[snafu(display("{tier} tensors expose no host-visible memory"))]
    NoHostView { tier: TensorTier },
}
