//! Error types for the resource manager and command sequences.

use halyard_dtype::DataType;
use snafu::Snafu;

/// Result type for runtime operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("device error: {source}"))]
    Device { source: halyard_device::Error },

    #[snafu(display("tensor error: {source}"))]
    Tensor { source: halyard_tensor::Error },

    #[snafu(display("physical device {index} requested but only {count} available"))]
    PhysicalDeviceOutOfRange { index: usize, count: usize },

    #[snafu(display("physical device has no compute-capable queue family"))]
    NoComputeQueue,

    #[snafu(display("queue index {index} is out of range ({count} queues created)"))]
    QueueIndexOutOfRange { index: u32, count: usize },

    /// Factory call on a manager after `destroy`.
    #[snafu(display("manager has been destroyed"))]
    ManagerDestroyed,

    #[snafu(display("sequence has been destroyed"))]
    SequenceDestroyed,

    /// Recording or submitting while a previous submission has not been awaited.
    #[snafu(display("sequence is still running"))]
    SequenceRunning,

    #[snafu(display("{requested} timestamps requested, at most {max} supported"))]
    TooManyTimestamps { requested: u32, max: u32 },

    #[snafu(display("sequence was created without timestamps"))]
    TimestampsDisabled,

    /// Dispatch of an algorithm that has no shader or no tensors to bind.
    #[snafu(display("algorithm has no shader or no tensors"))]
    EmptyAlgorithm,

    #[snafu(display("{operation} needs at least {required} tensors, got {actual}"))]
    TooFewTensors { operation: &'static str, required: usize, actual: usize },

    #[snafu(display("{operation} mixes {expected} and {actual} tensors"))]
    TensorDataTypeMismatch { operation: &'static str, expected: DataType, actual: DataType },
}
