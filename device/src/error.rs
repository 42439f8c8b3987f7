use snafu::Snafu;

use crate::flags::{BufferUsage, MemoryPropertyFlags};
use crate::handle::{BufferHandle, MemoryHandle};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Heap backing the requested memory type cannot hold the allocation.
    #[snafu(display("out of device memory: requested {requested} bytes from heap {heap} with {available} available"))]
    OutOfDeviceMemory { heap: u32, requested: u64, available: u64 },

    #[snafu(display("no memory type in mask {type_bits:#b} supports {required:?}"))]
    NoSuitableMemoryType { type_bits: u32, required: MemoryPropertyFlags },

    #[snafu(display("memory type index {index} is out of range ({count} types)"))]
    MemoryTypeOutOfRange { index: u32, count: usize },

    #[snafu(display("unknown buffer handle {handle:?}"))]
    InvalidBuffer { handle: BufferHandle },

    #[snafu(display("unknown memory handle {handle:?}"))]
    InvalidMemory { handle: MemoryHandle },

    /// Buffer is used before any memory was bound to it.
    #[snafu(display("buffer {handle:?} has no memory bound"))]
    UnboundBuffer { handle: BufferHandle },

    #[snafu(display("buffer {handle:?} is already bound to memory"))]
    AlreadyBound { handle: BufferHandle },

    #[snafu(display("binding {size} bytes at offset {offset} exceeds allocation of {allocation_size} bytes"))]
    BindOutOfRange { offset: u64, size: u64, allocation_size: u64 },

    #[snafu(display("memory {handle:?} is not host visible"))]
    NotHostVisible { handle: MemoryHandle },

    #[snafu(display("memory {handle:?} is already mapped"))]
    AlreadyMapped { handle: MemoryHandle },

    #[snafu(display("mapping {size} bytes at offset {offset} exceeds allocation of {allocation_size} bytes"))]
    MapOutOfRange { offset: u64, size: u64, allocation_size: u64 },

    /// Buffer was created without a usage the recorded command needs.
    #[snafu(display("buffer {handle:?} was not created with {usage:?} usage"))]
    MissingUsage { handle: BufferHandle, usage: BufferUsage },

    #[snafu(display("copy of {size} bytes at offset {offset} exceeds buffer {handle:?} of {buffer_size} bytes"))]
    CopyOutOfRange { handle: BufferHandle, offset: u64, size: u64, buffer_size: u64 },

    #[snafu(display("zero-sized buffers and allocations are not allowed"))]
    ZeroSize,

    #[snafu(display("physical device index {index} is out of range ({count} devices)"))]
    PhysicalDeviceOutOfRange { index: usize, count: usize },

    #[snafu(display("queue family {family} is out of range ({count} families)"))]
    QueueFamilyOutOfRange { family: u32, count: usize },

    #[snafu(display("queue {index} is out of range for family {family} ({count} queues)"))]
    QueueIndexOutOfRange { family: u32, index: u32, count: u32 },

    #[snafu(display("extension {name} is not supported by the physical device"))]
    ExtensionNotPresent { name: String },

    /// Object was used after its owning device or instance was destroyed.
    #[snafu(display("device lost: {reason}"))]
    DeviceLost { reason: String },

    #[snafu(display("timestamp query {index} is out of range ({capacity} slots)"))]
    TimestampOutOfRange { index: u32, capacity: u32 },

    #[snafu(display("timed out after {timeout_ms}ms waiting for value {target} (current {current})"))]
    Timeout { timeout_ms: u64, target: u64, current: u64 },
}
