//! Flag sets describing buffer usage, memory placement and synchronization scopes.
//!
//! Each flag is an [`enumset`] variant; combine them with `|` to get the matching `*Flags` set,
//! e.g. `BufferUsage::TransferSrc | BufferUsage::TransferDst`.

use enumset::{EnumSet, EnumSetType};

/// How a buffer may be used by recorded commands and shaders.
#[derive(Debug, Hash, PartialOrd, Ord, EnumSetType)]
pub enum BufferUsage {
    TransferSrc,
    TransferDst,
    UniformBuffer,
    StorageBuffer,
}

/// Properties of a memory type.
#[derive(Debug, Hash, PartialOrd, Ord, EnumSetType)]
pub enum MemoryProperty {
    /// Fastest for device access, not reachable from the host.
    DeviceLocal,
    /// Can be mapped into host address space.
    HostVisible,
    /// Host writes are visible to the device without explicit flushes.
    HostCoherent,
    HostCached,
}

/// Memory access kinds used to scope a barrier.
#[derive(Debug, Hash, PartialOrd, Ord, EnumSetType)]
pub enum Access {
    TransferRead,
    TransferWrite,
    ShaderRead,
    ShaderWrite,
    HostRead,
    HostWrite,
}

/// Pipeline stages used to scope a barrier.
#[derive(Debug, Hash, PartialOrd, Ord, EnumSetType)]
pub enum PipelineStage {
    TopOfPipe,
    Transfer,
    ComputeShader,
    Host,
    BottomOfPipe,
}

pub type BufferUsageFlags = EnumSet<BufferUsage>;
pub type MemoryPropertyFlags = EnumSet<MemoryProperty>;
pub type AccessFlags = EnumSet<Access>;
pub type PipelineStageFlags = EnumSet<PipelineStage>;

/// Properties required for memory the host writes into and the device reads from.
pub const HOST_STAGING: MemoryPropertyFlags =
    enumset::enum_set!(MemoryProperty::HostVisible | MemoryProperty::HostCoherent);
