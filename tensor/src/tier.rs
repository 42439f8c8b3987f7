//! Memory placement classes.

use halyard_device::flags::HOST_STAGING;
use halyard_device::{BufferUsage, BufferUsageFlags, MemoryProperty, MemoryPropertyFlags};

/// Where a tensor's memory lives and how data reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(strum::Display, strum::EnumIter, strum::VariantArray)]
pub enum TensorTier {
    /// Device-local primary memory, written and read back through a host-visible staging buffer.
    #[default]
    #[strum(to_string = "device")]
    Device,
    /// Host-visible primary memory mapped directly; no staging buffer.
    #[strum(to_string = "host")]
    Host,
    /// Device-local memory only usable by shaders; never mapped and never a transfer endpoint.
    #[strum(to_string = "storage")]
    Storage,
}

impl TensorTier {
    pub fn primary_usage(self) -> BufferUsageFlags {
        match self {
            Self::Device => BufferUsage::StorageBuffer | BufferUsage::TransferSrc | BufferUsage::TransferDst,
            Self::Host => {
                BufferUsage::StorageBuffer
                    | BufferUsage::UniformBuffer
                    | BufferUsage::TransferSrc
                    | BufferUsage::TransferDst
            }
            Self::Storage => BufferUsage::StorageBuffer.into(),
        }
    }

    pub fn primary_memory(self) -> MemoryPropertyFlags {
        match self {
            Self::Device | Self::Storage => MemoryProperty::DeviceLocal.into(),
            Self::Host => HOST_STAGING,
        }
    }

    pub fn staging_usage() -> BufferUsageFlags {
        BufferUsage::TransferSrc | BufferUsage::TransferDst
    }

    pub const fn has_staging(self) -> bool {
        matches!(self, Self::Device)
    }

    /// Whether host data reaches this tier through a mapping (staging for Device, primary for Host).
    pub const fn has_host_view(self) -> bool {
        !matches!(self, Self::Storage)
    }
}
