//! Device context traits.
//!
//! These mirror the explicit-API object model: an [`Instance`] enumerates [`PhysicalDevice`]s,
//! a physical device creates a [`LogicalDevice`] with a set of queues, and the logical device
//! creates buffers and memory. Every object is shared through an `Arc` and carries no ownership
//! semantics of its own; callers decide who destroys what (see [`Owned`](crate::Owned)).

use std::ptr::NonNull;
use std::sync::Arc;

use crate::command::CommandBuffer;
use crate::error::Result;
use crate::flags::BufferUsageFlags;
use crate::handle::{BufferHandle, MemoryHandle};
use crate::memory::{MemoryProperties, MemoryRequirements};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalDeviceType {
    DiscreteGpu,
    IntegratedGpu,
    VirtualGpu,
    Cpu,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalDeviceProperties {
    pub name: String,
    pub device_type: PhysicalDeviceType,
    /// Nanoseconds per timestamp tick.
    pub timestamp_period: f32,
    pub max_push_constants_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyProperties {
    pub supports_compute: bool,
    pub supports_transfer: bool,
    pub queue_count: u32,
    pub supports_timestamps: bool,
}

pub trait Instance: Send + Sync + std::fmt::Debug {
    fn enumerate_physical_devices(&self) -> Result<Vec<Arc<dyn PhysicalDevice>>>;

    fn destroy(&self);

    fn is_destroyed(&self) -> bool;
}

pub trait PhysicalDevice: Send + Sync + std::fmt::Debug {
    fn properties(&self) -> PhysicalDeviceProperties;

    fn memory_properties(&self) -> MemoryProperties;

    fn queue_family_properties(&self) -> Vec<QueueFamilyProperties>;

    fn extension_properties(&self) -> Vec<String>;

    /// Create a logical device. `queue_counts` lists `(family, count)` pairs of queues to create.
    fn create_device(&self, queue_counts: &[(u32, u32)], extensions: &[String]) -> Result<Arc<dyn LogicalDevice>>;
}

pub trait LogicalDevice: Send + Sync + std::fmt::Debug {
    fn create_buffer(&self, size: u64, usage: BufferUsageFlags) -> Result<BufferHandle>;

    fn buffer_memory_requirements(&self, buffer: BufferHandle) -> Result<MemoryRequirements>;

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> Result<MemoryHandle>;

    fn bind_buffer_memory(&self, buffer: BufferHandle, memory: MemoryHandle, offset: u64) -> Result<()>;

    /// Map a host-visible allocation. The pointer stays valid until the memory is unmapped or freed.
    fn map_memory(&self, memory: MemoryHandle, offset: u64, size: u64) -> Result<NonNull<u8>>;

    fn unmap_memory(&self, memory: MemoryHandle);

    fn destroy_buffer(&self, buffer: BufferHandle);

    /// Free an allocation, implicitly unmapping it.
    fn free_memory(&self, memory: MemoryHandle);

    fn queue(&self, family: u32, index: u32) -> Result<Arc<dyn Queue>>;

    fn enabled_extensions(&self) -> Vec<String>;

    fn wait_idle(&self) -> Result<()>;

    fn destroy(&self);

    fn is_destroyed(&self) -> bool;
}

pub trait Queue: Send + Sync + std::fmt::Debug {
    fn family_index(&self) -> u32;

    /// Submit recorded commands. Returns the timeline value that marks their completion.
    fn submit(&self, commands: &CommandBuffer) -> Result<u64>;

    /// Block until the submission marked by `value` has completed. A `timeout_ms` of 0 waits forever.
    fn wait(&self, value: u64, timeout_ms: u64) -> Result<()>;

    /// Highest timeline value known to have completed.
    fn completed(&self) -> u64;
}
