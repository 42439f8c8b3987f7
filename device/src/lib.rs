//! Device context abstraction for halyard.
//!
//! This crate describes everything the tensor layer needs from a GPU API without depending on
//! one: instances, physical and logical devices, queues, buffer/memory objects, and an
//! append-only [`CommandBuffer`] of copies, barriers, dispatches and timestamps.
//!
//! The [`cpu`] module implements the traits on host memory. It is the default backend and the
//! one the test suites run against.

pub mod command;
pub mod context;
pub mod cpu;
pub mod error;
pub mod flags;
pub mod handle;
pub mod memory;
pub mod sync;


pub use command::{BufferCopy, BufferMemoryBarrier, Command, CommandBuffer, TimestampPool};
pub use context::{
    Instance, LogicalDevice, PhysicalDevice, PhysicalDeviceProperties, PhysicalDeviceType, Queue,
    QueueFamilyProperties,
};
pub use error::{Error, Result};
pub use flags::{
    Access, AccessFlags, BufferUsage, BufferUsageFlags, MemoryProperty, MemoryPropertyFlags, PipelineStage,
    PipelineStageFlags,
};
pub use handle::{BufferHandle, MemoryHandle, Owned};
pub use memory::{MemoryHeap, MemoryProperties, MemoryRequirements, MemoryType};
pub use sync::{CpuTimelineSignal, TimelineSignal};
