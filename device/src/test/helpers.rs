use std::sync::Arc;

use crate::cpu::{CpuDevice, CpuDeviceConfig, CpuInstance};
use crate::{BufferHandle, BufferUsageFlags, LogicalDevice, MemoryHandle, PhysicalDevice};

/// Fresh host device with both compute queues of the default layout.
pub fn device() -> (Arc<dyn PhysicalDevice>, Arc<CpuDevice>) {
    device_with(CpuDeviceConfig::default())
}

pub fn device_with(config: CpuDeviceConfig) -> (Arc<dyn PhysicalDevice>, Arc<CpuDevice>) {
    let instance = CpuInstance::with_devices(vec![config]);
    let physical = instance.physical_device(0).unwrap();
    let device = physical.create_cpu_device(&[(0, 2)], &[]).unwrap();
    (physical as Arc<dyn PhysicalDevice>, device)
}

/// Create a buffer and bind it to fresh memory of the given type.
pub fn bound_buffer(
    device: &CpuDevice,
    size: u64,
    usage: BufferUsageFlags,
    memory_type: u32,
) -> (BufferHandle, MemoryHandle) {
    let buffer = device.create_buffer(size, usage).unwrap();
    let requirements = device.buffer_memory_requirements(buffer).unwrap();
    let memory = device.allocate_memory(requirements.size, memory_type).unwrap();
    device.bind_buffer_memory(buffer, memory, 0).unwrap();
    (buffer, memory)
}
