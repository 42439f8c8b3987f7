//! Emulated device backed by host memory.
//!
//! The CPU backend implements the device context traits without a GPU: every allocation is an
//! aligned host block, "device-local" memory simply refuses to be mapped, and queues execute
//! submitted copies and barriers synchronously on the submitting thread. It enforces the same
//! usage rules a validation layer would (transfer usage on copies, binding before use, mapping
//! only host-visible memory) so code written against it behaves the same on real hardware.
//!
//! Shader dispatches are recorded and counted but not executed.
//!
//! # Example
//!
//! ```
//! use halyard_device::cpu::CpuInstance;
//! use halyard_device::Instance;
//!
//! let instance = CpuInstance::new();
//! let physical = instance.enumerate_physical_devices().unwrap().remove(0);
//! let device = physical.create_device(&[(0, 1)], &[]).unwrap();
//! assert!(!device.is_destroyed());
//! ```

mod device;
mod queue;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use snafu::{OptionExt, ensure};

pub use device::{CpuDevice, CpuDeviceStats};
pub use queue::CpuQueue;

use crate::context::{
    Instance, LogicalDevice, PhysicalDevice, PhysicalDeviceProperties, PhysicalDeviceType, QueueFamilyProperties,
};
use crate::error::{
    DeviceLostSnafu, ExtensionNotPresentSnafu, QueueFamilyOutOfRangeSnafu, QueueIndexOutOfRangeSnafu, Result,
};
use crate::flags::MemoryProperty;
use crate::memory::{MemoryHeap, MemoryProperties, MemoryType};

/// Shape of an emulated physical device.
#[derive(Debug, Clone)]
pub struct CpuDeviceConfig {
    pub name: String,
    /// Capacity of the device-local heap in bytes.
    pub device_heap_size: u64,
    /// Capacity of the host-visible heap in bytes.
    pub host_heap_size: u64,
    pub queue_families: Vec<QueueFamilyProperties>,
    pub extensions: Vec<String>,
}

impl Default for CpuDeviceConfig {
    fn default() -> Self {
        Self {
            name: "halyard host device".to_string(),
            device_heap_size: 1 << 30,
            host_heap_size: 1 << 30,
            queue_families: vec![
                QueueFamilyProperties {
                    supports_compute: true,
                    supports_transfer: true,
                    queue_count: 2,
                    supports_timestamps: true,
                },
                QueueFamilyProperties {
                    supports_compute: false,
                    supports_transfer: true,
                    queue_count: 1,
                    supports_timestamps: false,
                },
            ],
            extensions: vec!["VK_KHR_storage_buffer_storage_class".to_string(), "VK_EXT_shader_atomic_float".to_string()],
        }
    }
}

impl CpuDeviceConfig {
    /// Memory layout every emulated device reports: one device-local type on heap 0 and two
    /// host-visible types on heap 1.
    pub fn memory_properties(&self) -> MemoryProperties {
        MemoryProperties {
            types: vec![
                MemoryType { properties: MemoryProperty::DeviceLocal.into(), heap_index: 0 },
                MemoryType { properties: MemoryProperty::HostVisible | MemoryProperty::HostCoherent, heap_index: 1 },
                MemoryType {
                    properties: MemoryProperty::HostVisible | MemoryProperty::HostCoherent | MemoryProperty::HostCached,
                    heap_index: 1,
                },
            ],
            heaps: vec![MemoryHeap { size: self.device_heap_size }, MemoryHeap { size: self.host_heap_size }],
        }
    }
}

#[derive(Debug)]
pub struct CpuInstance {
    devices: Vec<Arc<CpuPhysicalDevice>>,
    destroyed: AtomicBool,
}

impl CpuInstance {
    /// Instance exposing a single default device.
    pub fn new() -> Arc<Self> {
        Self::with_devices(vec![CpuDeviceConfig::default()])
    }

    pub fn with_devices(configs: Vec<CpuDeviceConfig>) -> Arc<Self> {
        let devices = configs.into_iter().map(|config| Arc::new(CpuPhysicalDevice { config })).collect();
        Arc::new(Self { devices, destroyed: AtomicBool::new(false) })
    }

    /// Concrete handle to a physical device, for callers that need [`CpuDevice`] rather than the trait.
    pub fn physical_device(&self, index: usize) -> Option<Arc<CpuPhysicalDevice>> {
        self.devices.get(index).cloned()
    }
}

impl Instance for CpuInstance {
    fn enumerate_physical_devices(&self) -> Result<Vec<Arc<dyn PhysicalDevice>>> {
        ensure!(!self.is_destroyed(), DeviceLostSnafu { reason: "instance destroyed" });
        Ok(self.devices.iter().map(|device| Arc::clone(device) as Arc<dyn PhysicalDevice>).collect())
    }

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::AcqRel) {
            tracing::debug!("host instance destroyed");
        }
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct CpuPhysicalDevice {
    config: CpuDeviceConfig,
}

impl CpuPhysicalDevice {
    pub fn config(&self) -> &CpuDeviceConfig {
        &self.config
    }

    /// Same as [`PhysicalDevice::create_device`] but keeps the concrete type, so callers can read
    /// [`CpuDevice::stats`].
    pub fn create_cpu_device(&self, queue_counts: &[(u32, u32)], extensions: &[String]) -> Result<Arc<CpuDevice>> {
        let families = &self.config.queue_families;
        for &(family, count) in queue_counts {
            let properties =
                families.get(family as usize).context(QueueFamilyOutOfRangeSnafu { family, count: families.len() })?;
            ensure!(
                count <= properties.queue_count,
                QueueIndexOutOfRangeSnafu { family, index: count.saturating_sub(1), count: properties.queue_count }
            );
        }
        for name in extensions {
            ensure!(self.config.extensions.contains(name), ExtensionNotPresentSnafu { name: name.clone() });
        }

        tracing::debug!(device = %self.config.name, ?queue_counts, ?extensions, "creating host logical device");
        Ok(Arc::new(CpuDevice::new(&self.config, queue_counts, extensions.to_vec())))
    }
}

impl PhysicalDevice for CpuPhysicalDevice {
    fn properties(&self) -> PhysicalDeviceProperties {
        PhysicalDeviceProperties {
            name: self.config.name.clone(),
            device_type: PhysicalDeviceType::Cpu,
            timestamp_period: 1.0,
            max_push_constants_size: 128,
        }
    }

    fn memory_properties(&self) -> MemoryProperties {
        self.config.memory_properties()
    }

    fn queue_family_properties(&self) -> Vec<QueueFamilyProperties> {
        self.config.queue_families.clone()
    }

    fn extension_properties(&self) -> Vec<String> {
        self.config.extensions.clone()
    }

    fn create_device(&self, queue_counts: &[(u32, u32)], extensions: &[String]) -> Result<Arc<dyn LogicalDevice>> {
        let device: Arc<dyn LogicalDevice> = self.create_cpu_device(queue_counts, extensions)?;
        Ok(device)
    }
}
