//! Shared fixture: a fresh emulated device per test.

use std::rc::Rc;
use std::sync::Arc;

use halyard_device::cpu::{CpuDevice, CpuDeviceConfig, CpuDeviceStats, CpuInstance};
use halyard_device::{CommandBuffer, LogicalDevice, PhysicalDevice};
use halyard_dtype::HasDataType;

use crate::{Tensor, TensorTier};

pub struct Fixture {
    pub physical: Arc<dyn PhysicalDevice>,
    pub device: Arc<CpuDevice>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(CpuDeviceConfig::default())
    }

    pub fn with_config(config: CpuDeviceConfig) -> Self {
        let instance = CpuInstance::with_devices(vec![config]);
        let physical = instance.physical_device(0).unwrap();
        let device = physical.create_cpu_device(&[(0, 1)], &[]).unwrap();
        Self { physical, device }
    }

    pub fn logical(&self) -> Arc<dyn LogicalDevice> {
        Arc::clone(&self.device) as Arc<dyn LogicalDevice>
    }

    pub fn tensor<T: HasDataType>(&self, data: &[T], tier: TensorTier) -> Rc<Tensor> {
        Rc::new(Tensor::from_slice(Arc::clone(&self.physical), self.logical(), data, tier).unwrap())
    }

    /// Submit and wait, the way a sequence would.
    pub fn run(&self, cmd: &CommandBuffer) {
        let queue = self.device.queue(0, 0).unwrap();
        let value = queue.submit(cmd).unwrap();
        queue.wait(value, 1000).unwrap();
    }

    pub fn stats(&self) -> CpuDeviceStats {
        self.device.stats()
    }
}
