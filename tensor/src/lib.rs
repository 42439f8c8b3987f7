//! Tiered GPU tensors.
//!
//! A [`Tensor`] owns up to two allocations on a [`LogicalDevice`](halyard_device::LogicalDevice):
//!
//! | Tier                    | Primary                          | Staging      | Host view |
//! |-------------------------|----------------------------------|--------------|-----------|
//! | [`TensorTier::Device`]  | device-local, transfer src/dst   | host-visible | staging   |
//! | [`TensorTier::Host`]    | host-visible, coherent           | none         | primary   |
//! | [`TensorTier::Storage`] | device-local, shader access only | none         | none      |
//!
//! Host data always goes through the host view. Moving it between tiers, and between tensors, is
//! recorded into a [`CommandBuffer`](halyard_device::CommandBuffer) together with the barriers that
//! order it against shader work; submitting that buffer is someone else's job.
//!
//! ```
//! use halyard_device::cpu::CpuInstance;
//! use halyard_device::{Instance, PhysicalDevice};
//! use halyard_tensor::{Tensor, TensorTier};
//!
//! let physical = CpuInstance::new().enumerate_physical_devices().unwrap().remove(0);
//! let device = physical.create_device(&[(0, 1)], &[]).unwrap();
//! let tensor = Tensor::from_slice(physical, device, &[1.0f32, 2.0, 3.0, 4.0], TensorTier::Device).unwrap();
//! assert_eq!(tensor.vector::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
//! ```

pub mod error;
mod tensor;
mod tier;
mod typed;

#[cfg(test)]
mod test;

pub use error::{Error, Result};
pub use tensor::{DescriptorBufferInfo, ExternalAllocation, Tensor};
pub use tier::TensorTier;
pub use typed::TypedTensor;
