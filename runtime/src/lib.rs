//! Resource management for halyard.
//!
//! A [`Manager`] picks a physical device, creates a logical device with the requested queues, and
//! issues three kinds of resources on it:
//!
//! - [`Tensor`](halyard_tensor::Tensor)s holding data in one of the memory tiers,
//! - [`Sequence`]s that record [`ops`] into a command buffer and submit it to a queue,
//! - [`Algorithm`]s binding a compute shader to the tensors it works on.
//!
//! Resources are plain `Rc` handles owned by the caller. The manager keeps weak observations so
//! [`Manager::clear`] can forget released ones and [`Manager::destroy`] can still reach the rest.
//!
//! ```
//! use halyard_runtime::Manager;
//! use halyard_runtime::ops::{TensorCopy, TensorSyncDevice};
//!
//! let manager = Manager::new().unwrap();
//! let a = manager.tensor(&[1u32, 2, 3]).unwrap();
//! let b = manager.tensor(&[0u32, 0, 0]).unwrap();
//!
//! let sequence = manager.sequence(0, 0).unwrap();
//! sequence.record(TensorSyncDevice::new(vec![a.clone()]).unwrap()).unwrap();
//! sequence.record(TensorCopy::new(vec![a.clone(), b.clone()]).unwrap()).unwrap();
//! sequence.eval().unwrap();
//! assert_eq!(b.vector::<u32>().unwrap(), vec![1, 2, 3]);
//! ```

pub mod algorithm;
pub mod config;
pub mod error;
mod manager;
pub mod ops;
mod registry;
mod sequence;


pub use algorithm::{Algorithm, Workgroup};
pub use config::ManagerConfig;
pub use error::{Error, Result};
pub use manager::Manager;
pub use sequence::{MAX_TIMESTAMP_COUNT, Sequence};
