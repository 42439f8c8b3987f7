//! Operations a [`Sequence`](crate::Sequence) records.
//!
//! An operation records its commands once, then gets a hook before the sequence is submitted and
//! another after the submission completes. Host-side work that must observe device results belongs
//! in [`Operation::post_eval`].

mod algo_dispatch;
mod tensor_copy;
mod tensor_sync;

use std::fmt::Debug;
use std::rc::Rc;

use halyard_device::CommandBuffer;
use halyard_tensor::Tensor;
use snafu::ensure;

pub use algo_dispatch::AlgoDispatch;
pub use tensor_copy::TensorCopy;
pub use tensor_sync::{TensorSyncDevice, TensorSyncLocal};

use crate::error::*;

pub trait Operation: Debug {
    /// Append this operation's commands.
    fn record(&self, cmd: &mut CommandBuffer) -> Result<()>;

    /// Runs on the host right before submission.
    fn pre_eval(&self) -> Result<()> {
        Ok(())
    }

    /// Runs on the host once the submission has completed.
    fn post_eval(&self) -> Result<()> {
        Ok(())
    }
}

fn require_tensors(operation: &'static str, tensors: &[Rc<Tensor>], required: usize) -> Result<()> {
    ensure!(tensors.len() >= required, TooFewTensorsSnafu { operation, required, actual: tensors.len() });
    Ok(())
}
