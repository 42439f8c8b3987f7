use std::rc::Rc;

use halyard_device::CommandBuffer;
use halyard_tensor::Tensor;
use snafu::ResultExt;

use super::{Operation, require_tensors};
use crate::error::*;

/// Push host data to the device: staging → primary for every Device tensor.
///
/// Other tiers are skipped; their primary memory is either host-visible already or unreachable.
#[derive(Debug, Clone)]
pub struct TensorSyncDevice {
    tensors: Vec<Rc<Tensor>>,
}

impl TensorSyncDevice {
    pub fn new(tensors: Vec<Rc<Tensor>>) -> Result<Self> {
        require_tensors("TensorSyncDevice", &tensors, 1)?;
        Ok(Self { tensors })
    }
}

impl Operation for TensorSyncDevice {
    fn record(&self, cmd: &mut CommandBuffer) -> Result<()> {
        for tensor in self.tensors.iter().filter(|tensor| tensor.tier().has_staging()) {
            tensor.record_copy_from_staging_to_device(cmd, false).context(TensorSnafu)?;
        }
        Ok(())
    }
}

/// Pull device results back to the host: primary → staging for every Device tensor.
#[derive(Debug, Clone)]
pub struct TensorSyncLocal {
    tensors: Vec<Rc<Tensor>>,
}

impl TensorSyncLocal {
    pub fn new(tensors: Vec<Rc<Tensor>>) -> Result<Self> {
        require_tensors("TensorSyncLocal", &tensors, 1)?;
        Ok(Self { tensors })
    }
}

impl Operation for TensorSyncLocal {
    fn record(&self, cmd: &mut CommandBuffer) -> Result<()> {
        for tensor in self.tensors.iter().filter(|tensor| tensor.tier().has_staging()) {
            tensor.record_copy_from_device_to_staging(cmd, true).context(TensorSnafu)?;
        }
        Ok(())
    }
}
