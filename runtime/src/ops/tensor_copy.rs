use std::rc::Rc;

use halyard_device::CommandBuffer;
use halyard_tensor::Tensor;
use snafu::{ResultExt, ensure};
use tracing::debug;

use super::{Operation, require_tensors};
use crate::error::*;

/// Copy the first tensor into every other tensor.
///
/// The copy runs between primary buffers. After the submission completes, targets with a host view
/// also get the source's host bytes, so a Device target's staging buffer matches what was copied.
#[derive(Debug, Clone)]
pub struct TensorCopy {
    tensors: Vec<Rc<Tensor>>,
}

impl TensorCopy {
    pub fn new(tensors: Vec<Rc<Tensor>>) -> Result<Self> {
        require_tensors("TensorCopy", &tensors, 2)?;
        let expected = tensors[0].data_type();
        for tensor in &tensors[1..] {
            let actual = tensor.data_type();
            ensure!(actual == expected, TensorDataTypeMismatchSnafu { operation: "TensorCopy", expected, actual });
        }
        Ok(Self { tensors })
    }
}

impl Operation for TensorCopy {
    fn record(&self, cmd: &mut CommandBuffer) -> Result<()> {
        let source = &self.tensors[0];
        for target in &self.tensors[1..] {
            target.record_copy_from(cmd, source, false).context(TensorSnafu)?;
        }
        Ok(())
    }

    fn post_eval(&self) -> Result<()> {
        let source = &self.tensors[0];
        if !source.tier().has_host_view() {
            return Ok(());
        }
        let bytes = source.bytes().context(TensorSnafu)?;
        for target in self.tensors[1..].iter().filter(|tensor| tensor.tier().has_host_view()) {
            target.set_raw_data(&bytes).context(TensorSnafu)?;
        }
        debug!(targets = self.tensors.len() - 1, bytes = bytes.len(), "mirrored copied host data");
        Ok(())
    }
}
