use std::rc::Rc;

use halyard_device::{Access, CommandBuffer, PipelineStage};
use snafu::{ResultExt, ensure};

use super::Operation;
use crate::algorithm::Algorithm;
use crate::error::*;

/// Dispatch an algorithm over its bound tensors.
///
/// Each bound tensor gets a transfer-write to shader-read barrier first, so uploads recorded earlier
/// in the same sequence are visible to the shader.
#[derive(Debug, Clone)]
pub struct AlgoDispatch {
    algorithm: Rc<Algorithm>,
    push_constants: Option<Vec<f32>>,
}

impl AlgoDispatch {
    pub fn new(algorithm: Rc<Algorithm>) -> Self {
        Self { algorithm, push_constants: None }
    }

    /// Override the algorithm's push constants for this dispatch and every later one.
    pub fn with_push_constants(algorithm: Rc<Algorithm>, push_constants: Vec<f32>) -> Self {
        Self { algorithm, push_constants: Some(push_constants) }
    }
}

impl Operation for AlgoDispatch {
    fn record(&self, cmd: &mut CommandBuffer) -> Result<()> {
        ensure!(self.algorithm.is_init(), EmptyAlgorithmSnafu);
        for tensor in self.algorithm.tensors() {
            tensor
                .record_buffer_memory_barrier(
                    cmd,
                    Access::TransferWrite.into(),
                    Access::ShaderRead.into(),
                    PipelineStage::Transfer.into(),
                    PipelineStage::ComputeShader.into(),
                )
                .context(TensorSnafu)?;
        }
        if let Some(push_constants) = &self.push_constants {
            self.algorithm.set_push_constants(push_constants.clone());
        }
        self.algorithm.record_dispatch(cmd)
    }
}
