use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use halyard_device::{BufferHandle, CommandBuffer, LogicalDevice};
use halyard_dtype::ext;
use halyard_tensor::Tensor;
use snafu::{ResultExt, ensure};
use tracing::debug;

use crate::error::*;

/// Workgroup counts along x, y and z.
pub type Workgroup = [u32; 3];

#[derive(Debug, Default)]
struct AlgorithmState {
    tensors: Vec<Rc<Tensor>>,
    spirv: Vec<u32>,
    workgroup: Workgroup,
    specialization_constants: Vec<f32>,
    push_constants: Vec<f32>,
    destroyed: bool,
}

/// A compute shader bound to the tensors it reads and writes.
///
/// Pipeline creation belongs to the shader layer; an algorithm only carries what a dispatch needs:
/// the SPIR-V words, the bound tensors, the workgroup counts and the constants.
#[derive(Debug)]
pub struct Algorithm {
    device: Arc<dyn LogicalDevice>,
    state: RefCell<AlgorithmState>,
}

impl Algorithm {
    pub(crate) fn new(
        device: Arc<dyn LogicalDevice>,
        tensors: Vec<Rc<Tensor>>,
        spirv: Vec<u32>,
        workgroup: Option<Workgroup>,
        specialization_constants: Vec<f32>,
        push_constants: Vec<f32>,
    ) -> Self {
        let algorithm = Self { device, state: RefCell::default() };
        algorithm.rebuild(tensors, spirv, workgroup, specialization_constants, push_constants);
        algorithm
    }

    /// Replace everything the algorithm binds. A missing workgroup defaults to one invocation per
    /// element of the first tensor.
    pub fn rebuild(
        &self,
        tensors: Vec<Rc<Tensor>>,
        spirv: Vec<u32>,
        workgroup: Option<Workgroup>,
        specialization_constants: Vec<f32>,
        push_constants: Vec<f32>,
    ) {
        let workgroup = resolve_workgroup(workgroup, &tensors);
        debug!(tensors = tensors.len(), spirv_words = spirv.len(), ?workgroup, "algorithm built");
        *self.state.borrow_mut() = AlgorithmState {
            tensors,
            spirv,
            workgroup,
            specialization_constants,
            push_constants,
            destroyed: false,
        };
    }

    /// Ready to dispatch: not destroyed, with a shader and at least one tensor.
    pub fn is_init(&self) -> bool {
        let state = self.state.borrow();
        !state.destroyed && !state.spirv.is_empty() && !state.tensors.is_empty() && !self.device.is_destroyed()
    }

    pub fn tensors(&self) -> Vec<Rc<Tensor>> {
        self.state.borrow().tensors.clone()
    }

    pub fn spirv(&self) -> Vec<u32> {
        self.state.borrow().spirv.clone()
    }

    pub fn workgroup(&self) -> Workgroup {
        self.state.borrow().workgroup
    }

    pub fn specialization_constants(&self) -> Vec<f32> {
        self.state.borrow().specialization_constants.clone()
    }

    pub fn push_constants(&self) -> Vec<f32> {
        self.state.borrow().push_constants.clone()
    }

    pub fn set_push_constants(&self, push_constants: Vec<f32>) {
        self.state.borrow_mut().push_constants = push_constants;
    }

    pub fn set_workgroup(&self, workgroup: Option<Workgroup>) {
        let mut state = self.state.borrow_mut();
        state.workgroup = resolve_workgroup(workgroup, &state.tensors);
    }

    /// Record the dispatch, binding every tensor's primary buffer in order.
    pub fn record_dispatch(&self, cmd: &mut CommandBuffer) -> Result<()> {
        ensure!(self.is_init(), EmptyAlgorithmSnafu);
        let state = self.state.borrow();
        let buffers = state
            .tensors
            .iter()
            .map(|tensor| tensor.descriptor_buffer_info().map(|info| info.buffer))
            .collect::<halyard_tensor::Result<Vec<BufferHandle>>>()
            .context(TensorSnafu)?;
        let push_constants = ext::as_bytes(&state.push_constants).to_vec();
        cmd.dispatch(buffers, state.workgroup, push_constants);
        Ok(())
    }

    /// Drop the bound tensors and shader. Safe to call repeatedly.
    pub fn destroy(&self) {
        let mut state = self.state.borrow_mut();
        if state.destroyed {
            return;
        }
        state.destroyed = true;
        state.tensors.clear();
        state.spirv.clear();
        debug!("algorithm destroyed");
    }
}

impl Drop for Algorithm {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn resolve_workgroup(workgroup: Option<Workgroup>, tensors: &[Rc<Tensor>]) -> Workgroup {
    match workgroup {
        Some([x, y, z]) if x > 0 => [x, y.max(1), z.max(1)],
        _ => {
            let x = tensors.first().map_or(1, |tensor| u32::try_from(tensor.size()).unwrap_or(u32::MAX));
            [x.max(1), 1, 1]
        }
    }
}
