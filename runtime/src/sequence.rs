//! Recorded batches of operations bound to one queue.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use halyard_device::{CommandBuffer, LogicalDevice, PipelineStage, Queue, TimestampPool};
use snafu::{OptionExt, ResultExt, ensure};
use tracing::{debug, error, trace, warn};

use crate::error::*;
use crate::ops::Operation;

/// Upper bound on the timestamps one sequence latches.
pub const MAX_TIMESTAMP_COUNT: u32 = 1 << 16;

#[derive(Debug, Default)]
struct SequenceState {
    commands: CommandBuffer,
    operations: Vec<Rc<dyn Operation>>,
    recording: bool,
    /// Timeline value of the submission not yet awaited.
    running: Option<u64>,
    timestamps: Option<Arc<TimestampPool>>,
    destroyed: bool,
}

/// A command buffer plus the operations recorded into it.
///
/// Recording starts implicitly with the first [`record`](Sequence::record). A recorded sequence can
/// be evaluated any number of times; [`clear`](Sequence::clear) or
/// [`rerecord`](Sequence::rerecord) starts over.
///
/// ```
/// use halyard_runtime::Manager;
/// use halyard_runtime::ops::{TensorSyncDevice, TensorSyncLocal};
///
/// let manager = Manager::new().unwrap();
/// let tensor = manager.tensor(&[1.0f32, 2.0, 3.0]).unwrap();
/// manager
///     .sequence(0, 0)
///     .unwrap()
///     .record(TensorSyncDevice::new(vec![tensor.clone()]).unwrap())
///     .unwrap()
///     .record(TensorSyncLocal::new(vec![tensor.clone()]).unwrap())
///     .unwrap()
///     .eval()
///     .unwrap();
/// assert_eq!(tensor.vector::<f32>().unwrap(), vec![1.0, 2.0, 3.0]);
/// ```
#[derive(Debug)]
pub struct Sequence {
    device: Arc<dyn LogicalDevice>,
    queue: Arc<dyn Queue>,
    state: RefCell<SequenceState>,
}

impl Sequence {
    /// A sequence on `queue`. A non-zero `timestamp_count` latches one timestamp when recording
    /// begins and one after each of the first `timestamp_count` operations. The count must not
    /// exceed [`MAX_TIMESTAMP_COUNT`].
    pub(crate) fn new(device: Arc<dyn LogicalDevice>, queue: Arc<dyn Queue>, timestamp_count: u32) -> Self {
        let timestamps = (timestamp_count > 0).then(|| Arc::new(TimestampPool::new(timestamp_count + 1)));
        debug!(queue.family = queue.family_index(), timestamp_count, "sequence created");
        Self { device, queue, state: RefCell::new(SequenceState { timestamps, ..Default::default() }) }
    }

    /// Start a fresh recording, dropping whatever was recorded before.
    pub fn begin(&self) -> Result<&Self> {
        let mut state = self.state.borrow_mut();
        ensure!(!state.destroyed, SequenceDestroyedSnafu);
        ensure!(state.running.is_none(), SequenceRunningSnafu);
        if state.recording {
            warn!("sequence begin called while already recording; earlier commands are dropped");
        }

        state.commands.reset();
        state.operations.clear();
        state.recording = true;
        if let Some(pool) = state.timestamps.clone() {
            pool.reset();
            state.commands.write_timestamp(PipelineStage::TopOfPipe.into(), pool, 0);
        }
        Ok(self)
    }

    /// Close the recording. The recorded commands stay and can be evaluated.
    pub fn end(&self) -> Result<&Self> {
        let mut state = self.state.borrow_mut();
        ensure!(!state.destroyed, SequenceDestroyedSnafu);
        if !state.recording {
            warn!("sequence end called while not recording");
        }
        state.recording = false;
        Ok(self)
    }

    /// Record `operation`, beginning a recording first if none is open.
    pub fn record(&self, operation: impl Operation + 'static) -> Result<&Self> {
        self.record_shared(Rc::new(operation))
    }

    fn record_shared(&self, operation: Rc<dyn Operation>) -> Result<&Self> {
        if !self.is_recording() {
            self.begin()?;
        }

        let mut state = self.state.borrow_mut();
        let SequenceState { commands, operations, timestamps, .. } = &mut *state;
        trace!(?operation, "recording operation");
        let recorded = commands.len();
        if let Err(error) = operation.record(commands) {
            commands.truncate(recorded);
            return Err(error);
        }
        operations.push(operation);

        if let Some(pool) = timestamps
            && let Ok(index) = u32::try_from(operations.len())
            && index < pool.capacity()
        {
            commands.write_timestamp(PipelineStage::BottomOfPipe.into(), Arc::clone(pool), index);
        }
        Ok(self)
    }

    /// Submit the recorded commands without waiting for them.
    pub fn eval_async(&self) -> Result<&Self> {
        {
            let state = self.state.borrow();
            ensure!(!state.destroyed, SequenceDestroyedSnafu);
            ensure!(state.running.is_none(), SequenceRunningSnafu);
        }
        if self.is_recording() {
            self.end()?;
        }

        for operation in self.operations() {
            operation.pre_eval()?;
        }
        let mut state = self.state.borrow_mut();
        let value = self.queue.submit(&state.commands).context(DeviceSnafu)?;
        debug!(commands = state.commands.len(), value, "sequence submitted");
        state.running = Some(value);
        Ok(self)
    }

    /// Wait for the outstanding submission, then run each operation's post-evaluation hook.
    ///
    /// `timeout_ms` of 0 waits indefinitely. Without an outstanding submission this only warns.
    pub fn eval_await(&self, timeout_ms: u64) -> Result<&Self> {
        let Some(value) = self.state.borrow().running else {
            warn!("sequence eval_await called with nothing running");
            return Ok(self);
        };

        self.queue.wait(value, timeout_ms).context(DeviceSnafu)?;
        self.state.borrow_mut().running = None;
        for operation in self.operations() {
            operation.post_eval()?;
        }
        Ok(self)
    }

    /// Submit and wait.
    pub fn eval(&self) -> Result<&Self> {
        self.eval_async()?.eval_await(0)
    }

    /// Replace the recording with `operation` alone and evaluate it.
    pub fn eval_op(&self, operation: impl Operation + 'static) -> Result<&Self> {
        self.clear()?;
        self.record(operation)?.eval()
    }

    /// Drop recorded commands and operations.
    pub fn clear(&self) -> Result<&Self> {
        let mut state = self.state.borrow_mut();
        ensure!(!state.destroyed, SequenceDestroyedSnafu);
        ensure!(state.running.is_none(), SequenceRunningSnafu);
        state.commands.reset();
        state.operations.clear();
        state.recording = false;
        Ok(self)
    }

    /// Record the current operations again from scratch, picking up tensors that were rebuilt since.
    pub fn rerecord(&self) -> Result<&Self> {
        let operations = self.operations();
        self.begin()?;
        for operation in operations {
            self.record_shared(operation)?;
        }
        self.end()
    }

    pub fn is_recording(&self) -> bool {
        self.state.borrow().recording
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running.is_some()
    }

    pub fn is_init(&self) -> bool {
        !self.state.borrow().destroyed && !self.device.is_destroyed()
    }

    /// Number of operations in the current recording.
    pub fn operation_count(&self) -> usize {
        self.state.borrow().operations.len()
    }

    /// Latched timestamps in nanoseconds, in recording order, up to the last one written.
    pub fn timestamps(&self) -> Result<Vec<u64>> {
        let state = self.state.borrow();
        let pool = state.timestamps.as_ref().context(TimestampsDisabledSnafu)?;
        Ok(pool.results())
    }

    /// Wait out any outstanding submission and drop everything recorded. Safe to call repeatedly.
    pub fn destroy(&self) {
        let mut state = self.state.borrow_mut();
        if state.destroyed {
            return;
        }
        if let Some(value) = state.running.take()
            && let Err(source) = self.queue.wait(value, 0)
        {
            error!(%source, "failed to wait for running sequence during destroy");
        }
        state.commands.reset();
        state.operations.clear();
        state.recording = false;
        state.timestamps = None;
        state.destroyed = true;
        debug!("sequence destroyed");
    }

    fn operations(&self) -> Vec<Rc<dyn Operation>> {
        self.state.borrow().operations.clone()
    }
}

impl Drop for Sequence {
    fn drop(&mut self) {
        self.destroy();
    }
}
