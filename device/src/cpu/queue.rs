use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use snafu::{OptionExt, ensure};

use super::device::DeviceState;
use crate::command::{BufferCopy, Command, CommandBuffer};
use crate::context::Queue;
use crate::error::*;
use crate::flags::BufferUsage;
use crate::handle::BufferHandle;
use crate::sync::{CpuTimelineSignal, TimelineSignal};

/// Queue of the host backend. Submissions run to completion before `submit` returns.
#[derive(Debug)]
pub struct CpuQueue {
    family: u32,
    state: Arc<Mutex<DeviceState>>,
    signal: CpuTimelineSignal,
    next_value: AtomicU64,
    origin: Instant,
}

impl CpuQueue {
    pub(super) fn new(family: u32, state: Arc<Mutex<DeviceState>>, origin: Instant) -> Self {
        Self { family, state, signal: CpuTimelineSignal::new(), next_value: AtomicU64::new(0), origin }
    }

    fn check_copy(state: &DeviceState, handle: BufferHandle, usage: BufferUsage, offset: u64, size: u64) -> Result<()> {
        let buffer = state.buffers.get(&handle).context(InvalidBufferSnafu { handle })?;
        ensure!(buffer.usage.contains(usage), MissingUsageSnafu { handle, usage });
        ensure!(
            offset.checked_add(size).is_some_and(|end| end <= buffer.size),
            CopyOutOfRangeSnafu { handle, offset, size, buffer_size: buffer.size }
        );
        Ok(())
    }

    fn copy(state: &mut DeviceState, src: BufferHandle, dst: BufferHandle, region: &BufferCopy) -> Result<()> {
        Self::check_copy(state, src, BufferUsage::TransferSrc, region.src_offset, region.size)?;
        Self::check_copy(state, dst, BufferUsage::TransferDst, region.dst_offset, region.size)?;
        let from = state.buffer_address(src)?;
        let to = state.buffer_address(dst)?;
        // SAFETY: both ranges were checked against their buffers, and bound buffers lie inside their
        // allocations. `copy` tolerates overlap when both buffers alias the same memory.
        unsafe {
            std::ptr::copy(from.add(region.src_offset as usize), to.add(region.dst_offset as usize), region.size as usize);
        }
        state.copies += 1;
        Ok(())
    }

    fn execute(&self, state: &mut DeviceState, command: &Command) -> Result<()> {
        match command {
            Command::CopyBuffer { src, dst, regions } => {
                for region in regions {
                    Self::copy(state, *src, *dst, region)?;
                }
            }
            Command::PipelineBarrier { buffer_barriers, .. } => {
                for barrier in buffer_barriers {
                    state.buffers.get(&barrier.buffer).context(InvalidBufferSnafu { handle: barrier.buffer })?;
                }
                // Host memory is coherent; a full fence is all a barrier has to provide.
                std::sync::atomic::fence(Ordering::SeqCst);
                state.barriers += buffer_barriers.len() as u64;
            }
            Command::Dispatch { buffers, workgroup, .. } => {
                for handle in buffers {
                    state.buffers.get(handle).context(InvalidBufferSnafu { handle: *handle })?;
                }
                tracing::debug!(?workgroup, "dispatch skipped: the host backend does not run shaders");
                state.dispatches += 1;
            }
            Command::WriteTimestamp { pool, index, .. } => {
                pool.write(*index, self.origin.elapsed().as_nanos() as u64)?;
            }
        }
        Ok(())
    }
}

impl Queue for CpuQueue {
    fn family_index(&self) -> u32 {
        self.family
    }

    fn submit(&self, commands: &CommandBuffer) -> Result<u64> {
        let mut state = self.state.lock();
        ensure!(!state.destroyed, DeviceLostSnafu { reason: "submit on destroyed device" });

        let value = self.next_value.fetch_add(1, Ordering::AcqRel) + 1;
        state.submissions += 1;
        tracing::debug!(family = self.family, value, commands = commands.len(), "executing submission");
        let result = commands.commands().iter().try_for_each(|command| self.execute(&mut state, command));
        drop(state);

        // The submission is complete either way; waiters must not hang on a failed one.
        self.signal.set(value);
        result.map(|()| value)
    }

    fn wait(&self, value: u64, timeout_ms: u64) -> Result<()> {
        self.signal.wait(value, timeout_ms)
    }

    fn completed(&self) -> u64 {
        self.signal.value()
    }
}
