//! Command recording.
//!
//! A [`CommandBuffer`] is an append-only list of [`Command`]s. Recording never touches device
//! memory and never blocks; the commands run only once the buffer is submitted to a
//! [`Queue`](crate::Queue), in recording order.

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::{SmallVec, smallvec};
use snafu::ensure;

use crate::error::{Result, TimestampOutOfRangeSnafu};
use crate::flags::{AccessFlags, PipelineStageFlags};
use crate::handle::BufferHandle;

/// One region of a buffer-to-buffer copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

impl BufferCopy {
    /// Region covering `size` bytes from the start of both buffers.
    pub fn whole(size: u64) -> Self {
        Self { src_offset: 0, dst_offset: 0, size }
    }
}

/// Memory dependency scoped to a range of one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferMemoryBarrier {
    pub buffer: BufferHandle,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    pub offset: u64,
    pub size: u64,
}

/// Fixed number of timestamp slots written by [`Command::WriteTimestamp`].
#[derive(Debug)]
pub struct TimestampPool {
    slots: Mutex<Vec<Option<u64>>>,
}

impl TimestampPool {
    pub fn new(capacity: u32) -> Self {
        Self { slots: Mutex::new(vec![None; capacity as usize]) }
    }

    pub fn capacity(&self) -> u32 {
        self.slots.lock().len() as u32
    }

    pub fn write(&self, index: u32, ticks: u64) -> Result<()> {
        let mut slots = self.slots.lock();
        let capacity = slots.len() as u32;
        ensure!(index < capacity, TimestampOutOfRangeSnafu { index, capacity });
        slots[index as usize] = Some(ticks);
        Ok(())
    }

    /// Written values in slot order, stopping at the first slot that was never written.
    pub fn results(&self) -> Vec<u64> {
        self.slots.lock().iter().map_while(|slot| *slot).collect()
    }

    pub fn reset(&self) {
        self.slots.lock().iter_mut().for_each(|slot| *slot = None);
    }
}

/// A recorded device command.
#[derive(Debug, Clone)]
pub enum Command {
    CopyBuffer { src: BufferHandle, dst: BufferHandle, regions: SmallVec<[BufferCopy; 1]> },
    PipelineBarrier {
        src_stage: PipelineStageFlags,
        dst_stage: PipelineStageFlags,
        buffer_barriers: SmallVec<[BufferMemoryBarrier; 1]>,
    },
    /// Compute dispatch of an opaque shader over the bound buffers.
    Dispatch { buffers: Vec<BufferHandle>, workgroup: [u32; 3], push_constants: Vec<u8> },
    WriteTimestamp { stage: PipelineStageFlags, pool: Arc<TimestampPool>, index: u32 },
}

/// Append-only list of commands awaiting submission.
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copy_buffer(&mut self, src: BufferHandle, dst: BufferHandle, region: BufferCopy) -> &mut Self {
        tracing::trace!(?src, ?dst, size = region.size, "record copy");
        self.commands.push(Command::CopyBuffer { src, dst, regions: smallvec![region] });
        self
    }

    pub fn pipeline_barrier(
        &mut self,
        src_stage: PipelineStageFlags,
        dst_stage: PipelineStageFlags,
        barrier: BufferMemoryBarrier,
    ) -> &mut Self {
        tracing::trace!(buffer = ?barrier.buffer, ?src_stage, ?dst_stage, "record buffer barrier");
        self.commands.push(Command::PipelineBarrier { src_stage, dst_stage, buffer_barriers: smallvec![barrier] });
        self
    }

    pub fn dispatch(&mut self, buffers: Vec<BufferHandle>, workgroup: [u32; 3], push_constants: Vec<u8>) -> &mut Self {
        tracing::trace!(?workgroup, buffers = buffers.len(), "record dispatch");
        self.commands.push(Command::Dispatch { buffers, workgroup, push_constants });
        self
    }

    pub fn write_timestamp(&mut self, stage: PipelineStageFlags, pool: Arc<TimestampPool>, index: u32) -> &mut Self {
        self.commands.push(Command::WriteTimestamp { stage, pool, index });
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drop commands recorded after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        self.commands.truncate(len);
    }

    /// Drop all recorded commands.
    pub fn reset(&mut self) {
        self.commands.clear();
    }
}
