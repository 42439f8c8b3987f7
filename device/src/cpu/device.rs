use std::alloc::{self, Layout};
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use snafu::{OptionExt, ensure};

use super::CpuDeviceConfig;
use super::queue::CpuQueue;
use crate::context::{LogicalDevice, Queue, QueueFamilyProperties};
use crate::error::*;
use crate::flags::{BufferUsageFlags, MemoryProperty};
use crate::handle::{BufferHandle, MemoryHandle};
use crate::memory::{MemoryProperties, MemoryRequirements};

/// Alignment of every host block and every buffer's memory requirement.
pub(super) const BLOCK_ALIGNMENT: usize = 64;

/// Zero-initialized, aligned host allocation standing in for device memory.
#[derive(Debug)]
pub(super) struct HostBlock {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: the block is plain bytes; all access goes through the device state lock or through
// mapped pointers whose synchronization is the caller's responsibility.
unsafe impl Send for HostBlock {}
unsafe impl Sync for HostBlock {}

impl HostBlock {
    fn new(size: u64) -> Option<Self> {
        let layout = Layout::from_size_align(usize::try_from(size).ok()?, BLOCK_ALIGNMENT).ok()?;
        // SAFETY: size is non-zero (checked by the caller).
        let ptr = NonNull::new(unsafe { alloc::alloc_zeroed(layout) })?;
        Some(Self { ptr, layout })
    }

    pub(super) fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for HostBlock {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with the same layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

#[derive(Debug)]
pub(super) struct BufferState {
    pub size: u64,
    pub usage: BufferUsageFlags,
    pub binding: Option<(MemoryHandle, u64)>,
}

#[derive(Debug)]
pub(super) struct MemoryState {
    pub block: HostBlock,
    pub size: u64,
    pub heap: u32,
    pub host_visible: bool,
    pub mapped: bool,
}

/// Counters describing what a host device currently holds and what its queues have executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuDeviceStats {
    pub live_buffers: usize,
    pub live_allocations: usize,
    pub mapped_allocations: usize,
    pub submissions: u64,
    pub copies: u64,
    pub barriers: u64,
    pub dispatches: u64,
}

#[derive(Debug, Default)]
pub(super) struct DeviceState {
    next_handle: u64,
    pub buffers: HashMap<BufferHandle, BufferState>,
    pub memories: HashMap<MemoryHandle, MemoryState>,
    heap_usage: Vec<u64>,
    pub submissions: u64,
    pub copies: u64,
    pub barriers: u64,
    pub dispatches: u64,
    pub destroyed: bool,
}

impl DeviceState {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Resolve a bound buffer to the host address of its first byte.
    pub fn buffer_address(&self, handle: BufferHandle) -> Result<*mut u8> {
        let buffer = self.buffers.get(&handle).context(InvalidBufferSnafu { handle })?;
        let (memory, offset) = buffer.binding.context(UnboundBufferSnafu { handle })?;
        let memory = self.memories.get(&memory).context(InvalidMemorySnafu { handle: memory })?;
        // SAFETY: bind_buffer_memory checked offset + size against the allocation.
        Ok(unsafe { memory.block.as_ptr().add(offset as usize) })
    }
}

/// Logical device of the host backend.
#[derive(Debug)]
pub struct CpuDevice {
    memory_properties: MemoryProperties,
    families: Vec<QueueFamilyProperties>,
    extensions: Vec<String>,
    state: Arc<Mutex<DeviceState>>,
    queues: HashMap<u32, Vec<Arc<CpuQueue>>>,
}

impl CpuDevice {
    pub(super) fn new(config: &CpuDeviceConfig, queue_counts: &[(u32, u32)], extensions: Vec<String>) -> Self {
        let memory_properties = config.memory_properties();
        let state = Arc::new(Mutex::new(DeviceState {
            heap_usage: vec![0; memory_properties.heaps.len()],
            ..Default::default()
        }));
        let origin = Instant::now();

        let mut queues: HashMap<u32, Vec<Arc<CpuQueue>>> = HashMap::new();
        for &(family, count) in queue_counts {
            let family_queues = queues.entry(family).or_default();
            while (family_queues.len() as u32) < count {
                family_queues.push(Arc::new(CpuQueue::new(family, Arc::clone(&state), origin)));
            }
        }

        Self { memory_properties, families: config.queue_families.clone(), extensions, state, queues }
    }

    pub fn stats(&self) -> CpuDeviceStats {
        let state = self.state.lock();
        CpuDeviceStats {
            live_buffers: state.buffers.len(),
            live_allocations: state.memories.len(),
            mapped_allocations: state.memories.values().filter(|memory| memory.mapped).count(),
            submissions: state.submissions,
            copies: state.copies,
            barriers: state.barriers,
            dispatches: state.dispatches,
        }
    }

    /// Bytes currently allocated from each heap.
    pub fn heap_usage(&self) -> Vec<u64> {
        self.state.lock().heap_usage.clone()
    }

    fn alive(state: &DeviceState, operation: &str) -> Result<()> {
        ensure!(!state.destroyed, DeviceLostSnafu { reason: format!("{operation} on destroyed device") });
        Ok(())
    }
}

impl LogicalDevice for CpuDevice {
    fn create_buffer(&self, size: u64, usage: BufferUsageFlags) -> Result<BufferHandle> {
        ensure!(size > 0, ZeroSizeSnafu);
        let mut state = self.state.lock();
        Self::alive(&state, "create_buffer")?;

        let handle = BufferHandle::from_raw(state.next_handle());
        state.buffers.insert(handle, BufferState { size, usage, binding: None });
        tracing::debug!(?handle, size, ?usage, "buffer created");
        Ok(handle)
    }

    fn buffer_memory_requirements(&self, buffer: BufferHandle) -> Result<MemoryRequirements> {
        let state = self.state.lock();
        Self::alive(&state, "buffer_memory_requirements")?;
        let size = state.buffers.get(&buffer).context(InvalidBufferSnafu { handle: buffer })?.size;
        let alignment = BLOCK_ALIGNMENT as u64;
        Ok(MemoryRequirements {
            size: size.div_ceil(alignment) * alignment,
            alignment,
            memory_type_bits: (1u32 << self.memory_properties.types.len()) - 1,
        })
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> Result<MemoryHandle> {
        ensure!(size > 0, ZeroSizeSnafu);
        let memory_type = self
            .memory_properties
            .types
            .get(memory_type_index as usize)
            .context(MemoryTypeOutOfRangeSnafu { index: memory_type_index, count: self.memory_properties.types.len() })?;
        let heap = memory_type.heap_index;
        let capacity = self.memory_properties.heaps[heap as usize].size;

        let mut state = self.state.lock();
        Self::alive(&state, "allocate_memory")?;
        let used = state.heap_usage[heap as usize];
        let available = capacity.saturating_sub(used);
        ensure!(size <= available, OutOfDeviceMemorySnafu { heap, requested: size, available });
        let block = HostBlock::new(size).context(OutOfDeviceMemorySnafu { heap, requested: size, available })?;

        let handle = MemoryHandle::from_raw(state.next_handle());
        let host_visible = memory_type.properties.contains(MemoryProperty::HostVisible);
        state.heap_usage[heap as usize] += size;
        state.memories.insert(handle, MemoryState { block, size, heap, host_visible, mapped: false });
        tracing::debug!(?handle, size, memory_type_index, "memory allocated");
        Ok(handle)
    }

    fn bind_buffer_memory(&self, buffer: BufferHandle, memory: MemoryHandle, offset: u64) -> Result<()> {
        let mut state = self.state.lock();
        Self::alive(&state, "bind_buffer_memory")?;
        let allocation_size = state.memories.get(&memory).context(InvalidMemorySnafu { handle: memory })?.size;
        let target = state.buffers.get_mut(&buffer).context(InvalidBufferSnafu { handle: buffer })?;
        ensure!(target.binding.is_none(), AlreadyBoundSnafu { handle: buffer });
        ensure!(
            offset.checked_add(target.size).is_some_and(|end| end <= allocation_size),
            BindOutOfRangeSnafu { offset, size: target.size, allocation_size }
        );
        target.binding = Some((memory, offset));
        Ok(())
    }

    fn map_memory(&self, memory: MemoryHandle, offset: u64, size: u64) -> Result<NonNull<u8>> {
        let mut state = self.state.lock();
        Self::alive(&state, "map_memory")?;
        let target = state.memories.get_mut(&memory).context(InvalidMemorySnafu { handle: memory })?;
        ensure!(target.host_visible, NotHostVisibleSnafu { handle: memory });
        ensure!(!target.mapped, AlreadyMappedSnafu { handle: memory });
        ensure!(
            offset.checked_add(size).is_some_and(|end| end <= target.size),
            MapOutOfRangeSnafu { offset, size, allocation_size: target.size }
        );
        target.mapped = true;
        // SAFETY: offset is within the block (checked above) and the block pointer is non-null.
        Ok(unsafe { NonNull::new_unchecked(target.block.as_ptr().add(offset as usize)) })
    }

    fn unmap_memory(&self, memory: MemoryHandle) {
        let mut state = self.state.lock();
        match state.memories.get_mut(&memory) {
            Some(target) => target.mapped = false,
            None => tracing::warn!(handle = ?memory, "unmap of unknown memory ignored"),
        }
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        let mut state = self.state.lock();
        if state.destroyed {
            tracing::warn!(handle = ?buffer, "destroy_buffer on destroyed device ignored");
            return;
        }
        match state.buffers.remove(&buffer) {
            Some(_) => tracing::debug!(handle = ?buffer, "buffer destroyed"),
            None => tracing::warn!(handle = ?buffer, "destroy of unknown buffer ignored"),
        }
    }

    fn free_memory(&self, memory: MemoryHandle) {
        let mut state = self.state.lock();
        if state.destroyed {
            tracing::warn!(handle = ?memory, "free_memory on destroyed device ignored");
            return;
        }
        match state.memories.remove(&memory) {
            Some(freed) => {
                state.heap_usage[freed.heap as usize] -= freed.size;
                tracing::debug!(handle = ?memory, size = freed.size, "memory freed");
            }
            None => tracing::warn!(handle = ?memory, "free of unknown memory ignored"),
        }
    }

    fn queue(&self, family: u32, index: u32) -> Result<Arc<dyn Queue>> {
        Self::alive(&self.state.lock(), "queue")?;
        let family_queues = self
            .queues
            .get(&family)
            .context(QueueFamilyOutOfRangeSnafu { family, count: self.families.len() })?;
        let queue = family_queues
            .get(index as usize)
            .context(QueueIndexOutOfRangeSnafu { family, index, count: family_queues.len() as u32 })?;
        Ok(Arc::clone(queue) as Arc<dyn Queue>)
    }

    fn enabled_extensions(&self) -> Vec<String> {
        self.extensions.clone()
    }

    fn wait_idle(&self) -> Result<()> {
        Self::alive(&self.state.lock(), "wait_idle")?;
        // Submissions execute inline, so every queue is idle once submit returns.
        Ok(())
    }

    fn destroy(&self) {
        let mut state = self.state.lock();
        if state.destroyed {
            return;
        }
        state.destroyed = true;
        if !state.buffers.is_empty() || !state.memories.is_empty() {
            // Host blocks stay alive until the device itself drops so stale mapped pointers never dangle.
            tracing::warn!(
                buffers = state.buffers.len(),
                allocations = state.memories.len(),
                "host device destroyed with live objects"
            );
        }
        tracing::debug!("host logical device destroyed");
    }

    fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }
}
