use std::cell::RefCell;
use std::ptr::NonNull;
use std::sync::Arc;

use halyard_device::flags::HOST_STAGING;
use halyard_device::{
    Access, AccessFlags, BufferCopy, BufferHandle, BufferMemoryBarrier, BufferUsageFlags, CommandBuffer, LogicalDevice,
    MemoryHandle, MemoryPropertyFlags, Owned, PhysicalDevice, PipelineStage, PipelineStageFlags,
};
use halyard_dtype::{DataType, HasDataType, ext};
use snafu::{OptionExt, ResultExt, ensure};
use tracing::{debug, trace, warn};

use crate::TensorTier;
use crate::error::*;

/// Buffer and memory created outside halyard, adopted by [`Tensor::from_external`] without taking
/// ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalAllocation {
    pub buffer: BufferHandle,
    pub memory: MemoryHandle,
}

/// Binding information a shader descriptor needs for a tensor's primary buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBufferInfo {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub range: u64,
}

#[derive(Debug)]
struct Allocation {
    buffer: Owned<BufferHandle>,
    memory: Owned<MemoryHandle>,
}

impl Allocation {
    fn owned(buffer: BufferHandle, memory: MemoryHandle) -> Self {
        Self { buffer: Owned::owned(buffer), memory: Owned::owned(memory) }
    }

    fn borrowed(external: ExternalAllocation) -> Self {
        Self { buffer: Owned::borrowed(external.buffer), memory: Owned::borrowed(external.memory) }
    }

    fn buffer(&self) -> BufferHandle {
        self.buffer.handle()
    }

    /// Buffer first, then its memory. Borrowed halves are left to their owner.
    fn release(self, device: &dyn LogicalDevice) {
        let buffer = self.buffer.handle();
        if !self.buffer.release(|handle| device.destroy_buffer(handle)) {
            debug!(?buffer, "borrowed buffer left to its owner");
        }
        self.memory.release(|handle| device.free_memory(handle));
    }
}

#[derive(Debug)]
struct Mapping {
    memory: MemoryHandle,
    ptr: NonNull<u8>,
}

#[derive(Debug, Default)]
struct TensorState {
    element_count: usize,
    element_size: usize,
    primary: Option<Allocation>,
    staging: Option<Allocation>,
    /// Staging memory for Device tensors, primary memory for Host tensors, never set for Storage.
    mapping: Option<Mapping>,
}

/// Byte size of `element_count` elements of `element_size` bytes, rejecting empty and overflowing extents.
fn checked_extent(element_count: usize, element_size: usize) -> Result<usize> {
    ensure!(element_count > 0 && element_size > 0, EmptyTensorSnafu);
    element_count.checked_mul(element_size).context(ExtentOverflowSnafu { element_count, element_size })
}

impl TensorState {
    /// Only set from extents that passed [`checked_extent`].
    fn memory_size(&self) -> usize {
        self.element_count * self.element_size
    }
}

/// A flat buffer of `size()` elements of `element_size()` bytes each, backed by device memory.
///
/// Depending on its [`TensorTier`] a tensor holds a primary allocation and, for the Device tier, a
/// host-visible staging allocation that stays mapped for the tensor's lifetime. Host data is always
/// written through the mapping; moving it between staging and primary memory is recorded into a
/// [`CommandBuffer`] and only happens once that buffer is submitted.
///
/// Tensors are shared through `Rc` and are not `Send`: all state sits behind a `RefCell` and the
/// mapping is a raw pointer into device memory.
#[derive(Debug)]
pub struct Tensor {
    physical: Arc<dyn PhysicalDevice>,
    device: Arc<dyn LogicalDevice>,
    data_type: DataType,
    tier: TensorTier,
    state: RefCell<TensorState>,
}

impl Tensor {
    fn uninit(
        physical: Arc<dyn PhysicalDevice>,
        device: Arc<dyn LogicalDevice>,
        data_type: DataType,
        tier: TensorTier,
    ) -> Self {
        Self { physical, device, data_type, tier, state: RefCell::default() }
    }

    /// Allocate memory for `element_count` elements of `element_size` bytes and upload `data`
    /// into whichever allocation is host-visible. Storage tensors ignore `data` beyond its length.
    pub fn new(
        physical: Arc<dyn PhysicalDevice>,
        device: Arc<dyn LogicalDevice>,
        data: &[u8],
        element_count: usize,
        element_size: usize,
        data_type: DataType,
        tier: TensorTier,
    ) -> Result<Self> {
        let tensor = Self::uninit(physical, device, data_type, tier);
        tensor.rebuild(data, element_count, element_size)?;
        Ok(tensor)
    }

    pub fn from_slice<T: HasDataType>(
        physical: Arc<dyn PhysicalDevice>,
        device: Arc<dyn LogicalDevice>,
        data: &[T],
        tier: TensorTier,
    ) -> Result<Self> {
        Self::new(physical, device, ext::as_bytes(data), data.len(), size_of::<T>(), T::DATA_TYPE, tier)
    }

    /// Wrap an externally created primary buffer. The primary pair is borrowed and never released
    /// here; a Device tensor still allocates (and owns) its own staging pair. Nothing is uploaded.
    pub fn from_external(
        physical: Arc<dyn PhysicalDevice>,
        device: Arc<dyn LogicalDevice>,
        primary: ExternalAllocation,
        element_count: usize,
        element_size: usize,
        data_type: DataType,
        tier: TensorTier,
    ) -> Result<Self> {
        checked_extent(element_count, element_size)?;
        let tensor = Self::uninit(physical, device, data_type, tier);
        {
            let mut state = tensor.state.borrow_mut();
            state.element_count = element_count;
            state.element_size = element_size;
            state.primary = Some(Allocation::borrowed(primary));
            if tier.has_staging() {
                let size = state.memory_size() as u64;
                state.staging = Some(tensor.create_allocation(size, TensorTier::staging_usage(), HOST_STAGING)?);
            }
            tensor.map(&mut state)?;
        }
        debug!(%tier, buffer = ?primary.buffer, element_count, "tensor adopted external buffer");
        Ok(tensor)
    }

    /// Release the current allocations and allocate fresh ones for the new extent, keeping the tier.
    pub fn rebuild(&self, data: &[u8], element_count: usize, element_size: usize) -> Result<()> {
        let expected = checked_extent(element_count, element_size)?;
        ensure!(data.len() == expected, SizeMismatchSnafu { expected, actual: data.len() });

        self.destroy();
        let mut state = self.state.borrow_mut();
        state.element_count = element_count;
        state.element_size = element_size;
        let allocated = self.allocate(&mut state, data);
        drop(state);

        match allocated {
            Ok(()) => {
                debug!(tier = %self.tier, data_type = %self.data_type, element_count, element_size, "tensor allocated");
                Ok(())
            }
            Err(error) => {
                // Whatever was allocated before the failure goes back to the device.
                self.destroy();
                Err(error)
            }
        }
    }

    fn allocate(&self, state: &mut TensorState, data: &[u8]) -> Result<()> {
        let size = state.memory_size() as u64;
        state.primary = Some(self.create_allocation(size, self.tier.primary_usage(), self.tier.primary_memory())?);
        if self.tier.has_staging() {
            state.staging = Some(self.create_allocation(size, TensorTier::staging_usage(), HOST_STAGING)?);
        }
        self.map(state)?;
        if let Some(mapping) = &state.mapping {
            // SAFETY: the mapping covers `memory_size()` bytes and `data` was checked to be that long.
            unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), mapping.ptr.as_ptr(), data.len()) };
        }
        Ok(())
    }

    fn create_allocation(&self, size: u64, usage: BufferUsageFlags, required: MemoryPropertyFlags) -> Result<Allocation> {
        let buffer = self.device.create_buffer(size, usage).context(DeviceSnafu)?;
        match self.bind_new_memory(buffer, required) {
            Ok(memory) => {
                trace!(?buffer, ?memory, size, ?usage, "allocation bound");
                Ok(Allocation::owned(buffer, memory))
            }
            Err(source) => {
                self.device.destroy_buffer(buffer);
                Err(source).context(DeviceSnafu)
            }
        }
    }

    fn bind_new_memory(
        &self,
        buffer: BufferHandle,
        required: MemoryPropertyFlags,
    ) -> halyard_device::Result<MemoryHandle> {
        let requirements = self.device.buffer_memory_requirements(buffer)?;
        let memory_type =
            self.physical.memory_properties().require_memory_type(requirements.memory_type_bits, required)?;
        let memory = self.device.allocate_memory(requirements.size, memory_type)?;
        if let Err(source) = self.device.bind_buffer_memory(buffer, memory, 0) {
            self.device.free_memory(memory);
            return Err(source);
        }
        Ok(memory)
    }

    fn map(&self, state: &mut TensorState) -> Result<()> {
        let target = match self.tier {
            TensorTier::Device => state.staging.as_ref(),
            TensorTier::Host => state.primary.as_ref(),
            TensorTier::Storage => None,
        };
        let Some(allocation) = target else {
            return Ok(());
        };
        let memory = allocation.memory.handle();
        let ptr = self.device.map_memory(memory, 0, state.memory_size() as u64).context(DeviceSnafu)?;
        state.mapping = Some(Mapping { memory, ptr });
        Ok(())
    }

    /// Unmap, then release staging and primary allocations this tensor owns. Safe to call repeatedly.
    pub fn destroy(&self) {
        let mut state = self.state.borrow_mut();
        if let Some(mapping) = state.mapping.take() {
            self.device.unmap_memory(mapping.memory);
        }
        let staging = state.staging.take();
        let primary = state.primary.take();
        if staging.is_none() && primary.is_none() {
            return;
        }
        if let Some(staging) = staging {
            staging.release(&*self.device);
        }
        if let Some(primary) = primary {
            primary.release(&*self.device);
        }
        debug!(tier = %self.tier, element_count = state.element_count, "tensor destroyed");
    }

    pub fn is_init(&self) -> bool {
        self.state.borrow().primary.is_some() && !self.device.is_destroyed()
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.state.borrow().element_count
    }

    /// Bytes per element.
    pub fn element_size(&self) -> usize {
        self.state.borrow().element_size
    }

    /// Total bytes: `size() * element_size()`.
    pub fn memory_size(&self) -> usize {
        self.state.borrow().memory_size()
    }

    pub fn tier(&self) -> TensorTier {
        self.tier
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn physical_device(&self) -> &Arc<dyn PhysicalDevice> {
        &self.physical
    }

    pub fn device(&self) -> &Arc<dyn LogicalDevice> {
        &self.device
    }

    /// Host address of the mapped memory: staging for Device tensors, primary for Host tensors.
    pub fn raw_data(&self) -> Option<NonNull<u8>> {
        self.state.borrow().mapping.as_ref().map(|mapping| mapping.ptr)
    }

    /// Reinterpret the mapped memory as a slice of `T`.
    ///
    /// Returns `None` for Storage tensors, destroyed tensors, and zero-sized `T`.
    ///
    /// # Safety
    ///
    /// The slice aliases the mapping. It must not be used after `rebuild`, `destroy` or drop, nor
    /// while the tensor is written through `set_raw_data` or a [`TypedTensor`](crate::TypedTensor).
    /// Every element must be a valid, suitably aligned `T`; nothing checks `T` against
    /// [`data_type`](Self::data_type).
    pub unsafe fn data<T>(&self) -> Option<&[T]> {
        let state = self.state.borrow();
        let mapping = state.mapping.as_ref()?;
        let len = state.memory_size().checked_div(size_of::<T>())?;
        // SAFETY: upheld by the caller as documented above.
        Some(unsafe { std::slice::from_raw_parts(mapping.ptr.as_ptr().cast::<T>(), len) })
    }

    /// Copy the mapped contents out unchanged.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        self.with_host_bytes(|bytes| bytes.to_vec())
    }

    /// Copy the mapped contents out as elements of `T`.
    pub fn vector<T: HasDataType>(&self) -> Result<Vec<T>> {
        self.check_element_type::<T>()?;
        self.with_host_bytes(|bytes| ext::from_bytes(bytes))
    }

    /// Overwrite the mapped memory with `data`, which must be exactly `memory_size()` bytes.
    ///
    /// Device memory is not touched: a Device tensor needs a recorded staging-to-device copy before
    /// shaders see the new contents. Storage tensors have nothing to write into; the call is
    /// skipped with a warning.
    pub fn set_raw_data(&self, data: &[u8]) -> Result<()> {
        let expected = self.memory_size();
        ensure!(data.len() == expected, SizeMismatchSnafu { expected, actual: data.len() });
        match self.with_host_bytes(|bytes| bytes.copy_from_slice(data)) {
            Err(Error::NoHostView { tier }) => {
                warn!(%tier, "tensor has no host-visible memory; data not written");
                Ok(())
            }
            written => written,
        }
    }

    pub(crate) fn check_element_type<T: HasDataType>(&self) -> Result<()> {
        ensure!(
            T::DATA_TYPE == self.data_type,
            DataTypeMismatchSnafu { expected: self.data_type, actual: T::DATA_TYPE }
        );
        let element_size = self.element_size();
        ensure!(
            element_size == size_of::<T>(),
            ElementSizeMismatchSnafu { expected: element_size, actual: size_of::<T>() }
        );
        Ok(())
    }

    pub(crate) fn with_host_bytes<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        let state = self.state.borrow();
        ensure!(state.primary.is_some(), NotInitializedSnafu);
        let mapping = state.mapping.as_ref().context(NoHostViewSnafu { tier: self.tier })?;
        // SAFETY: the mapping covers `memory_size()` bytes and stays valid while `state` is borrowed.
        let bytes = unsafe { std::slice::from_raw_parts_mut(mapping.ptr.as_ptr(), state.memory_size()) };
        Ok(f(bytes))
    }

    fn primary_buffer(&self) -> Result<BufferHandle> {
        self.state.borrow().primary.as_ref().map(Allocation::buffer).context(NotInitializedSnafu)
    }

    fn staging_pair(&self) -> Result<(BufferHandle, BufferHandle)> {
        let state = self.state.borrow();
        let primary = state.primary.as_ref().map(Allocation::buffer).context(NotInitializedSnafu)?;
        let staging = state.staging.as_ref().map(Allocation::buffer).context(NotInitializedSnafu)?;
        Ok((staging, primary))
    }

    pub fn descriptor_buffer_info(&self) -> Result<DescriptorBufferInfo> {
        Ok(DescriptorBufferInfo { buffer: self.primary_buffer()?, offset: 0, range: self.memory_size() as u64 })
    }

    /// Record a full-extent copy of `source`'s primary buffer into this tensor's primary buffer.
    ///
    /// With `with_barrier`, a transfer-write to shader-read barrier follows the copy.
    pub fn record_copy_from(&self, cmd: &mut CommandBuffer, source: &Tensor, with_barrier: bool) -> Result<()> {
        let dst = self.primary_buffer()?;
        let src = source.primary_buffer()?;
        let size = self.memory_size();
        ensure!(source.memory_size() == size, SizeMismatchSnafu { expected: size, actual: source.memory_size() });

        cmd.copy_buffer(src, dst, BufferCopy::whole(size as u64));
        if with_barrier {
            self.record_transfer_to_shader_barrier(cmd)?;
        }
        Ok(())
    }

    /// Record staging → primary. Only Device tensors have staging; other tiers skip with a warning.
    pub fn record_copy_from_staging_to_device(&self, cmd: &mut CommandBuffer, with_barrier: bool) -> Result<()> {
        if !self.tier.has_staging() {
            warn!(tier = %self.tier, "staging to device copy skipped: tensor has no staging buffer");
            return Ok(());
        }
        let (staging, primary) = self.staging_pair()?;
        cmd.copy_buffer(staging, primary, BufferCopy::whole(self.memory_size() as u64));
        if with_barrier {
            self.record_transfer_to_shader_barrier(cmd)?;
        }
        Ok(())
    }

    /// Record primary → staging. Only Device tensors have staging; other tiers skip with a warning.
    ///
    /// With `with_barrier`, a shader-write to transfer-read barrier precedes the copy so that
    /// earlier dispatches finish writing before the copy reads.
    pub fn record_copy_from_device_to_staging(&self, cmd: &mut CommandBuffer, with_barrier: bool) -> Result<()> {
        if !self.tier.has_staging() {
            warn!(tier = %self.tier, "device to staging copy skipped: tensor has no staging buffer");
            return Ok(());
        }
        let (staging, primary) = self.staging_pair()?;
        if with_barrier {
            self.record_buffer_memory_barrier(
                cmd,
                Access::ShaderWrite.into(),
                Access::TransferRead.into(),
                PipelineStage::ComputeShader.into(),
                PipelineStage::Transfer.into(),
            )?;
        }
        cmd.copy_buffer(primary, staging, BufferCopy::whole(self.memory_size() as u64));
        Ok(())
    }

    fn record_transfer_to_shader_barrier(&self, cmd: &mut CommandBuffer) -> Result<()> {
        self.record_buffer_memory_barrier(
            cmd,
            Access::TransferWrite.into(),
            Access::ShaderRead.into(),
            PipelineStage::Transfer.into(),
            PipelineStage::ComputeShader.into(),
        )
    }

    /// Record one barrier covering the whole primary buffer.
    pub fn record_buffer_memory_barrier(
        &self,
        cmd: &mut CommandBuffer,
        src_access: AccessFlags,
        dst_access: AccessFlags,
        src_stage: PipelineStageFlags,
        dst_stage: PipelineStageFlags,
    ) -> Result<()> {
        let buffer = self.primary_buffer()?;
        let size = self.memory_size() as u64;
        cmd.pipeline_barrier(
            src_stage,
            dst_stage,
            BufferMemoryBarrier { buffer, src_access, dst_access, offset: 0, size },
        );
        Ok(())
    }
}

impl Drop for Tensor {
    fn drop(&mut self) {
        self.destroy();
    }
}
