//! Memory types, heaps and allocation requirements reported by a physical device.

use snafu::OptionExt;

use crate::error::{NoSuitableMemoryTypeSnafu, Result};
use crate::flags::MemoryPropertyFlags;

/// One kind of memory a device can allocate from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryType {
    pub properties: MemoryPropertyFlags,
    pub heap_index: u32,
}

/// A pool of memory backing one or more memory types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryHeap {
    /// Capacity in bytes.
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryProperties {
    pub types: Vec<MemoryType>,
    pub heaps: Vec<MemoryHeap>,
}

impl MemoryProperties {
    /// Pick the first memory type allowed by `type_bits` that has every property in `required`.
    pub fn find_memory_type(&self, type_bits: u32, required: MemoryPropertyFlags) -> Option<u32> {
        self.types
            .iter()
            .enumerate()
            .take(u32::BITS as usize)
            .find(|(index, ty)| type_bits & (1 << index) != 0 && ty.properties.is_superset(required))
            .map(|(index, _)| index as u32)
    }

    /// Like [`Self::find_memory_type`] but fails with `NoSuitableMemoryType`.
    pub fn require_memory_type(&self, type_bits: u32, required: MemoryPropertyFlags) -> Result<u32> {
        self.find_memory_type(type_bits, required).context(NoSuitableMemoryTypeSnafu { type_bits, required })
    }
}

/// Size, alignment and allowed memory types for backing a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequirements {
    pub size: u64,
    pub alignment: u64,
    /// Bit `i` is set when memory type `i` may back the buffer.
    pub memory_type_bits: u32,
}
