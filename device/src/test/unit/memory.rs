use crate::test::helpers::{bound_buffer, device, device_with};
use crate::cpu::CpuDeviceConfig;
use crate::{BufferUsage, Error, LogicalDevice};

#[test]
fn test_allocation_accounting() {
    let (_, device) = device();
    let (buffer, memory) = bound_buffer(&device, 100, BufferUsage::StorageBuffer.into(), 0);

    let stats = device.stats();
    assert_eq!((stats.live_buffers, stats.live_allocations), (1, 1));
    assert_eq!(device.heap_usage(), vec![128, 0]);

    device.destroy_buffer(buffer);
    device.free_memory(memory);
    let stats = device.stats();
    assert_eq!((stats.live_buffers, stats.live_allocations), (0, 0));
    assert_eq!(device.heap_usage(), vec![0, 0]);
}

#[test]
fn test_device_local_memory_cannot_be_mapped() {
    let (_, device) = device();
    let (_, memory) = bound_buffer(&device, 16, BufferUsage::StorageBuffer.into(), 0);
    assert!(matches!(device.map_memory(memory, 0, 16), Err(Error::NotHostVisible { .. })));
}

#[test]
fn test_map_is_exclusive_and_zeroed() {
    let (_, device) = device();
    let (_, memory) = bound_buffer(&device, 16, BufferUsage::TransferSrc.into(), 1);

    let ptr = device.map_memory(memory, 0, 16).unwrap();
    let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 16) };
    assert!(bytes.iter().all(|&b| b == 0));
    assert_eq!(ptr.as_ptr() as usize % 64, 0);
    assert!(matches!(device.map_memory(memory, 0, 16), Err(Error::AlreadyMapped { .. })));
    assert_eq!(device.stats().mapped_allocations, 1);

    device.unmap_memory(memory);
    assert!(device.map_memory(memory, 0, 16).is_ok());
}

#[test]
fn test_heap_exhaustion() {
    let (_, device) = device_with(CpuDeviceConfig { device_heap_size: 256, ..Default::default() });
    assert!(device.allocate_memory(256, 0).is_ok());
    assert!(matches!(device.allocate_memory(64, 0), Err(Error::OutOfDeviceMemory { heap: 0, .. })));
    assert!(device.allocate_memory(64, 1).is_ok());
}

#[test]
fn test_binding_rules() {
    let (_, device) = device();
    let buffer = device.create_buffer(128, BufferUsage::StorageBuffer.into()).unwrap();
    let small = device.allocate_memory(64, 0).unwrap();
    let large = device.allocate_memory(256, 0).unwrap();

    assert!(matches!(device.bind_buffer_memory(buffer, small, 0), Err(Error::BindOutOfRange { .. })));
    assert!(matches!(device.bind_buffer_memory(buffer, large, 192), Err(Error::BindOutOfRange { .. })));
    device.bind_buffer_memory(buffer, large, 128).unwrap();
    assert!(matches!(device.bind_buffer_memory(buffer, large, 0), Err(Error::AlreadyBound { .. })));
    assert!(matches!(device.create_buffer(0, BufferUsage::StorageBuffer.into()), Err(Error::ZeroSize)));
}

#[test]
fn test_release_after_destroy_is_ignored() {
    let (_, device) = device();
    let (buffer, memory) = bound_buffer(&device, 16, BufferUsage::StorageBuffer.into(), 0);
    device.destroy();
    device.destroy();
    assert!(device.is_destroyed());

    device.destroy_buffer(buffer);
    device.free_memory(memory);
    assert_eq!(device.stats().live_buffers, 1);
    assert!(matches!(device.create_buffer(16, BufferUsage::StorageBuffer.into()), Err(Error::DeviceLost { .. })));
}
