use std::sync::Arc;

use halyard_device::{Instance, LogicalDevice, QueueFamilyProperties};
use halyard_tensor::TensorTier;
use test_case::test_case;

use crate::test::helpers::{External, config_with_families, instance_with_families, manager};
use crate::ops::TensorSyncDevice;
use crate::{Error, MAX_TIMESTAMP_COUNT, Manager, ManagerConfig};

#[test]
fn test_owned_device_is_destroyed_with_manager() {
    let instance = halyard_device::cpu::CpuInstance::new();
    let manager = Manager::with_instance(instance.clone(), &ManagerConfig::default()).unwrap();
    let tensor = manager.tensor(&[1.0f32, 2.0]).unwrap();
    let device = Arc::clone(tensor.device());

    manager.destroy();
    assert!(manager.is_destroyed());
    assert!(device.is_destroyed());
    assert!(instance.is_destroyed());
    assert!(!tensor.is_init());

    // A second destroy, and the drop after it, are no-ops.
    manager.destroy();
    drop(manager);
}

#[test]
fn test_factories_fail_after_destroy() {
    let manager = manager();
    manager.destroy();

    assert!(matches!(manager.tensor(&[1u32]), Err(Error::ManagerDestroyed)));
    assert!(matches!(manager.sequence(0, 0), Err(Error::ManagerDestroyed)));
    assert!(matches!(manager.algorithm().call(), Err(Error::ManagerDestroyed)));
    assert!(matches!(manager.device_properties(), Err(Error::ManagerDestroyed)));
    assert_eq!(manager.queue_count(), 0);
}

#[test]
fn test_external_device_is_never_freed() {
    let external = External::new();
    let manager = external.manager();
    let tensor = manager.tensor(&[1u32, 2, 3]).unwrap();
    let sequence = manager.sequence(0, 0).unwrap();
    assert_eq!(external.stats().live_buffers, 2);

    manager.destroy();
    assert!(!external.device.is_destroyed());
    assert!(!external.instance.is_destroyed());
    // Managed resources are still torn down.
    assert_eq!(external.stats().live_buffers, 0);
    assert!(!tensor.is_init());
    assert!(!sequence.is_init());
}

#[test]
fn test_unmanaged_resources_survive_destroy() {
    let manager = Manager::with_config(ManagerConfig::builder().manage_resources(false).build()).unwrap();
    let tensor = manager.tensor_with_tier(&[1u32, 2], TensorTier::Host).unwrap();
    let algorithm = manager.algorithm().tensors(vec![tensor.clone()]).spirv(vec![1]).call().unwrap();

    manager.destroy();
    assert!(tensor.raw_data().is_some());
    assert_eq!(algorithm.tensors().len(), 1);
}

#[test]
fn test_managed_resources_are_destroyed() {
    let manager = manager();
    let tensor = manager.tensor_with_tier(&[1u32, 2], TensorTier::Host).unwrap();
    let algorithm = manager.algorithm().tensors(vec![tensor.clone()]).spirv(vec![1]).call().unwrap();
    let sequence = manager.sequence(0, 0).unwrap();

    manager.destroy();
    assert!(tensor.raw_data().is_none());
    assert!(algorithm.tensors().is_empty());
    assert!(matches!(sequence.begin(), Err(Error::SequenceDestroyed)));
}

#[test]
fn test_clear_forgets_only_released_resources() {
    let manager = manager();
    let kept = manager.tensor(&[1u32]).unwrap();
    let released = manager.tensor(&[2u32]).unwrap();
    let sequence = manager.sequence(0, 0).unwrap();
    let algorithm = manager.algorithm().call().unwrap();
    assert_eq!((manager.tensor_count(), manager.sequence_count(), manager.algorithm_count()), (2, 1, 1));

    manager.clear();
    assert_eq!(manager.tensor_count(), 2);

    drop(released);
    // Expired observations linger until swept.
    assert_eq!(manager.tensor_count(), 2);
    manager.clear();
    assert_eq!(manager.tensor_count(), 1);
    assert!(kept.is_init());

    drop(sequence);
    drop(algorithm);
    manager.clear();
    assert_eq!((manager.tensor_count(), manager.sequence_count(), manager.algorithm_count()), (1, 0, 0));
}

#[test]
fn test_clear_does_no_device_work() {
    let external = External::new();
    let manager = external.manager();
    let tensor = manager.tensor(&[1u32]).unwrap();
    let before = external.stats();

    manager.clear();
    assert_eq!(external.stats(), before);
    drop(tensor);
}

#[test_case(u32::MAX; "u32_max")]
#[test_case(MAX_TIMESTAMP_COUNT + 1; "just_past_limit")]
fn test_sequence_rejects_too_many_timestamps(count: u32) {
    let manager = manager();
    let result = manager.sequence(0, count);
    assert!(matches!(result, Err(Error::TooManyTimestamps { requested, max: MAX_TIMESTAMP_COUNT }) if requested == count));
    assert_eq!(manager.sequence_count(), 0);
}

#[test]
fn test_sequence_accepts_timestamp_limit() {
    let manager = manager();
    let tensor = manager.tensor(&[1u32]).unwrap();
    let sequence = manager.sequence(0, MAX_TIMESTAMP_COUNT).unwrap();
    sequence.eval_op(TensorSyncDevice::new(vec![tensor]).unwrap()).unwrap();
    assert_eq!(sequence.timestamps().unwrap().len(), 2);
}

#[test]
fn test_sequence_queue_index_out_of_range() {
    let manager = manager();
    assert_eq!(manager.queue_count(), 1);
    assert!(matches!(manager.sequence(1, 0), Err(Error::QueueIndexOutOfRange { index: 1, count: 1 })));
}

#[test]
fn test_repeated_family_creates_successive_queues() {
    let manager = Manager::with_config(config_with_families(vec![0, 0, 1])).unwrap();
    assert_eq!(manager.queue_count(), 3);
    for index in 0..3 {
        assert!(manager.sequence(index, 0).unwrap().is_init());
    }
}

#[test]
fn test_family_with_too_few_queues_is_rejected() {
    // The default host device has two queues in family 0.
    let result = Manager::with_config(config_with_families(vec![0, 0, 0]));
    assert!(matches!(result, Err(Error::Device { .. })));
}

#[test]
fn test_physical_device_out_of_range() {
    let config = ManagerConfig::builder().physical_device_index(3).build();
    assert!(matches!(Manager::with_config(config), Err(Error::PhysicalDeviceOutOfRange { index: 3, count: 1 })));
}

#[test]
fn test_unsupported_extensions_are_skipped() {
    let config = ManagerConfig::builder()
        .extensions(vec!["VK_KHR_storage_buffer_storage_class".to_string(), "VK_NV_made_up".to_string()])
        .build();
    let manager = Manager::with_config(config).unwrap();
    assert_eq!(manager.enabled_extensions().unwrap(), vec!["VK_KHR_storage_buffer_storage_class".to_string()]);
}

#[test]
fn test_failed_setup_destroys_owned_instance() {
    let transfer_only = QueueFamilyProperties {
        supports_compute: false,
        supports_transfer: true,
        queue_count: 1,
        supports_timestamps: false,
    };
    let instance = instance_with_families(vec![transfer_only]);
    let result = Manager::with_instance(instance.clone(), &ManagerConfig::default());
    assert!(matches!(result, Err(Error::NoComputeQueue)));
    assert!(instance.is_destroyed());
}

#[test_case(vec![0], 3; "timestamp_family")]
#[test_case(vec![1], 0; "family_without_timestamps")]
fn test_timestamps_follow_family_support(families: Vec<u32>, expected: usize) {
    let manager = Manager::with_config(config_with_families(families)).unwrap();
    let sequence = manager.sequence(0, 4).unwrap();
    let tensor = manager.tensor(&[1u32]).unwrap();
    sequence.record(crate::ops::TensorSyncDevice::new(vec![tensor.clone()]).unwrap()).unwrap();
    sequence.record(crate::ops::TensorSyncLocal::new(vec![tensor]).unwrap()).unwrap();
    sequence.eval().unwrap();

    match sequence.timestamps() {
        Ok(timestamps) => assert_eq!(timestamps.len(), expected),
        Err(error) => {
            assert!(matches!(error, Error::TimestampsDisabled));
            assert_eq!(expected, 0);
        }
    }
}

#[test]
fn test_typed_tensor_factory() {
    let manager = manager();
    let typed = manager.typed_tensor(&[1.5f64, 2.5], TensorTier::Host).unwrap();
    typed.set(1, 4.0).unwrap();
    assert_eq!(typed.vector().unwrap(), vec![1.5, 4.0]);
    assert_eq!(manager.tensor_count(), 1);
}

#[test]
fn test_tensor_raw_uses_declared_extent() {
    let manager = manager();
    let tensor = manager
        .tensor_raw(&[1, 0, 2, 0], 2, 2, halyard_dtype::DataType::UnsignedInt, TensorTier::Host)
        .unwrap();
    assert_eq!((tensor.size(), tensor.element_size()), (2, 2));
    assert!(matches!(
        manager.tensor_raw(&[], 0, 4, halyard_dtype::DataType::Float, TensorTier::Device),
        Err(Error::Tensor { source: halyard_tensor::Error::EmptyTensor })
    ));
}

#[test]
fn test_device_properties_name_the_device() {
    let manager = manager();
    assert_eq!(manager.device_properties().unwrap().name, "halyard host device");
}
