use halyard_device::{Access, AccessFlags, Command, CommandBuffer};
use halyard_dtype::{DataType, ext};
use halyard_tensor::TensorTier;
use test_case::test_case;

use crate::Error;
use crate::ops::{AlgoDispatch, Operation, TensorCopy, TensorSyncDevice, TensorSyncLocal};
use crate::test::helpers::{External, manager};

#[test]
fn test_operations_reject_missing_tensors() {
    let manager = manager();
    let one = manager.tensor(&[1u32]).unwrap();

    assert!(matches!(TensorSyncDevice::new(vec![]), Err(Error::TooFewTensors { required: 1, actual: 0, .. })));
    assert!(matches!(TensorSyncLocal::new(vec![]), Err(Error::TooFewTensors { required: 1, actual: 0, .. })));
    assert!(matches!(TensorCopy::new(vec![one]), Err(Error::TooFewTensors { required: 2, actual: 1, .. })));
}

#[test]
fn test_copy_requires_one_data_type() {
    let manager = manager();
    let source = manager.tensor(&[1u32]).unwrap();
    let target = manager.tensor(&[1i32]).unwrap();
    assert!(matches!(
        TensorCopy::new(vec![source, target]),
        Err(Error::TensorDataTypeMismatch { expected: DataType::UnsignedInt, actual: DataType::Int, .. })
    ));
}

#[test_case(TensorTier::Device; "device")]
#[test_case(TensorTier::Host; "host")]
fn test_copy_reaches_every_target(tier: TensorTier) {
    let manager = manager();
    let source = manager.tensor_with_tier(&[1i32, 2, 3], tier).unwrap();
    let first = manager.tensor_with_tier(&[0i32; 3], tier).unwrap();
    let second = manager.tensor_with_tier(&[0i32; 3], tier).unwrap();

    let sequence = manager.sequence(0, 0).unwrap();
    sequence.record(TensorSyncDevice::new(vec![source.clone()]).unwrap()).unwrap();
    sequence.record(TensorCopy::new(vec![source.clone(), first.clone(), second.clone()]).unwrap()).unwrap();
    sequence.eval().unwrap();
    assert_eq!(first.vector::<i32>().unwrap(), vec![1, 2, 3]);
    assert_eq!(second.vector::<i32>().unwrap(), vec![1, 2, 3]);

    if tier.has_staging() {
        // The device side holds the copy too, not just the mirrored host view.
        first.set_raw_data(&[0; 12]).unwrap();
        sequence.eval_op(TensorSyncLocal::new(vec![first.clone()]).unwrap()).unwrap();
        assert_eq!(first.vector::<i32>().unwrap(), vec![1, 2, 3]);
    }
}

#[test]
fn test_copy_extent_mismatch_fails_on_record() {
    let manager = manager();
    let source = manager.tensor(&[1u32, 2]).unwrap();
    let target = manager.tensor(&[1u32]).unwrap();
    let copy = TensorCopy::new(vec![source, target]).unwrap();

    let mut cmd = CommandBuffer::new();
    assert!(matches!(
        copy.record(&mut cmd),
        Err(Error::Tensor { source: halyard_tensor::Error::SizeMismatch { expected: 4, actual: 8 } })
    ));
}

#[test]
fn test_sync_skips_tiers_without_staging() {
    let manager = manager();
    let host = manager.tensor_with_tier(&[1u32], TensorTier::Host).unwrap();
    let storage = manager.tensor_with_tier(&[1u32], TensorTier::Storage).unwrap();

    let mut cmd = CommandBuffer::new();
    TensorSyncDevice::new(vec![host.clone(), storage.clone()]).unwrap().record(&mut cmd).unwrap();
    TensorSyncLocal::new(vec![host, storage]).unwrap().record(&mut cmd).unwrap();
    assert!(cmd.is_empty());
}

#[test]
fn test_dispatch_barriers_every_bound_tensor() {
    let manager = manager();
    let a = manager.tensor(&[1.0f32, 2.0]).unwrap();
    let b = manager.tensor_with_tier(&[0.0f32, 0.0], TensorTier::Storage).unwrap();
    let algorithm = manager
        .algorithm()
        .tensors(vec![a.clone(), b.clone()])
        .spirv(vec![0x0723_0203])
        .push_constants(vec![0.5])
        .call()
        .unwrap();

    let mut cmd = CommandBuffer::new();
    AlgoDispatch::new(algorithm).record(&mut cmd).unwrap();
    let [
        Command::PipelineBarrier { buffer_barriers: first, .. },
        Command::PipelineBarrier { buffer_barriers: second, .. },
        Command::Dispatch { buffers, workgroup, push_constants },
    ] = cmd.commands()
    else {
        panic!("unexpected commands: {:?}", cmd.commands());
    };

    let a_buffer = a.descriptor_buffer_info().unwrap().buffer;
    let b_buffer = b.descriptor_buffer_info().unwrap().buffer;
    assert_eq!((first[0].buffer, second[0].buffer), (a_buffer, b_buffer));
    assert_eq!(first[0].src_access, AccessFlags::from(Access::TransferWrite));
    assert_eq!(first[0].dst_access, AccessFlags::from(Access::ShaderRead));
    assert_eq!(buffers, &vec![a_buffer, b_buffer]);
    assert_eq!(*workgroup, [2, 1, 1]);
    assert_eq!(push_constants.as_slice(), ext::as_bytes(&[0.5f32]));
}

#[test]
fn test_dispatch_push_constants_override() {
    let manager = manager();
    let tensor = manager.tensor(&[1u32]).unwrap();
    let algorithm =
        manager.algorithm().tensors(vec![tensor]).spirv(vec![1]).push_constants(vec![1.0]).call().unwrap();

    let mut cmd = CommandBuffer::new();
    AlgoDispatch::with_push_constants(algorithm.clone(), vec![2.0, 3.0]).record(&mut cmd).unwrap();
    assert_eq!(algorithm.push_constants(), vec![2.0, 3.0]);
    let Some(Command::Dispatch { push_constants, .. }) = cmd.commands().last() else {
        panic!("dispatch not recorded");
    };
    assert_eq!(push_constants.as_slice(), ext::as_bytes(&[2.0f32, 3.0]));
}

#[test]
fn test_dispatch_of_empty_algorithm_records_nothing() {
    let manager = manager();
    let tensor = manager.tensor(&[1u32]).unwrap();
    let without_shader = manager.algorithm().tensors(vec![tensor]).call().unwrap();

    let mut cmd = CommandBuffer::new();
    assert!(matches!(AlgoDispatch::new(without_shader).record(&mut cmd), Err(Error::EmptyAlgorithm)));
    assert!(cmd.is_empty());
}

#[test]
fn test_dispatch_runs_on_the_queue() {
    let external = External::new();
    let manager = external.manager();
    let a = manager.tensor(&[1u32, 2, 3]).unwrap();
    let algorithm = manager.algorithm().tensors(vec![a.clone()]).spirv(vec![1]).call().unwrap();

    let sequence = manager.sequence(0, 0).unwrap();
    sequence.record(TensorSyncDevice::new(vec![a.clone()]).unwrap()).unwrap();
    sequence.record(AlgoDispatch::new(algorithm)).unwrap();
    sequence.record(TensorSyncLocal::new(vec![a.clone()]).unwrap()).unwrap();
    sequence.eval().unwrap();

    let stats = external.stats();
    assert_eq!((stats.dispatches, stats.copies, stats.barriers), (1, 2, 2));
    // The host backend does not run shaders, so the data comes back as uploaded.
    assert_eq!(a.vector::<u32>().unwrap(), vec![1, 2, 3]);
}
