use halyard_tensor::TensorTier;

use crate::Error;
use crate::ops::{TensorCopy, TensorSyncDevice, TensorSyncLocal};
use crate::test::helpers::{External, manager};

#[test]
fn test_device_round_trip_is_unchanged() {
    let external = External::new();
    let manager = external.manager();
    let tensor = manager.tensor(&[1.0f32, 2.0, 3.0, 4.0]).unwrap();
    assert_eq!(tensor.vector::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);

    let sequence = manager.sequence(0, 0).unwrap();
    sequence.eval_op(TensorSyncDevice::new(vec![tensor.clone()]).unwrap()).unwrap();
    // Staging is overwritten; only the device copy still holds the data.
    tensor.set_raw_data(&[0; 16]).unwrap();
    sequence.eval_op(TensorSyncLocal::new(vec![tensor.clone()]).unwrap()).unwrap();

    assert_eq!(tensor.vector::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    let stats = external.stats();
    assert_eq!((stats.submissions, stats.copies, stats.barriers), (2, 2, 1));
}

#[test]
fn test_record_begins_implicitly() {
    let manager = manager();
    let tensor = manager.tensor(&[1u32]).unwrap();
    let sequence = manager.sequence(0, 0).unwrap();
    assert!(!sequence.is_recording());

    sequence.record(TensorSyncDevice::new(vec![tensor]).unwrap()).unwrap();
    assert!(sequence.is_recording());
    assert_eq!(sequence.operation_count(), 1);

    sequence.end().unwrap();
    assert!(!sequence.is_recording());
    // Ending twice only warns.
    sequence.end().unwrap();
}

#[test]
fn test_async_evaluation_blocks_recording_until_awaited() {
    let manager = manager();
    let tensor = manager.tensor(&[1u32, 2]).unwrap();
    let sequence = manager.sequence(0, 0).unwrap();
    sequence.record(TensorSyncDevice::new(vec![tensor.clone()]).unwrap()).unwrap();

    sequence.eval_async().unwrap();
    assert!(sequence.is_running());
    assert!(!sequence.is_recording());
    assert!(matches!(sequence.eval_async(), Err(Error::SequenceRunning)));
    assert!(matches!(sequence.record(TensorSyncLocal::new(vec![tensor]).unwrap()), Err(Error::SequenceRunning)));
    assert!(matches!(sequence.clear(), Err(Error::SequenceRunning)));

    sequence.eval_await(1000).unwrap();
    assert!(!sequence.is_running());
    // Nothing outstanding: awaiting again only warns.
    sequence.eval_await(1000).unwrap();
}

#[test]
fn test_recorded_commands_can_be_evaluated_repeatedly() {
    let external = External::new();
    let manager = external.manager();
    let tensor = manager.tensor(&[7u32, 8]).unwrap();
    let sequence = manager.sequence(0, 0).unwrap();
    sequence.record(TensorSyncDevice::new(vec![tensor]).unwrap()).unwrap();

    sequence.eval().unwrap();
    sequence.eval().unwrap();
    assert_eq!(external.stats().copies, 2);
    assert_eq!(sequence.operation_count(), 1);
}

#[test]
fn test_failed_record_leaves_no_commands_behind() {
    let external = External::new();
    let manager = external.manager();
    let source = manager.tensor(&[1.0f32, 2.0]).unwrap();
    let target = manager.tensor(&[5.0f32, 6.0]).unwrap();
    let destroyed = manager.tensor(&[0.0f32, 0.0]).unwrap();
    let sequence = manager.sequence(0, 0).unwrap();
    sequence.eval_op(TensorSyncDevice::new(vec![source.clone(), target.clone()]).unwrap()).unwrap();
    destroyed.destroy();
    sequence.clear().unwrap();

    // The copy into `target` is recorded before the destroyed tensor fails the operation.
    let copy = TensorCopy::new(vec![source, target.clone(), destroyed]).unwrap();
    assert!(matches!(sequence.record(copy), Err(Error::Tensor { .. })));
    assert_eq!(sequence.operation_count(), 0);

    let copies = external.stats().copies;
    sequence.record(TensorSyncLocal::new(vec![target.clone()]).unwrap()).unwrap().eval().unwrap();
    assert_eq!(external.stats().copies, copies + 1);
    assert_eq!(target.vector::<f32>().unwrap(), vec![5.0, 6.0]);
}

#[test]
fn test_clear_drops_recording() {
    let manager = manager();
    let tensor = manager.tensor(&[1u32]).unwrap();
    let sequence = manager.sequence(0, 0).unwrap();
    sequence.record(TensorSyncDevice::new(vec![tensor]).unwrap()).unwrap();

    sequence.clear().unwrap();
    assert!(!sequence.is_recording());
    assert_eq!(sequence.operation_count(), 0);
}

#[test]
fn test_rerecord_picks_up_rebuilt_tensor() {
    let manager = manager();
    let tensor = manager.tensor(&[1u32, 2]).unwrap();
    let sequence = manager.sequence(0, 0).unwrap();
    sequence.record(TensorSyncDevice::new(vec![tensor.clone()]).unwrap()).unwrap();
    sequence.record(TensorSyncLocal::new(vec![tensor.clone()]).unwrap()).unwrap();
    sequence.eval().unwrap();

    let values = [3u32, 4, 5];
    tensor.rebuild(halyard_dtype::ext::as_bytes(&values), values.len(), 4).unwrap();
    // The recorded copies still name the released buffers.
    assert!(matches!(sequence.eval(), Err(Error::Device { .. })));

    sequence.rerecord().unwrap();
    assert_eq!(sequence.operation_count(), 2);
    sequence.eval().unwrap();
    assert_eq!(tensor.vector::<u32>().unwrap(), values);
}

#[test]
fn test_timestamps_stop_at_capacity() {
    let manager = manager();
    let tensor = manager.tensor(&[1u32]).unwrap();
    let sequence = manager.sequence(0, 2).unwrap();
    for _ in 0..3 {
        sequence.record(TensorSyncDevice::new(vec![tensor.clone()]).unwrap()).unwrap();
    }
    assert!(sequence.timestamps().unwrap().is_empty());

    sequence.eval().unwrap();
    let timestamps = sequence.timestamps().unwrap();
    assert_eq!(timestamps.len(), 3);
    assert!(timestamps.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn test_timestamps_disabled_without_count() {
    let sequence = manager().sequence(0, 0).unwrap();
    assert!(matches!(sequence.timestamps(), Err(Error::TimestampsDisabled)));
}

#[test]
fn test_destroy_is_terminal() {
    let manager = manager();
    let tensor = manager.tensor_with_tier(&[1u32], TensorTier::Host).unwrap();
    let sequence = manager.sequence(0, 1).unwrap();
    sequence.record(TensorSyncDevice::new(vec![tensor.clone()]).unwrap()).unwrap();
    sequence.eval_async().unwrap();

    sequence.destroy();
    sequence.destroy();
    assert!(!sequence.is_init());
    assert!(!sequence.is_running());
    assert_eq!(sequence.operation_count(), 0);
    assert!(matches!(sequence.record(TensorSyncDevice::new(vec![tensor]).unwrap()), Err(Error::SequenceDestroyed)));
    assert!(matches!(sequence.eval(), Err(Error::SequenceDestroyed)));
    assert!(matches!(sequence.timestamps(), Err(Error::TimestampsDisabled)));
}
