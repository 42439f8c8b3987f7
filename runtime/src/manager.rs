//! The resource manager: device setup, resource factories and teardown.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use bon::bon;
use halyard_device::cpu::CpuInstance;
use halyard_device::{
    Instance, LogicalDevice, Owned, PhysicalDevice, PhysicalDeviceProperties, Queue, QueueFamilyProperties,
};
use halyard_dtype::{DataType, HasDataType};
use halyard_tensor::{Tensor, TensorTier, TypedTensor};
use snafu::{OptionExt, ResultExt, ensure};
use tracing::{debug, warn};

use crate::algorithm::{Algorithm, Workgroup};
use crate::config::ManagerConfig;
use crate::error::*;
use crate::registry::Observations;
use crate::sequence::{MAX_TIMESTAMP_COUNT, Sequence};

#[derive(Debug)]
struct DeviceContext {
    instance: Owned<Arc<dyn Instance>>,
    physical: Arc<dyn PhysicalDevice>,
    device: Owned<Arc<dyn LogicalDevice>>,
    queues: Vec<Arc<dyn Queue>>,
}

impl DeviceContext {
    fn release(self) {
        let DeviceContext { instance, device, .. } = self;
        device.release(|device| {
            if let Err(source) = device.wait_idle() {
                warn!(%source, "device did not go idle before destroy");
            }
            device.destroy();
            debug!("logical device destroyed");
        });
        instance.release(|instance| {
            instance.destroy();
            debug!("instance destroyed");
        });
    }
}

/// Issues tensors, sequences and algorithms on one logical device and tears them down together.
///
/// The manager hands out `Rc` handles and only keeps weak observations of them. Callers decide how
/// long a resource lives; the manager can still reach every live resource when it is destroyed.
///
/// Devices and instances the manager created are destroyed with it. Ones passed to
/// [`Manager::from_external`] are left alone.
#[derive(Debug)]
pub struct Manager {
    context: RefCell<Option<DeviceContext>>,
    manage_resources: bool,
    tensors: RefCell<Observations<Tensor>>,
    sequences: RefCell<Observations<Sequence>>,
    algorithms: RefCell<Observations<Algorithm>>,
}

#[bon]
impl Manager {
    /// Manager on the first physical device of a fresh host instance.
    pub fn new() -> Result<Self> {
        Self::with_config(ManagerConfig::default())
    }

    /// Manager on a fresh host instance, set up according to `config`.
    pub fn with_config(config: ManagerConfig) -> Result<Self> {
        Self::with_instance(CpuInstance::new(), &config)
    }

    /// Manager that takes ownership of `instance` and creates its own logical device on it.
    ///
    /// On failure `instance` has already been destroyed.
    pub fn with_instance(instance: Arc<dyn Instance>, config: &ManagerConfig) -> Result<Self> {
        let (physical, device, queues) = match open_device(instance.as_ref(), config) {
            Ok(opened) => opened,
            Err(error) => {
                instance.destroy();
                return Err(error);
            }
        };
        let context = DeviceContext {
            instance: Owned::owned(instance),
            physical,
            device: Owned::owned(device),
            queues,
        };
        Ok(Self::from_context(context, config.manage_resources))
    }

    /// Manager on a device someone else created. Nothing here is ever destroyed by the manager.
    ///
    /// Sequences use the first queue of the first compute-capable family.
    pub fn from_external(
        instance: Arc<dyn Instance>,
        physical: Arc<dyn PhysicalDevice>,
        device: Arc<dyn LogicalDevice>,
    ) -> Result<Self> {
        let family = first_compute_family(&physical.queue_family_properties())?;
        let queue = device.queue(family, 0).context(DeviceSnafu)?;
        let context = DeviceContext {
            instance: Owned::borrowed(instance),
            physical,
            device: Owned::borrowed(device),
            queues: vec![queue],
        };
        Ok(Self::from_context(context, true))
    }

    fn from_context(context: DeviceContext, manage_resources: bool) -> Self {
        debug!(
            device = %context.physical.properties().name,
            queues = context.queues.len(),
            owns_device = context.device.owns(),
            manage_resources,
            "manager ready"
        );
        Self {
            context: RefCell::new(Some(context)),
            manage_resources,
            tensors: RefCell::default(),
            sequences: RefCell::default(),
            algorithms: RefCell::default(),
        }
    }

    /// A sequence on the `queue_index`-th queue created for this manager.
    ///
    /// `timestamp_count` > 0 enables timestamp latching when the queue family supports it; otherwise
    /// timestamps stay disabled with a warning. Counts above [`MAX_TIMESTAMP_COUNT`] are rejected.
    pub fn sequence(&self, queue_index: u32, timestamp_count: u32) -> Result<Rc<Sequence>> {
        ensure!(
            timestamp_count <= MAX_TIMESTAMP_COUNT,
            TooManyTimestampsSnafu { requested: timestamp_count, max: MAX_TIMESTAMP_COUNT }
        );
        let (device, queue, supports_timestamps) = {
            let context = self.context.borrow();
            let context = context.as_ref().context(ManagerDestroyedSnafu)?;
            let queue = context
                .queues
                .get(queue_index as usize)
                .context(QueueIndexOutOfRangeSnafu { index: queue_index, count: context.queues.len() })?;
            let supports_timestamps = context
                .physical
                .queue_family_properties()
                .get(queue.family_index() as usize)
                .is_some_and(|family| family.supports_timestamps);
            (Arc::clone(context.device.get()), Arc::clone(queue), supports_timestamps)
        };

        let timestamp_count = if timestamp_count > 0 && !supports_timestamps {
            warn!(queue_index, family = queue.family_index(), "queue family has no timestamps; latching disabled");
            0
        } else {
            timestamp_count
        };

        let sequence = Rc::new(Sequence::new(device, queue, timestamp_count));
        let id = self.sequences.borrow_mut().track(&sequence);
        debug!(id, queue_index, "sequence registered");
        Ok(sequence)
    }

    /// A tensor holding `data`, on the Device tier.
    pub fn tensor<T: HasDataType>(&self, data: &[T]) -> Result<Rc<Tensor>> {
        self.tensor_with_tier(data, TensorTier::Device)
    }

    pub fn tensor_with_tier<T: HasDataType>(&self, data: &[T], tier: TensorTier) -> Result<Rc<Tensor>> {
        let (physical, device) = self.handles()?;
        let tensor = Tensor::from_slice(physical, device, data, tier).context(TensorSnafu)?;
        Ok(self.track_tensor(tensor))
    }

    /// A tensor over raw bytes with an explicit element count and width.
    pub fn tensor_raw(
        &self,
        data: &[u8],
        element_count: usize,
        element_size: usize,
        data_type: DataType,
        tier: TensorTier,
    ) -> Result<Rc<Tensor>> {
        let (physical, device) = self.handles()?;
        let tensor = Tensor::new(physical, device, data, element_count, element_size, data_type, tier)
            .context(TensorSnafu)?;
        Ok(self.track_tensor(tensor))
    }

    /// Same as [`Manager::tensor_with_tier`], wrapped for typed element access.
    pub fn typed_tensor<T: HasDataType>(&self, data: &[T], tier: TensorTier) -> Result<TypedTensor<T>> {
        TypedTensor::new(self.tensor_with_tier(data, tier)?).context(TensorSnafu)
    }

    /// An algorithm over `tensors`. Every argument is optional:
    ///
    /// ```
    /// # let manager = halyard_runtime::Manager::new().unwrap();
    /// let a = manager.tensor(&[1.0f32, 2.0, 3.0]).unwrap();
    /// let algorithm = manager.algorithm().tensors(vec![a]).spirv(vec![0x0723_0203]).call().unwrap();
    /// assert_eq!(algorithm.workgroup(), [3, 1, 1]);
    /// ```
    #[builder]
    pub fn algorithm(
        &self,
        #[builder(default)] tensors: Vec<Rc<Tensor>>,
        #[builder(default)] spirv: Vec<u32>,
        workgroup: Option<Workgroup>,
        #[builder(default)] specialization_constants: Vec<f32>,
        #[builder(default)] push_constants: Vec<f32>,
    ) -> Result<Rc<Algorithm>> {
        let device = {
            let context = self.context.borrow();
            Arc::clone(context.as_ref().context(ManagerDestroyedSnafu)?.device.get())
        };
        let algorithm =
            Rc::new(Algorithm::new(device, tensors, spirv, workgroup, specialization_constants, push_constants));
        let id = self.algorithms.borrow_mut().track(&algorithm);
        debug!(id, "algorithm registered");
        Ok(algorithm)
    }

    /// Forget observations of resources nobody holds anymore. Touches no device state.
    pub fn clear(&self) {
        let tensors = self.tensors.borrow_mut().sweep();
        let sequences = self.sequences.borrow_mut().sweep();
        let algorithms = self.algorithms.borrow_mut().sweep();
        debug!(tensors, sequences, algorithms, "swept expired observations");
    }

    /// Tear everything down. Resources still held elsewhere are destroyed first when the manager
    /// manages them; the device and instance are destroyed only if the manager created them.
    ///
    /// Safe to call repeatedly. Factory calls fail with [`Error::ManagerDestroyed`] afterwards.
    pub fn destroy(&self) {
        let Some(context) = self.context.borrow_mut().take() else {
            return;
        };

        if self.manage_resources {
            let sequences = self.sequences.borrow_mut().drain_live();
            let algorithms = self.algorithms.borrow_mut().drain_live();
            let tensors = self.tensors.borrow_mut().drain_live();
            debug!(
                sequences = sequences.len(),
                algorithms = algorithms.len(),
                tensors = tensors.len(),
                "destroying managed resources"
            );
            sequences.iter().for_each(|sequence| sequence.destroy());
            algorithms.iter().for_each(|algorithm| algorithm.destroy());
            tensors.iter().for_each(|tensor| tensor.destroy());
        }

        context.release();
        debug!("manager destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.context.borrow().is_none()
    }

    /// Tracked tensor observations, including expired ones not yet swept by [`Manager::clear`].
    pub fn tensor_count(&self) -> usize {
        self.tensors.borrow().len()
    }

    pub fn sequence_count(&self) -> usize {
        self.sequences.borrow().len()
    }

    pub fn algorithm_count(&self) -> usize {
        self.algorithms.borrow().len()
    }

    /// Number of queues available to [`Manager::sequence`].
    pub fn queue_count(&self) -> usize {
        self.context.borrow().as_ref().map_or(0, |context| context.queues.len())
    }

    pub fn device_properties(&self) -> Result<PhysicalDeviceProperties> {
        let context = self.context.borrow();
        Ok(context.as_ref().context(ManagerDestroyedSnafu)?.physical.properties())
    }

    /// Extensions the logical device was created with.
    pub fn enabled_extensions(&self) -> Result<Vec<String>> {
        let context = self.context.borrow();
        Ok(context.as_ref().context(ManagerDestroyedSnafu)?.device.get().enabled_extensions())
    }

    fn handles(&self) -> Result<(Arc<dyn PhysicalDevice>, Arc<dyn LogicalDevice>)> {
        let context = self.context.borrow();
        let context = context.as_ref().context(ManagerDestroyedSnafu)?;
        Ok((Arc::clone(&context.physical), Arc::clone(context.device.get())))
    }

    fn track_tensor(&self, tensor: Tensor) -> Rc<Tensor> {
        let tensor = Rc::new(tensor);
        let id = self.tensors.borrow_mut().track(&tensor);
        debug!(id, size = tensor.size(), tier = %tensor.tier(), "tensor registered");
        tensor
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.destroy();
    }
}

type OpenedDevice = (Arc<dyn PhysicalDevice>, Arc<dyn LogicalDevice>, Vec<Arc<dyn Queue>>);

fn open_device(instance: &dyn Instance, config: &ManagerConfig) -> Result<OpenedDevice> {
    let physicals = instance.enumerate_physical_devices().context(DeviceSnafu)?;
    let count = physicals.len();
    let index = config.physical_device_index;
    let physical =
        physicals.into_iter().nth(index).context(PhysicalDeviceOutOfRangeSnafu { index, count })?;

    let families = if config.queue_family_indices.is_empty() {
        vec![first_compute_family(&physical.queue_family_properties())?]
    } else {
        config.queue_family_indices.clone()
    };

    // One entry per family in first-seen order; repeats ask for another queue in the same family.
    let mut queue_counts: Vec<(u32, u32)> = Vec::new();
    for &family in &families {
        match queue_counts.iter_mut().find(|(seen, _)| *seen == family) {
            Some((_, count)) => *count += 1,
            None => queue_counts.push((family, 1)),
        }
    }

    let available = physical.extension_properties();
    let (extensions, missing): (Vec<String>, Vec<String>) =
        config.extensions.iter().cloned().partition(|name| available.contains(name));
    for name in &missing {
        warn!(extension = %name, "device does not support extension; skipping");
    }

    let device = physical.create_device(&queue_counts, &extensions).context(DeviceSnafu)?;
    match fetch_queues(device.as_ref(), &families) {
        Ok(queues) => Ok((physical, device, queues)),
        Err(error) => {
            device.destroy();
            Err(error)
        }
    }
}

fn fetch_queues(device: &dyn LogicalDevice, families: &[u32]) -> Result<Vec<Arc<dyn Queue>>> {
    let mut next_index: HashMap<u32, u32> = HashMap::new();
    families
        .iter()
        .map(|&family| -> Result<Arc<dyn Queue>> {
            let index = next_index.entry(family).or_default();
            let queue = device.queue(family, *index).context(DeviceSnafu)?;
            *index += 1;
            Ok(queue)
        })
        .collect()
}

fn first_compute_family(families: &[QueueFamilyProperties]) -> Result<u32> {
    let family = families.iter().position(|family| family.supports_compute).context(NoComputeQueueSnafu)?;
    Ok(family as u32)
}
