//! Manager configuration.
//!
//! Built explicitly with [`ManagerConfig::builder`] or read from the environment with
//! [`ManagerConfig::from_env`].

use std::str::FromStr;

use bon::bon;

/// How a [`Manager`](crate::Manager) picks and sets up its device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Index into the instance's physical devices.
    pub physical_device_index: usize,
    /// One entry per queue to create. Repeating a family creates successive queues within it.
    /// Empty selects the first compute-capable family with a single queue.
    pub queue_family_indices: Vec<u32>,
    /// Device extensions to enable. Ones the device lacks are skipped with a warning.
    pub extensions: Vec<String>,
    /// Destroy still-referenced sequences, algorithms and tensors when the manager is destroyed.
    pub manage_resources: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            physical_device_index: 0,
            queue_family_indices: Vec::new(),
            extensions: Vec::new(),
            manage_resources: true,
        }
    }
}

#[bon]
impl ManagerConfig {
    #[builder(finish_fn = build)]
    pub fn builder(
        #[builder(default)] physical_device_index: usize,
        #[builder(default)] queue_family_indices: Vec<u32>,
        #[builder(default)] extensions: Vec<String>,
        #[builder(default = true)] manage_resources: bool,
    ) -> Self {
        Self { physical_device_index, queue_family_indices, extensions, manage_resources }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `HALYARD_DEVICE` - Physical device index (default: 0)
    /// * `HALYARD_QUEUE_FAMILIES` - Comma-separated queue family indices (default: first compute family)
    /// * `HALYARD_EXTENSIONS` - Comma-separated extension names (default: none)
    /// * `HALYARD_UNMANAGED` - Leave issued resources alone on destroy if set
    ///
    /// Unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let physical_device_index = std::env::var("HALYARD_DEVICE").ok().and_then(|s| s.parse().ok()).unwrap_or(0);
        let queue_family_indices =
            std::env::var("HALYARD_QUEUE_FAMILIES").ok().and_then(|s| parse_list(&s)).unwrap_or_default();
        let extensions = std::env::var("HALYARD_EXTENSIONS").ok().and_then(|s| parse_list(&s)).unwrap_or_default();
        let manage_resources = std::env::var("HALYARD_UNMANAGED").is_err();

        Self { physical_device_index, queue_family_indices, extensions, manage_resources }
    }
}

/// Parse a comma-separated list, skipping blank entries. Any unparsable entry rejects the whole list.
fn parse_list<T: FromStr>(value: &str) -> Option<Vec<T>> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty()).map(|item| item.parse().ok()).collect()
}
