use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::Error;

/// Type alias used to represent [`Device`] IDs, which are unique among all devices known to a [`Client`](crate::Client)
/// and, in multi-host environments, are also unique across all devices and all hosts.
pub type DeviceId = usize;

/// Type alias used to represent the index of the process that owns a [`Device`].
pub type ProcessIndex = usize;

/// Handle for a single compute device (e.g., a specific CPU, GPU, or TPU) known to a [`Client`](crate::Client).
///
/// Two devices are considered the same if they have the same [`DeviceId`] and [`ProcessIndex`]. This is the
/// equivalence class preserved by serialization round trips: deserialization resolves device IDs against whatever
/// client is supplied and is not guaranteed to return the exact device values held by the original sharding, only
/// equal ones.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Device {
    id: DeviceId,
    process_index: ProcessIndex,
}

impl Device {
    /// Creates a new [`Device`] handle.
    pub fn new(id: DeviceId, process_index: ProcessIndex) -> Self {
        Self { id, process_index }
    }

    /// ID of this [`Device`].
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Index of the process that this [`Device`] belongs to (i.e., is _addressable_ from).
    pub fn process_index(&self) -> ProcessIndex {
        self.process_index
    }
}

impl Display for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "device {} (process {})", self.id, self.process_index)
    }
}

/// Type alias used to represent shared references to [`DeviceList`]s. Device lists are immutable and jointly owned
/// by the [`Client`](crate::Client) that created their devices and by every [`Sharding`](crate::Sharding) holding
/// the reference, so they are always passed around behind an [`Arc`].
pub type DeviceListRef = Arc<DeviceList>;

/// Ordered, immutable list of [`Device`]s over which a [`Sharding`](crate::Sharding) places the shards of an array.
///
/// The identity of a device list is derived from its resolved device handles, never from any transient encoding:
/// two device lists are equal if and only if their device sequences are equal element-wise.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceList {
    devices: Vec<Device>,
}

impl DeviceList {
    /// Creates a new [`DeviceList`] from the provided ordered devices. Device lists must contain at least one device.
    pub fn new(devices: Vec<Device>) -> Result<Self, Error> {
        if devices.is_empty() {
            Err(Error::invalid_argument("device lists must contain at least one device"))
        } else {
            Ok(Self { devices })
        }
    }

    /// Creates a new shared [`DeviceListRef`] from the provided ordered devices.
    pub fn new_ref(devices: Vec<Device>) -> Result<DeviceListRef, Error> {
        Self::new(devices).map(Arc::new)
    }

    /// Creates a new shared [`DeviceListRef`] containing a single device.
    pub fn of(device: Device) -> DeviceListRef {
        Arc::new(Self { devices: vec![device] })
    }

    /// Returns the ordered devices in this [`DeviceList`].
    pub fn devices(&self) -> &[Device] {
        self.devices.as_slice()
    }

    /// Returns the number of devices in this [`DeviceList`].
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `false`, as device lists are validated to be non-empty at construction time.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_accessors_and_display() {
        let device = Device::new(3, 1);
        assert_eq!(device.id(), 3);
        assert_eq!(device.process_index(), 1);
        assert_eq!(format!("{device}"), "device 3 (process 1)");
    }

    #[test]
    fn test_device_list_construction() {
        let devices = vec![Device::new(0, 0), Device::new(1, 0)];
        let device_list = DeviceList::new(devices.clone()).unwrap();
        assert_eq!(device_list.devices(), devices.as_slice());
        assert_eq!(device_list.len(), 2);
        assert!(!device_list.is_empty());
    }

    #[test]
    fn test_device_list_rejects_empty() {
        assert!(matches!(DeviceList::new(Vec::new()), Err(Error::InvalidArgument { .. })));
        assert!(matches!(DeviceList::new_ref(Vec::new()), Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_device_list_of_single_device() {
        let device_list = DeviceList::of(Device::new(7, 2));
        assert_eq!(device_list.devices(), &[Device::new(7, 2)]);
        assert_eq!(device_list.len(), 1);
    }

    #[test]
    fn test_device_list_equality_is_element_wise() {
        let first = DeviceList::new(vec![Device::new(0, 0), Device::new(1, 0)]).unwrap();
        let second = DeviceList::new(vec![Device::new(0, 0), Device::new(1, 0)]).unwrap();
        let third = DeviceList::new(vec![Device::new(1, 0), Device::new(0, 0)]).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, third);
    }
}
