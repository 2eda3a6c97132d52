use std::collections::HashMap;

use crate::{Device, DeviceId, DeviceList, DeviceListRef, Error};

/// Runtime client that owns the universe of [`Device`]s known to the current process and can resolve device IDs back
/// into live device handles.
///
/// Sharding payloads never embed device identity in a form that is directly reusable across processes. They embed
/// device IDs that are only meaningful relative to a client, which is why deserializing a sharding always requires a
/// live [`Client`] (supplied through [`DeserializeOptions`](crate::DeserializeOptions)): the IDs found in the payload
/// are resolved through [`Client::resolve_device`] while reconstructing the sharding's device list.
pub struct Client {
    devices: Vec<Device>,
    device_index_by_id: HashMap<DeviceId, usize>,
}

impl Client {
    /// Creates a new [`Client`] that owns the provided devices. Device IDs must be unique within a client.
    pub fn new(devices: Vec<Device>) -> Result<Self, Error> {
        let mut device_index_by_id = HashMap::with_capacity(devices.len());
        for (device_index, device) in devices.iter().enumerate() {
            if device_index_by_id.insert(device.id(), device_index).is_some() {
                return Err(Error::invalid_argument(format!(
                    "device id {} appears more than once in the devices owned by this client",
                    device.id(),
                )));
            }
        }
        Ok(Self { devices, device_index_by_id })
    }

    /// Creates a new single-process [`Client`] that owns `device_count` devices with IDs `0..device_count`.
    pub fn with_device_count(device_count: usize) -> Result<Self, Error> {
        Self::new((0..device_count).map(|id| Device::new(id, 0)).collect())
    }

    /// Returns all devices owned by this [`Client`], in order.
    pub fn devices(&self) -> &[Device] {
        self.devices.as_slice()
    }

    /// Returns the number of devices owned by this [`Client`].
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Resolves the provided device ID into a live [`Device`] handle, or returns [`Error::InvalidArgument`] if this
    /// [`Client`] does not know about a device with that ID.
    pub fn resolve_device(&self, id: DeviceId) -> Result<Device, Error> {
        self.device_index_by_id.get(&id).map(|device_index| self.devices[*device_index]).ok_or_else(|| {
            Error::invalid_argument(format!(
                "device id {id} cannot be resolved by this client, which owns {} device(s)",
                self.devices.len(),
            ))
        })
    }

    /// Builds a shared [`DeviceListRef`] from positions into this [`Client`]'s device sequence. Positions that are
    /// out of range result in [`Error::InvalidArgument`].
    pub fn device_list(&self, positions: &[usize]) -> Result<DeviceListRef, Error> {
        let devices = positions
            .iter()
            .map(|position| {
                self.devices.get(*position).copied().ok_or_else(|| {
                    Error::invalid_argument(format!(
                        "device position {position} is out of range for this client, which owns {} device(s)",
                        self.devices.len(),
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        DeviceList::new_ref(devices)
    }
}
