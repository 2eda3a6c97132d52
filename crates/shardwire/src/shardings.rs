//! This module provides the sharding descriptor types: metadata objects that describe how a logically single array
//! is partitioned and placed across a set of devices.
//!
//! The descriptor kinds form a closed set modeled by the [`Sharding`] union. Each kind combines a shared
//! [`DeviceListRef`] and a [`MemoryKind`] with kind-specific geometry:
//!
//! | Kind | Geometry |
//! |---|---|
//! | [`SingleDeviceSharding`] | None; the array lives whole on one device |
//! | [`OpaqueSharding`] | None declared; the shard layout is known only to an external algorithm |
//! | [`ConcreteSharding`] | Full shape plus one per-shard shape per device (static or bounded-dynamic) |
//! | [`ConcreteEvenSharding`] | Full shape plus a single uniform shard shape |
//! | [`ShardingParamSharding`] | A compact [`ShardingParam`] from which shard geometry is derivable |
//!
//! All descriptors are created through validating factories that enforce structural invariants (e.g., the number of
//! shard shapes matching the number of devices) and fail with [`Error::InvalidArgument`] when one is violated. Note
//! that this module only describes shardings; it does not compute shard placements.

use std::fmt::{Display, Formatter};

use crate::{Device, DeviceList, DeviceListRef, DynamicShape, Error, MemoryKind, Shape};

// ---------------------------------------------------------------------------
// Sharding kinds
// ---------------------------------------------------------------------------

/// Identifies the concrete kind of a [`Sharding`]. This is the type tag carried by serialized envelopes, so the
/// numeric values are part of the wire format and must never be reused or renumbered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ShardingKind {
    SingleDevice = 1,
    Opaque = 2,
    Concrete = 3,
    ConcreteEven = 4,
    ShardingParam = 5,
}

impl ShardingKind {
    /// All sharding kinds, in wire-number order.
    pub const ALL: [ShardingKind; 5] = [
        ShardingKind::SingleDevice,
        ShardingKind::Opaque,
        ShardingKind::Concrete,
        ShardingKind::ConcreteEven,
        ShardingKind::ShardingParam,
    ];

    /// Returns the stable wire number of this [`ShardingKind`].
    pub fn number(self) -> u32 {
        self as u32
    }

    /// Returns the [`ShardingKind`] with the provided wire number, or [`Error::InvalidArgument`] if the number does
    /// not correspond to any known kind.
    pub fn from_number(number: u32) -> Result<Self, Error> {
        match number {
            1 => Ok(Self::SingleDevice),
            2 => Ok(Self::Opaque),
            3 => Ok(Self::Concrete),
            4 => Ok(Self::ConcreteEven),
            5 => Ok(Self::ShardingParam),
            _ => Err(Error::invalid_argument(format!("unknown sharding kind number {number}"))),
        }
    }

    /// Returns the human-readable name of this [`ShardingKind`].
    pub fn name(self) -> &'static str {
        match self {
            Self::SingleDevice => "single-device",
            Self::Opaque => "opaque",
            Self::Concrete => "concrete",
            Self::ConcreteEven => "concrete-even",
            Self::ShardingParam => "sharding-param",
        }
    }
}

impl Display for ShardingKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// Sharding parameters
// ---------------------------------------------------------------------------

/// Compact algebraic description of how each array dimension maps onto a logical device mesh.
///
/// `dim_shards[d]` is the number of shards that array dimension `d` is split into. The device mesh is described in
/// minor-to-major order by `axis_sizes`, and `permutation` maps those minor-to-major positions back to mesh axes, so
/// the full shard geometry of an array is derivable from the parameter alone. The total number of devices addressed
/// by the parameter is the product of `axis_sizes`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShardingParam {
    dim_shards: Vec<u64>,
    permutation: Vec<usize>,
    axis_sizes: Vec<u64>,
}

impl ShardingParam {
    /// Creates a new [`ShardingParam`], verifying that:
    ///
    ///   - all shard counts and axis sizes are positive,
    ///   - `permutation` is a valid permutation of the mesh axis indices `0..axis_sizes.len()`, and
    ///   - the product of `dim_shards` divides the product of `axis_sizes` (shards that use fewer devices than the
    ///     mesh provides are replicated over the remainder).
    pub fn new(dim_shards: Vec<u64>, permutation: Vec<usize>, axis_sizes: Vec<u64>) -> Result<Self, Error> {
        if dim_shards.iter().any(|shards| *shards == 0) {
            return Err(Error::invalid_argument("sharding parameter dimension shard counts must be positive"));
        }
        if axis_sizes.iter().any(|size| *size == 0) {
            return Err(Error::invalid_argument("sharding parameter mesh axis sizes must be positive"));
        }
        if permutation.len() != axis_sizes.len() {
            return Err(Error::invalid_argument(format!(
                "sharding parameter permutation has {} entries but the mesh has {} axis size(s)",
                permutation.len(),
                axis_sizes.len(),
            )));
        }
        let mut seen = vec![false; permutation.len()];
        for axis_index in &permutation {
            match seen.get_mut(*axis_index) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(Error::invalid_argument(format!(
                        "sharding parameter permutation {permutation:?} is not a valid permutation of the mesh axes",
                    )));
                }
            }
        }
        let shard_count = checked_product(&dim_shards, "dimension shard counts")?;
        let device_count = checked_product(&axis_sizes, "mesh axis sizes")?;
        if device_count % shard_count != 0 {
            return Err(Error::invalid_argument(format!(
                "sharding parameter splits arrays into {shard_count} shard(s), \
                 which cannot be placed evenly on {device_count} device(s)",
            )));
        }
        Ok(Self { dim_shards, permutation, axis_sizes })
    }

    /// Returns the number of shards for each array dimension.
    pub fn dim_shards(&self) -> &[u64] {
        self.dim_shards.as_slice()
    }

    /// Returns the permutation mapping minor-to-major mesh positions to mesh axes.
    pub fn permutation(&self) -> &[usize] {
        self.permutation.as_slice()
    }

    /// Returns the mesh axis sizes in minor-to-major order.
    pub fn axis_sizes(&self) -> &[u64] {
        self.axis_sizes.as_slice()
    }

    /// Returns the total number of devices addressed by this [`ShardingParam`].
    pub fn device_count(&self) -> u64 {
        // The product was validated not to overflow in `new`, so saturation never triggers.
        self.axis_sizes.iter().fold(1, |product, size| product.saturating_mul(*size))
    }
}

fn checked_product(values: &[u64], what: &str) -> Result<u64, Error> {
    values.iter().try_fold(1u64, |product, value| product.checked_mul(*value)).ok_or_else(|| {
        Error::invalid_argument(format!("sharding parameter {what} {values:?} overflow the supported device count"))
    })
}

// ---------------------------------------------------------------------------
// Sharding variants
// ---------------------------------------------------------------------------

/// Sharding descriptor for an array that lives whole on a single device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SingleDeviceSharding {
    devices: DeviceListRef,
    memory_kind: MemoryKind,
}

impl SingleDeviceSharding {
    /// Creates a new [`SingleDeviceSharding`] for the provided device.
    pub fn new(device: Device, memory_kind: MemoryKind) -> Self {
        Self { devices: DeviceList::of(device), memory_kind }
    }

    /// Returns the devices of this sharding (always exactly one).
    pub fn devices(&self) -> &DeviceListRef {
        &self.devices
    }

    /// Returns the memory kind of this sharding.
    pub fn memory_kind(&self) -> &MemoryKind {
        &self.memory_kind
    }

    /// Returns the single device that holds the array.
    pub fn device(&self) -> Device {
        self.devices.devices()[0]
    }
}

/// Sharding descriptor whose shard layout is opaque to the framework: the array is placed over a device list, but
/// how shards map to devices is known only to an external algorithm.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpaqueSharding {
    devices: DeviceListRef,
    memory_kind: MemoryKind,
}

impl OpaqueSharding {
    /// Creates a new [`OpaqueSharding`] over the provided devices.
    pub fn new(devices: DeviceListRef, memory_kind: MemoryKind) -> Self {
        Self { devices, memory_kind }
    }

    /// Returns the devices of this sharding.
    pub fn devices(&self) -> &DeviceListRef {
        &self.devices
    }

    /// Returns the memory kind of this sharding.
    pub fn memory_kind(&self) -> &MemoryKind {
        &self.memory_kind
    }
}

/// Geometry of a [`ConcreteSharding`]: either a static full shape with one static shape per shard, or a
/// bounded-dynamic full shape with one bounded-dynamic shape per shard. The two forms are mutually exclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConcreteGeometry {
    /// Static full shape and per-shard static shapes.
    Static { shape: Shape, shard_shapes: Vec<Shape> },
    /// Bounded-dynamic full shape and per-shard bounded-dynamic shapes.
    Dynamic { dynamic_shape: DynamicShape, shard_dynamic_shapes: Vec<DynamicShape> },
}

/// Sharding descriptor that lists the exact shape of every shard, one per device, alongside the full array shape.
/// Shard shapes are either all static or all bounded-dynamic; see [`ConcreteGeometry`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConcreteSharding {
    devices: DeviceListRef,
    memory_kind: MemoryKind,
    geometry: ConcreteGeometry,
}

impl ConcreteSharding {
    /// Creates a new [`ConcreteSharding`] with static geometry. The number of shard shapes must equal the number of
    /// devices, since each shard is assigned to exactly one device.
    pub fn with_static_shapes(
        devices: DeviceListRef,
        memory_kind: MemoryKind,
        shape: Shape,
        shard_shapes: Vec<Shape>,
    ) -> Result<Self, Error> {
        if shard_shapes.len() != devices.len() {
            return Err(Error::invalid_argument(format!(
                "concrete shardings must have exactly one shard shape per device, \
                 but got {} shard shape(s) for {} device(s)",
                shard_shapes.len(),
                devices.len(),
            )));
        }
        Ok(Self { devices, memory_kind, geometry: ConcreteGeometry::Static { shape, shard_shapes } })
    }

    /// Creates a new [`ConcreteSharding`] with bounded-dynamic geometry. The number of shard shapes must equal the
    /// number of devices, since each shard is assigned to exactly one device.
    pub fn with_dynamic_shapes(
        devices: DeviceListRef,
        memory_kind: MemoryKind,
        dynamic_shape: DynamicShape,
        shard_dynamic_shapes: Vec<DynamicShape>,
    ) -> Result<Self, Error> {
        if shard_dynamic_shapes.len() != devices.len() {
            return Err(Error::invalid_argument(format!(
                "concrete shardings must have exactly one shard shape per device, \
                 but got {} shard dynamic shape(s) for {} device(s)",
                shard_dynamic_shapes.len(),
                devices.len(),
            )));
        }
        Ok(Self { devices, memory_kind, geometry: ConcreteGeometry::Dynamic { dynamic_shape, shard_dynamic_shapes } })
    }

    /// Returns the devices of this sharding.
    pub fn devices(&self) -> &DeviceListRef {
        &self.devices
    }

    /// Returns the memory kind of this sharding.
    pub fn memory_kind(&self) -> &MemoryKind {
        &self.memory_kind
    }

    /// Returns the geometry of this sharding.
    pub fn geometry(&self) -> &ConcreteGeometry {
        &self.geometry
    }

    /// Returns `true` if this sharding has static geometry.
    pub fn has_static_geometry(&self) -> bool {
        matches!(self.geometry, ConcreteGeometry::Static { .. })
    }

    /// Returns the full static shape, or [`None`] if this sharding has dynamic geometry.
    pub fn shape(&self) -> Option<&Shape> {
        match &self.geometry {
            ConcreteGeometry::Static { shape, .. } => Some(shape),
            ConcreteGeometry::Dynamic { .. } => None,
        }
    }

    /// Returns the per-shard static shapes, or [`None`] if this sharding has dynamic geometry.
    pub fn shard_shapes(&self) -> Option<&[Shape]> {
        match &self.geometry {
            ConcreteGeometry::Static { shard_shapes, .. } => Some(shard_shapes.as_slice()),
            ConcreteGeometry::Dynamic { .. } => None,
        }
    }

    /// Returns the full dynamic shape, or [`None`] if this sharding has static geometry.
    pub fn dynamic_shape(&self) -> Option<&DynamicShape> {
        match &self.geometry {
            ConcreteGeometry::Static { .. } => None,
            ConcreteGeometry::Dynamic { dynamic_shape, .. } => Some(dynamic_shape),
        }
    }

    /// Returns the per-shard dynamic shapes, or [`None`] if this sharding has static geometry.
    pub fn shard_dynamic_shapes(&self) -> Option<&[DynamicShape]> {
        match &self.geometry {
            ConcreteGeometry::Static { .. } => None,
            ConcreteGeometry::Dynamic { shard_dynamic_shapes, .. } => Some(shard_dynamic_shapes.as_slice()),
        }
    }
}

/// Sharding descriptor for an array that is split into identically shaped shards, one per device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConcreteEvenSharding {
    devices: DeviceListRef,
    memory_kind: MemoryKind,
    shape: Shape,
    shard_shape: Shape,
    is_fully_replicated: bool,
}

impl ConcreteEvenSharding {
    /// Creates a new [`ConcreteEvenSharding`]. The shard shape must have the same rank as the full shape.
    pub fn new(
        devices: DeviceListRef,
        memory_kind: MemoryKind,
        shape: Shape,
        shard_shape: Shape,
        is_fully_replicated: bool,
    ) -> Result<Self, Error> {
        if shard_shape.rank() != shape.rank() {
            return Err(Error::invalid_argument(format!(
                "concrete even shardings must have a shard shape with the same rank as the full shape, \
                 but the shard shape {shard_shape} has rank {} while the full shape {shape} has rank {}",
                shard_shape.rank(),
                shape.rank(),
            )));
        }
        Ok(Self { devices, memory_kind, shape, shard_shape, is_fully_replicated })
    }

    /// Returns the devices of this sharding.
    pub fn devices(&self) -> &DeviceListRef {
        &self.devices
    }

    /// Returns the memory kind of this sharding.
    pub fn memory_kind(&self) -> &MemoryKind {
        &self.memory_kind
    }

    /// Returns the full array shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the shape shared by all shards.
    pub fn shard_shape(&self) -> &Shape {
        &self.shard_shape
    }

    /// Returns `true` if every device holds a full copy of the array.
    pub fn is_fully_replicated(&self) -> bool {
        self.is_fully_replicated
    }
}

/// Sharding descriptor backed by a [`ShardingParam`], from which the shard geometry is derivable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardingParamSharding {
    param: ShardingParam,
    devices: DeviceListRef,
    memory_kind: MemoryKind,
}

impl ShardingParamSharding {
    /// Creates a new [`ShardingParamSharding`]. The number of devices addressed by the parameter must equal the
    /// length of the device list.
    pub fn new(param: ShardingParam, devices: DeviceListRef, memory_kind: MemoryKind) -> Result<Self, Error> {
        if param.device_count() != devices.len() as u64 {
            return Err(Error::invalid_argument(format!(
                "the sharding parameter addresses {} device(s) but the device list contains {} device(s)",
                param.device_count(),
                devices.len(),
            )));
        }
        Ok(Self { param, devices, memory_kind })
    }

    /// Returns the sharding parameter of this sharding.
    pub fn sharding_param(&self) -> &ShardingParam {
        &self.param
    }

    /// Returns the devices of this sharding.
    pub fn devices(&self) -> &DeviceListRef {
        &self.devices
    }

    /// Returns the memory kind of this sharding.
    pub fn memory_kind(&self) -> &MemoryKind {
        &self.memory_kind
    }
}

// ---------------------------------------------------------------------------
// Closed sharding union
// ---------------------------------------------------------------------------

/// A sharding descriptor of any kind.
///
/// This is a closed union rather than an open trait hierarchy: the wire format's type tag enumerates exactly these
/// kinds, so adding a new kind means adding a variant here and a codec entry in the
/// [`Registry`](crate::Registry) atomically.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sharding {
    SingleDevice(SingleDeviceSharding),
    Opaque(OpaqueSharding),
    Concrete(ConcreteSharding),
    ConcreteEven(ConcreteEvenSharding),
    ShardingParam(ShardingParamSharding),
}

impl Sharding {
    /// Returns the concrete kind of this [`Sharding`].
    pub fn kind(&self) -> ShardingKind {
        match self {
            Self::SingleDevice(_) => ShardingKind::SingleDevice,
            Self::Opaque(_) => ShardingKind::Opaque,
            Self::Concrete(_) => ShardingKind::Concrete,
            Self::ConcreteEven(_) => ShardingKind::ConcreteEven,
            Self::ShardingParam(_) => ShardingKind::ShardingParam,
        }
    }

    /// Returns the devices of this [`Sharding`].
    pub fn devices(&self) -> &DeviceListRef {
        match self {
            Self::SingleDevice(sharding) => sharding.devices(),
            Self::Opaque(sharding) => sharding.devices(),
            Self::Concrete(sharding) => sharding.devices(),
            Self::ConcreteEven(sharding) => sharding.devices(),
            Self::ShardingParam(sharding) => sharding.devices(),
        }
    }

    /// Returns the memory kind of this [`Sharding`].
    pub fn memory_kind(&self) -> &MemoryKind {
        match self {
            Self::SingleDevice(sharding) => sharding.memory_kind(),
            Self::Opaque(sharding) => sharding.memory_kind(),
            Self::Concrete(sharding) => sharding.memory_kind(),
            Self::ConcreteEven(sharding) => sharding.memory_kind(),
            Self::ShardingParam(sharding) => sharding.memory_kind(),
        }
    }
}

/// Trait implemented by every concrete sharding descriptor type, enabling typed deserialization via
/// [`Registry::deserialize`](crate::Registry::deserialize) and conversion to and from the [`Sharding`] union.
pub trait ShardingVariant: Sized {
    /// The [`ShardingKind`] of this descriptor type.
    const KIND: ShardingKind;

    /// Wraps this descriptor in the [`Sharding`] union.
    fn into_sharding(self) -> Sharding;

    /// Extracts this descriptor type from the [`Sharding`] union, or returns [`Error::InvalidArgument`] if the
    /// provided sharding is of a different kind.
    fn from_sharding(sharding: Sharding) -> Result<Self, Error>;
}

macro_rules! impl_sharding_variant {
    ($variant_type:ident, $kind:ident) => {
        impl ShardingVariant for $variant_type {
            const KIND: ShardingKind = ShardingKind::$kind;

            fn into_sharding(self) -> Sharding {
                Sharding::$kind(self)
            }

            fn from_sharding(sharding: Sharding) -> Result<Self, Error> {
                match sharding {
                    Sharding::$kind(sharding) => Ok(sharding),
                    sharding => Err(Error::invalid_argument(format!(
                        "requested a sharding of kind '{}' but got one of kind '{}'",
                        Self::KIND,
                        sharding.kind(),
                    ))),
                }
            }
        }

        impl From<$variant_type> for Sharding {
            fn from(sharding: $variant_type) -> Self {
                sharding.into_sharding()
            }
        }
    };
}

impl_sharding_variant!(SingleDeviceSharding, SingleDevice);
impl_sharding_variant!(OpaqueSharding, Opaque);
impl_sharding_variant!(ConcreteSharding, Concrete);
impl_sharding_variant!(ConcreteEvenSharding, ConcreteEven);
impl_sharding_variant!(ShardingParamSharding, ShardingParam);
