//! This module provides the versioned serialization framework ("SerDes") for sharding descriptors.
//!
//! Serialization turns a [`Sharding`] into a [`Serialized`] envelope carrying the sharding's
//! [`ShardingKind`] type tag, an explicit [`SerdesVersion`], and opaque payload bytes whose layout is entirely
//! determined by that `(kind, version)` pair. Deserialization dispatches on the tag and version, resolves the
//! device IDs embedded in the payload against the live [`Client`] supplied through [`DeserializeOptions`], and
//! reconstructs the descriptor through the same validating factories used at construction time, so corrupted
//! payloads that violate a structural invariant fail with the same [`Error::InvalidArgument`] as fresh
//! construction.
//!
//! Dispatch goes through an explicit [`Registry`] mapping `(kind, version)` to a [`Codec`]. The registry is
//! constructed once and never mutated afterwards, so concurrent [`Registry::serialize`] and
//! [`Registry::deserialize`] calls need no synchronization; a process-wide default registry is available through
//! [`default_registry`] and the free [`serialize`]/[`deserialize`] functions. Tests can fabricate partial
//! registries via [`Registry::empty`] and [`Registry::register`].
//!
//! Both supported versions currently share the same payload layout for every sharding kind. Codecs are
//! nonetheless registered per version so that a future version can change a payload without touching the layouts
//! already shipped: a layout is frozen once a version that uses it has shipped, and changing one requires minting
//! a new [`SerdesVersion`] value.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use prost::Message;

use crate::{
    BoundedDynamicShapeTag, Client, ConcreteEvenSharding, ConcreteGeometry, ConcreteSharding, DeviceList,
    DeviceListRef, DynamicShape, Error, MemoryKind, OpaqueSharding, Shape, Sharding, ShardingKind, ShardingParam,
    ShardingParamSharding, ShardingVariant, SingleDeviceSharding, protos,
};

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

/// Identifies a supported wire-format version. The version fixes the payload byte layout for every
/// [`ShardingKind`]; a serializer writes exactly one version into the envelope and a deserializer must interpret
/// the payload using exactly that version's layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SerdesVersion {
    V1 = 1,
    V2 = 2,
}

impl SerdesVersion {
    /// The version written by default when serializing.
    pub const CURRENT: SerdesVersion = SerdesVersion::V2;

    /// All supported versions, in increasing order.
    pub const ALL: [SerdesVersion; 2] = [SerdesVersion::V1, SerdesVersion::V2];

    /// Returns the stable wire number of this [`SerdesVersion`].
    pub fn number(self) -> u32 {
        self as u32
    }

    /// Returns the [`SerdesVersion`] with the provided wire number, or [`Error::Unimplemented`] if the number does
    /// not correspond to any supported version.
    pub fn from_number(number: u32) -> Result<Self, Error> {
        match number {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            _ => Err(Error::unimplemented(format!("wire-format version {number} is not supported"))),
        }
    }
}

impl Display for SerdesVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Versioned, typed, immutable container for a serialized sharding descriptor. Produced by [`serialize`] and
/// consumed by [`deserialize`]; the payload bytes are opaque to callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Serialized {
    kind: ShardingKind,
    version: SerdesVersion,
    data: Vec<u8>,
}

impl Serialized {
    pub(crate) fn new(kind: ShardingKind, version: SerdesVersion, data: Vec<u8>) -> Self {
        Self { kind, version, data }
    }

    /// Returns the [`ShardingKind`] that produced the payload of this envelope.
    pub fn kind(&self) -> ShardingKind {
        self.kind
    }

    /// Returns the [`SerdesVersion`] that fixes the payload layout of this envelope.
    pub fn version(&self) -> SerdesVersion {
        self.version
    }

    /// Returns the opaque payload bytes of this envelope.
    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Encodes this envelope, including its type tag and version, into a self-describing byte sequence.
    pub fn to_bytes(&self) -> Vec<u8> {
        let proto = protos::Envelope {
            kind: self.kind.number(),
            version: self.version.number(),
            data: self.data.clone(),
        };
        proto.encode_to_vec()
    }

    /// Decodes an envelope previously produced by [`Serialized::to_bytes`]. Unparsable bytes fail with
    /// [`Error::Internal`], unknown kind numbers with [`Error::InvalidArgument`], and unsupported version numbers
    /// with [`Error::Unimplemented`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let proto = protos::Envelope::decode(bytes)
            .map_err(|error| Error::internal(format!("failed to parse serialized sharding envelope: {error}")))?;
        Ok(Self {
            kind: ShardingKind::from_number(proto.kind)?,
            version: SerdesVersion::from_number(proto.version)?,
            data: proto.data,
        })
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Options for [`serialize`], carrying the target wire-format version.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SerializeOptions {
    version: SerdesVersion,
}

impl SerializeOptions {
    /// Creates new [`SerializeOptions`] targeting the provided version.
    pub fn new(version: SerdesVersion) -> Self {
        Self { version }
    }

    /// Returns the target wire-format version.
    pub fn version(&self) -> SerdesVersion {
        self.version
    }
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self { version: SerdesVersion::CURRENT }
    }
}

/// Options for [`deserialize`], carrying the live [`Client`] used to resolve the device IDs embedded in sharding
/// payloads back into device handles. Sharding descriptors are not self-contained outside a runtime session,
/// which is why deserialization always requires a client.
#[derive(Copy, Clone)]
pub struct DeserializeOptions<'c> {
    client: &'c Client,
}

impl<'c> DeserializeOptions<'c> {
    /// Creates new [`DeserializeOptions`] resolving devices through the provided client.
    pub fn new(client: &'c Client) -> Self {
        Self { client }
    }

    /// Returns the client used to resolve device IDs.
    pub fn client(&self) -> &'c Client {
        self.client
    }
}

// ---------------------------------------------------------------------------
// Codec registry
// ---------------------------------------------------------------------------

/// Function that encodes a [`Sharding`] of a specific kind into payload bytes at a specific version.
pub type EncodeFn = fn(&Sharding) -> Result<Vec<u8>, Error>;

/// Function that decodes payload bytes of a specific kind and version back into a [`Sharding`], resolving device
/// IDs through the client in the provided options.
pub type DecodeFn = fn(&[u8], &DeserializeOptions) -> Result<Sharding, Error>;

/// Encoder/decoder pair registered for one `(kind, version)` entry of a [`Registry`].
#[derive(Copy, Clone)]
pub struct Codec {
    encode: EncodeFn,
    decode: DecodeFn,
}

impl Codec {
    /// Creates a new [`Codec`] from the provided encoder and decoder functions.
    pub fn new(encode: EncodeFn, decode: DecodeFn) -> Self {
        Self { encode, decode }
    }
}

/// Explicit, constructed-once mapping from `(kind, version)` to [`Codec`]s.
///
/// The registry is read-only after construction, so a single instance can serve concurrent
/// [`serialize`](Registry::serialize) and [`deserialize`](Registry::deserialize) calls without synchronization.
/// Production code normally uses the process-wide [`default_registry`]; tests can fabricate partial registries
/// with [`Registry::empty`] and [`Registry::register`] to exercise dispatch in isolation.
pub struct Registry {
    codecs: HashMap<(ShardingKind, SerdesVersion), Codec>,
}

impl Registry {
    /// Creates a new [`Registry`] with codecs registered for every [`ShardingKind`] at every [`SerdesVersion`].
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for version in SerdesVersion::ALL {
            registry.register(
                ShardingKind::SingleDevice,
                version,
                Codec::new(encode_single_device, decode_single_device),
            );
            registry.register(ShardingKind::Opaque, version, Codec::new(encode_opaque, decode_opaque));
            registry.register(ShardingKind::Concrete, version, Codec::new(encode_concrete, decode_concrete));
            registry.register(
                ShardingKind::ConcreteEven,
                version,
                Codec::new(encode_concrete_even, decode_concrete_even),
            );
            registry.register(
                ShardingKind::ShardingParam,
                version,
                Codec::new(encode_sharding_param, decode_sharding_param),
            );
        }
        registry
    }

    /// Creates a new [`Registry`] with no registered codecs.
    pub fn empty() -> Self {
        Self { codecs: HashMap::new() }
    }

    /// Registers a [`Codec`] for the provided kind and version, replacing any previous entry. Registration must
    /// complete before the registry is shared across threads.
    pub fn register(&mut self, kind: ShardingKind, version: SerdesVersion, codec: Codec) {
        self.codecs.insert((kind, version), codec);
    }

    fn codec(&self, kind: ShardingKind, version: SerdesVersion) -> Result<&Codec, Error> {
        self.codecs.get(&(kind, version)).ok_or_else(|| {
            Error::unimplemented(format!(
                "no codec is registered for {kind} shardings at wire-format version {version}",
            ))
        })
    }

    /// Serializes the provided [`Sharding`] into a [`Serialized`] envelope at the version requested by `options`.
    /// Fails with [`Error::Unimplemented`] if no codec is registered for the sharding's kind at that version.
    pub fn serialize(&self, sharding: &Sharding, options: SerializeOptions) -> Result<Serialized, Error> {
        let codec = self.codec(sharding.kind(), options.version())?;
        let data = (codec.encode)(sharding)?;
        Ok(Serialized::new(sharding.kind(), options.version(), data))
    }

    /// Deserializes the provided envelope into a sharding descriptor of type `T`. Fails with
    /// [`Error::InvalidArgument`] if the envelope's type tag does not match `T`, and with [`Error::Unimplemented`]
    /// if the envelope's version has no registered codec for that kind.
    pub fn deserialize<T: ShardingVariant>(
        &self,
        serialized: &Serialized,
        options: &DeserializeOptions,
    ) -> Result<T, Error> {
        if serialized.kind() != T::KIND {
            return Err(Error::invalid_argument(format!(
                "requested deserialization into a {} sharding, but the envelope contains a {} sharding",
                T::KIND,
                serialized.kind(),
            )));
        }
        T::from_sharding(self.deserialize_sharding(serialized, options)?)
    }

    /// Deserializes the provided envelope into a [`Sharding`] of whatever kind the envelope's type tag names.
    pub fn deserialize_sharding(
        &self,
        serialized: &Serialized,
        options: &DeserializeOptions,
    ) -> Result<Sharding, Error> {
        let codec = self.codec(serialized.kind(), serialized.version())?;
        (codec.decode)(serialized.data(), options)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the process-wide default [`Registry`], initialized on first use with codecs for every kind and version.
pub fn default_registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::new)
}

/// Serializes the provided [`Sharding`] using the [`default_registry`].
pub fn serialize(sharding: &Sharding, options: SerializeOptions) -> Result<Serialized, Error> {
    default_registry().serialize(sharding, options)
}

/// Deserializes the provided envelope into a sharding descriptor of type `T` using the [`default_registry`].
pub fn deserialize<T: ShardingVariant>(serialized: &Serialized, options: &DeserializeOptions) -> Result<T, Error> {
    default_registry().deserialize(serialized, options)
}

/// Deserializes the provided envelope into a [`Sharding`] of any kind using the [`default_registry`].
pub fn deserialize_sharding(serialized: &Serialized, options: &DeserializeOptions) -> Result<Sharding, Error> {
    default_registry().deserialize_sharding(serialized, options)
}

// ---------------------------------------------------------------------------
// Field conversions
// ---------------------------------------------------------------------------

fn encode_memory_kind(memory_kind: &MemoryKind) -> Option<String> {
    memory_kind.kind().map(str::to_string)
}

fn decode_memory_kind(memory_kind: Option<String>) -> MemoryKind {
    match memory_kind {
        Some(kind) => MemoryKind::new(kind),
        None => MemoryKind::unspecified(),
    }
}

fn encode_device_ids(devices: &DeviceListRef) -> Vec<u64> {
    devices.devices().iter().map(|device| device.id() as u64).collect()
}

fn decode_device_list(client: &Client, device_ids: &[u64]) -> Result<DeviceListRef, Error> {
    let devices = device_ids
        .iter()
        .map(|id| {
            let id = usize::try_from(*id).map_err(|_| {
                Error::invalid_argument(format!("device id {id} does not fit in this platform's id range"))
            })?;
            client.resolve_device(id)
        })
        .collect::<Result<Vec<_>, _>>()?;
    DeviceList::new_ref(devices)
}

fn encode_shape(shape: &Shape) -> protos::ShapeProto {
    protos::ShapeProto { dims: shape.dims().to_vec() }
}

fn decode_shape(proto: protos::ShapeProto) -> Result<Shape, Error> {
    Shape::new(proto.dims)
}

fn encode_dynamic_shape(dynamic_shape: &DynamicShape) -> protos::DynamicShapeProto {
    protos::DynamicShapeProto {
        bounds: Some(encode_shape(dynamic_shape.bounds())),
        dynamic_dims: dynamic_shape.tag().dynamic_dims().to_vec(),
    }
}

fn decode_dynamic_shape(proto: protos::DynamicShapeProto) -> Result<DynamicShape, Error> {
    let bounds = proto
        .bounds
        .ok_or_else(|| Error::invalid_argument("serialized dynamic shape is missing its dimension bounds"))?;
    DynamicShape::new(decode_shape(bounds)?, BoundedDynamicShapeTag::new(proto.dynamic_dims)?)
}

fn parse_error(kind: ShardingKind, error: prost::DecodeError) -> Error {
    Error::internal(format!("failed to parse serialized {kind} sharding payload: {error}"))
}

fn dispatch_error(kind: ShardingKind) -> Error {
    Error::internal(format!("a {kind} sharding codec was dispatched on a sharding of a different kind"))
}

// ---------------------------------------------------------------------------
// Per-kind codecs
// ---------------------------------------------------------------------------

fn encode_single_device(sharding: &Sharding) -> Result<Vec<u8>, Error> {
    let Sharding::SingleDevice(sharding) = sharding else {
        return Err(dispatch_error(ShardingKind::SingleDevice));
    };
    let proto = protos::SingleDeviceShardingProto {
        device_id: sharding.device().id() as u64,
        memory_kind: encode_memory_kind(sharding.memory_kind()),
    };
    Ok(proto.encode_to_vec())
}

fn decode_single_device(data: &[u8], options: &DeserializeOptions) -> Result<Sharding, Error> {
    let proto = protos::SingleDeviceShardingProto::decode(data)
        .map_err(|error| parse_error(ShardingKind::SingleDevice, error))?;
    let device_id = usize::try_from(proto.device_id).map_err(|_| {
        Error::invalid_argument(format!("device id {} does not fit in this platform's id range", proto.device_id))
    })?;
    let device = options.client().resolve_device(device_id)?;
    Ok(SingleDeviceSharding::new(device, decode_memory_kind(proto.memory_kind)).into_sharding())
}

fn encode_opaque(sharding: &Sharding) -> Result<Vec<u8>, Error> {
    let Sharding::Opaque(sharding) = sharding else {
        return Err(dispatch_error(ShardingKind::Opaque));
    };
    let proto = protos::OpaqueShardingProto {
        device_ids: encode_device_ids(sharding.devices()),
        memory_kind: encode_memory_kind(sharding.memory_kind()),
    };
    Ok(proto.encode_to_vec())
}

fn decode_opaque(data: &[u8], options: &DeserializeOptions) -> Result<Sharding, Error> {
    let proto =
        protos::OpaqueShardingProto::decode(data).map_err(|error| parse_error(ShardingKind::Opaque, error))?;
    let devices = decode_device_list(options.client(), &proto.device_ids)?;
    Ok(OpaqueSharding::new(devices, decode_memory_kind(proto.memory_kind)).into_sharding())
}

fn encode_concrete(sharding: &Sharding) -> Result<Vec<u8>, Error> {
    let Sharding::Concrete(sharding) = sharding else {
        return Err(dispatch_error(ShardingKind::Concrete));
    };
    let geometry = match sharding.geometry() {
        ConcreteGeometry::Static { shape, shard_shapes } => {
            protos::ConcreteGeometryProto::Static(protos::ConcreteStaticGeometryProto {
                shape: Some(encode_shape(shape)),
                shard_shapes: shard_shapes.iter().map(encode_shape).collect(),
            })
        }
        ConcreteGeometry::Dynamic { dynamic_shape, shard_dynamic_shapes } => {
            protos::ConcreteGeometryProto::Dynamic(protos::ConcreteDynamicGeometryProto {
                dynamic_shape: Some(encode_dynamic_shape(dynamic_shape)),
                shard_dynamic_shapes: shard_dynamic_shapes.iter().map(encode_dynamic_shape).collect(),
            })
        }
    };
    let proto = protos::ConcreteShardingProto {
        device_ids: encode_device_ids(sharding.devices()),
        memory_kind: encode_memory_kind(sharding.memory_kind()),
        geometry: Some(geometry),
    };
    Ok(proto.encode_to_vec())
}

fn decode_concrete(data: &[u8], options: &DeserializeOptions) -> Result<Sharding, Error> {
    let proto =
        protos::ConcreteShardingProto::decode(data).map_err(|error| parse_error(ShardingKind::Concrete, error))?;
    let devices = decode_device_list(options.client(), &proto.device_ids)?;
    let memory_kind = decode_memory_kind(proto.memory_kind);
    let geometry = proto
        .geometry
        .ok_or_else(|| Error::invalid_argument("serialized concrete sharding is missing its geometry"))?;
    let sharding = match geometry {
        protos::ConcreteGeometryProto::Static(geometry) => {
            let shape = geometry
                .shape
                .ok_or_else(|| Error::invalid_argument("serialized concrete sharding is missing its full shape"))?;
            ConcreteSharding::with_static_shapes(
                devices,
                memory_kind,
                decode_shape(shape)?,
                geometry.shard_shapes.into_iter().map(decode_shape).collect::<Result<Vec<_>, _>>()?,
            )?
        }
        protos::ConcreteGeometryProto::Dynamic(geometry) => {
            let dynamic_shape = geometry.dynamic_shape.ok_or_else(|| {
                Error::invalid_argument("serialized concrete sharding is missing its full dynamic shape")
            })?;
            ConcreteSharding::with_dynamic_shapes(
                devices,
                memory_kind,
                decode_dynamic_shape(dynamic_shape)?,
                geometry
                    .shard_dynamic_shapes
                    .into_iter()
                    .map(decode_dynamic_shape)
                    .collect::<Result<Vec<_>, _>>()?,
            )?
        }
    };
    Ok(sharding.into_sharding())
}

fn encode_concrete_even(sharding: &Sharding) -> Result<Vec<u8>, Error> {
    let Sharding::ConcreteEven(sharding) = sharding else {
        return Err(dispatch_error(ShardingKind::ConcreteEven));
    };
    let proto = protos::ConcreteEvenShardingProto {
        device_ids: encode_device_ids(sharding.devices()),
        memory_kind: encode_memory_kind(sharding.memory_kind()),
        shape: Some(encode_shape(sharding.shape())),
        shard_shape: Some(encode_shape(sharding.shard_shape())),
        is_fully_replicated: sharding.is_fully_replicated(),
    };
    Ok(proto.encode_to_vec())
}

fn decode_concrete_even(data: &[u8], options: &DeserializeOptions) -> Result<Sharding, Error> {
    let proto = protos::ConcreteEvenShardingProto::decode(data)
        .map_err(|error| parse_error(ShardingKind::ConcreteEven, error))?;
    let devices = decode_device_list(options.client(), &proto.device_ids)?;
    let shape = proto
        .shape
        .ok_or_else(|| Error::invalid_argument("serialized concrete even sharding is missing its full shape"))?;
    let shard_shape = proto
        .shard_shape
        .ok_or_else(|| Error::invalid_argument("serialized concrete even sharding is missing its shard shape"))?;
    let sharding = ConcreteEvenSharding::new(
        devices,
        decode_memory_kind(proto.memory_kind),
        decode_shape(shape)?,
        decode_shape(shard_shape)?,
        proto.is_fully_replicated,
    )?;
    Ok(sharding.into_sharding())
}

fn encode_sharding_param(sharding: &Sharding) -> Result<Vec<u8>, Error> {
    let Sharding::ShardingParam(sharding) = sharding else {
        return Err(dispatch_error(ShardingKind::ShardingParam));
    };
    let param = sharding.sharding_param();
    let proto = protos::ShardingParamShardingProto {
        device_ids: encode_device_ids(sharding.devices()),
        memory_kind: encode_memory_kind(sharding.memory_kind()),
        sharding_param: Some(protos::ShardingParamProto {
            dim_shards: param.dim_shards().to_vec(),
            permutation: param.permutation().iter().map(|axis_index| *axis_index as u64).collect(),
            axis_sizes: param.axis_sizes().to_vec(),
        }),
    };
    Ok(proto.encode_to_vec())
}

fn decode_sharding_param(data: &[u8], options: &DeserializeOptions) -> Result<Sharding, Error> {
    let proto = protos::ShardingParamShardingProto::decode(data)
        .map_err(|error| parse_error(ShardingKind::ShardingParam, error))?;
    let devices = decode_device_list(options.client(), &proto.device_ids)?;
    let param = proto.sharding_param.ok_or_else(|| {
        Error::invalid_argument("serialized sharding-param sharding is missing its sharding parameter")
    })?;
    let permutation = param
        .permutation
        .into_iter()
        .map(|axis_index| {
            usize::try_from(axis_index).map_err(|_| {
                Error::invalid_argument(format!(
                    "sharding parameter permutation entry {axis_index} does not fit in this platform's index range",
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let param = ShardingParam::new(param.dim_shards, permutation, param.axis_sizes)?;
    let sharding = ShardingParamSharding::new(param, devices, decode_memory_kind(proto.memory_kind))?;
    Ok(sharding.into_sharding())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> Client {
        Client::with_device_count(2).unwrap()
    }

    fn test_shape(dims: &[i64]) -> Shape {
        Shape::new(dims.to_vec()).unwrap()
    }

    fn test_dynamic_shape(dims: &[i64]) -> DynamicShape {
        DynamicShape::new(test_shape(dims), BoundedDynamicShapeTag::new(vec![false, true]).unwrap()).unwrap()
    }

    fn test_shardings(client: &Client) -> Vec<Sharding> {
        let devices = client.device_list(&[0, 1]).unwrap();
        vec![
            SingleDeviceSharding::new(client.devices()[0], MemoryKind::new("abc")).into_sharding(),
            OpaqueSharding::new(devices.clone(), MemoryKind::new("abc")).into_sharding(),
            ConcreteSharding::with_static_shapes(
                devices.clone(),
                MemoryKind::new("abc"),
                test_shape(&[10, 20]),
                vec![test_shape(&[3, 20]), test_shape(&[7, 20])],
            )
            .unwrap()
            .into_sharding(),
            ConcreteSharding::with_dynamic_shapes(
                devices.clone(),
                MemoryKind::new("abc"),
                test_dynamic_shape(&[10, 20]),
                vec![test_dynamic_shape(&[3, 20]), test_dynamic_shape(&[7, 20])],
            )
            .unwrap()
            .into_sharding(),
            ConcreteEvenSharding::new(
                devices.clone(),
                MemoryKind::new("abc"),
                test_shape(&[10, 20]),
                test_shape(&[5, 20]),
                true,
            )
            .unwrap()
            .into_sharding(),
            ShardingParamSharding::new(
                ShardingParam::new(vec![2, 1], vec![0], vec![2]).unwrap(),
                devices,
                MemoryKind::new("abc"),
            )
            .unwrap()
            .into_sharding(),
        ]
    }

    #[test]
    fn test_serdes_version_numbers() {
        for version in SerdesVersion::ALL {
            assert_eq!(SerdesVersion::from_number(version.number()).unwrap(), version);
        }
        assert!(matches!(SerdesVersion::from_number(0), Err(Error::Unimplemented { .. })));
        assert!(matches!(SerdesVersion::from_number(3), Err(Error::Unimplemented { .. })));
    }

    #[test]
    fn test_round_trip_all_kinds_and_versions() {
        let client = test_client();
        let options = DeserializeOptions::new(&client);
        for version in SerdesVersion::ALL {
            for sharding in test_shardings(&client) {
                let serialized = serialize(&sharding, SerializeOptions::new(version)).unwrap();
                assert_eq!(serialized.kind(), sharding.kind());
                assert_eq!(serialized.version(), version);
                let deserialized = deserialize_sharding(&serialized, &options).unwrap();
                assert_eq!(deserialized, sharding);
            }
        }
    }

    #[test]
    fn test_single_device_sharding_round_trip() {
        let client = test_client();
        let sharding = SingleDeviceSharding::new(client.devices()[0], MemoryKind::new("abc"));
        for version in SerdesVersion::ALL {
            let serialized = serialize(&sharding.clone().into_sharding(), SerializeOptions::new(version)).unwrap();
            let deserialized: SingleDeviceSharding =
                deserialize(&serialized, &DeserializeOptions::new(&client)).unwrap();
            assert_eq!(deserialized.devices().devices(), sharding.devices().devices());
            assert_eq!(deserialized.memory_kind(), sharding.memory_kind());
        }
    }

    #[test]
    fn test_opaque_sharding_round_trip() {
        let client = test_client();
        let sharding = OpaqueSharding::new(client.device_list(&[0, 1]).unwrap(), MemoryKind::new("abc"));
        for version in SerdesVersion::ALL {
            let serialized = serialize(&sharding.clone().into_sharding(), SerializeOptions::new(version)).unwrap();
            let deserialized: OpaqueSharding = deserialize(&serialized, &DeserializeOptions::new(&client)).unwrap();
            assert_eq!(deserialized.devices().devices(), sharding.devices().devices());
            assert_eq!(deserialized.memory_kind(), sharding.memory_kind());
        }
    }

    #[test]
    fn test_concrete_sharding_round_trip() {
        let client = test_client();
        let sharding = ConcreteSharding::with_static_shapes(
            client.device_list(&[0, 1]).unwrap(),
            MemoryKind::new("abc"),
            test_shape(&[10, 20]),
            vec![test_shape(&[3, 20]), test_shape(&[7, 20])],
        )
        .unwrap();
        for version in SerdesVersion::ALL {
            let serialized = serialize(&sharding.clone().into_sharding(), SerializeOptions::new(version)).unwrap();
            let deserialized: ConcreteSharding = deserialize(&serialized, &DeserializeOptions::new(&client)).unwrap();
            assert_eq!(deserialized.devices().devices(), sharding.devices().devices());
            assert_eq!(deserialized.shape(), sharding.shape());
            assert_eq!(deserialized.shard_shapes(), sharding.shard_shapes());
        }
    }

    #[test]
    fn test_concrete_sharding_with_dynamic_shape_round_trip() {
        let client = test_client();
        let sharding = ConcreteSharding::with_dynamic_shapes(
            client.device_list(&[0, 1]).unwrap(),
            MemoryKind::new("abc"),
            test_dynamic_shape(&[10, 20]),
            vec![test_dynamic_shape(&[3, 20]), test_dynamic_shape(&[7, 20])],
        )
        .unwrap();
        for version in SerdesVersion::ALL {
            let serialized = serialize(&sharding.clone().into_sharding(), SerializeOptions::new(version)).unwrap();
            let deserialized: ConcreteSharding = deserialize(&serialized, &DeserializeOptions::new(&client)).unwrap();
            assert_eq!(deserialized.devices().devices(), sharding.devices().devices());
            assert_eq!(deserialized.dynamic_shape(), sharding.dynamic_shape());
            assert_eq!(deserialized.shard_dynamic_shapes(), sharding.shard_dynamic_shapes());
        }
    }

    #[test]
    fn test_concrete_even_sharding_round_trip() {
        let client = test_client();
        let sharding = ConcreteEvenSharding::new(
            client.device_list(&[0, 1]).unwrap(),
            MemoryKind::new("abc"),
            test_shape(&[10, 20]),
            test_shape(&[5, 20]),
            true,
        )
        .unwrap();
        for version in SerdesVersion::ALL {
            let serialized = serialize(&sharding.clone().into_sharding(), SerializeOptions::new(version)).unwrap();
            let deserialized: ConcreteEvenSharding =
                deserialize(&serialized, &DeserializeOptions::new(&client)).unwrap();
            assert_eq!(deserialized.devices().devices(), sharding.devices().devices());
            assert_eq!(deserialized.shape(), sharding.shape());
            assert_eq!(deserialized.shard_shape(), sharding.shard_shape());
            assert_eq!(deserialized.is_fully_replicated(), sharding.is_fully_replicated());
        }
    }

    #[test]
    fn test_sharding_param_sharding_round_trip() {
        let client = test_client();
        let sharding = ShardingParamSharding::new(
            ShardingParam::new(vec![2, 1], vec![0], vec![2]).unwrap(),
            client.device_list(&[0, 1]).unwrap(),
            MemoryKind::new("abc"),
        )
        .unwrap();
        for version in SerdesVersion::ALL {
            let serialized = serialize(&sharding.clone().into_sharding(), SerializeOptions::new(version)).unwrap();
            let deserialized: ShardingParamSharding =
                deserialize(&serialized, &DeserializeOptions::new(&client)).unwrap();
            assert_eq!(deserialized.devices().devices(), sharding.devices().devices());
            assert_eq!(deserialized.sharding_param(), sharding.sharding_param());
        }
    }

    #[test]
    fn test_deserialize_rejects_kind_mismatch_for_every_pair() {
        let client = test_client();
        let options = DeserializeOptions::new(&client);
        for sharding in test_shardings(&client) {
            let serialized = serialize(&sharding, SerializeOptions::default()).unwrap();
            for kind in ShardingKind::ALL {
                if kind == sharding.kind() {
                    continue;
                }
                let error = match kind {
                    ShardingKind::SingleDevice => {
                        deserialize::<SingleDeviceSharding>(&serialized, &options).unwrap_err()
                    }
                    ShardingKind::Opaque => deserialize::<OpaqueSharding>(&serialized, &options).unwrap_err(),
                    ShardingKind::Concrete => deserialize::<ConcreteSharding>(&serialized, &options).unwrap_err(),
                    ShardingKind::ConcreteEven => {
                        deserialize::<ConcreteEvenSharding>(&serialized, &options).unwrap_err()
                    }
                    ShardingKind::ShardingParam => {
                        deserialize::<ShardingParamSharding>(&serialized, &options).unwrap_err()
                    }
                };
                assert!(matches!(error, Error::InvalidArgument { .. }));
            }
        }
    }

    #[test]
    fn test_serialize_fails_for_unregistered_version() {
        let client = test_client();
        let sharding = OpaqueSharding::new(client.device_list(&[0, 1]).unwrap(), MemoryKind::new("abc"));
        let mut registry = Registry::empty();
        registry.register(ShardingKind::Opaque, SerdesVersion::V1, Codec::new(encode_opaque, decode_opaque));
        let serialized =
            registry.serialize(&sharding.clone().into_sharding(), SerializeOptions::new(SerdesVersion::V1));
        assert!(serialized.is_ok());
        let error = registry
            .serialize(&sharding.into_sharding(), SerializeOptions::new(SerdesVersion::V2))
            .unwrap_err();
        assert!(matches!(error, Error::Unimplemented { .. }));
    }

    #[test]
    fn test_deserialize_fails_for_unregistered_version() {
        let client = test_client();
        let sharding = OpaqueSharding::new(client.device_list(&[0, 1]).unwrap(), MemoryKind::new("abc"));
        let serialized = serialize(&sharding.into_sharding(), SerializeOptions::new(SerdesVersion::V2)).unwrap();
        let mut registry = Registry::empty();
        registry.register(ShardingKind::Opaque, SerdesVersion::V1, Codec::new(encode_opaque, decode_opaque));
        let error = registry.deserialize_sharding(&serialized, &DeserializeOptions::new(&client)).unwrap_err();
        assert!(matches!(error, Error::Unimplemented { .. }));
    }

    #[test]
    fn test_deserialize_fails_for_unresolvable_device_id() {
        let serializing_client = test_client();
        let sharding =
            OpaqueSharding::new(serializing_client.device_list(&[0, 1]).unwrap(), MemoryKind::new("abc"));
        let serialized = serialize(&sharding.into_sharding(), SerializeOptions::default()).unwrap();
        let smaller_client = Client::with_device_count(1).unwrap();
        let error = deserialize::<OpaqueSharding>(&serialized, &DeserializeOptions::new(&smaller_client)).unwrap_err();
        assert!(matches!(error, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_deserialize_fails_for_unparsable_payload() {
        let client = test_client();
        // A lone 0xff byte is a truncated field key and can never parse as a message.
        let serialized = Serialized::new(ShardingKind::Opaque, SerdesVersion::V1, vec![0xff]);
        let error = deserialize_sharding(&serialized, &DeserializeOptions::new(&client)).unwrap_err();
        assert!(matches!(error, Error::Internal { .. }));
    }

    #[test]
    fn test_decode_invariant_violation_matches_construction_error() {
        let client = test_client();
        // Hand-craft a concrete sharding payload with two devices but only one shard shape.
        let proto = protos::ConcreteShardingProto {
            device_ids: vec![0, 1],
            memory_kind: Some("abc".to_string()),
            geometry: Some(protos::ConcreteGeometryProto::Static(protos::ConcreteStaticGeometryProto {
                shape: Some(protos::ShapeProto { dims: vec![10, 20] }),
                shard_shapes: vec![protos::ShapeProto { dims: vec![10, 20] }],
            })),
        };
        let serialized = Serialized::new(ShardingKind::Concrete, SerdesVersion::V1, proto.encode_to_vec());
        let decode_error =
            deserialize::<ConcreteSharding>(&serialized, &DeserializeOptions::new(&client)).unwrap_err();
        let construction_error = ConcreteSharding::with_static_shapes(
            client.device_list(&[0, 1]).unwrap(),
            MemoryKind::new("abc"),
            test_shape(&[10, 20]),
            vec![test_shape(&[10, 20])],
        )
        .unwrap_err();
        assert!(matches!(&decode_error, Error::InvalidArgument { .. }));
        assert_eq!(decode_error.message(), construction_error.message());
    }

    #[test]
    fn test_decode_rejects_missing_concrete_geometry() {
        let client = test_client();
        let proto = protos::ConcreteShardingProto {
            device_ids: vec![0, 1],
            memory_kind: None,
            geometry: None,
        };
        let serialized = Serialized::new(ShardingKind::Concrete, SerdesVersion::V1, proto.encode_to_vec());
        let error = deserialize::<ConcreteSharding>(&serialized, &DeserializeOptions::new(&client)).unwrap_err();
        assert!(matches!(error, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_decode_rejects_overflowing_sharding_param_products() {
        let client = test_client();
        // Shard counts whose product overflows `u64` must be rejected, not wrapped.
        let proto = protos::ShardingParamShardingProto {
            device_ids: vec![0, 1],
            memory_kind: None,
            sharding_param: Some(protos::ShardingParamProto {
                dim_shards: vec![1 << 32, 1 << 32],
                permutation: vec![0],
                axis_sizes: vec![2],
            }),
        };
        let serialized = Serialized::new(ShardingKind::ShardingParam, SerdesVersion::V1, proto.encode_to_vec());
        let error = deserialize_sharding(&serialized, &DeserializeOptions::new(&client)).unwrap_err();
        assert!(matches!(error, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_envelope_byte_round_trip() {
        let client = test_client();
        let sharding = SingleDeviceSharding::new(client.devices()[1], MemoryKind::unspecified());
        let serialized = serialize(&sharding.into_sharding(), SerializeOptions::default()).unwrap();
        let decoded = Serialized::from_bytes(&serialized.to_bytes()).unwrap();
        assert_eq!(decoded, serialized);
    }

    #[test]
    fn test_envelope_from_bytes_rejects_unknown_kind_and_version() {
        let unknown_kind = protos::Envelope { kind: 9, version: 1, data: Vec::new() }.encode_to_vec();
        assert!(matches!(Serialized::from_bytes(&unknown_kind), Err(Error::InvalidArgument { .. })));

        let unknown_version = protos::Envelope { kind: 1, version: 9, data: Vec::new() }.encode_to_vec();
        assert!(matches!(Serialized::from_bytes(&unknown_version), Err(Error::Unimplemented { .. })));

        assert!(matches!(Serialized::from_bytes(&[0xff]), Err(Error::Internal { .. })));
    }

    #[test]
    fn test_unspecified_memory_kind_round_trip() {
        let client = test_client();
        let sharding = OpaqueSharding::new(client.device_list(&[0, 1]).unwrap(), MemoryKind::unspecified());
        let serialized = serialize(&sharding.clone().into_sharding(), SerializeOptions::default()).unwrap();
        let deserialized: OpaqueSharding = deserialize(&serialized, &DeserializeOptions::new(&client)).unwrap();
        assert_eq!(deserialized.memory_kind(), &MemoryKind::unspecified());
    }

    #[test]
    fn test_serialize_options_default_to_current_version() {
        assert_eq!(SerializeOptions::default().version(), SerdesVersion::CURRENT);
        assert_eq!(SerializeOptions::new(SerdesVersion::V1).version(), SerdesVersion::V1);
    }
}
