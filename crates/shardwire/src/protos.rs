//! Hand-written Protobuf message types defining the wire payload layouts for serialized sharding descriptors.
//!
//! Each `(sharding kind, wire version)` pair fixes the payload layout produced for that kind at that version.
//! Layouts are frozen once shipped: changing one requires minting a new
//! [`SerdesVersion`](crate::SerdesVersion) value, and new fields may at most be appended with fresh tags.
//! Device identity is encoded as device IDs (see [`Device::id`](crate::Device::id)) that are only meaningful
//! relative to the [`Client`](crate::Client) supplied at deserialization time.

use prost::{Message, Oneof};

/// Versioned, typed container for a serialized sharding descriptor.
#[derive(Clone, PartialEq, Message)]
pub struct Envelope {
    /// Wire number of the [`ShardingKind`](crate::ShardingKind) that produced the payload.
    #[prost(uint32, tag = "1")]
    pub kind: u32,

    /// Wire number of the [`SerdesVersion`](crate::SerdesVersion) that fixes the payload layout.
    #[prost(uint32, tag = "2")]
    pub version: u32,

    /// Opaque payload bytes whose layout is entirely determined by `(kind, version)`.
    #[prost(bytes = "vec", tag = "3")]
    pub data: Vec<u8>,
}

/// Wire form of a static [`Shape`](crate::Shape).
#[derive(Clone, PartialEq, Message)]
pub struct ShapeProto {
    /// Dimension sizes, in order.
    #[prost(int64, repeated, tag = "1")]
    pub dims: Vec<i64>,
}

/// Wire form of a [`DynamicShape`](crate::DynamicShape).
#[derive(Clone, PartialEq, Message)]
pub struct DynamicShapeProto {
    /// Dimension bounds, in order.
    #[prost(message, optional, tag = "1")]
    pub bounds: Option<ShapeProto>,

    /// Per-dimension dynamism flags; must have the same length as `bounds.dims`.
    #[prost(bool, repeated, tag = "2")]
    pub dynamic_dims: Vec<bool>,
}

/// Payload for [`SingleDeviceSharding`](crate::SingleDeviceSharding)s.
#[derive(Clone, PartialEq, Message)]
pub struct SingleDeviceShardingProto {
    /// ID of the single device that holds the array.
    #[prost(uint64, tag = "1")]
    pub device_id: u64,

    /// Memory kind, absent if unspecified.
    #[prost(string, optional, tag = "2")]
    pub memory_kind: Option<String>,
}

/// Payload for [`OpaqueSharding`](crate::OpaqueSharding)s.
#[derive(Clone, PartialEq, Message)]
pub struct OpaqueShardingProto {
    /// Ordered IDs of the devices that the array is placed over.
    #[prost(uint64, repeated, tag = "1")]
    pub device_ids: Vec<u64>,

    /// Memory kind, absent if unspecified.
    #[prost(string, optional, tag = "2")]
    pub memory_kind: Option<String>,
}

/// Static arm of the [`ConcreteShardingProto`] geometry one-of.
#[derive(Clone, PartialEq, Message)]
pub struct ConcreteStaticGeometryProto {
    /// Full array shape.
    #[prost(message, optional, tag = "1")]
    pub shape: Option<ShapeProto>,

    /// Per-shard shapes, one per device.
    #[prost(message, repeated, tag = "2")]
    pub shard_shapes: Vec<ShapeProto>,
}

/// Dynamic arm of the [`ConcreteShardingProto`] geometry one-of.
#[derive(Clone, PartialEq, Message)]
pub struct ConcreteDynamicGeometryProto {
    /// Full array dynamic shape.
    #[prost(message, optional, tag = "1")]
    pub dynamic_shape: Option<DynamicShapeProto>,

    /// Per-shard dynamic shapes, one per device.
    #[prost(message, repeated, tag = "2")]
    pub shard_dynamic_shapes: Vec<DynamicShapeProto>,
}

/// Geometry one-of for [`ConcreteShardingProto`]. Exactly one arm is populated, matching the mutually exclusive
/// geometry forms of [`ConcreteSharding`](crate::ConcreteSharding).
#[derive(Clone, PartialEq, Oneof)]
pub enum ConcreteGeometryProto {
    /// Static full shape and per-shard static shapes.
    #[prost(message, tag = "3")]
    Static(ConcreteStaticGeometryProto),

    /// Bounded-dynamic full shape and per-shard bounded-dynamic shapes.
    #[prost(message, tag = "4")]
    Dynamic(ConcreteDynamicGeometryProto),
}

/// Payload for [`ConcreteSharding`](crate::ConcreteSharding)s.
#[derive(Clone, PartialEq, Message)]
pub struct ConcreteShardingProto {
    /// Ordered IDs of the devices that the array is placed over.
    #[prost(uint64, repeated, tag = "1")]
    pub device_ids: Vec<u64>,

    /// Memory kind, absent if unspecified.
    #[prost(string, optional, tag = "2")]
    pub memory_kind: Option<String>,

    /// Static or dynamic geometry.
    #[prost(oneof = "ConcreteGeometryProto", tags = "3, 4")]
    pub geometry: Option<ConcreteGeometryProto>,
}

/// Payload for [`ConcreteEvenSharding`](crate::ConcreteEvenSharding)s.
#[derive(Clone, PartialEq, Message)]
pub struct ConcreteEvenShardingProto {
    /// Ordered IDs of the devices that the array is placed over.
    #[prost(uint64, repeated, tag = "1")]
    pub device_ids: Vec<u64>,

    /// Memory kind, absent if unspecified.
    #[prost(string, optional, tag = "2")]
    pub memory_kind: Option<String>,

    /// Full array shape.
    #[prost(message, optional, tag = "3")]
    pub shape: Option<ShapeProto>,

    /// Shape shared by all shards.
    #[prost(message, optional, tag = "4")]
    pub shard_shape: Option<ShapeProto>,

    /// Whether every device holds a full copy of the array.
    #[prost(bool, tag = "5")]
    pub is_fully_replicated: bool,
}

/// Wire form of a [`ShardingParam`](crate::ShardingParam).
#[derive(Clone, PartialEq, Message)]
pub struct ShardingParamProto {
    /// Number of shards for each array dimension.
    #[prost(uint64, repeated, tag = "1")]
    pub dim_shards: Vec<u64>,

    /// Permutation mapping minor-to-major mesh positions to mesh axes.
    #[prost(uint64, repeated, tag = "2")]
    pub permutation: Vec<u64>,

    /// Mesh axis sizes in minor-to-major order.
    #[prost(uint64, repeated, tag = "3")]
    pub axis_sizes: Vec<u64>,
}

/// Payload for [`ShardingParamSharding`](crate::ShardingParamSharding)s.
#[derive(Clone, PartialEq, Message)]
pub struct ShardingParamShardingProto {
    /// Ordered IDs of the devices that the array is placed over.
    #[prost(uint64, repeated, tag = "1")]
    pub device_ids: Vec<u64>,

    /// Memory kind, absent if unspecified.
    #[prost(string, optional, tag = "2")]
    pub memory_kind: Option<String>,

    /// The sharding parameter.
    #[prost(message, optional, tag = "3")]
    pub sharding_param: Option<ShardingParamProto>,
}
