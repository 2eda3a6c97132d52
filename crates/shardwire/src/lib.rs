//! Versioned, polymorphic serialization ("SerDes") for _sharding descriptors_: metadata objects that describe how
//! a logically single array is partitioned and placed across a set of compute devices in a distributed
//! tensor-computation runtime.
//!
//! The descriptor kinds form a closed set (see [`Sharding`]), each combining a shared device list and a
//! [`MemoryKind`] with kind-specific geometry. Serialization wraps a kind-specific Protobuf payload in a
//! [`Serialized`] envelope tagged with the descriptor's [`ShardingKind`] and an explicit [`SerdesVersion`].
//! Deserialization is polymorphic and validating: it dispatches on the envelope's tag and version through a
//! [`Registry`] of codecs, resolves the device IDs embedded in the payload against the live [`Client`] supplied
//! through [`DeserializeOptions`], and rebuilds the descriptor through the same factories that enforce structural
//! invariants at construction time.
//!
//! ```
//! use shardwire::{
//!     Client, ConcreteSharding, DeserializeOptions, MemoryKind, SerializeOptions, Shape, ShardingVariant,
//!     deserialize, serialize,
//! };
//!
//! # fn main() -> Result<(), shardwire::Error> {
//! let client = Client::with_device_count(2)?;
//! let sharding = ConcreteSharding::with_static_shapes(
//!     client.device_list(&[0, 1])?,
//!     MemoryKind::new("abc"),
//!     Shape::new(vec![10, 20])?,
//!     vec![Shape::new(vec![3, 20])?, Shape::new(vec![7, 20])?],
//! )?;
//!
//! let serialized = serialize(&sharding.clone().into_sharding(), SerializeOptions::default())?;
//! let deserialized: ConcreteSharding = deserialize(&serialized, &DeserializeOptions::new(&client))?;
//! assert_eq!(deserialized, sharding);
//! # Ok(())
//! # }
//! ```
//!
//! Note that this crate only describes and transports shardings; it does not compute shard placements, and it does
//! not own a device runtime beyond the [`Client`] resolution interface that deserialization consumes.

pub mod clients;
pub mod devices;
pub mod errors;
pub mod memories;
pub mod protos;
pub mod serdes;
pub mod shardings;
pub mod shapes;

pub use clients::*;
pub use devices::*;
pub use errors::*;
pub use memories::*;
pub use serdes::*;
pub use shardings::*;
pub use shapes::*;
