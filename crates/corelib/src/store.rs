//! Storage engine types.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer};

use crate::error::Error;

/// Storage engine backing a storage server.
///
/// A server's store type never changes. Moving an endpoint to a different
/// engine means destroying the old server and creating a new one.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyValueStoreType {
    SsdBTreeV1,
    SsdBTreeV2,
    SsdRedwoodV1,
    SsdRocksDbV1,
    Memory,
    MemoryRadixTree,
}

impl KeyValueStoreType {
    /// Configuration name of this engine.
    pub fn name(&self) -> &'static str {
        match self {
            KeyValueStoreType::SsdBTreeV1 => "ssd-1",
            KeyValueStoreType::SsdBTreeV2 => "ssd-2",
            KeyValueStoreType::SsdRedwoodV1 => "ssd-redwood-1-experimental",
            KeyValueStoreType::SsdRocksDbV1 => "ssd-rocksdb-v1",
            KeyValueStoreType::Memory => "memory",
            KeyValueStoreType::MemoryRadixTree => "memory-radixtree-beta",
        }
    }
}

impl fmt::Display for KeyValueStoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyValueStoreType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ssd-1" => Ok(KeyValueStoreType::SsdBTreeV1),
            "ssd-2" | "ssd" => Ok(KeyValueStoreType::SsdBTreeV2),
            "ssd-redwood-1-experimental" => Ok(KeyValueStoreType::SsdRedwoodV1),
            "ssd-rocksdb-v1" => Ok(KeyValueStoreType::SsdRocksDbV1),
            "memory" => Ok(KeyValueStoreType::Memory),
            "memory-radixtree-beta" => Ok(KeyValueStoreType::MemoryRadixTree),
            other => Err(Error::InvalidStoreType(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for KeyValueStoreType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(de::Error::custom)
    }
}
