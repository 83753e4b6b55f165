//! Root blocks: the commit-epoch markers that bracket every process log.
//!
//! The journal owns the real root block; the log writer only needs the
//! accessors in [`RootBlockView`] and the canonical byte form. [`RootBlock`]
//! is the concrete value used by the reader, the CLI and the tests.

use crate::error::{Error, Result};
use crate::sha256_digest;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Size of the canonical root block encoding in bytes.
pub const ROOT_BLOCK_SIZE: usize = 48;

const ROOT_BLOCK_MAGIC: u32 = 0x5242_4C4B; // "RBLK"
const ROOT_BLOCK_VERSION: u16 = 1;
const CHECKSUM_OFFSET: usize = 40;

/// Backing store type of the journal being replicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreType {
    /// Read-write store: fragments are replayed from raw page bytes.
    Rw,
    /// Write-once store: fragment metadata alone is enough for replay.
    Worm,
}

impl StoreType {
    fn as_u8(self) -> u8 {
        match self {
            StoreType::Rw => 0,
            StoreType::Worm => 1,
        }
    }

    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(StoreType::Rw),
            1 => Some(StoreType::Worm),
            _ => None,
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreType::Rw => write!(f, "RW"),
            StoreType::Worm => write!(f, "WORM"),
        }
    }
}

/// Read-only view of a root block as consumed by the log writer.
pub trait RootBlockView {
    fn commit_counter(&self) -> u64;

    fn last_commit_time(&self) -> i64;

    fn uuid(&self) -> Uuid;

    /// Fixed for the lifetime of a store, so not part of write-set identity.
    fn store_type(&self) -> StoreType;

    /// Canonical fixed-size serialized form, written verbatim to the log.
    fn to_bytes(&self) -> Vec<u8>;

    /// Two root blocks describe the same write set when commit counter,
    /// last commit time and store uuid all match.
    fn same_write_set<O: RootBlockView + ?Sized>(&self, other: &O) -> bool {
        self.commit_counter() == other.commit_counter()
            && self.last_commit_time() == other.last_commit_time()
            && self.uuid() == other.uuid()
    }
}

/// Immutable root block value with a 48-byte little-endian encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootBlock {
    pub commit_counter: u64,
    pub last_commit_time: i64,
    pub uuid: Uuid,
    pub store_type: StoreType,
}

impl RootBlock {
    pub fn new(commit_counter: u64, last_commit_time: i64, uuid: Uuid, store_type: StoreType) -> Self {
        RootBlock {
            commit_counter,
            last_commit_time,
            uuid,
            store_type,
        }
    }

    /// Encode to the canonical form.
    ///
    /// Layout: magic (4) | version (2) | store type (1) | reserved (1) |
    /// commit counter (8) | last commit time (8) | uuid (16) | checksum (8).
    /// The checksum is the first 8 bytes of SHA-256 over everything before it.
    pub fn encode(&self) -> [u8; ROOT_BLOCK_SIZE] {
        let mut buf = [0u8; ROOT_BLOCK_SIZE];
        buf[0..4].copy_from_slice(&ROOT_BLOCK_MAGIC.to_le_bytes());
        buf[4..6].copy_from_slice(&ROOT_BLOCK_VERSION.to_le_bytes());
        buf[6] = self.store_type.as_u8();
        buf[8..16].copy_from_slice(&self.commit_counter.to_le_bytes());
        buf[16..24].copy_from_slice(&self.last_commit_time.to_le_bytes());
        buf[24..40].copy_from_slice(self.uuid.as_bytes());
        let digest = sha256_digest(&buf[..CHECKSUM_OFFSET]);
        buf[CHECKSUM_OFFSET..].copy_from_slice(&digest[..ROOT_BLOCK_SIZE - CHECKSUM_OFFSET]);
        buf
    }

    /// Decode a canonical root block, verifying magic, version and checksum.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != ROOT_BLOCK_SIZE {
            return Err(Error::CorruptLog(format!(
                "root block must be {} bytes, got {}",
                ROOT_BLOCK_SIZE,
                data.len()
            )));
        }

        let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        if magic != ROOT_BLOCK_MAGIC {
            return Err(Error::CorruptLog(format!("bad root block magic: {:#010x}", magic)));
        }

        let version = u16::from_le_bytes([data[4], data[5]]);
        if version != ROOT_BLOCK_VERSION {
            return Err(Error::CorruptLog(format!("unsupported root block version: {}", version)));
        }

        let digest = sha256_digest(&data[..CHECKSUM_OFFSET]);
        if data[CHECKSUM_OFFSET..] != digest[..ROOT_BLOCK_SIZE - CHECKSUM_OFFSET] {
            return Err(Error::CorruptLog("root block checksum mismatch".to_string()));
        }

        let store_type = StoreType::from_u8(data[6])
            .ok_or_else(|| Error::CorruptLog(format!("unknown store type: {}", data[6])))?;

        let mut counter = [0u8; 8];
        counter.copy_from_slice(&data[8..16]);
        let mut time = [0u8; 8];
        time.copy_from_slice(&data[16..24]);
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&data[24..40]);

        Ok(RootBlock {
            commit_counter: u64::from_le_bytes(counter),
            last_commit_time: i64::from_le_bytes(time),
            uuid: Uuid::from_bytes(uuid),
            store_type,
        })
    }
}

impl RootBlockView for RootBlock {
    fn commit_counter(&self) -> u64 {
        self.commit_counter
    }

    fn last_commit_time(&self) -> i64 {
        self.last_commit_time
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn store_type(&self) -> StoreType {
        self.store_type
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.encode().to_vec()
    }
}

impl fmt::Display for RootBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RootBlock{{commitCounter={}, lastCommitTime={}, uuid={}, storeType={}}}",
            self.commit_counter, self.last_commit_time, self.uuid, self.store_type
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RootBlock {
        RootBlock::new(5, 100, Uuid::from_u128(0xfeed), StoreType::Rw)
    }

    #[test]
    fn test_encode_is_fixed_size_and_decodes() {
        let rb = sample();
        let bytes = rb.to_bytes();
        assert_eq!(bytes.len(), ROOT_BLOCK_SIZE);
        assert_eq!(RootBlock::from_bytes(&bytes).unwrap(), rb);
    }

    #[test]
    fn test_decode_rejects_flipped_bit() {
        let mut bytes = sample().encode();
        bytes[9] ^= 0x01;
        let err = RootBlock::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::CorruptLog(_)));
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let bytes = sample().encode();
        assert!(matches!(
            RootBlock::from_bytes(&bytes[..ROOT_BLOCK_SIZE - 1]),
            Err(Error::CorruptLog(_))
        ));
    }

    #[test]
    fn test_same_write_set_ignores_store_type() {
        let rw = sample();
        let worm = RootBlock { store_type: StoreType::Worm, ..rw };
        assert!(rw.same_write_set(&worm));
    }

    #[test]
    fn test_same_write_set_checks_identity_fields() {
        let rb = sample();
        assert!(!rb.same_write_set(&RootBlock { commit_counter: 6, ..rb }));
        assert!(!rb.same_write_set(&RootBlock { last_commit_time: 101, ..rb }));
        assert!(!rb.same_write_set(&RootBlock { uuid: Uuid::from_u128(1), ..rb }));
    }
}
