use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Metadata for one fragment of a replicated write set.
///
/// On disk each message is a record: `u64` little-endian length followed by
/// the bincode encoding of the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteMessage {
    pub commit_counter: u64,
    pub last_commit_time: i64,
    /// Zero-based position within the write set
    pub sequence: u64,
    /// Length of the raw payload that accompanies this message
    pub size: u32,
}

/// Length of the record length prefix.
pub const RECORD_LEN_PREFIX: usize = 8;

impl WriteMessage {
    pub fn new(commit_counter: u64, last_commit_time: i64, sequence: u64, size: u32) -> Self {
        WriteMessage {
            commit_counter,
            last_commit_time,
            sequence,
            size,
        }
    }

    /// Serialize as a length-prefixed record
    pub fn encode_record(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self)
            .map_err(|e| Error::Serialization(format!("Failed to serialize write message: {}", e)))?;
        let mut record = Vec::with_capacity(RECORD_LEN_PREFIX + body.len());
        record.extend_from_slice(&(body.len() as u64).to_le_bytes());
        record.extend_from_slice(&body);
        Ok(record)
    }

    /// Parse a record from the front of `data`.
    ///
    /// Returns the message and the number of bytes consumed.
    pub fn decode_record(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < RECORD_LEN_PREFIX {
            return Err(Error::CorruptLog("truncated record length".to_string()));
        }
        let mut len_buf = [0u8; RECORD_LEN_PREFIX];
        len_buf.copy_from_slice(&data[..RECORD_LEN_PREFIX]);
        let len = u64::from_le_bytes(len_buf);

        let end = usize::try_from(len)
            .ok()
            .and_then(|l| l.checked_add(RECORD_LEN_PREFIX))
            .filter(|end| *end <= data.len())
            .ok_or_else(|| Error::CorruptLog(format!("record length {} overruns log", len)))?;

        let msg: WriteMessage = bincode::deserialize(&data[RECORD_LEN_PREFIX..end])
            .map_err(|e| Error::CorruptLog(format!("Failed to deserialize write message: {}", e)))?;
        Ok((msg, end))
    }
}
