//! Reading sealed process logs back for replay and inspection.

use crate::error::{Error, Result};
use crate::message::WriteMessage;
use crate::root_block::{RootBlock, RootBlockView, StoreType, ROOT_BLOCK_SIZE};
use serde::{Serialize, Serializer};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One logged fragment: its metadata and, for RW stores, the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub message: WriteMessage,
    /// Hex encoded in serialized output
    #[serde(serialize_with = "serialize_payload")]
    pub payload: Option<Vec<u8>>,
}

fn serialize_payload<S: Serializer>(
    payload: &Option<Vec<u8>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match payload {
        Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
        None => serializer.serialize_none(),
    }
}

/// A complete, validated write set read from disk.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessLog {
    pub path: PathBuf,
    pub opening: RootBlock,
    pub closing: RootBlock,
    pub records: Vec<LogRecord>,
}

impl ProcessLog {
    /// Commit point a journal reaches after replaying this log.
    pub fn commit_point(&self) -> u64 {
        self.opening.commit_counter.saturating_add(1)
    }

    pub fn store_type(&self) -> StoreType {
        self.opening.store_type
    }

    /// Total payload bytes declared by the records.
    pub fn payload_bytes(&self) -> u64 {
        self.records.iter().map(|r| r.message.size as u64).sum()
    }
}

/// Read and validate a sealed process log.
///
/// Anything other than `[root block][record [payload]]*[root block]` for a
/// single write set is reported as `Error::CorruptLog`, including logs that
/// were never sealed.
pub fn read_log(path: &Path) -> Result<ProcessLog> {
    let data = fs::read(path)
        .map_err(|e| Error::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    parse_log(path, &data)
}

fn parse_log(path: &Path, data: &[u8]) -> Result<ProcessLog> {
    if data.len() < 2 * ROOT_BLOCK_SIZE {
        return Err(Error::CorruptLog(format!(
            "{} is {} bytes, too short to hold two root blocks",
            path.display(),
            data.len()
        )));
    }

    let opening = RootBlock::from_bytes(&data[..ROOT_BLOCK_SIZE])?;
    let body_end = data.len() - ROOT_BLOCK_SIZE;
    let closing = RootBlock::from_bytes(&data[body_end..])
        .map_err(|e| Error::CorruptLog(format!("{} is not sealed: {}", path.display(), e)))?;

    if !opening.same_write_set(&closing) {
        return Err(Error::CorruptLog(format!(
            "{} opens with commit counter {} but closes with {}",
            path.display(),
            opening.commit_counter,
            closing.commit_counter
        )));
    }

    let mut records = Vec::new();
    let mut offset = ROOT_BLOCK_SIZE;
    while offset < body_end {
        let (message, used) = WriteMessage::decode_record(&data[offset..body_end])?;
        offset += used;

        if message.commit_counter != opening.commit_counter
            || message.last_commit_time != opening.last_commit_time
        {
            return Err(Error::CorruptLog(format!(
                "record {} belongs to commit counter {}, expected {}",
                records.len(),
                message.commit_counter,
                opening.commit_counter
            )));
        }
        if message.sequence != records.len() as u64 {
            return Err(Error::CorruptLog(format!(
                "record sequence {} found where {} was expected",
                message.sequence,
                records.len()
            )));
        }

        let payload = match opening.store_type {
            StoreType::Rw => {
                let end = offset + message.size as usize;
                if end > body_end {
                    return Err(Error::CorruptLog(format!(
                        "payload of record {} is truncated",
                        message.sequence
                    )));
                }
                let bytes = data[offset..end].to_vec();
                offset = end;
                Some(bytes)
            }
            StoreType::Worm => None,
        };

        records.push(LogRecord { message, payload });
    }

    Ok(ProcessLog {
        path: path.to_path_buf(),
        opening,
        closing,
        records,
    })
}

/// Parse the commit point out of a process log file name.
pub fn commit_point_of(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let digits = name.strip_suffix(".log")?;
    if digits.len() != 20 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// List process log files in `dir`, oldest commit point first.
///
/// A missing directory has no logs.
pub fn list_logs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(Error::Io(format!("Failed to list {}: {}", dir.display(), e)));
        }
    };

    let mut logs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::Io(format!("Failed to list {}: {}", dir.display(), e)))?;
        let path = entry.path();
        if path.is_file() && commit_point_of(&path).is_some() {
            logs.push(path);
        }
    }
    logs.sort();
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{log_file_name, LogWriter};
    use tempfile::TempDir;
    use uuid::Uuid;

    fn write_sealed(dir: &Path, store_type: StoreType, fragments: &[&[u8]]) -> PathBuf {
        let rb = RootBlock::new(41, 9000, Uuid::from_u128(3), store_type);
        let mut writer = LogWriter::new(dir);
        writer.create_log(&rb).unwrap();
        for (i, payload) in fragments.iter().enumerate() {
            let msg = WriteMessage::new(41, 9000, i as u64, payload.len() as u32);
            writer.write(&msg, payload).unwrap();
        }
        writer.close_log(&rb).unwrap();
        dir.join(log_file_name(41))
    }

    #[test]
    fn test_read_rw_log() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_sealed(temp_dir.path(), StoreType::Rw, &[&b"abc"[..], &b""[..], &b"defgh"[..]]);

        let log = read_log(&path).unwrap();
        assert_eq!(log.commit_point(), 42);
        assert_eq!(log.store_type(), StoreType::Rw);
        assert_eq!(log.records.len(), 3);
        assert_eq!(log.records[0].payload.as_deref(), Some(&b"abc"[..]));
        assert_eq!(log.records[1].payload.as_deref(), Some(&b""[..]));
        assert_eq!(log.records[2].message.sequence, 2);
        assert_eq!(log.payload_bytes(), 8);
    }

    #[test]
    fn test_read_worm_log_has_no_payloads() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_sealed(temp_dir.path(), StoreType::Worm, &[&b"xyz"[..], &b"q"[..]]);

        let log = read_log(&path).unwrap();
        assert_eq!(log.records.len(), 2);
        assert!(log.records.iter().all(|r| r.payload.is_none()));
        assert_eq!(log.payload_bytes(), 4);
    }

    #[test]
    fn test_json_output_carries_hex_payload() {
        let temp_dir = TempDir::new().unwrap();
        let rw = write_sealed(temp_dir.path(), StoreType::Rw, &[&[0xdeu8, 0xad, 0xbe, 0xef][..]]);
        let log = read_log(&rw).unwrap();

        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["records"][0]["payload"], "deadbeef");
        assert_eq!(json["records"][0]["message"]["size"], 4);

        let worm_dir = TempDir::new().unwrap();
        let worm = write_sealed(worm_dir.path(), StoreType::Worm, &[&b"x"[..]]);
        let json = serde_json::to_value(read_log(&worm).unwrap()).unwrap();
        assert!(json["records"][0]["payload"].is_null());
    }

    #[test]
    fn test_unsealed_log_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_sealed(temp_dir.path(), StoreType::Rw, &[&b"abc"[..]]);
        let data = fs::read(&path).unwrap();
        fs::write(&path, &data[..data.len() - ROOT_BLOCK_SIZE]).unwrap();

        assert!(matches!(read_log(&path), Err(Error::CorruptLog(_))));
    }

    #[test]
    fn test_truncated_payload_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(log_file_name(41));
        let rb = RootBlock::new(41, 9000, Uuid::from_u128(3), StoreType::Rw);

        let mut data = rb.to_bytes();
        data.extend(WriteMessage::new(41, 9000, 0, 64).encode_record().unwrap());
        data.extend_from_slice(&[0u8; 10]);
        data.extend(rb.to_bytes());
        fs::write(&path, data).unwrap();

        assert!(matches!(read_log(&path), Err(Error::CorruptLog(_))));
    }

    #[test]
    fn test_mismatched_root_blocks_are_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(log_file_name(1));
        let opening = RootBlock::new(1, 10, Uuid::from_u128(3), StoreType::Worm);
        let closing = RootBlock::new(2, 10, Uuid::from_u128(3), StoreType::Worm);

        let mut data = opening.to_bytes();
        data.extend(closing.to_bytes());
        fs::write(&path, data).unwrap();

        assert!(matches!(read_log(&path), Err(Error::CorruptLog(_))));
    }

    #[test]
    fn test_commit_point_of() {
        assert_eq!(commit_point_of(Path::new("/x/00000000000000000006.log")), Some(6));
        assert_eq!(commit_point_of(Path::new("6.log")), None);
        assert_eq!(commit_point_of(Path::new("0000000000000000000a.log")), None);
        assert_eq!(commit_point_of(Path::new("00000000000000000006.tmp")), None);
    }

    #[test]
    fn test_list_logs_in_commit_order() {
        let temp_dir = TempDir::new().unwrap();
        for counter in [10u64, 2, 99] {
            fs::write(temp_dir.path().join(log_file_name(counter)), b"").unwrap();
        }
        fs::write(temp_dir.path().join("notes.txt"), b"").unwrap();

        let logs = list_logs(temp_dir.path()).unwrap();
        let points: Vec<_> = logs.iter().filter_map(|p| commit_point_of(p)).collect();
        assert_eq!(points, vec![3, 11, 100]);
    }

    #[test]
    fn test_list_logs_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(list_logs(&temp_dir.path().join("absent")).unwrap().is_empty());
    }
}
