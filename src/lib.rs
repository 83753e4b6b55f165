pub mod root_block;
pub mod message;
pub mod writer;
pub mod reader;
pub mod error;
pub mod logger;
pub mod config;

pub use root_block::{RootBlock, RootBlockView, StoreType, ROOT_BLOCK_SIZE};
pub use message::WriteMessage;
pub use writer::{log_file_name, LogWriter, WriteOutcome};

use sha2::{Sha256, Digest};

/// Calculate SHA256 digest
pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}
