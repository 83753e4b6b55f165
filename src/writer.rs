//! Process log writer for replicated write sets.
//!
//! A replica records every write message the leader ships for the current
//! write set so it can later replay the set instead of resynchronising the
//! whole store. Each write set gets one file:
//!
//! ```text
//! [start root block][record [payload]]*[final root block]
//! ```
//!
//! The file is named after the commit point it produces (`commit_counter + 1`,
//! zero filled to 20 digits), so lexical order is commit order. A file that
//! does not end with a root block is partial and must not be replayed.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::message::WriteMessage;
use crate::root_block::{RootBlock, RootBlockView, StoreType};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the process log for the write set opened by a root block
/// with the given commit counter.
pub fn log_file_name(commit_counter: u64) -> String {
    format!("{:020}.log", commit_counter.saturating_add(1))
}

/// What `write` did with a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Appended to the log; the expected sequence advanced by one.
    Accepted,
    /// No write set is open.
    NotOpen,
    /// Commit counter or last commit time differ from the open write set.
    DroppedEpochMismatch,
    /// Sequence is not the next one expected.
    DroppedSequenceMismatch { expected: u64, received: u64 },
}

impl WriteOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, WriteOutcome::Accepted)
    }
}

/// State that exists only while a write set is open.
struct OpenLog<R> {
    root_block: R,
    expected_sequence: u64,
    path: PathBuf,
    sink: BufWriter<File>,
    /// Set once a write to the file fails; the log can then only be removed.
    failed: bool,
}

impl<R> OpenLog<R> {
    /// Release the file handle, optionally forcing it to stable storage.
    fn finish(self, sync: bool) -> Result<PathBuf> {
        let file = self.sink.into_inner().map_err(|e| {
            Error::Io(format!("Failed to flush {}: {}", self.path.display(), e.error()))
        })?;
        if sync {
            file.sync_all()
                .map_err(|e| Error::Io(format!("Failed to fsync {}: {}", self.path.display(), e)))?;
        }
        Ok(self.path)
    }
}

/// Writes the process log for one write set at a time.
///
/// Not internally synchronised: the owning HA pipeline stage drives
/// `create_log`, `write`, and `close_log`/`remove` from a single thread.
pub struct LogWriter<R: RootBlockView + Clone = RootBlock> {
    directory: PathBuf,
    sync_on_seal: bool,
    open: Option<OpenLog<R>>,
}

impl<R: RootBlockView + Clone> LogWriter<R> {
    /// Create a closed writer bound to `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        LogWriter {
            directory: directory.into(),
            sync_on_seal: true,
            open: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        LogWriter {
            directory: config.log_dir.clone(),
            sync_on_seal: config.sync_on_seal,
            open: None,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Path of the log file for the open write set
    pub fn current_file(&self) -> Option<&Path> {
        self.open.as_ref().map(|o| o.path.as_path())
    }

    /// Root block that opened the current write set
    pub fn active_write_set(&self) -> Option<&R> {
        self.open.as_ref().map(|o| &o.root_block)
    }

    /// Next sequence `write` will accept; 0 while closed.
    pub fn expected_sequence(&self) -> u64 {
        self.open.as_ref().map_or(0, |o| o.expected_sequence)
    }

    /// Open the log file for the write set starting at `root_block`.
    ///
    /// An existing file for the same commit point is left over from an
    /// aborted attempt and is deleted first.
    pub fn create_log(&mut self, root_block: &R) -> Result<()> {
        if let Some(open) = &self.open {
            return Err(Error::LogAlreadyOpen(open.path.clone()));
        }

        // u64::MAX + 1 would share a file name with u64::MAX - 1.
        if root_block.commit_counter() == u64::MAX {
            return Err(Error::InvalidArgument(
                "commit counter u64::MAX has no next commit point".to_string(),
            ));
        }

        fs::create_dir_all(&self.directory).map_err(|e| {
            Error::Io(format!("Failed to create log directory {}: {}", self.directory.display(), e))
        })?;

        let path = self.directory.join(log_file_name(root_block.commit_counter()));

        match fs::remove_file(&path) {
            Ok(()) => warn!(file = %path.display(), "deleted stale process log"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::Io(format!("Could not delete {}: {}", path.display(), e)));
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| Error::Io(format!("Failed to create {}: {}", path.display(), e)))?;
        let mut sink = BufWriter::new(file);

        if let Err(e) = write_root_block(&mut sink, root_block).and_then(|_| {
            sink.flush()
                .map_err(|e| Error::Io(format!("Failed to flush {}: {}", path.display(), e)))
        }) {
            drop(sink);
            let _ = fs::remove_file(&path);
            return Err(e);
        }

        info!(
            file = %path.display(),
            commit_counter = root_block.commit_counter(),
            store_type = %root_block.store_type(),
            "opened process log"
        );

        self.open = Some(OpenLog {
            root_block: root_block.clone(),
            expected_sequence: 0,
            path,
            sink,
            failed: false,
        });
        Ok(())
    }

    /// Append one fragment of the open write set.
    ///
    /// Fragments from another epoch or out of sequence are dropped without
    /// touching the file. For RW stores the raw payload follows the record
    /// and must be exactly `msg.size` bytes; WORM stores log the record only.
    pub fn write(&mut self, msg: &WriteMessage, payload: &[u8]) -> Result<WriteOutcome> {
        let Some(open) = self.open.as_mut() else {
            debug!(sequence = msg.sequence, "no open write set, ignoring write message");
            return Ok(WriteOutcome::NotOpen);
        };

        if open.failed {
            return Err(Error::InvalidState(format!(
                "{} failed an earlier write and must be removed",
                open.path.display()
            )));
        }

        if msg.commit_counter != open.root_block.commit_counter()
            || msg.last_commit_time != open.root_block.last_commit_time()
        {
            warn!(
                expected_commit_counter = open.root_block.commit_counter(),
                commit_counter = msg.commit_counter,
                last_commit_time = msg.last_commit_time,
                "dropping write message from another epoch"
            );
            return Ok(WriteOutcome::DroppedEpochMismatch);
        }

        if msg.sequence != open.expected_sequence {
            warn!(
                expected = open.expected_sequence,
                received = msg.sequence,
                "dropping out of sequence write message"
            );
            return Ok(WriteOutcome::DroppedSequenceMismatch {
                expected: open.expected_sequence,
                received: msg.sequence,
            });
        }

        let store_type = open.root_block.store_type();
        if store_type == StoreType::Rw && payload.len() != msg.size as usize {
            return Err(Error::InvalidArgument(format!(
                "payload is {} bytes but write message {} declares {}",
                payload.len(),
                msg.sequence,
                msg.size
            )));
        }

        let record = msg.encode_record()?;
        if let Err(e) = open.sink.write_all(&record) {
            open.failed = true;
            return Err(Error::Io(format!("Failed to write record to {}: {}", open.path.display(), e)));
        }

        if store_type == StoreType::Rw {
            if let Err(e) = open.sink.write_all(payload) {
                open.failed = true;
                return Err(Error::Io(format!("Failed to write payload to {}: {}", open.path.display(), e)));
            }
        }

        open.expected_sequence += 1;
        debug!(sequence = msg.sequence, size = msg.size, "logged write message");
        Ok(WriteOutcome::Accepted)
    }

    /// Seal the open log with the final root block of the write set.
    ///
    /// A log with a failed write is never sealed. If writing or flushing the
    /// final root block fails the writer stays open so the caller can
    /// `remove` the partial file. Once the handle is being released the
    /// writer is closed whatever the outcome.
    pub fn close_log(&mut self, root_block: &R) -> Result<()> {
        let open = self
            .open
            .as_mut()
            .ok_or_else(|| Error::InvalidState("no write set is open".to_string()))?;

        if !open.root_block.same_write_set(root_block) {
            return Err(Error::InvalidState(format!(
                "final root block ({}) does not match open write set ({})",
                describe(root_block),
                describe(&open.root_block)
            )));
        }

        if open.failed {
            return Err(Error::InvalidState(format!(
                "{} failed an earlier write and cannot be sealed",
                open.path.display()
            )));
        }

        if let Err(e) = write_root_block(&mut open.sink, root_block) {
            open.failed = true;
            return Err(e);
        }
        if let Err(e) = open.sink.flush() {
            open.failed = true;
            return Err(Error::Io(format!("Failed to flush {}: {}", open.path.display(), e)));
        }

        let records = open.expected_sequence;
        if let Some(sealed) = self.reset() {
            let path = sealed.finish(self.sync_on_seal)?;
            info!(file = %path.display(), records, "sealed process log");
        }
        Ok(())
    }

    /// Abort the open write set and delete its log file.
    ///
    /// No-op when nothing is open. The writer is closed even if the delete fails.
    pub fn remove(&mut self) -> Result<()> {
        let Some(open) = self.reset() else {
            return Ok(());
        };

        // Buffered bytes belong to a file that is about to be deleted.
        let (file, _) = open.sink.into_parts();
        drop(file);

        fs::remove_file(&open.path).map_err(|e| {
            warn!(file = %open.path.display(), error = %e, "failed to delete aborted process log");
            Error::Io(format!("Could not delete {}: {}", open.path.display(), e))
        })?;

        info!(file = %open.path.display(), "removed process log");
        Ok(())
    }

    fn reset(&mut self) -> Option<OpenLog<R>> {
        self.open.take()
    }
}

fn write_root_block<R: RootBlockView, W: Write>(sink: &mut W, root_block: &R) -> Result<()> {
    sink.write_all(&root_block.to_bytes())
        .map_err(|e| Error::Io(format!("Failed to write root block: {}", e)))?;
    debug!(root_block = %describe(root_block), "wrote root block");
    Ok(())
}

fn describe<R: RootBlockView + ?Sized>(rb: &R) -> String {
    format!(
        "commitCounter={}, lastCommitTime={}, uuid={}",
        rb.commit_counter(),
        rb.last_commit_time(),
        rb.uuid()
    )
}
