//! File-backed durable store.
//!
//! Layout inside the store directory:
//!
//! ```text
//! queue.lock            PID of the owning process
//! head.json             {"generation": g, "head": n}  (temp file + rename)
//! data-<g>.log          [u32 LE length][bytes] records, append only
//! ```
//!
//! Records before `head` are consumed. Removing records only rewrites
//! `head.json`, so an unflushed dequeue never touches disk. Once the consumed
//! prefix passes `compact_threshold` the live tail is copied into
//! `data-<g+1>.log` and `head.json` is switched to it in one rename.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::StoreError;
use super::lock::LockFile;
use super::store::DurableStore;

const LOCK_FILE: &str = "queue.lock";
const HEAD_FILE: &str = "head.json";
const HEADER_LEN: u64 = 4;

/// Options for [`FileStore::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// How long `open` waits for a previous holder to release the store.
    pub lock_timeout: Duration,
    /// Consumed bytes that trigger copying the live tail into a new file.
    pub compact_threshold: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(60),
            compact_threshold: 1024 * 1024,
        }
    }
}

impl StoreOptions {
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_compact_threshold(mut self, bytes: u64) -> Self {
        self.compact_threshold = bytes;
        self
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct HeadState {
    generation: u64,
    head: u64,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: u64,
    len: u32,
}

/// Append-only record log on local disk with exclusive ownership.
pub struct FileStore {
    dir: PathBuf,
    options: StoreOptions,
    state: HeadState,
    data: Option<File>,
    data_len: u64,
    slots: VecDeque<Slot>,
    lock: Option<LockFile>,
}

impl FileStore {
    /// Open (or create) the store in `dir`, waiting up to
    /// `options.lock_timeout` for exclusive access.
    pub fn open(dir: impl AsRef<Path>, options: StoreOptions) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let lock = LockFile::acquire(&dir.join(LOCK_FILE), options.lock_timeout)?;

        let mut state = read_head(&dir)?;
        let mut data = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(data_path(&dir, state.generation))?;

        let file_len = data.metadata()?.len();
        if state.head > file_len {
            warn!(head = state.head, file_len, "head past end of data, treating log as drained");
            state.head = file_len;
        }

        let (slots, valid_len) = scan(&mut data, state.head, file_len)?;
        if valid_len < file_len {
            warn!(
                dropped_bytes = file_len - valid_len,
                "truncating torn record at end of store"
            );
            data.set_len(valid_len)?;
            data.sync_all()?;
        }
        remove_other_generations(&dir, state.generation);

        debug!(dir = %dir.display(), records = slots.len(), "opened file store");

        Ok(Self {
            dir,
            options,
            state,
            data: Some(data),
            data_len: valid_len,
            slots,
            lock: Some(lock),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_closed(&self) -> bool {
        self.data.is_none()
    }

    fn file(&mut self) -> Result<&mut File, StoreError> {
        self.data.as_mut().ok_or(StoreError::Closed)
    }

    fn write_records(&mut self, records: &[Vec<u8>]) -> Result<Vec<Slot>, StoreError> {
        let mut buf = Vec::with_capacity(records.iter().map(|r| r.len() + 4).sum());
        let mut slots = Vec::with_capacity(records.len());
        let mut offset = self.data_len;
        for record in records {
            let len = u32::try_from(record.len()).map_err(|_| StoreError::RecordTooLarge(record.len()))?;
            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(record);
            slots.push(Slot { offset, len });
            offset += HEADER_LEN + u64::from(len);
        }

        let start = self.data_len;
        let file = self.file()?;
        let written = file
            .seek(SeekFrom::Start(start))
            .and_then(|_| file.write_all(&buf))
            .and_then(|_| file.sync_data());
        if let Err(err) = written {
            // Drop whatever part of the batch reached the file.
            let _ = file.set_len(start);
            return Err(err.into());
        }
        Ok(slots)
    }

    fn compact(&mut self) -> Result<(), StoreError> {
        let next = HeadState {
            generation: self.state.generation + 1,
            head: 0,
        };
        let next_path = data_path(&self.dir, next.generation);
        let old_path = data_path(&self.dir, self.state.generation);
        let live_from = self.state.head;

        let copied = (|| -> Result<File, StoreError> {
            let source = self.file()?;
            source.seek(SeekFrom::Start(live_from))?;
            let mut target = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&next_path)?;
            io::copy(source, &mut target)?;
            target.sync_all()?;
            write_head(&self.dir, next)?;
            Ok(target)
        })();

        match copied {
            Ok(target) => {
                self.data = Some(target);
                self.data_len -= live_from;
                for slot in self.slots.iter_mut() {
                    slot.offset -= live_from;
                }
                self.state = next;
                let _ = fs::remove_file(&old_path);
                info!(generation = next.generation, reclaimed_bytes = live_from, "compacted store");
                Ok(())
            }
            Err(err) => {
                let _ = fs::remove_file(&next_path);
                Err(err)
            }
        }
    }
}

impl DurableStore for FileStore {
    fn append(&mut self, records: &[Vec<u8>]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let slots = self.write_records(records)?;
        if let Some(last) = slots.last() {
            self.data_len = last.offset + HEADER_LEN + u64::from(last.len);
        }
        self.slots.extend(slots);
        Ok(())
    }

    fn read_at(&mut self, index: usize) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(slot) = self.slots.get(index).copied() else {
            self.file()?;
            return Ok(None);
        };
        let file = self.file()?;
        file.seek(SeekFrom::Start(slot.offset + HEADER_LEN))?;
        let mut record = vec![0u8; slot.len as usize];
        file.read_exact(&mut record)?;
        Ok(Some(record))
    }

    fn remove_front(&mut self, count: usize) -> Result<(), StoreError> {
        self.file()?;
        let count = count.min(self.slots.len());
        if count == 0 {
            return Ok(());
        }
        let head = self.slots.get(count).map_or(self.data_len, |slot| slot.offset);
        let next = HeadState {
            generation: self.state.generation,
            head,
        };
        write_head(&self.dir, next)?;
        self.state = next;
        self.slots.drain(..count);

        if self.state.head >= self.options.compact_threshold {
            if let Err(err) = self.compact() {
                warn!(error = %err, "store compaction failed, will retry on next removal");
            }
        }
        Ok(())
    }

    fn estimated_len(&self) -> usize {
        self.slots.len()
    }

    fn close(&mut self) -> Result<(), StoreError> {
        let Some(data) = self.data.take() else {
            return Ok(());
        };
        self.slots.clear();
        let synced = data.sync_all();
        drop(data);
        if let Some(mut lock) = self.lock.take() {
            lock.release()?;
        }
        debug!(dir = %self.dir.display(), "closed file store");
        synced.map_err(StoreError::from)
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close file store cleanly");
        }
    }
}

fn data_path(dir: &Path, generation: u64) -> PathBuf {
    dir.join(format!("data-{}.log", generation))
}

fn read_head(dir: &Path) -> Result<HeadState, StoreError> {
    match fs::read(dir.join(HEAD_FILE)) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(HeadState::default()),
        Err(err) => Err(err.into()),
    }
}

fn write_head(dir: &Path, state: HeadState) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(&state)?;
    let tmp = dir.join(format!("{}.tmp", HEAD_FILE));
    let written = (|| -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, dir.join(HEAD_FILE))?;
        if let Ok(parent) = File::open(dir) {
            let _ = parent.sync_all();
        }
        Ok(())
    })();

    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

/// Index records from `head`. Returns the slots and the length of the valid
/// prefix of the file; anything past it is a torn write.
fn scan(data: &mut File, head: u64, file_len: u64) -> Result<(VecDeque<Slot>, u64), StoreError> {
    let mut slots = VecDeque::new();
    let mut offset = head;
    data.seek(SeekFrom::Start(head))?;
    let mut reader = io::BufReader::new(data);
    let mut header = [0u8; HEADER_LEN as usize];

    while offset + HEADER_LEN <= file_len {
        reader.read_exact(&mut header)?;
        let len = u32::from_le_bytes(header);
        let end = offset + HEADER_LEN + u64::from(len);
        if end > file_len {
            break;
        }
        reader.seek_relative(i64::from(len))?;
        slots.push_back(Slot { offset, len });
        offset = end;
    }
    Ok((slots, offset))
}

fn remove_other_generations(dir: &Path, keep: u64) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let keep_name = format!("data-{}.log", keep);
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("data-") && name.ends_with(".log") && name != keep_name {
            debug!(file = %name, "removing leftover store generation");
            let _ = fs::remove_file(entry.path());
        }
    }
}
