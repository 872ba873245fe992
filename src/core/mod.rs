use std::alloc::{self, Layout};
use std::cmp;
use std::mem;
use std::path::{Path, PathBuf};
use std::ptr;
use std::str;

use serde_derive::{Deserialize, Serialize};
use shared_memory::{Shmem, ShmemConf, ShmemError};
use tracing::{debug, info};

use crate::codec;
use crate::errors::StoreError;

pub const MAX_ACCOUNTS: usize = 100;
pub const MAX_MESSAGES: usize = 1000;
pub const NAME_LEN: usize = 50;
pub const EMAIL_LEN: usize = 100;
pub const PASSWORD_LEN: usize = 50;
pub const SUBJECT_LEN: usize = 200;
pub const BODY_LEN: usize = 2000;

pub static SEGMENT_LINK_NAME: &'static str = "shmail-segment";
pub static ACCOUNTS_FILE_NAME: &'static str = "accounts.txt";
pub static MESSAGES_FILE_NAME: &'static str = "messages.txt";

/// One account slot. Flags are `i32` 0/1 so that an all-zero slot is a
/// valid never-used one and the on-disk format stays digit-for-digit
/// stable. String fields are NUL-terminated within their fixed width.
#[repr(C)]
pub struct Account {
    pub id: i32,
    pub name: [u8; NAME_LEN],
    pub email: [u8; EMAIL_LEN],
    pub password: [u8; PASSWORD_LEN],
    pub age: i32,
    pub is_active: i32,
    pub created_at: i64,
}

#[repr(C)]
pub struct Message {
    pub id: i32,
    pub sender_id: i32,
    pub receiver_id: i32,
    pub subject: [u8; SUBJECT_LEN],
    pub body: [u8; BODY_LEN],
    pub sent_at: i64,
    pub is_read: i32,
    pub is_deleted: i32,
}

/// Control header shared by every attached process.
///
/// `next_account_id`/`next_message_id` only ever grow and ids are never
/// reused. `account_count` moves with creates and soft deletes while
/// `message_count` is a highest-used-slot watermark; neither is a reliable
/// active-record total and callers must not treat them as one.
#[repr(C)]
pub struct Control {
    pub account_count: i32,
    pub message_count: i32,
    pub next_account_id: i32,
    pub next_message_id: i32,
}

impl Control {
    /// How far account save/validate scans run. Clamped so a corrupt
    /// header cannot push a scan past the array.
    pub fn account_span(&self) -> usize {
        cmp::min(cmp::max(self.account_count, 0) as usize, MAX_ACCOUNTS)
    }

    /// How far every message scan runs (the watermark).
    pub fn message_span(&self) -> usize {
        cmp::min(cmp::max(self.message_count, 0) as usize, MAX_MESSAGES)
    }
}

#[repr(C)]
pub struct StoreData {
    pub control: Control,
    pub accounts: [Account; MAX_ACCOUNTS],
    pub messages: [Message; MAX_MESSAGES],
}

impl Account {
    pub fn name(&self) -> &str {
        read_fixed(&self.name)
    }

    pub fn email(&self) -> &str {
        read_fixed(&self.email)
    }

    pub fn password(&self) -> &str {
        read_fixed(&self.password)
    }

    pub fn active(&self) -> bool {
        self.is_active != 0
    }
}

impl Message {
    pub fn subject(&self) -> &str {
        read_fixed(&self.subject)
    }

    pub fn body(&self) -> &str {
        read_fixed(&self.body)
    }

    pub fn read(&self) -> bool {
        self.is_read != 0
    }

    pub fn deleted(&self) -> bool {
        self.is_deleted != 0
    }
}

impl StoreData {
    /// Heap-allocated all-zero store, the same state a freshly created
    /// segment starts in. Too large to ever construct on the stack.
    pub fn boxed_zeroed() -> Box<StoreData> {
        let layout = Layout::new::<StoreData>();
        unsafe {
            let raw = alloc::alloc_zeroed(layout) as *mut StoreData;
            if raw.is_null() {
                alloc::handle_alloc_error(layout);
            }
            Box::from_raw(raw)
        }
    }

    /// Zeroes both arrays and the header, then seeds the id counters.
    pub fn reset(&mut self) {
        unsafe {
            ptr::write_bytes(self as *mut StoreData as *mut u8, 0, mem::size_of::<StoreData>());
        }
        self.control.next_account_id = 1;
        self.control.next_message_id = 1;
    }
}

/// Copies `src` into a fixed-width NUL-terminated field, truncating to
/// width minus one and backing off to a character boundary. The tail is
/// zero-filled so a shorter overwrite leaves no residue.
pub(crate) fn write_fixed(dst: &mut [u8], src: &str) {
    let limit = dst.len() - 1;
    let mut end = cmp::min(src.len(), limit);
    while !src.is_char_boundary(end) {
        end -= 1;
    }
    dst[..end].copy_from_slice(&src.as_bytes()[..end]);
    for b in dst[end..].iter_mut() {
        *b = 0;
    }
}

pub(crate) fn read_fixed(src: &[u8]) -> &str {
    let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    str::from_utf8(&src[..end]).unwrap_or("")
}

#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    pub data_dir: String,
}

impl StoreConfig {
    pub fn new<S: Into<String>>(data_dir: S) -> StoreConfig {
        StoreConfig { data_dir: data_dir.into() }
    }

    pub fn segment_link(&self) -> PathBuf {
        Path::new(&self.data_dir).join(SEGMENT_LINK_NAME)
    }

    pub fn accounts_file(&self) -> PathBuf {
        Path::new(&self.data_dir).join(ACCOUNTS_FILE_NAME)
    }

    pub fn messages_file(&self) -> PathBuf {
        Path::new(&self.data_dir).join(MESSAGES_FILE_NAME)
    }
}

/// A mapping of the shared region. Dropping it detaches; it never tears
/// the region down, so other attached processes keep working. Explicit
/// teardown goes through [`Segment::destroy`].
pub struct Segment {
    shmem: Shmem,
}

impl Segment {
    /// Creates the region, sized exactly to `StoreData`. Fails when one
    /// already exists under the same link.
    pub fn create(cfg: &StoreConfig) -> Result<Segment, StoreError> {
        let link = cfg.segment_link();
        let mut shmem = ShmemConf::new()
            .size(mem::size_of::<StoreData>())
            .flink(&link)
            .create()
            .map_err(StoreError::SegmentUnavailable)?;
        // The creating process must not take the region with it on exit.
        shmem.set_owner(false);
        info!(link = %link.display(), bytes = shmem.len(), "segment created");
        Segment::from_mapping(shmem)
    }

    /// Obtains the region, creating it when absent and falling back to
    /// opening when another process got there first.
    pub fn attach(cfg: &StoreConfig) -> Result<Segment, StoreError> {
        match Segment::create(cfg) {
            Err(StoreError::SegmentUnavailable(ShmemError::LinkExists)) => Segment::open(cfg),
            other => other,
        }
    }

    /// Opens an existing region only; fails when none is present.
    pub fn open(cfg: &StoreConfig) -> Result<Segment, StoreError> {
        let link = cfg.segment_link();
        let shmem = ShmemConf::new()
            .flink(&link)
            .open()
            .map_err(StoreError::SegmentUnavailable)?;
        debug!(link = %link.display(), "segment opened");
        Segment::from_mapping(shmem)
    }

    fn from_mapping(shmem: Shmem) -> Result<Segment, StoreError> {
        if shmem.len() < mem::size_of::<StoreData>() {
            return Err(StoreError::UndersizedSegment {
                expected: mem::size_of::<StoreData>(),
                actual: shmem.len(),
            });
        }
        Ok(Segment { shmem })
    }

    /// One-time cold initialization, then a codec load from disk. Returns
    /// whether the cold path ran; on a warm region this is a no-op and the
    /// caller observes whatever other processes produced.
    pub fn init(&mut self, cfg: &StoreConfig) -> Result<bool, StoreError> {
        let data = unsafe { &mut *(self.shmem.as_ptr() as *mut StoreData) };
        init_store(data, cfg)
    }

    pub fn data(&self) -> &StoreData {
        unsafe { &*(self.shmem.as_ptr() as *const StoreData) }
    }

    pub fn data_mut(&mut self) -> &mut StoreData {
        unsafe { &mut *(self.shmem.as_ptr() as *mut StoreData) }
    }

    pub fn info(&self) -> SegmentInfo {
        let control = &self.data().control;
        let used = mem::size_of::<Control>()
            + control.account_span() * mem::size_of::<Account>()
            + control.message_span() * mem::size_of::<Message>();
        SegmentInfo {
            total_bytes: mem::size_of::<StoreData>(),
            used_bytes: used,
            account_count: control.account_count,
            message_count: control.message_count,
            next_account_id: control.next_account_id,
            next_message_id: control.next_message_id,
        }
    }

    /// Detach only. The region stays for every other attached process.
    pub fn detach(self) {}

    /// Removes the region and its link. Never called on normal process
    /// exit; reserved for explicit system teardown.
    pub fn destroy(cfg: &StoreConfig) -> Result<(), StoreError> {
        let link = cfg.segment_link();
        let mut shmem = ShmemConf::new()
            .flink(&link)
            .open()
            .map_err(StoreError::SegmentUnavailable)?;
        shmem.set_owner(true);
        drop(shmem);
        info!(link = %link.display(), "segment destroyed");
        Ok(())
    }
}

/// Counter and usage snapshot of the mapped region.
#[derive(Clone, Copy, Debug)]
pub struct SegmentInfo {
    pub total_bytes: usize,
    pub used_bytes: usize,
    pub account_count: i32,
    pub message_count: i32,
    pub next_account_id: i32,
    pub next_message_id: i32,
}

/// Cold-region detection and first-time population. A region is cold
/// exactly when `next_account_id` still holds its zero sentinel.
pub fn init_store(data: &mut StoreData, cfg: &StoreConfig) -> Result<bool, StoreError> {
    if data.control.next_account_id != 0 {
        return Ok(false);
    }
    data.reset();
    info!("store initialized");
    codec::load_accounts(data, cfg)?;
    codec::load_messages(data, cfg)?;
    Ok(true)
}
