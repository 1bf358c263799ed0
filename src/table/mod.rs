//! Shared-memory accumulator table
//!
//! This module provides the accumulator table that workers and the coordinator
//! share across process boundaries. The table lives in a POSIX shared-memory
//! object (shm_open + mmap) and holds one (sum, count) slot per item
//! identifier, plus a small header used to validate attachments.
//!
//! # Layout
//!
//! ```text
//! [TableHeader: 24 bytes][AccumulatorSlot; capacity]
//! ```
//!
//! All slot fields are atomics. Two partitions may reference the same item
//! identifier, so increments are per-field fetch-and-add; a plain
//! read-modify-write would silently lose updates under concurrent workers.
//!
//! # Lifecycle
//!
//! - `create()` - coordinator side; allocates and zero-initializes the object
//! - `attach()` - worker side; maps an existing object after header checks
//! - `release()` - unmaps and (creator only) unlinks; idempotent, also runs
//!   on drop so every exit path past allocation tears the object down

use anyhow::Context;
use std::ffi::CString;
use std::ptr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use thiserror::Error;

/// Magic value identifying a rateagg table header
const TABLE_MAGIC: u64 = 0x5241_5445_4147_4731; // "RATEAGG1"

/// Header layout version
const TABLE_VERSION: u64 = 1;

/// Upper bound on table capacity (2^24 slots = 256 MiB of accumulators)
pub const MAX_CAPACITY: u64 = 1 << 24;

/// Errors produced by shared table operations
#[derive(Error, Debug)]
pub enum TableError {
    #[error("failed to allocate shared table '{name}': {source}")]
    Allocation {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to attach shared table '{name}': {source}")]
    Attach {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("shared table '{name}' has incompatible header (magic {magic:#x}, version {version})")]
    HeaderMismatch {
        name: String,
        magic: u64,
        version: u64,
    },

    #[error("capacity {capacity} out of range (1..={max})")]
    BadCapacity { capacity: u64, max: u64 },

    #[error("slot index {index} out of bounds for capacity {capacity}")]
    OutOfBounds { index: u64, capacity: u64 },
}

/// Table header, written once at creation and validated on attach
#[repr(C)]
struct TableHeader {
    magic: u64,
    version: u64,
    capacity: u64,
}

/// One per-item accumulator
///
/// `sum` is the arithmetic total of all valid ratings contributed to this
/// slot across all workers; `count` is how many ratings contributed.
#[repr(C)]
pub struct AccumulatorSlot {
    sum: AtomicI64,
    count: AtomicU64,
}

/// Plain snapshot of one slot, taken post-barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotValue {
    pub sum: i64,
    pub count: u64,
}

/// Role of this handle in the table's lifetime
///
/// The creator is the longest holder and the only role that unlinks the
/// underlying object; attached handles only unmap their own view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableRole {
    Creator,
    Attached,
}

/// Shared accumulator table handle
///
/// One handle per process. The coordinator creates the table before spawning
/// any worker; each worker attaches by name. Slots are only ever mutated via
/// `increment()`, and only read via `read_all()` after the join barrier, so
/// no broader locking is needed: slots are independently atomic and there is
/// no cross-slot invariant.
pub struct SharedTable {
    /// Shared-memory object name (leading '/', no other slashes)
    name: String,

    /// Mapped base address
    addr: *mut u8,

    /// Total mapped size in bytes
    map_size: usize,

    /// Number of slots
    capacity: u64,

    /// Creator or attached
    role: TableRole,

    /// Set once release() has run
    released: bool,
}

// Safety: the mapping is shared between processes by design; within a
// process the handle only exposes atomic slot access, and release() takes
// &mut self. The raw pointer is valid until release().
unsafe impl Send for SharedTable {}
unsafe impl Sync for SharedTable {}

impl SharedTable {
    /// Create a new shared table visible to subsequently spawned workers
    ///
    /// Allocates a POSIX shared-memory object under `name`, sizes it for
    /// `capacity` slots, and maps it. Every slot starts at zero (fresh
    /// object pages are zero-filled by the kernel).
    ///
    /// Creation is exclusive: if an object with the same name already
    /// exists (e.g. leaked by a crashed run), this fails instead of
    /// silently reusing it.
    ///
    /// # Errors
    ///
    /// Returns `TableError::BadCapacity` for a capacity outside
    /// `1..=MAX_CAPACITY`, and `TableError::Allocation` if the object
    /// cannot be created, sized, or mapped. Allocation failure is fatal and
    /// happens before any worker is spawned.
    pub fn create(name: &str, capacity: u64) -> Result<Self, TableError> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(TableError::BadCapacity {
                capacity,
                max: MAX_CAPACITY,
            });
        }

        let c_name = shm_name(name)?;
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600 as libc::mode_t,
            )
        };
        if fd < 0 {
            return Err(TableError::Allocation {
                name: name.to_string(),
                source: std::io::Error::last_os_error(),
            });
        }

        let map_size = mapped_size(capacity);
        if unsafe { libc::ftruncate(fd, map_size as libc::off_t) } < 0 {
            let err = std::io::Error::last_os_error();
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(TableError::Allocation {
                name: name.to_string(),
                source: err,
            });
        }

        let addr = match map_fd(fd, map_size) {
            Ok(addr) => addr,
            Err(err) => {
                unsafe {
                    libc::close(fd);
                    libc::shm_unlink(c_name.as_ptr());
                }
                return Err(TableError::Allocation {
                    name: name.to_string(),
                    source: err,
                });
            }
        };

        // The fd is only needed to establish the mapping
        unsafe { libc::close(fd) };

        let header = addr as *mut TableHeader;
        unsafe {
            (*header).capacity = capacity;
            (*header).version = TABLE_VERSION;
            // Magic written last: an attacher that sees it sees a complete header
            (*header).magic = TABLE_MAGIC;
        }

        Ok(Self {
            name: name.to_string(),
            addr,
            map_size,
            capacity,
            role: TableRole::Creator,
            released: false,
        })
    }

    /// Attach to an existing shared table by name
    ///
    /// Worker side. Opens the object the coordinator created, validates the
    /// header (magic, version, size consistency), and maps it.
    ///
    /// # Errors
    ///
    /// Returns `TableError::Attach` if the object cannot be opened or
    /// mapped, and `TableError::HeaderMismatch` if it does not look like a
    /// table this build understands.
    pub fn attach(name: &str) -> Result<Self, TableError> {
        let c_name = shm_name(name)?;
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };
        if fd < 0 {
            return Err(TableError::Attach {
                name: name.to_string(),
                source: std::io::Error::last_os_error(),
            });
        }

        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut stat) } < 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(TableError::Attach {
                name: name.to_string(),
                source: err,
            });
        }
        let map_size = stat.st_size as usize;
        if map_size < std::mem::size_of::<TableHeader>() {
            unsafe { libc::close(fd) };
            return Err(TableError::HeaderMismatch {
                name: name.to_string(),
                magic: 0,
                version: 0,
            });
        }

        let addr = match map_fd(fd, map_size) {
            Ok(addr) => addr,
            Err(err) => {
                unsafe { libc::close(fd) };
                return Err(TableError::Attach {
                    name: name.to_string(),
                    source: err,
                });
            }
        };
        unsafe { libc::close(fd) };

        let header = addr as *const TableHeader;
        let (magic, version, capacity) =
            unsafe { ((*header).magic, (*header).version, (*header).capacity) };
        if magic != TABLE_MAGIC || version != TABLE_VERSION || mapped_size(capacity) != map_size {
            unsafe { libc::munmap(addr as *mut libc::c_void, map_size) };
            return Err(TableError::HeaderMismatch {
                name: name.to_string(),
                magic,
                version,
            });
        }

        Ok(Self {
            name: name.to_string(),
            addr,
            map_size,
            capacity,
            role: TableRole::Attached,
            released: false,
        })
    }

    /// Number of slots in the table
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Shared-memory object name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add one rating to the slot at `index`
    ///
    /// Safe under concurrent invocation from multiple processes targeting
    /// the same index: both fields are updated with atomic fetch-and-add.
    /// Relaxed ordering suffices - there are no cross-slot invariants, and
    /// the coordinator's post-barrier read is ordered by process join.
    ///
    /// # Errors
    ///
    /// Returns `TableError::OutOfBounds` if `index >= capacity`.
    pub fn increment(&self, index: u64, rating: i64) -> Result<(), TableError> {
        let slot = self.slot(index)?;
        slot.sum.fetch_add(rating, Ordering::Relaxed);
        slot.count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Snapshot every slot, index ascending
    ///
    /// Only meaningful after all workers have terminated (post-barrier); the
    /// coordinator enforces that ordering. While workers are still running
    /// the values read here are a torn, in-progress view.
    pub fn read_all(&self) -> Vec<SlotValue> {
        (0..self.capacity)
            .map(|i| {
                // Index is in range by construction
                let slot = self.slot(i).expect("slot index within capacity");
                SlotValue {
                    sum: slot.sum.load(Ordering::Relaxed),
                    count: slot.count.load(Ordering::Relaxed),
                }
            })
            .collect()
    }

    /// Unmap the table and, for the creator, unlink the underlying object
    ///
    /// Idempotent: calling release on an already-released handle is a no-op.
    /// Also invoked from `Drop`, so the object is torn down on every exit
    /// path that passed allocation.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if unsafe { libc::munmap(self.addr as *mut libc::c_void, self.map_size) } < 0 {
            let err = std::io::Error::last_os_error();
            eprintln!("Warning: munmap failed for table '{}': {}", self.name, err);
            // Continue teardown even if munmap fails
        }

        if self.role == TableRole::Creator {
            if let Ok(c_name) = shm_name(&self.name) {
                if unsafe { libc::shm_unlink(c_name.as_ptr()) } < 0 {
                    let err = std::io::Error::last_os_error();
                    eprintln!(
                        "Warning: shm_unlink failed for table '{}': {}",
                        self.name, err
                    );
                }
            }
        }
    }

    fn slot(&self, index: u64) -> Result<&AccumulatorSlot, TableError> {
        if index >= self.capacity {
            return Err(TableError::OutOfBounds {
                index,
                capacity: self.capacity,
            });
        }
        let base = unsafe { self.addr.add(std::mem::size_of::<TableHeader>()) };
        let slots = base as *const AccumulatorSlot;
        // Safety: index < capacity and the mapping covers header + capacity
        // slots for the lifetime of the handle (until release()).
        Ok(unsafe { &*slots.add(index as usize) })
    }
}

impl Drop for SharedTable {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for SharedTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTable")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("role", &self.role)
            .field("released", &self.released)
            .finish()
    }
}

/// Total object size for a table of `capacity` slots
fn mapped_size(capacity: u64) -> usize {
    std::mem::size_of::<TableHeader>()
        + capacity as usize * std::mem::size_of::<AccumulatorSlot>()
}

/// Validate and C-ify a shared-memory object name
fn shm_name(name: &str) -> Result<CString, TableError> {
    let bad = |msg: &str| TableError::Allocation {
        name: name.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, msg.to_string()),
    };
    if !name.starts_with('/') || name.len() < 2 || name[1..].contains('/') {
        return Err(bad("object name must be '/name' with no interior slashes"));
    }
    CString::new(name).map_err(|_| bad("object name contains NUL"))
}

/// Map `size` bytes of `fd` shared and read-write
fn map_fd(fd: libc::c_int, size: usize) -> std::io::Result<*mut u8> {
    let addr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    if addr == libc::MAP_FAILED {
        return Err(std::io::Error::last_os_error());
    }
    Ok(addr as *mut u8)
}

/// Derive a per-run object name from the coordinator pid
///
/// Keeps concurrent rateagg runs on one machine from colliding while still
/// giving a stable identifier tests can probe.
pub fn default_table_name() -> String {
    format!("/rateagg-{}", std::process::id())
}

/// Attach with anyhow context, for call sites outside the table module
pub fn attach_table(name: &str) -> crate::Result<SharedTable> {
    SharedTable::attach(name).with_context(|| format!("cannot attach shared table '{}'", name))
}
