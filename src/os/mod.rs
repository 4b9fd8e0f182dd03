//! OS virtual memory adapters.
//!
//! The region layer treats reserve/commit/decommit/reset/unreset/
//! protect/unprotect as external collaborators (§6 of the design).
//! This module is that collaborator: a thin, platform-dispatching
//! wrapper around raw `mmap`/`mprotect`/`madvise` (unix) or
//! `VirtualAlloc`/`VirtualFree`/`VirtualProtect` (windows), chosen over
//! a managed-mmap crate because the claim protocol needs independent
//! control over reservation, commit, decommit, reset and protection of
//! arbitrary sub-ranges of an already-reserved chunk.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{RegionError, Result};

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
use unix as platform;
#[cfg(windows)]
use windows as platform;

static CACHED_PAGE_SIZE: AtomicUsize = AtomicUsize::new(0);

/// System page size, queried once and cached thereafter.
pub fn page_size() -> usize {
    let cached = CACHED_PAGE_SIZE.load(Ordering::Relaxed);
    if cached != 0 {
        return cached;
    }
    let size = page_size::get();
    CACHED_PAGE_SIZE.store(size, Ordering::Relaxed);
    size
}

/// Preferred large-page (huge-page) granularity. Used only to round
/// commit/reset ranges so a decommit never splits a large OS page
/// underneath a live neighbor; this is not a request for actual huge
/// pages, just an alignment hint.
pub fn large_page_size() -> usize {
    2 * 1024 * 1024
}

/// Reserve a `size`-byte virtual address range aligned to `align`,
/// optionally pre-committing it. Returns the base address, or an
/// error if the OS denied the reservation.
pub fn reserve_aligned(size: usize, align: usize, commit: bool) -> Result<usize> {
    debug_assert!(align.is_power_of_two());
    platform::reserve_aligned(size, align, commit)
}

/// Release a previously reserved range back to the OS.
pub fn free(addr: usize, size: usize) -> Result<()> {
    platform::free(addr, size)
}

/// Make `[addr, addr+size)` readable and writable.
pub fn commit(addr: usize, size: usize) -> Result<()> {
    platform::commit(addr, size)
}

/// Release the physical backing of `[addr, addr+size)`, keeping the
/// reservation. A subsequent access requires re-commit.
pub fn decommit(addr: usize, size: usize) -> Result<()> {
    platform::decommit(addr, size)
}

/// Hint that the contents of `[addr, addr+size)` may be discarded; the
/// range remains committed and accessible, but reading it afterward
/// may observe zeros.
pub fn reset(addr: usize, size: usize) -> Result<()> {
    platform::reset(addr, size)
}

/// Inverse of [`reset`]; on platforms where reset is a pure hint this
/// is a no-op.
pub fn unreset(addr: usize, size: usize) -> Result<()> {
    platform::unreset(addr, size)
}

/// Make `[addr, addr+size)` inaccessible (`PROT_NONE`).
pub fn protect(addr: usize, size: usize) -> Result<()> {
    platform::protect(addr, size)
}

/// Restore `[addr, addr+size)` to read/write access.
pub fn unprotect(addr: usize, size: usize) -> Result<()> {
    platform::unprotect(addr, size)
}

fn invalid_argument(msg: impl Into<String>) -> RegionError {
    RegionError::InvalidArgument(msg.into())
}

fn vm_error(msg: impl Into<String>) -> RegionError {
    RegionError::VirtualMemoryError(msg.into())
}
