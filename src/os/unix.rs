//! Unix virtual memory primitives built directly on `libc::mmap` /
//! `mprotect` / `madvise`, rather than a managed-mmap crate, so the
//! region layer can reserve with `PROT_NONE` and commit/decommit/
//! reset/protect arbitrary sub-ranges independently.

use std::io;

use super::{invalid_argument, vm_error};
use crate::error::Result;

fn last_os_error(context: &str) -> crate::error::RegionError {
    vm_error(format!("{context}: {}", io::Error::last_os_error()))
}

pub fn reserve_aligned(size: usize, align: usize, commit: bool) -> Result<usize> {
    crate::ensure!(size != 0, invalid_argument("reserve size must be > 0"));
    crate::ensure!(
        align.is_power_of_two(),
        invalid_argument("reserve alignment must be a power of two")
    );

    let prot = if commit {
        libc::PROT_READ | libc::PROT_WRITE
    } else {
        libc::PROT_NONE
    };
    let page = super::page_size();

    if align <= page {
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                prot,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(last_os_error("mmap"));
        }
        return Ok(ptr as usize);
    }

    // Alignment beyond the page size: over-map by `align` extra bytes,
    // then trim the unaligned prefix and trailing slack back to the OS.
    let over_size = size + align;
    let raw = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            over_size,
            prot,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if raw == libc::MAP_FAILED {
        return Err(last_os_error("mmap"));
    }
    let raw_addr = raw as usize;
    let aligned_addr = (raw_addr + align - 1) & !(align - 1);

    let prefix = aligned_addr - raw_addr;
    if prefix > 0 {
        let rc = unsafe { libc::munmap(raw, prefix) };
        if rc != 0 {
            return Err(last_os_error("munmap prefix"));
        }
    }
    let suffix_start = aligned_addr + size;
    let suffix_len = (raw_addr + over_size) - suffix_start;
    if suffix_len > 0 {
        let rc = unsafe { libc::munmap(suffix_start as *mut libc::c_void, suffix_len) };
        if rc != 0 {
            return Err(last_os_error("munmap suffix"));
        }
    }

    Ok(aligned_addr)
}

pub fn free(addr: usize, size: usize) -> Result<()> {
    let rc = unsafe { libc::munmap(addr as *mut libc::c_void, size) };
    if rc != 0 {
        return Err(last_os_error("munmap"));
    }
    Ok(())
}

pub fn commit(addr: usize, size: usize) -> Result<()> {
    let rc = unsafe {
        libc::mprotect(
            addr as *mut libc::c_void,
            size,
            libc::PROT_READ | libc::PROT_WRITE,
        )
    };
    if rc != 0 {
        return Err(last_os_error("mprotect (commit)"));
    }
    Ok(())
}

pub fn decommit(addr: usize, size: usize) -> Result<()> {
    // Drop physical backing first, then remove access so a racing
    // re-commit of neighboring pages is unaffected.
    let rc = unsafe { libc::madvise(addr as *mut libc::c_void, size, libc::MADV_DONTNEED) };
    if rc != 0 {
        return Err(last_os_error("madvise (decommit)"));
    }
    let rc = unsafe { libc::mprotect(addr as *mut libc::c_void, size, libc::PROT_NONE) };
    if rc != 0 {
        return Err(last_os_error("mprotect (decommit)"));
    }
    Ok(())
}

pub fn reset(addr: usize, size: usize) -> Result<()> {
    let rc = unsafe { libc::madvise(addr as *mut libc::c_void, size, libc::MADV_DONTNEED) };
    if rc != 0 {
        return Err(last_os_error("madvise (reset)"));
    }
    Ok(())
}

pub fn unreset(addr: usize, size: usize) -> Result<()> {
    // MADV_DONTNEED is a pure hint on Linux: the range stays committed
    // and mapped, just possibly zeroed. Nothing to undo.
    let _ = (addr, size);
    Ok(())
}

pub fn protect(addr: usize, size: usize) -> Result<()> {
    let rc = unsafe { libc::mprotect(addr as *mut libc::c_void, size, libc::PROT_NONE) };
    if rc != 0 {
        return Err(last_os_error("mprotect (protect)"));
    }
    Ok(())
}

pub fn unprotect(addr: usize, size: usize) -> Result<()> {
    let rc = unsafe {
        libc::mprotect(
            addr as *mut libc::c_void,
            size,
            libc::PROT_READ | libc::PROT_WRITE,
        )
    };
    if rc != 0 {
        return Err(last_os_error("mprotect (unprotect)"));
    }
    Ok(())
}
