//! Windows virtual memory primitives built on `VirtualAlloc` /
//! `VirtualFree` / `VirtualProtect`, mirroring the unix adapter's
//! reserve/commit/decommit/reset/protect surface.

use std::io;

use windows_sys::Win32::System::Memory::{
    VirtualAlloc, VirtualFree, VirtualProtect, MEM_COMMIT, MEM_DECOMMIT, MEM_RELEASE,
    MEM_RESERVE, MEM_RESET, MEM_RESET_UNDO, PAGE_NOACCESS, PAGE_READWRITE,
};

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

    let alloc_type = if commit {
        MEM_RESERVE | MEM_COMMIT
    } else {
        MEM_RESERVE
    };
    let protect = if commit { PAGE_READWRITE } else { PAGE_NOACCESS };
    let page = super::page_size();

    if align <= page {
        let ptr = unsafe {
            VirtualAlloc(std::ptr::null_mut(), size, alloc_type, protect)
        };
        if ptr.is_null() {
            return Err(last_os_error("VirtualAlloc"));
        }
        return Ok(ptr as usize);
    }

    // VirtualFree with MEM_RELEASE only accepts the exact base address
    // of a prior reservation, so alignment beyond the page size has to
    // go through the reserve-oversized / release / re-reserve-aligned
    // dance: reserve more than needed to learn an address with enough
    // alignment slack, release it, then immediately re-reserve just the
    // aligned sub-range. This has a narrow race (another thread/process
    // could claim the address between release and re-reserve); retry a
    // bounded number of times on failure, matching how VirtualAlloc2-less
    // code paths had to handle this before `MEM_EXTENDED_PARAMETER` was
    // widely available.
    const MAX_ATTEMPTS: usize = 8;
    for _ in 0..MAX_ATTEMPTS {
        let over_size = size + align;
        let raw = unsafe { VirtualAlloc(std::ptr::null_mut(), over_size, MEM_RESERVE, PAGE_NOACCESS) };
        if raw.is_null() {
            return Err(last_os_error("VirtualAlloc (probe)"));
        }
        let raw_addr = raw as usize;
        let aligned_addr = (raw_addr + align - 1) & !(align - 1);

        let rc = unsafe { VirtualFree(raw, 0, MEM_RELEASE) };
        if rc == 0 {
            return Err(last_os_error("VirtualFree (probe)"));
        }

        let ptr = unsafe {
            VirtualAlloc(aligned_addr as *mut _, size, alloc_type, protect)
        };
        if !ptr.is_null() {
            return Ok(ptr as usize);
        }
        // Lost the race for that address; retry with a fresh probe.
    }
    Err(vm_error("failed to reserve aligned range after retries"))
}

pub fn free(addr: usize, _size: usize) -> Result<()> {
    let rc = unsafe { VirtualFree(addr as *mut _, 0, MEM_RELEASE) };
    if rc == 0 {
        return Err(last_os_error("VirtualFree"));
    }
    Ok(())
}

pub fn commit(addr: usize, size: usize) -> Result<()> {
    let ptr = unsafe { VirtualAlloc(addr as *mut _, size, MEM_COMMIT, PAGE_READWRITE) };
    if ptr.is_null() {
        return Err(last_os_error("VirtualAlloc (commit)"));
    }
    Ok(())
}

pub fn decommit(addr: usize, size: usize) -> Result<()> {
    let rc = unsafe { VirtualFree(addr as *mut _, size, MEM_DECOMMIT) };
    if rc == 0 {
        return Err(last_os_error("VirtualFree (decommit)"));
    }
    Ok(())
}

pub fn reset(addr: usize, size: usize) -> Result<()> {
    let ptr = unsafe { VirtualAlloc(addr as *mut _, size, MEM_RESET, PAGE_READWRITE) };
    if ptr.is_null() {
        return Err(last_os_error("VirtualAlloc (reset)"));
    }
    Ok(())
}

pub fn unreset(addr: usize, size: usize) -> Result<()> {
    let ptr = unsafe { VirtualAlloc(addr as *mut _, size, MEM_RESET_UNDO, PAGE_READWRITE) };
    if ptr.is_null() {
        return Err(last_os_error("VirtualAlloc (unreset)"));
    }
    Ok(())
}

pub fn protect(addr: usize, size: usize) -> Result<()> {
    let mut old = 0u32;
    let rc = unsafe { VirtualProtect(addr as *mut _, size, PAGE_NOACCESS, &mut old) };
    if rc == 0 {
        return Err(last_os_error("VirtualProtect (protect)"));
    }
    Ok(())
}

pub fn unprotect(addr: usize, size: usize) -> Result<()> {
    let mut old = 0u32;
    let rc = unsafe { VirtualProtect(addr as *mut _, size, PAGE_READWRITE, &mut old) };
    if rc == 0 {
        return Err(last_os_error("VirtualProtect (unprotect)"));
    }
    Ok(())
}
