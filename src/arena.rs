//! Top-level region arena API: `allocate_aligned` / `allocate` / `free`
//! and the pass-through OS operations (§4.3–§4.5 of the design).

use crate::bitmap;
use crate::config::RegionOptions;
use crate::error::{RegionError, Result};
use crate::os;
use crate::ptr::{AllocId, BlockPtr};
use crate::stats::{RegionStats, RegionStatsSnapshot};
use crate::table::RegionTable;

fn align_up(value: usize, granularity: usize) -> usize {
    (value + granularity - 1) & !(granularity - 1)
}

/// An independent region arena: its own table, cursor, and statistics.
///
/// Multiple arenas may coexist in one process (useful for testing in
/// isolation); a single process-wide default is exposed via
/// [`crate::default_arena`].
pub struct Arena {
    table: RegionTable,
    stats: RegionStats,
}

impl Arena {
    /// Build a new arena with the given options. Fails only if the
    /// options themselves are invalid (see [`RegionOptions::validate`]).
    pub fn new(options: RegionOptions) -> Result<Self> {
        Ok(Arena {
            table: RegionTable::new(options)?,
            stats: RegionStats::new(),
        })
    }

    /// Build a new arena with default options.
    pub fn with_default_options() -> Result<Self> {
        Self::new(RegionOptions::default())
    }

    pub fn options(&self) -> &RegionOptions {
        self.table.options()
    }

    pub fn stats(&self) -> RegionStatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of region descriptors whose backing has ever been
    /// reserved. An upper bound, not an exact count (§3 invariant 4).
    pub fn regions_count(&self) -> usize {
        self.table.regions_count()
    }

    /// §4.3: the top-level allocate-aligned entry.
    pub fn allocate_aligned(
        &self,
        size: usize,
        alignment: usize,
        commit: bool,
    ) -> Result<(usize, AllocId)> {
        if size == 0 {
            return Err(RegionError::InvalidArgument(
                "allocation size must be > 0".to_string(),
            ));
        }
        if !alignment.is_power_of_two() {
            return Err(RegionError::InvalidArgument(
                "alignment must be a power of two".to_string(),
            ));
        }

        let options = self.table.options();

        // Step 2: oversized or overaligned requests bypass the region
        // layer entirely. This path always commits, regardless of the
        // caller's `commit` flag: the caller gets a usable pointer
        // immediately since there is no claim bitmap to defer
        // backing-memory decisions against.
        if size > options.max_alloc() || alignment > options.region_size() {
            return self.allocate_direct(size, true);
        }

        // Step 3: round up to an OS page multiple so later commit/
        // decommit calls cover integral pages.
        let page = os::page_size();
        let rounded_size = align_up(size, page);
        let block_count = bitmap::block_count(rounded_size, options.block_size);

        // Steps 5-7: two-sweep scan of the region table.
        match self
            .table
            .try_allocate(block_count, rounded_size, commit, &self.stats)?
        {
            Some(placement) => {
                let addr = BlockPtr::at(placement.region_start, placement.bit_index, options.block_size).addr();
                let id = AllocId::encode(placement.region_index, placement.bit_index);
                Ok((addr, id))
            }
            // Step 8: both sweeps found no fit; fall back to the OS,
            // honoring the caller's own `commit` flag this time (unlike
            // the step-2 bypass, this path has no special reason to
            // force a commit the caller didn't ask for).
            None => self.allocate_direct(size, commit),
        }
    }

    /// §4.3: allocate with the region layer's natural alignment
    /// (`block_size`, which suffices since every claimed block address
    /// is `region_start + bit_index * block_size` and `region_start`
    /// is `region_size`-aligned).
    pub fn allocate(&self, size: usize, commit: bool) -> Result<(usize, AllocId)> {
        let block_size = self.table.options().block_size;
        self.allocate_aligned(size, block_size, commit)
    }

    fn allocate_direct(&self, size: usize, commit: bool) -> Result<(usize, AllocId)> {
        let page = os::page_size();
        let rounded_size = align_up(size, page);
        match os::reserve_aligned(rounded_size, page, commit) {
            Ok(addr) => {
                self.stats.record_direct_os(rounded_size);
                log::debug!("direct OS allocation of {rounded_size} bytes at {addr:#x}");
                Ok((addr, AllocId::direct_os()))
            }
            Err(err) => {
                self.stats.record_oom();
                log::error!("direct OS allocation of {rounded_size} bytes failed: {err}");
                Err(err)
            }
        }
    }

    /// §4.4: the free path. Routes on `id` alone (direct-OS vs
    /// region-backed); a validation-contract failure on the
    /// region-backed path is a silent no-op, per the documented default.
    pub fn free(&self, addr: usize, size: usize, id: AllocId) -> Result<()> {
        if id.is_direct_os() {
            let page = os::page_size();
            let rounded_size = align_up(size, page);
            return os::free(addr, rounded_size);
        }

        let (region_index, bit_index) = id.decode();
        let options = self.table.options();
        let page = os::page_size();
        let rounded_size = align_up(size, page);
        let block_count = bitmap::block_count(rounded_size, options.block_size);

        if !self
            .table
            .free(region_index, bit_index, block_count, rounded_size, &self.stats)
        {
            log::warn!(
                "free() called with an inconsistent (addr={addr:#x}, size={size}, id) triple; \
                 ignored as a caller contract violation"
            );
        }
        Ok(())
    }

    /// §4.5 pass-through: make `[addr, addr+size)` readable/writable.
    pub fn commit(&self, addr: usize, size: usize) -> bool {
        os::commit(addr, size).is_ok()
    }

    /// §4.5 pass-through: release physical backing, keep the reservation.
    pub fn decommit(&self, addr: usize, size: usize) -> bool {
        os::decommit(addr, size).is_ok()
    }

    /// §4.5 pass-through: hint that contents may be discarded.
    pub fn reset(&self, addr: usize, size: usize) -> bool {
        os::reset(addr, size).is_ok()
    }

    /// §4.5 pass-through: inverse of [`Self::reset`].
    pub fn unreset(&self, addr: usize, size: usize) -> bool {
        os::unreset(addr, size).is_ok()
    }

    /// §4.5 pass-through: make `[addr, addr+size)` inaccessible.
    pub fn protect(&self, addr: usize, size: usize) -> bool {
        os::protect(addr, size).is_ok()
    }

    /// §4.5 pass-through: restore read/write access.
    pub fn unprotect(&self, addr: usize, size: usize) -> bool {
        os::unprotect(addr, size).is_ok()
    }
}
