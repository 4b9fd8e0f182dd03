//! Region table: the fixed-size array of region descriptors and the
//! two-sweep allocation orchestration over it (§4.3 of the design).

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::RegionOptions;
use crate::error::{RegionError, Result};
use crate::ptr::BlockPtr;
use crate::region::Region;
use crate::stats::RegionStats;

/// Process-wide (or, for testing, per-[`crate::Arena`]) table of region
/// descriptors plus the shared search cursor.
pub struct RegionTable {
    regions: Vec<Region>,
    regions_count: AtomicUsize,
    next_idx: AtomicUsize,
    options: RegionOptions,
}

/// Outcome of a successful table-level claim: which region, which bit
/// within it, and the region's backing start address.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub region_index: usize,
    pub bit_index: usize,
    pub region_start: usize,
}

impl RegionTable {
    /// Build a table sized per `options.max_regions()`. All descriptors
    /// start zero-initialized (unclaimed, unreserved).
    pub fn new(options: RegionOptions) -> Result<Self> {
        options
            .validate()
            .map_err(|e| RegionError::Configuration(e.to_string()))?;

        let n = options.max_regions();
        let mut regions = Vec::with_capacity(n);
        regions.resize_with(n, Region::new);

        Ok(RegionTable {
            regions,
            regions_count: AtomicUsize::new(0),
            next_idx: AtomicUsize::new(0),
            options,
        })
    }

    pub fn options(&self) -> &RegionOptions {
        &self.options
    }

    /// Total number of region descriptor slots (`N`).
    pub fn capacity(&self) -> usize {
        self.regions.len()
    }

    /// Upper bound on the number of initialized descriptors. May lag
    /// the true count; see §3 invariant 4.
    pub fn regions_count(&self) -> usize {
        self.regions_count.load(Ordering::Acquire)
    }

    /// Borrow a region descriptor by index, for the free path.
    pub fn region(&self, index: usize) -> Option<&Region> {
        self.regions.get(index)
    }

    /// §4.3 Steps 5-7: the two-sweep scan. Returns `Ok(None)` if every
    /// region (existing and extension) failed to fit the request —
    /// the caller must then fall back to a direct OS allocation.
    pub fn try_allocate(
        &self,
        block_count: usize,
        request_size: usize,
        want_commit: bool,
        stats: &RegionStats,
    ) -> Result<Option<Placement>> {
        let count = self.regions_count.load(Ordering::Acquire).min(self.regions.len());
        let start_idx = self.next_idx.load(Ordering::Relaxed);

        // First sweep: existing regions, round-robin from the cursor.
        if count > 0 {
            for visited in 0..count {
                let idx = (start_idx + visited) % count;
                if let Some(placement) =
                    self.try_region(idx, block_count, request_size, want_commit, stats)?
                {
                    return Ok(Some(placement));
                }
            }
        }

        // Second sweep: extension into never-yet-touched descriptors.
        for idx in count..self.regions.len() {
            if let Some(placement) =
                self.try_region(idx, block_count, request_size, want_commit, stats)?
            {
                return Ok(Some(placement));
            }
        }

        stats.record_no_fit();
        Ok(None)
    }

    fn try_region(
        &self,
        idx: usize,
        block_count: usize,
        request_size: usize,
        want_commit: bool,
        stats: &RegionStats,
    ) -> Result<Option<Placement>> {
        let region = &self.regions[idx];
        // Fast pre-check: a fully-claimed bitmap can never fit anything,
        // so skip the CAS attempt entirely (mirrors the source's
        // `map != MI_REGION_MAP_FULL` guard).
        if region.map() == usize::MAX {
            return Ok(None);
        }

        match region.claim(block_count, request_size, &self.options, want_commit, stats)? {
            Some((bit_index, newly_reserved)) => {
                if newly_reserved {
                    self.regions_count.fetch_add(1, Ordering::AcqRel);
                    log::info!("region table extended: regions_count -> {}", idx + 1);
                }
                // §4.2 Step 5: publish the cursor so the next call starts here.
                self.next_idx.store(idx, Ordering::Relaxed);
                Ok(Some(Placement {
                    region_index: idx,
                    bit_index,
                    region_start: region.start(),
                }))
            }
            None => Ok(None),
        }
    }

    /// Release the blocks described by `placement` back to this table.
    pub fn free(
        &self,
        region_index: usize,
        bit_index: usize,
        block_count: usize,
        request_size: usize,
        stats: &RegionStats,
    ) -> bool {
        let Some(region) = self.regions.get(region_index) else {
            return false;
        };
        let addr = BlockPtr::at(region.start(), bit_index, self.options.block_size).addr();
        if !region.validate(bit_index, block_count, addr, self.options.block_size) {
            return false;
        }
        region.release(bit_index, block_count, request_size, &self.options, stats);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_table() -> RegionTable {
        let options = RegionOptions {
            block_size: crate::os::page_size(),
            heap_address_limit: crate::os::page_size() * crate::bitmap::W * 4,
            ..Default::default()
        };
        RegionTable::new(options).unwrap()
    }

    #[test]
    fn first_allocation_lands_in_region_zero_bit_zero() {
        let table = small_table();
        let stats = RegionStats::new();
        let block_size = table.options().block_size;

        let placement = table
            .try_allocate(1, block_size, true, &stats)
            .unwrap()
            .expect("fits");
        assert_eq!(placement.region_index, 0);
        assert_eq!(placement.bit_index, 0);
        assert_eq!(table.regions_count(), 1);
    }

    #[test]
    fn filling_region_extends_the_table() {
        let table = small_table();
        let stats = RegionStats::new();
        let block_size = table.options().block_size;

        for _ in 0..crate::bitmap::W {
            table.try_allocate(1, block_size, false, &stats).unwrap();
        }
        assert_eq!(table.regions_count(), 1);

        let placement = table
            .try_allocate(1, block_size, false, &stats)
            .unwrap()
            .expect("extends into region 1");
        assert_eq!(placement.region_index, 1);
        assert_eq!(table.regions_count(), 2);
    }

    #[test]
    fn exhausting_every_region_returns_no_fit() {
        let options = RegionOptions {
            block_size: crate::os::page_size(),
            heap_address_limit: crate::os::page_size() * crate::bitmap::W,
            ..Default::default()
        };
        let table = RegionTable::new(options).unwrap();
        let stats = RegionStats::new();
        let block_size = table.options().block_size;

        for _ in 0..crate::bitmap::W {
            assert!(table
                .try_allocate(1, block_size, false, &stats)
                .unwrap()
                .is_some());
        }
        assert!(table
            .try_allocate(1, block_size, false, &stats)
            .unwrap()
            .is_none());
    }

    #[test]
    fn free_then_realloc_reuses_the_freed_bit() {
        let table = small_table();
        let stats = RegionStats::new();
        let block_size = table.options().block_size;

        let p0 = table.try_allocate(1, block_size, false, &stats).unwrap().unwrap();
        assert!(table.free(p0.region_index, p0.bit_index, 1, block_size, &stats));

        let p1 = table.try_allocate(1, block_size, false, &stats).unwrap().unwrap();
        assert_eq!(p1.bit_index, p0.bit_index);
    }

    #[test]
    fn free_with_wrong_region_index_is_rejected() {
        let table = small_table();
        let stats = RegionStats::new();
        assert!(!table.free(table.capacity() + 1, 0, 1, 4096, &stats));
    }
}
