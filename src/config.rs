//! Configuration Module - region arena tuning parameters
//!
//! Manages the options that affect region arena behavior. The layer
//! recognizes exactly one behavioral option (`eager_region_commit`);
//! the rest of this struct fixes the sizing constants an embedder
//! needs to pick (block size, address-space ceiling) since a reusable
//! crate cannot hardcode a single segment size the way a
//! single-purpose allocator can.

use thiserror::Error;

pub const KB: usize = 1024;
pub const MB: usize = 1024 * KB;
pub const GB: usize = 1024 * MB;

#[cfg(target_pointer_width = "64")]
const DEFAULT_HEAP_ADDRESS_LIMIT: usize = 256 * GB;
#[cfg(not(target_pointer_width = "64"))]
const DEFAULT_HEAP_ADDRESS_LIMIT: usize = 3 * GB;

/// Options controlling region arena behavior.
///
/// # Examples
///
/// ```rust
/// use region_arena::RegionOptions;
///
/// let options = RegionOptions::default();
/// assert!(options.validate().is_ok());
///
/// let options = RegionOptions {
///     eager_region_commit: true,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct RegionOptions {
    /// When true, regions are committed in full at reservation time and
    /// freed ranges are reset (not decommitted). When false (the
    /// default), regions are reserved without commit, block ranges are
    /// committed on claim, and decommitted on free.
    pub eager_region_commit: bool,

    /// Upper-layer segment size; all claims are whole numbers of this
    /// many bytes. Default: 4 MiB.
    pub block_size: usize,

    /// Ceiling on the total address space the region table may span.
    /// Bounds the number of region descriptors (`N = heap_address_limit
    /// / region_size`). Default: 256 GiB on 64-bit targets, 3 GiB on
    /// 32-bit targets.
    pub heap_address_limit: usize,

    /// Granularity commit/reset ranges are rounded up to, so a decommit
    /// never fragments an OS large page underneath a neighboring live
    /// claim. Default: 2 MiB.
    pub large_page_size: usize,
}

impl Default for RegionOptions {
    fn default() -> Self {
        RegionOptions {
            eager_region_commit: false,
            block_size: 4 * MB,
            heap_address_limit: DEFAULT_HEAP_ADDRESS_LIMIT,
            large_page_size: crate::os::large_page_size(),
        }
    }
}

impl RegionOptions {
    /// Validate that this configuration is internally consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::ensure!(
            self.block_size != 0,
            ConfigError::InvalidBlockSize("block_size must be > 0".to_string())
        );

        crate::ensure!(
            self.block_size.is_power_of_two(),
            ConfigError::InvalidBlockSize("block_size must be a power of two".to_string())
        );

        let region_size = self.region_size();
        crate::ensure!(
            self.heap_address_limit >= region_size,
            ConfigError::InvalidHeapLimit(
                "heap_address_limit must hold at least one region".to_string()
            )
        );

        crate::ensure!(
            self.large_page_size.is_power_of_two(),
            ConfigError::InvalidLargePageSize("large_page_size must be a power of two".to_string())
        );

        Ok(())
    }

    /// Region size in bytes: `block_size * W` (one bitmap word's worth
    /// of blocks).
    pub fn region_size(&self) -> usize {
        self.block_size * crate::bitmap::W
    }

    /// Per-region allocation ceiling: `(W / 4) * block_size`. Requests
    /// larger than this bypass the region layer entirely.
    pub fn max_alloc(&self) -> usize {
        (crate::bitmap::W / 4) * self.block_size
    }

    /// Maximum number of region descriptors the table may hold.
    pub fn max_regions(&self) -> usize {
        (self.heap_address_limit / self.region_size()).max(1)
    }

    /// Build configuration from environment variables, overlaying
    /// defaults with:
    /// - `REGION_ARENA_EAGER_COMMIT`
    /// - `REGION_ARENA_BLOCK_SIZE`
    /// - `REGION_ARENA_HEAP_LIMIT`
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(val) = std::env::var("REGION_ARENA_EAGER_COMMIT") {
            options.eager_region_commit = val == "1" || val.eq_ignore_ascii_case("true");
        }

        if let Ok(val) = std::env::var("REGION_ARENA_BLOCK_SIZE") {
            if let Ok(size) = val.parse::<usize>() {
                options.block_size = size;
            }
        }

        if let Ok(val) = std::env::var("REGION_ARENA_HEAP_LIMIT") {
            if let Ok(size) = val.parse::<usize>() {
                options.heap_address_limit = size;
            }
        }

        options
    }
}

/// Errors produced by [`RegionOptions::validate`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid block size: {0}")]
    InvalidBlockSize(String),

    #[error("invalid heap address limit: {0}")]
    InvalidHeapLimit(String),

    #[error("invalid large page size: {0}")]
    InvalidLargePageSize(String),
}
