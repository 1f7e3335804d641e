//! Runtime configuration.

use crate::error::{ChunkError, Result};
use crate::kernels::LeafKernel;

/// Default leaf block side.
pub const DEFAULT_BLOCK_SIZE: usize = 64;

/// Memoization of task results by `(operation, input ids)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Stop memoizing once this many result bytes are cached, each result
    /// counted as its whole matrix tree. `None` = no limit.
    pub limit_bytes: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit_bytes: None,
        }
    }
}

/// Settings for a [`LocalRuntime`](crate::runtime::LocalRuntime).
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Leaf dimension B; matrices must be `B * 2^k`.
    pub block_size: usize,
    /// Worker threads evaluating the task graph.
    pub threads: usize,
    pub kernel: LeafKernel,
    pub cache: CacheConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            threads,
            kernel: LeafKernel::default(),
            cache: CacheConfig::default(),
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_kernel(mut self, kernel: LeafKernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache.enabled = enabled;
        self
    }

    pub fn with_cache_limit(mut self, limit_bytes: usize) -> Self {
        self.cache.limit_bytes = Some(limit_bytes);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(ChunkError::InvalidConfig(
                "block size must be at least 1".into(),
            ));
        }
        if self.threads == 0 {
            return Err(ChunkError::InvalidConfig(
                "need at least one worker thread".into(),
            ));
        }
        Ok(())
    }

    /// Whether `n` is `block_size * 2^k` for some `k >= 0`.
    pub fn is_valid_dimension(&self, n: usize) -> bool {
        is_block_power(n, self.block_size)
    }
}

pub(crate) fn is_block_power(n: usize, block_size: usize) -> bool {
    block_size > 0 && n >= block_size && n % block_size == 0 && (n / block_size).is_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::new();
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert!(config.threads >= 1);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.limit_bytes, None);
        assert_eq!(config.kernel, LeafKernel::Optimized);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::new()
            .with_block_size(2)
            .with_threads(3)
            .with_kernel(LeafKernel::Reference)
            .with_cache(false)
            .with_cache_limit(1024);
        assert_eq!(config.block_size, 2);
        assert_eq!(config.threads, 3);
        assert_eq!(config.kernel, LeafKernel::Reference);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.limit_bytes, Some(1024));
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        assert!(RuntimeConfig::new().with_block_size(0).validate().is_err());
        assert!(RuntimeConfig::new().with_threads(0).validate().is_err());
    }

    #[test]
    fn test_valid_dimensions() {
        let config = RuntimeConfig::new().with_block_size(4);
        for n in [4, 8, 16, 1024] {
            assert!(config.is_valid_dimension(n), "{}", n);
        }
        for n in [0, 2, 6, 12, 20] {
            assert!(!config.is_valid_dimension(n), "{}", n);
        }
    }
}
