use std::time::Duration;

use super::error::{CacheError, CacheResult};

pub const DEFAULT_MAX_SIZE_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Serialized values longer than this many bytes are deflate-compressed.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024;
pub const DEFAULT_OPTIMIZE_THRESHOLD: f64 = 0.8;
pub const DEFAULT_OPTIMIZE_FRACTION: f64 = 0.2;
pub const DEFAULT_PERSIST_DEBOUNCE: Duration = Duration::from_secs(2);
pub const DEFAULT_PERSIST_KEY: &str = "stacksafe.response_cache";
pub const DEFAULT_QUALITY: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_size_bytes: usize,
    pub default_ttl: Duration,
    pub compression_threshold: usize,
    /// Fraction of capacity above which `optimize()` starts removing entries.
    pub optimize_threshold: f64,
    /// Fraction of entries (rounded up) removed by one `optimize()` pass.
    pub optimize_fraction: f64,
    pub persist_debounce: Duration,
    pub persist_key: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            default_ttl: DEFAULT_TTL,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            optimize_threshold: DEFAULT_OPTIMIZE_THRESHOLD,
            optimize_fraction: DEFAULT_OPTIMIZE_FRACTION,
            persist_debounce: DEFAULT_PERSIST_DEBOUNCE,
            persist_key: DEFAULT_PERSIST_KEY.to_string(),
        }
    }
}

impl CacheConfig {
    pub fn max_size_bytes(mut self, bytes: usize) -> Self {
        self.max_size_bytes = bytes;
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn compression_threshold(mut self, bytes: usize) -> Self {
        self.compression_threshold = bytes;
        self
    }

    pub fn persist_debounce(mut self, debounce: Duration) -> Self {
        self.persist_debounce = debounce;
        self
    }

    pub fn persist_key(mut self, key: &str) -> Self {
        self.persist_key = key.to_string();
        self
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.max_size_bytes == 0 {
            return Err(CacheError::Config {
                reason: "max_size_bytes must be > 0".to_string(),
            });
        }
        if self.default_ttl.is_zero() {
            return Err(CacheError::Config {
                reason: "default_ttl must be > 0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.optimize_threshold)
            || !(0.0..=1.0).contains(&self.optimize_fraction)
        {
            return Err(CacheError::Config {
                reason: format!(
                    "optimize_threshold ({}) and optimize_fraction ({}) must be within [0, 1]",
                    self.optimize_threshold, self.optimize_fraction
                ),
            });
        }
        Ok(())
    }
}

/// Admission priority. Controls how aggressively space is reclaimed on insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EvictionPriority {
    Low,
    #[default]
    Normal,
    High,
}

impl EvictionPriority {
    /// Over-eviction multiplier applied to the space shortfall.
    #[inline]
    pub fn multiplier(&self) -> f64 {
        match self {
            EvictionPriority::Low => 1.0,
            EvictionPriority::Normal => 1.2,
            EvictionPriority::High => 1.5,
        }
    }
}

/// Per-insert options for [`ResponseCache::set`](super::ResponseCache::set).
#[derive(Debug, Clone)]
pub struct SetOptions {
    /// Falls back to [`CacheConfig::default_ttl`] when `None`.
    pub ttl: Option<Duration>,
    pub quality: f64,
    pub tags: Vec<String>,
    pub priority: EvictionPriority,
}

impl Default for SetOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            quality: DEFAULT_QUALITY,
            tags: Vec::new(),
            priority: EvictionPriority::Normal,
        }
    }
}

impl SetOptions {
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn quality(mut self, quality: f64) -> Self {
        self.quality = quality;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn priority(mut self, priority: EvictionPriority) -> Self {
        self.priority = priority;
        self
    }
}
