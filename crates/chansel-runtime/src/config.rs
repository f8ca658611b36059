//! Channel configuration

use chansel_core::env::env_get;

/// Default buffer size for `Channel::new()`
pub const DEFAULT_CAPACITY: usize = 64;

/// Default busy retries before a producer parks on a full channel
pub const DEFAULT_PUT_SPINS: u32 = 32;

/// Configuration for a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// `Some(n)`: bounded to n items, `put` blocks when full.
    /// `None`: unbounded, `put` never blocks.
    pub capacity: Option<usize>,

    /// Retries (with a pause hint) before a full producer parks on the futex
    pub put_spins: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: Some(DEFAULT_CAPACITY),
            put_spins: DEFAULT_PUT_SPINS,
        }
    }
}

impl ChannelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by the environment:
    ///
    /// - `CHANSEL_CHANNEL_CAPACITY` - buffer size, `0` means unbounded
    /// - `CHANSEL_PUT_SPINS` - retries before parking
    pub fn from_env() -> Self {
        let capacity = match env_get("CHANSEL_CHANNEL_CAPACITY", DEFAULT_CAPACITY) {
            0 => None,
            n => Some(n),
        };
        Self {
            capacity,
            put_spins: env_get("CHANSEL_PUT_SPINS", DEFAULT_PUT_SPINS),
        }
    }

    /// Bound the buffer; a zero capacity is raised to 1
    pub fn capacity(mut self, n: usize) -> Self {
        self.capacity = Some(n.max(1));
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.capacity = None;
        self
    }

    pub fn put_spins(mut self, n: u32) -> Self {
        self.put_spins = n;
        self
    }
}
