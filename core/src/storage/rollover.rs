use crate::index::DEFAULT_MAX_SHARD_SIZE;

/// Decides when the active shard is sealed and a new one started. The limit
/// is advisory: a chunk larger than `max_shard_size` still goes into an
/// empty shard, so a shard may exceed the limit by at most one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloverPolicy {
    pub max_shard_size: u64,
}

impl Default for RolloverPolicy {
    fn default() -> Self {
        Self {
            max_shard_size: DEFAULT_MAX_SHARD_SIZE,
        }
    }
}

impl RolloverPolicy {
    pub fn new(max_shard_size: u64) -> Self {
        Self { max_shard_size }
    }

    /// Returns `true` if appending `incoming_len` bytes to a shard whose data
    /// file currently holds `current_size` bytes requires a new shard
    pub fn should_roll(&self, current_size: u64, incoming_len: u64) -> bool {
        current_size > 0 && current_size.saturating_add(incoming_len) > self.max_shard_size
    }
}
