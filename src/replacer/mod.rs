use std::sync::Arc;

use serde::Deserialize;

use crate::config::Config;
use crate::error::Result;

pub mod arc;
pub mod lru_k;

/// Id of a frame, i.e., a physical slot in the buffer pool. Valid ids are
/// in range [0, num_frames). A frame id is stable while the frame is
/// resident.
pub type FrameId = usize;

/// Id of a logical page. A page keeps its id across evictions, which is
/// what lets a ghost list recognise a returning page.
pub type PageId = i64;

/// The kind of access the buffer pool is reporting. Passed through so a
/// policy could treat e.g. sequential scans differently; both built-in
/// policies accept and ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Unknown,
    Lookup,
    Scan,
    Index,
}

/// Replacer tracks frame usage for replacement in case the buffer pool
/// is full.
///
/// Every operation checks that the frame id is within [0, num_frames)
/// and panics otherwise.
pub trait Replacer: Send + Sync {
    /// Record the event that the given frame id is accessed at current
    /// timestamp. Create a new entry for access history if frame id has not
    /// been seen before. New entries start non-evictable until the caller
    /// unpins them.
    ///
    /// The page id identifies the page resident in the frame. A policy that
    /// only tracks frames is free to ignore it.
    fn record_access(&self, frame_id: FrameId, page_id: PageId, access_type: AccessType);

    /// Find the frame to evict with the replace policy (e.g. backward
    /// k-distance). Only frames that are marked as evictable are candidates
    /// for eviction.
    ///
    /// Successful eviction of a frame should decrement the size of replacer
    /// and remove the frame's access history.
    ///
    /// Return the frame id if a frame is evicted successfully, None if no
    /// frames can be evicted.
    fn evict(&self) -> Option<FrameId>;

    /// Toggle whether a frame is evictable or non-evictable. This function
    /// also controls replacer size. Note that size is equal to number of
    /// evictable entries.
    ///
    /// If a frame was previously evictable and is to be set to non-evictable,
    /// then size should decrement. If a frame was previously non-evictable
    /// and is to be set evictable, then size should increment.
    fn set_evictable(&self, frame_id: FrameId, evictable: bool);

    /// Check if a frame is evictable. If the frame is not found, return true.
    fn is_evictable(&self, frame_id: FrameId) -> bool;

    /// Remove a frame from the replacer, along with its access history.
    /// This function should also decrement the replacer size if removal is
    /// successful.
    ///
    /// Note that this is different from evicting a frame, which always picks
    /// the victim with the replace policy. This function removes the
    /// specified frame no matter where the policy ranks it.
    ///
    /// If remove is called on a non-evictable frame, return
    /// [`Error::FramePinned`](crate::error::Error::FramePinned). If the
    /// specified frame is not found, do nothing without returning any error.
    fn remove(&self, frame_id: FrameId) -> Result<()>;

    /// Number of evictable frames.
    fn size(&self) -> usize;
}

#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
pub enum ReplacerPolicy {
    LruK,
    Arc,
}

/// Build a replacer with the given policy. `k` is the history depth of the
/// LRU-K policy and is ignored by ARC.
pub fn new_replacer(policy: ReplacerPolicy, num_frames: usize, k: usize) -> Arc<dyn Replacer> {
    match policy {
        ReplacerPolicy::LruK => Arc::new(lru_k::SyncLRUKReplacer::new(k, num_frames)),
        ReplacerPolicy::Arc => Arc::new(arc::SyncArcReplacer::new(num_frames)),
    }
}

/// Build a replacer from a config.
pub fn new_replacer_with_config(config: &Config) -> Arc<dyn Replacer> {
    new_replacer(config.policy, config.num_frames, config.replacer_k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_replacer() -> Result<()> {
        for policy in [ReplacerPolicy::LruK, ReplacerPolicy::Arc] {
            let replacer = new_replacer(policy, 4, 2);
            replacer.record_access(0, 100, AccessType::Unknown);
            assert_eq!(0, replacer.size());
            replacer.set_evictable(0, true);
            assert_eq!(1, replacer.size());
            assert_eq!(Some(0), replacer.evict());
            assert_eq!(0, replacer.size());
        }
        Ok(())
    }

    #[test]
    fn test_new_replacer_with_config() -> Result<()> {
        let config = Config::new("")?;
        let replacer = new_replacer_with_config(&config);
        assert_eq!(None, replacer.evict());
        Ok(())
    }
}
