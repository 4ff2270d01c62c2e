use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use log::debug;

use crate::error::{Error, Result};

use super::{AccessType, FrameId, PageId, Replacer};

/// Residency of a tracked entry. Real frames live in one of the two
/// resident lists, ghost entries only remember the page id of a recent
/// eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameStatus {
    Mru,
    Mfu,
    MruGhost,
    MfuGhost,
}

struct FrameMeta {
    page_id: PageId,
    is_evictable: bool,
    status: FrameStatus,
}

/// Remove the first occurrence of an item from a list.
fn splice<T: PartialEq>(list: &mut VecDeque<T>, item: &T) {
    if let Some(idx) = list.iter().position(|v| v == item) {
        list.remove(idx);
    }
}

/// ArcReplacer implements the adaptive replacement cache policy.
///
/// Resident frames are split between a recency list (`mru`, pages seen
/// once in their current lifetime) and a frequency list (`mfu`, pages
/// seen at least twice). Two ghost lists remember the page ids most
/// recently evicted from each side. A hit on a ghost list means that side
/// was evicted too eagerly, so the adaptive target for the recency list
/// moves toward the side that was wrongly evicted.
///
/// Each list keeps its most recent entry at the front; eviction scans
/// from the back, the LRU end.
pub struct ArcReplacer {
    replacer_size: usize,
    /// Adaptive target for the size of `mru`, in [0, replacer_size].
    mru_target_size: usize,
    current_size: usize,

    mru: VecDeque<FrameId>,
    mfu: VecDeque<FrameId>,
    mru_ghost: VecDeque<PageId>,
    mfu_ghost: VecDeque<PageId>,

    alive: HashMap<FrameId, FrameMeta>,
    ghosts: HashMap<PageId, FrameStatus>,
}

impl ArcReplacer {
    pub fn new(size: usize) -> Self {
        ArcReplacer {
            replacer_size: size,
            mru_target_size: 0,
            current_size: 0,
            mru: VecDeque::new(),
            mfu: VecDeque::new(),
            mru_ghost: VecDeque::new(),
            mfu_ghost: VecDeque::new(),
            alive: HashMap::new(),
            ghosts: HashMap::new(),
        }
    }

    /// Record an access of the given page in the given frame.
    ///
    /// A repeat access to a resident frame promotes it to the front of
    /// `mfu`. An access whose page id sits in one of the ghost lists
    /// adapts the recency target toward the side the page was evicted
    /// from, then revives the page as a frequency entry. Anything else is
    /// a plain miss and enters the front of `mru`.
    ///
    /// New and revived entries start non-evictable and never trigger an
    /// eviction here; ghost capacity is enforced on eviction.
    fn record_access(&mut self, frame_id: FrameId, page_id: PageId) {
        assert!(frame_id < self.replacer_size, "frame id {} out of range", frame_id);
        if self.alive.contains_key(&frame_id) {
            self.promote(frame_id, page_id);
            return;
        }
        match self.ghosts.get(&page_id).copied() {
            Some(FrameStatus::MruGhost) => {
                self.adapt_up();
                self.drop_ghost(page_id);
                self.insert_alive(frame_id, page_id, FrameStatus::Mfu);
            }
            Some(_) => {
                self.adapt_down();
                self.drop_ghost(page_id);
                self.insert_alive(frame_id, page_id, FrameStatus::Mfu);
            }
            None => self.insert_alive(frame_id, page_id, FrameStatus::Mru),
        }
    }

    /// Pick a victim and evict it.
    ///
    /// The recency list is tried first whenever it is larger than its
    /// adaptive target, the frequency list otherwise. Each side is
    /// scanned from the LRU end and yields its first evictable entry; a
    /// side with no evictable entry falls through to the other one.
    ///
    /// The victim's page id moves to the ghost list of the side it was
    /// evicted from. A ghost list never grows past the replacer size, the
    /// oldest ghost entry is dropped on overflow.
    fn evict(&mut self) -> Option<FrameId> {
        let sides = if self.mru.len() > self.mru_target_size {
            [FrameStatus::Mru, FrameStatus::Mfu]
        } else {
            [FrameStatus::Mfu, FrameStatus::Mru]
        };
        for side in sides {
            if let Some(frame_id) = self.find_victim(side) {
                self.evict_frame(frame_id, side);
                return Some(frame_id);
            }
        }
        None
    }

    /// Toggle whether a frame is evictable or non-evictable. This function
    /// also controls replacer size. Note that size is equal to number of
    /// evictable entries.
    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        assert!(frame_id < self.replacer_size, "frame id {} out of range", frame_id);
        let meta = match self.alive.get_mut(&frame_id) {
            Some(meta) => meta,
            None => return,
        };
        let is_evictable = meta.is_evictable;
        if is_evictable == evictable {
            return;
        }

        meta.is_evictable = evictable;
        if !is_evictable && evictable {
            self.current_size += 1;
        }
        if is_evictable && !evictable {
            self.current_size -= 1;
        }
    }

    /// Check if a frame is evictable. if the frame is not found, return true.
    fn is_evictable(&self, frame_id: FrameId) -> bool {
        assert!(frame_id < self.replacer_size, "frame id {} out of range", frame_id);
        match self.alive.get(&frame_id) {
            Some(meta) => meta.is_evictable,
            None => true,
        }
    }

    /// Remove an evictable frame from the replacer, splicing it out of
    /// whichever resident list holds it. No ghost entry is created. Ghost
    /// entries themselves are never removed through this API.
    ///
    /// If remove is called on a non-evictable frame, return an error. If the
    /// specified frame is not found, do nothing without return any error.
    fn remove(&mut self, frame_id: FrameId) -> Result<()> {
        assert!(frame_id < self.replacer_size, "frame id {} out of range", frame_id);
        let meta = match self.alive.get(&frame_id) {
            Some(meta) => meta,
            None => return Ok(()),
        };
        if !meta.is_evictable {
            return Err(Error::FramePinned);
        }
        let status = meta.status;
        match status {
            FrameStatus::Mru => splice(&mut self.mru, &frame_id),
            _ => splice(&mut self.mfu, &frame_id),
        }
        self.alive.remove(&frame_id);
        self.current_size -= 1;
        Ok(())
    }

    fn size(&self) -> usize {
        self.current_size
    }

    /// Move a resident frame to the front of `mfu` and refresh its page id.
    fn promote(&mut self, frame_id: FrameId, page_id: PageId) {
        // the caller checked the frame is alive, unwrap here is
        // guaranteed to not panic.
        let meta = self.alive.get(&frame_id).unwrap();
        let (old_status, old_page) = (meta.status, meta.page_id);
        match old_status {
            FrameStatus::Mru => splice(&mut self.mru, &frame_id),
            _ => splice(&mut self.mfu, &frame_id),
        }
        if old_page != page_id {
            // the frame was reloaded with another page; drop the stale
            // ghost entry so alive and ghost stay disjoint on page id.
            self.drop_ghost(page_id);
        }
        let meta = self.alive.get_mut(&frame_id).unwrap();
        meta.status = FrameStatus::Mfu;
        meta.page_id = page_id;
        self.mfu.push_front(frame_id);
    }

    /// A hit on `mru_ghost`: grow the recency target by
    /// max(1, |mfu_ghost| / |mru_ghost|), capped at the replacer size.
    fn adapt_up(&mut self) {
        let delta = match self.mru_ghost.len() {
            0 => 1,
            n => (self.mfu_ghost.len() / n).max(1),
        };
        self.mru_target_size = (self.mru_target_size + delta).min(self.replacer_size);
        debug!("arc mru target grew to {}", self.mru_target_size);
    }

    /// A hit on `mfu_ghost`: shrink the recency target by
    /// max(1, |mru_ghost| / |mfu_ghost|), saturating at zero.
    fn adapt_down(&mut self) {
        let delta = match self.mfu_ghost.len() {
            0 => 1,
            n => (self.mru_ghost.len() / n).max(1),
        };
        self.mru_target_size = self.mru_target_size.saturating_sub(delta);
        debug!("arc mru target shrank to {}", self.mru_target_size);
    }

    fn drop_ghost(&mut self, page_id: PageId) {
        if let Some(status) = self.ghosts.remove(&page_id) {
            match status {
                FrameStatus::MruGhost => splice(&mut self.mru_ghost, &page_id),
                _ => splice(&mut self.mfu_ghost, &page_id),
            }
        }
    }

    fn insert_alive(&mut self, frame_id: FrameId, page_id: PageId, status: FrameStatus) {
        match status {
            FrameStatus::Mru => self.mru.push_front(frame_id),
            _ => self.mfu.push_front(frame_id),
        }
        self.alive.insert(frame_id, FrameMeta { page_id, is_evictable: false, status });
    }

    /// Scan the given resident list from the back, the LRU end, toward the
    /// front and return the first evictable frame.
    fn find_victim(&self, side: FrameStatus) -> Option<FrameId> {
        let list = match side {
            FrameStatus::Mru => &self.mru,
            _ => &self.mfu,
        };
        list.iter().rev().copied().find(|frame_id| self.alive[frame_id].is_evictable)
    }

    fn evict_frame(&mut self, frame_id: FrameId, side: FrameStatus) {
        // find_victim only returns frames present in the alive map, unwrap
        // here is guaranteed to not panic.
        let meta = self.alive.remove(&frame_id).unwrap();
        let (list, ghost, ghost_status) = match side {
            FrameStatus::Mru => (&mut self.mru, &mut self.mru_ghost, FrameStatus::MruGhost),
            _ => (&mut self.mfu, &mut self.mfu_ghost, FrameStatus::MfuGhost),
        };
        splice(list, &frame_id);
        ghost.push_front(meta.page_id);
        self.ghosts.insert(meta.page_id, ghost_status);
        if ghost.len() > self.replacer_size {
            // the ghost list overflowed, forget its oldest page.
            if let Some(expired) = ghost.pop_back() {
                self.ghosts.remove(&expired);
            }
        }
        self.current_size -= 1;
        debug!("arc evicted frame {} holding page {}", frame_id, meta.page_id);
    }
}

/// SyncArcReplacer implements the thread-safe version of the adaptive
/// replacement cache policy, basically all the heavy lifting happens in
/// the ArcReplacer.
pub struct SyncArcReplacer {
    inner: Mutex<ArcReplacer>,
}

impl SyncArcReplacer {
    pub fn new(size: usize) -> Self {
        let inner = Mutex::new(ArcReplacer::new(size));
        SyncArcReplacer { inner }
    }
}

impl Replacer for SyncArcReplacer {
    /// Record an access of the given page in the given frame.
    fn record_access(&self, frame_id: FrameId, page_id: PageId, _access_type: AccessType) {
        let mut guard = self.inner.lock().unwrap();
        guard.record_access(frame_id, page_id)
    }

    /// Pick a victim with the adaptive policy and evict it.
    fn evict(&self) -> Option<FrameId> {
        let mut guard = self.inner.lock().unwrap();
        guard.evict()
    }

    /// Toggle whether a frame is evictable or non-evictable. This function
    /// also controls replacer size. Note that size is equal to number of
    /// evictable entries.
    fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut guard = self.inner.lock().unwrap();
        guard.set_evictable(frame_id, evictable)
    }

    /// Check if a frame is evictable. if the frame is not found, return true.
    fn is_evictable(&self, frame_id: FrameId) -> bool {
        let guard = self.inner.lock().unwrap();
        guard.is_evictable(frame_id)
    }

    /// Remove an evictable frame from the replacer without creating a ghost
    /// entry.
    fn remove(&self, frame_id: FrameId) -> Result<()> {
        let mut guard = self.inner.lock().unwrap();
        guard.remove(frame_id)
    }

    fn size(&self) -> usize {
        let guard = self.inner.lock().unwrap();
        guard.size()
    }
}
