//! Direction-aware two-array frame cache.
//!
//! The cache holds two fixed-capacity arrays of decoded frames. At any time
//! one array is designated *forward* (the run the reader is moving into when
//! playing ahead) and the other *backward*. Each array holds one contiguous,
//! strictly increasing run of frame indices, and the two runs never overlap.
//!
//! The cache itself is policy-free: the reader decides which array to refill
//! and which role it gets afterwards.

use std::ops::RangeInclusive;

use crate::pixel_buffer::PixelBuffer;

/// Number of slots in each of the two arrays.
pub const CACHE_CAPACITY: usize = 16;

/// Direction designation of a cache array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The array the reader fills when moving to higher indices.
    Forward,
    /// The array the reader fills when moving to lower indices.
    Backward,
}

impl Role {
    /// The other role.
    pub fn opposite(self) -> Self {
        match self {
            Role::Forward => Role::Backward,
            Role::Backward => Role::Forward,
        }
    }
}

/// Identity of one of the two arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayId {
    First,
    Second,
}

impl ArrayId {
    /// The other array.
    pub fn other(self) -> Self {
        match self {
            ArrayId::First => ArrayId::Second,
            ArrayId::Second => ArrayId::First,
        }
    }

    fn slot(self) -> usize {
        match self {
            ArrayId::First => 0,
            ArrayId::Second => 1,
        }
    }
}

/// Order in which an array's slots are scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    /// Slot 0 first.
    Ascending,
    /// Last occupied slot first.
    Descending,
}

/// A cached frame and the index it was decoded for.
#[derive(Debug, Clone)]
pub struct CacheSlot {
    /// Frame index of the cached frame.
    pub frame_index: u64,
    /// The frame's pixels.
    pub frame: PixelBuffer,
}

#[derive(Debug)]
struct CacheArray {
    slots: [Option<CacheSlot>; CACHE_CAPACITY],
}

impl CacheArray {
    fn empty() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    fn occupied(&self) -> impl DoubleEndedIterator<Item = &CacheSlot> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    fn find(&self, frame_index: u64, order: ScanOrder) -> Option<&PixelBuffer> {
        let matches = |slot: &&CacheSlot| slot.frame_index == frame_index;
        let slot = match order {
            ScanOrder::Ascending => self.occupied().find(matches),
            ScanOrder::Descending => self.occupied().rev().find(matches),
        };
        slot.map(|slot| &slot.frame)
    }

    fn range(&self) -> Option<RangeInclusive<u64>> {
        let first = self.occupied().next()?.frame_index;
        let last = self.occupied().last()?.frame_index;
        Some(first..=last)
    }

    fn len(&self) -> usize {
        self.occupied().count()
    }
}

/// Two fixed-capacity arrays of decoded frames with forward/backward roles.
///
/// ```
/// use vidscrub::{ArrayId, FrameCache, PixelBuffer, Role};
///
/// let mut cache = FrameCache::new();
/// let frame = PixelBuffer::new(1, 1, 3, vec![0, 0, 0])?;
/// cache.fill(ArrayId::Second, [(7, frame)]);
/// cache.assign(ArrayId::Second, Role::Forward);
///
/// assert!(cache.contains(7));
/// assert_eq!(cache.array_for(Role::Forward), ArrayId::Second);
/// # Ok::<(), vidscrub::ScrubError>(())
/// ```
#[derive(Debug)]
pub struct FrameCache {
    arrays: [CacheArray; 2],
    forward: ArrayId,
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCache {
    /// An empty cache with [`ArrayId::First`] designated forward.
    pub fn new() -> Self {
        Self {
            arrays: [CacheArray::empty(), CacheArray::empty()],
            forward: ArrayId::First,
        }
    }

    fn array(&self, id: ArrayId) -> &CacheArray {
        &self.arrays[id.slot()]
    }

    /// Find a frame in either array, first array first.
    pub fn lookup(&self, frame_index: u64) -> Option<&PixelBuffer> {
        [ArrayId::First, ArrayId::Second]
            .into_iter()
            .find_map(|id| self.array(id).find(frame_index, ScanOrder::Ascending))
    }

    /// Find a frame, scanning the array holding `first` before the other one,
    /// each in `order`.
    pub fn lookup_from(
        &self,
        frame_index: u64,
        first: Role,
        order: ScanOrder,
    ) -> Option<&PixelBuffer> {
        let preferred = self.array_for(first);
        self.array(preferred)
            .find(frame_index, order)
            .or_else(|| self.array(preferred.other()).find(frame_index, order))
    }

    /// Whether either array holds `frame_index`.
    pub fn contains(&self, frame_index: u64) -> bool {
        self.locate(frame_index).is_some()
    }

    /// The array holding `frame_index`, if any.
    pub fn locate(&self, frame_index: u64) -> Option<ArrayId> {
        [ArrayId::First, ArrayId::Second]
            .into_iter()
            .find(|&id| {
                self.array(id)
                    .occupied()
                    .any(|slot| slot.frame_index == frame_index)
            })
    }

    /// Replace the contents of `id` with `frames`, starting at slot 0.
    ///
    /// The previous contents are always dropped, even when `frames` is
    /// shorter. Frames past [`CACHE_CAPACITY`], or whose index does not
    /// strictly increase, are rejected. Returns the number stored.
    pub fn fill<I>(&mut self, id: ArrayId, frames: I) -> usize
    where
        I: IntoIterator<Item = (u64, PixelBuffer)>,
    {
        let mut array = CacheArray::empty();
        let mut stored = 0;
        let mut previous: Option<u64> = None;

        for (frame_index, frame) in frames {
            if stored == CACHE_CAPACITY {
                log::warn!("Cache array {id:?} is full, dropping frame {frame_index}");
                continue;
            }
            if previous.is_some_and(|previous| frame_index <= previous) {
                log::warn!(
                    "Frame {frame_index} does not follow {previous:?} in cache array {id:?}, dropping it"
                );
                continue;
            }
            array.slots[stored] = Some(CacheSlot { frame_index, frame });
            previous = Some(frame_index);
            stored += 1;
        }

        self.arrays[id.slot()] = array;
        stored
    }

    /// Swap which array is forward and which is backward.
    pub fn swap_forward_designation(&mut self) {
        self.forward = self.forward.other();
    }

    /// The array currently holding `role`.
    pub fn array_for(&self, role: Role) -> ArrayId {
        match role {
            Role::Forward => self.forward,
            Role::Backward => self.forward.other(),
        }
    }

    /// The role currently held by `id`.
    pub fn role_of(&self, id: ArrayId) -> Role {
        if id == self.forward {
            Role::Forward
        } else {
            Role::Backward
        }
    }

    /// Give `id` the role `role`; the other array takes the opposite one.
    pub fn assign(&mut self, id: ArrayId, role: Role) {
        if self.role_of(id) != role {
            self.swap_forward_designation();
        }
    }

    /// Frame indices held by `id`, or `None` if it is empty.
    pub fn range(&self, id: ArrayId) -> Option<RangeInclusive<u64>> {
        self.array(id).range()
    }

    /// Frame indices held by the array currently holding `role`.
    pub fn range_for(&self, role: Role) -> Option<RangeInclusive<u64>> {
        self.range(self.array_for(role))
    }

    /// Number of occupied slots in `id`.
    pub fn len(&self, id: ArrayId) -> usize {
        self.array(id).len()
    }

    /// Occupied slots of `id` in slot order.
    pub fn slots(&self, id: ArrayId) -> impl Iterator<Item = &CacheSlot> {
        self.array(id).occupied()
    }
}
