use crate::profiling::profile_function;
use std::num::NonZeroU64;

/// Generational handle into a [`SlotArena`].
///
/// The high 32 bits hold the generation, the low 32 bits the slot index + 1,
/// so a handle is never zero and `Option<SlotId>` costs nothing extra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(NonZeroU64);

impl SlotId {
    pub fn new(generation: u32, idx: u32) -> Self {
        let raw = ((generation as u64) << 32) | (idx as u64 + 1);
        // Low word is idx + 1, which is at least 1.
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    pub fn generation(&self) -> u32 {
        (self.0.get() >> 32) as u32
    }

    pub fn index(&self) -> u32 {
        (self.0.get() & u32::MAX as u64) as u32 - 1
    }
}

struct Slot<T> {
    generation: u32,
    data: Option<T>,
}

/// Owning arena with stable, generation-checked identifiers.
///
/// Removing a value bumps its slot's generation, so stale ids resolve to
/// `None` instead of aliasing whatever reuses the slot.
pub struct SlotArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> SlotArena<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, data: T) -> SlotId {
        profile_function!();
        self.len += 1;
        if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.data = Some(data);
            SlotId::new(slot.generation, idx)
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                data: Some(data),
            });
            SlotId::new(0, idx)
        }
    }

    /// Insert a value that needs to know its own id.
    pub fn insert_with(&mut self, make: impl FnOnce(SlotId) -> T) -> SlotId {
        let id = match self.free.last() {
            Some(&idx) => SlotId::new(self.slots[idx as usize].generation, idx),
            None => SlotId::new(0, self.slots.len() as u32),
        };
        let inserted = self.insert(make(id));
        debug_assert_eq!(id, inserted);
        inserted
    }

    fn slot(&self, id: SlotId) -> Option<&Slot<T>> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.slot(id).and_then(|slot| slot.data.as_ref())
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.data.as_mut())
    }

    pub fn contains(&self, id: SlotId) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        profile_function!();
        let index = id.index();
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        let data = slot.data.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Some(data)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn ids(&self) -> Vec<SlotId> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &T)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.data
                .as_ref()
                .map(|data| (SlotId::new(slot.generation, idx as u32), data))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotId, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(idx, slot)| {
            let generation = slot.generation;
            slot.data
                .as_mut()
                .map(|data| (SlotId::new(generation, idx as u32), data))
        })
    }
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_eq_size!(SlotId, Option<SlotId>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut arena = SlotArena::<u8>::new();
        let id = arena.insert(15);
        assert_eq!(id.generation(), 0);
        assert_eq!(id.index(), 0);
        assert_eq!(arena.get(id), Some(&15));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_stale_id_resolves_to_none() {
        let mut arena = SlotArena::<u8>::new();
        let _ = arena.insert(15);
        let stale = SlotId::new(1, 0);
        assert!(arena.get(stale).is_none());
        assert!(arena.remove(stale).is_none());
    }

    #[test]
    fn test_remove_reuses_slot_with_new_generation() {
        let mut arena = SlotArena::<u8>::new();
        let id = arena.insert(15);
        assert_eq!(arena.remove(id), Some(15));
        assert!(arena.is_empty());
        let new_id = arena.insert(45);
        assert_eq!(id.index(), new_id.index());
        assert_ne!(id.generation(), new_id.generation());
        assert!(arena.get(id).is_none());
    }

    #[test]
    fn test_insert_with_sees_own_id() {
        let mut arena = SlotArena::<SlotId>::new();
        let a = arena.insert_with(|id| id);
        arena.remove(a);
        let b = arena.insert_with(|id| id);
        assert_eq!(arena.get(b), Some(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_iter_skips_removed() {
        let mut arena = SlotArena::<u8>::new();
        let ids: Vec<_> = (0..100).map(|i| arena.insert(i)).collect();
        arena.remove(ids[0]);
        arena.remove(ids[1]);
        let collected: Vec<_> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(collected.len(), 98);
        assert_eq!(collected[0], 2);
    }
}
