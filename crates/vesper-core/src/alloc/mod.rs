//! Allocation and collection types shared by the Vesper crates.
//!
//! - Re-exports of hash collections using AHash
//! - [`SlotArena`], a generational arena handing out stable [`SlotId`]s

pub mod slot_arena;

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};
pub use slot_arena::{SlotArena, SlotId};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashmap_ahash() {
        let mut map = HashMap::new();
        map.insert("key", "value");
        assert_eq!(map.get("key"), Some(&"value"));
    }

    #[test]
    fn test_hashset_ahash() {
        let mut set = HashSet::new();
        set.insert(42);
        assert!(set.contains(&42));
    }
}
