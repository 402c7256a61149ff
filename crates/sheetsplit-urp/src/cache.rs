//! The 256-entry type/OID/TID caches both sides of a URP bridge maintain.
//!
//! The writer decides which slot a value goes into and tells the reader; the
//! reader just stores what it is told. A slot index of `0xFFFF` means "not
//! cached".

use crate::error::{Result, UrpError};
use crate::types::Type;

pub const CACHE_SIZE: usize = 256;

/// Slot index meaning "this value is not cached".
pub const NO_CACHE: u16 = 0xFFFF;

/// Where a value lives in the peer's cache and whether the value itself is
/// sent along (`fresh`) or only referenced by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSlot {
    pub index: u16,
    pub fresh: bool,
}

impl CacheSlot {
    /// Value sent inline, not remembered by the peer.
    pub const UNCACHED: CacheSlot = CacheSlot {
        index: NO_CACHE,
        fresh: true,
    };

    pub fn is_cached(self) -> bool {
        self.index != NO_CACHE
    }
}

fn empty_slots<T>() -> Box<[Option<T>]> {
    (0..CACHE_SIZE).map(|_| None).collect()
}

/// Writer-side mirror of the peer's cache, with round-robin eviction.
pub struct OutboundCache<T> {
    entries: Box<[Option<T>]>,
    next: usize,
}

impl<T: PartialEq + Clone> OutboundCache<T> {
    pub fn new() -> Self {
        Self {
            entries: empty_slots(),
            next: 0,
        }
    }

    /// Find `value` in the cache, or claim the next slot for it.
    pub fn slot_for(&mut self, value: &T) -> CacheSlot {
        if let Some(index) = self.entries.iter().position(|e| e.as_ref() == Some(value)) {
            return CacheSlot {
                index: index as u16,
                fresh: false,
            };
        }
        let index = self.next;
        self.entries[index] = Some(value.clone());
        self.next = (self.next + 1) % CACHE_SIZE;
        CacheSlot {
            index: index as u16,
            fresh: true,
        }
    }
}

impl<T: PartialEq + Clone> Default for OutboundCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader-side cache: a plain table of slots filled on the writer's instruction.
pub struct InboundCache<T> {
    slots: Box<[Option<T>]>,
}

impl<T: Clone> InboundCache<T> {
    pub fn new() -> Self {
        Self {
            slots: empty_slots(),
        }
    }

    pub fn store(&mut self, index: u16, value: T) {
        if let Some(slot) = self.slots.get_mut(index as usize) {
            *slot = Some(value);
        }
    }

    pub fn load(&self, index: u16, what: &str) -> Result<T> {
        self.slots
            .get(index as usize)
            .and_then(|slot| slot.clone())
            .ok_or_else(|| UrpError::Cache(format!("no {what} in slot {index}")))
    }
}

impl<T: Clone> Default for InboundCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The caches shared between message headers and message bodies on the
/// reading side. Types and OIDs that appear inside a body (an `any`, an
/// interface reference) use the same tables as the header.
#[derive(Default)]
pub struct InboundTables {
    pub types: InboundCache<Type>,
    pub oids: InboundCache<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_reuses_existing_slot() {
        let mut cache = OutboundCache::new();
        let first = cache.slot_for(&"doc".to_string());
        assert_eq!(first, CacheSlot { index: 0, fresh: true });

        let again = cache.slot_for(&"doc".to_string());
        assert_eq!(again, CacheSlot { index: 0, fresh: false });

        let other = cache.slot_for(&"sheets".to_string());
        assert_eq!(other, CacheSlot { index: 1, fresh: true });
    }

    #[test]
    fn outbound_wraps_around() {
        let mut cache = OutboundCache::new();
        for i in 0..CACHE_SIZE {
            cache.slot_for(&i);
        }
        // Slot 0 gets recycled for the 257th distinct value.
        let slot = cache.slot_for(&CACHE_SIZE);
        assert_eq!(slot, CacheSlot { index: 0, fresh: true });
        // ...which evicts the value that used to live there.
        assert!(cache.slot_for(&0).fresh);
    }

    #[test]
    fn inbound_miss_is_an_error() {
        let mut cache = InboundCache::new();
        cache.store(3, "oid".to_string());
        assert_eq!(cache.load(3, "OID").unwrap(), "oid");
        assert!(matches!(cache.load(4, "OID"), Err(UrpError::Cache(_))));
        assert!(cache.load(NO_CACHE, "OID").is_err());
    }

    #[test]
    fn caches_keep_their_slots_off_the_stack() {
        assert!(std::mem::size_of::<OutboundCache<Type>>() <= 32);
        assert!(std::mem::size_of::<InboundTables>() <= 64);
    }
}
