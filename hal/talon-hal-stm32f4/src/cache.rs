//! Lazy peripheral cache
//!
//! One slot per logical peripheral, filled on first access and kept for the
//! cache's lifetime. Returned references stay valid because slots are never
//! overwritten.
//!
//! Not reentrant with respect to interrupts: resources must be created from
//! the main context only.

use core::cell::OnceCell;

/// Logical peripheral identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResourceId {
    Gpio,
    Spi1,
    Spi2,
    Spi3,
    I2c1,
    I2c2,
    Uart3,
}

impl ResourceId {
    pub const COUNT: usize = 7;

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Arena of lazily created resources keyed by [`ResourceId`]
pub struct ResourceCache<R> {
    slots: [OnceCell<R>; ResourceId::COUNT],
}

impl<R> Default for ResourceCache<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> ResourceCache<R> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| OnceCell::new()),
        }
    }

    /// Return the resource for `id`, running `create` only if it is absent
    pub fn get_or_create(&self, id: ResourceId, create: impl FnOnce() -> R) -> &R {
        self.slots[id.index()].get_or_init(create)
    }

    /// Resource for `id` if it has been created
    pub fn get(&self, id: ResourceId) -> Option<&R> {
        self.slots[id.index()].get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    #[test]
    fn test_factory_runs_once() {
        let cache = ResourceCache::new();
        let calls = Cell::new(0);

        let first = cache.get_or_create(ResourceId::Spi2, || {
            calls.set(calls.get() + 1);
            42u32
        });
        let second = cache.get_or_create(ResourceId::Spi2, || {
            calls.set(calls.get() + 1);
            7u32
        });

        assert_eq!(calls.get(), 1);
        assert_eq!(*second, 42);
        assert!(core::ptr::eq(first, second));
    }

    #[test]
    fn test_slots_are_independent() {
        let cache = ResourceCache::new();
        cache.get_or_create(ResourceId::I2c1, || 1u8);

        assert_eq!(cache.get(ResourceId::I2c1), Some(&1));
        assert_eq!(cache.get(ResourceId::I2c2), None);
        assert_eq!(*cache.get_or_create(ResourceId::I2c2, || 2u8), 2);
    }

    #[test]
    fn test_indices_are_distinct() {
        let ids = [
            ResourceId::Gpio,
            ResourceId::Spi1,
            ResourceId::Spi2,
            ResourceId::Spi3,
            ResourceId::I2c1,
            ResourceId::I2c2,
            ResourceId::Uart3,
        ];
        for (expected, id) in ids.iter().enumerate() {
            assert_eq!(id.index(), expected);
        }
        assert_eq!(ids.len(), ResourceId::COUNT);
    }
}
