//! Entity handles and the generational handle allocator.
//!
//! An [`Entity`] pairs a dense slot *index* with a *generation* counter. The
//! [`EntityAllocator`] owns one generation per slot: destroying an entity bumps
//! that slot's generation, so every handle issued for the slot before the
//! destroy stops validating without anyone having to be told.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::error::EcsError;

/// Largest generation a slot can carry. Destroying an entity whose slot sits
/// at this generation wraps the slot back to generation 0.
///
/// After a wrap, a handle issued `2^32` reuses ago for the same index would
/// validate again. At practical entity churn this never happens within a
/// session.
pub const GENERATION_MAX: u32 = u32::MAX;

/// A generational entity handle.
///
/// Packed into a `u64`: the lower 32 bits are the slot index, the upper 32
/// bits the generation. Handles are plain values; they carry no data and do
/// not keep anything alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(u64);

impl Entity {
    /// A handle that never validates against any allocator.
    pub const NULL: Entity = Entity(u64::MAX);

    /// Build a handle from its index and generation.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | index as u64)
    }

    /// Rebuild a handle from [`Entity::to_bits`].
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// The packed `u64` form of this handle.
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Slot index in the allocator.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Generation the slot had when this handle was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Returns `true` for [`Entity::NULL`].
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "Entity(null)")
        } else {
            write!(f, "Entity({}v{})", self.index(), self.generation())
        }
    }
}

/// Generational slot table that issues and retires [`Entity`] handles.
///
/// Freed indices go onto a min-heap so `create` always reuses the lowest
/// available index.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    /// Current generation per slot.
    generations: Vec<u32>,
    /// Whether the slot currently holds a live entity.
    alive: Vec<bool>,
    /// Free slot indices, lowest first.
    free: BinaryHeap<Reverse<u32>>,
    live: usize,
}

impl EntityAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty allocator with room for `capacity` slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            generations: Vec::with_capacity(capacity),
            alive: Vec::with_capacity(capacity),
            free: BinaryHeap::new(),
            live: 0,
        }
    }

    /// Issues a new handle.
    ///
    /// # Panics
    ///
    /// Panics if all `u32::MAX` slot indices are live. Index `u32::MAX` is
    /// never handed out so no handle can collide with [`Entity::NULL`].
    pub fn create(&mut self) -> Entity {
        let index = match self.free.pop() {
            Some(Reverse(index)) => index,
            None => {
                let index = u32::try_from(self.generations.len())
                    .ok()
                    .filter(|&i| i < u32::MAX)
                    .unwrap_or_else(|| panic!("entity slot table exhausted"));
                self.generations.push(0);
                self.alive.push(false);
                index
            }
        };

        let slot = index as usize;
        self.alive[slot] = true;
        self.live += 1;
        Entity::new(index, self.generations[slot])
    }

    /// Retires a handle, bumping its slot generation and freeing the index.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleHandle`] if the handle was already destroyed
    /// or never issued by this allocator.
    pub fn destroy(&mut self, entity: Entity) -> Result<(), EcsError> {
        if !self.is_valid(entity) {
            return Err(EcsError::StaleHandle(entity));
        }

        let slot = entity.index() as usize;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.alive[slot] = false;
        self.free.push(Reverse(entity.index()));
        self.live -= 1;
        Ok(())
    }

    /// Returns `true` while `entity` refers to the live occupant of its slot.
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        let slot = entity.index() as usize;
        slot < self.generations.len()
            && self.alive[slot]
            && self.generations[slot] == entity.generation()
    }

    /// Number of live entities.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Number of slots ever allocated (live or free).
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.generations.len()
    }

    /// Iterates live handles in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .zip(&self.generations)
            .enumerate()
            .filter(|(_, (alive, _))| **alive)
            .map(|(index, (_, &generation))| Entity::new(index as u32, generation))
    }
}
