//! Fixed-capacity component arenas.
//!
//! A [`ComponentPool`] stores every live instance of one component type as
//! raw bytes, packed with no holes. Slots are 16-byte aligned so the bytes
//! can be viewed back as `&T` for any registered component. Removing an
//! instance moves the last slot into the hole, which keeps iteration dense
//! but relocates one other instance. The pool's epoch counts those
//! relocations so stale slot references can be detected.

use std::collections::HashMap;

use crate::component::ComponentId;
use crate::entity::Entity;
use crate::error::DataError;

/// Slot alignment and the granularity of the slot stride.
pub const SLOT_ALIGN: usize = 16;

/// One aligned storage unit.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
struct Block([u8; SLOT_ALIGN]);

// SAFETY: `Block` is a 16-byte array with 16-byte alignment, so it has no
// padding and every bit pattern is valid.
unsafe impl bytemuck::Zeroable for Block {}
// SAFETY: see above; `Block` is `Copy` and `'static`.
unsafe impl bytemuck::Pod for Block {}

/// Round `size` up to a whole number of blocks (at least one).
const fn stride_for(size: usize) -> usize {
    let size = if size == 0 { 1 } else { size };
    size.div_ceil(SLOT_ALIGN) * SLOT_ALIGN
}

/// Contiguous storage for one component type.
#[derive(Debug)]
pub struct ComponentPool {
    id: ComponentId,
    name: String,
    size: usize,
    stride: usize,
    capacity: u32,
    blocks: Vec<Block>,
    /// `owners[slot]` is the entity bound to `slot`.
    owners: Vec<Entity>,
    index: HashMap<Entity, u32>,
    /// Variable-length payload per slot, parallel to `owners`.
    aux: Vec<Vec<u8>>,
    epoch: u64,
}

impl ComponentPool {
    /// Create an empty pool for instances of `size` bytes.
    #[must_use]
    pub fn new(id: ComponentId, name: impl Into<String>, size: usize, capacity: u32) -> Self {
        let stride = stride_for(size);
        Self {
            id,
            name: name.into(),
            size,
            stride,
            capacity,
            blocks: Vec::with_capacity(capacity as usize * stride / SLOT_ALIGN),
            owners: Vec::with_capacity(capacity as usize),
            index: HashMap::with_capacity(capacity as usize),
            aux: Vec::with_capacity(capacity as usize),
            epoch: 0,
        }
    }

    /// The component type stored here.
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Size of one instance in bytes.
    #[must_use]
    pub fn item_size(&self) -> usize {
        self.size
    }

    /// Maximum number of live instances.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of live instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Returns `true` if the pool holds no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Relocation counter, bumped by every removal.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns `true` if `entity` has an instance here.
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.index.contains_key(&entity)
    }

    /// Slot bound to `entity`.
    #[must_use]
    pub fn slot_of(&self, entity: Entity) -> Option<u32> {
        self.index.get(&entity).copied()
    }

    /// Entities in slot order.
    #[must_use]
    pub fn owners(&self) -> &[Entity] {
        &self.owners
    }

    fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.blocks)
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.blocks)
    }

    /// Bytes of `slot`.
    #[must_use]
    pub fn slot(&self, slot: u32) -> Option<&[u8]> {
        if slot as usize >= self.owners.len() {
            return None;
        }
        let start = slot as usize * self.stride;
        Some(&self.bytes()[start..start + self.size])
    }

    /// Mutable bytes of `slot`.
    #[must_use]
    pub fn slot_mut(&mut self, slot: u32) -> Option<&mut [u8]> {
        if slot as usize >= self.owners.len() {
            return None;
        }
        let start = slot as usize * self.stride;
        let size = self.size;
        Some(&mut self.bytes_mut()[start..start + size])
    }

    /// Bytes of the instance bound to `entity`.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&[u8]> {
        self.slot(self.slot_of(entity)?)
    }

    /// Mutable bytes of the instance bound to `entity`.
    #[must_use]
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut [u8]> {
        let slot = self.slot_of(entity)?;
        self.slot_mut(slot)
    }

    /// Auxiliary payload of `entity`.
    #[must_use]
    pub fn aux(&self, entity: Entity) -> Option<&[u8]> {
        let slot = self.slot_of(entity)?;
        Some(&self.aux[slot as usize])
    }

    /// Mutable auxiliary payload of `entity`.
    #[must_use]
    pub fn aux_mut(&mut self, entity: Entity) -> Option<&mut Vec<u8>> {
        let slot = self.slot_of(entity)?;
        Some(&mut self.aux[slot as usize])
    }

    /// Bind a new instance to `entity`, initialised from `bytes`.
    ///
    /// # Errors
    ///
    /// - [`DataError::SizeMismatch`] if `bytes` is not one instance long.
    /// - [`DataError::DuplicateComponent`] if `entity` already has one.
    /// - [`DataError::CapacityExceeded`] if the pool is full.
    pub fn insert(&mut self, entity: Entity, bytes: &[u8], aux: Vec<u8>) -> Result<u32, DataError> {
        if bytes.len() != self.size {
            return Err(DataError::SizeMismatch {
                component: self.name.clone(),
                expected: self.size,
                actual: bytes.len(),
            });
        }
        if self.index.contains_key(&entity) {
            return Err(DataError::DuplicateComponent {
                entity,
                component: self.name.clone(),
            });
        }
        if self.owners.len() >= self.capacity as usize {
            return Err(DataError::CapacityExceeded {
                component: self.name.clone(),
                capacity: self.capacity,
            });
        }

        let slot = self.owners.len() as u32;
        let blocks_per_slot = self.stride / SLOT_ALIGN;
        self.blocks
            .resize(self.blocks.len() + blocks_per_slot, Block([0; SLOT_ALIGN]));
        self.owners.push(entity);
        self.aux.push(aux);
        self.index.insert(entity, slot);
        if let Some(dst) = self.slot_mut(slot) {
            dst.copy_from_slice(bytes);
        }
        Ok(slot)
    }

    /// Unbind `entity`, moving the last slot into its place.
    ///
    /// Returns `false` if `entity` had no instance.
    pub fn remove(&mut self, entity: Entity) -> bool {
        let Some(slot) = self.index.remove(&entity) else {
            return false;
        };
        let slot = slot as usize;
        let last = self.owners.len() - 1;
        if slot != last {
            let stride = self.stride;
            self.bytes_mut()
                .copy_within(last * stride..(last + 1) * stride, slot * stride);
        }
        self.owners.swap_remove(slot);
        self.aux.swap_remove(slot);
        if slot != last {
            self.index.insert(self.owners[slot], slot as u32);
        }
        self.blocks.truncate(last * self.stride / SLOT_ALIGN);
        self.epoch += 1;
        true
    }

    /// Iterate `(owner, bytes)` in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &[u8])> + '_ {
        let size = self.size;
        self.bytes()
            .chunks_exact(self.stride)
            .zip(self.owners.iter())
            .map(move |(chunk, &owner)| (owner, &chunk[..size]))
    }

    /// Iterate `(owner, bytes, aux)` in slot order with mutable access.
    ///
    /// Every slot is yielded once, so the borrows are disjoint.
    pub fn slots_mut(&mut self) -> impl Iterator<Item = (Entity, &mut [u8], &mut Vec<u8>)> + '_ {
        let Self {
            blocks,
            owners,
            aux,
            size,
            stride,
            ..
        } = self;
        let size = *size;
        bytemuck::cast_slice_mut::<Block, u8>(blocks)
            .chunks_exact_mut(*stride)
            .zip(owners.iter())
            .zip(aux.iter_mut())
            .map(move |((chunk, &owner), aux)| (owner, &mut chunk[..size], aux))
    }

    /// Drop every instance.
    pub fn clear(&mut self) {
        if !self.owners.is_empty() {
            self.epoch += 1;
        }
        self.blocks.clear();
        self.owners.clear();
        self.aux.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(capacity: u32) -> ComponentPool {
        ComponentPool::new(ComponentId::from_name("Test"), "Test", 4, capacity)
    }

    fn value(pool: &ComponentPool, entity: Entity) -> u32 {
        bytemuck::pod_read_unaligned(pool.get(entity).unwrap())
    }

    #[test]
    fn test_stride_is_block_aligned() {
        assert_eq!(stride_for(0), 16);
        assert_eq!(stride_for(4), 16);
        assert_eq!(stride_for(16), 16);
        assert_eq!(stride_for(17), 32);
    }

    #[test]
    fn test_slots_are_aligned() {
        let mut p = pool(4);
        for i in 0..4 {
            p.insert(Entity::new(i), &i.to_le_bytes(), Vec::new()).unwrap();
        }
        for slot in 0..4 {
            let ptr = p.slot(slot).unwrap().as_ptr();
            assert_eq!(ptr as usize % SLOT_ALIGN, 0);
        }
    }

    #[test]
    fn test_insert_and_capacity() {
        let mut p = pool(2);
        p.insert(Entity::new(0), &1u32.to_le_bytes(), Vec::new()).unwrap();
        p.insert(Entity::new(1), &2u32.to_le_bytes(), Vec::new()).unwrap();
        let err = p
            .insert(Entity::new(2), &3u32.to_le_bytes(), Vec::new())
            .unwrap_err();
        assert!(matches!(err, DataError::CapacityExceeded { capacity: 2, .. }));
        assert_eq!(p.len(), 2);
        assert!(!p.contains(Entity::new(2)));
    }

    #[test]
    fn test_duplicate_and_size_mismatch() {
        let mut p = pool(4);
        p.insert(Entity::new(0), &1u32.to_le_bytes(), Vec::new()).unwrap();
        assert!(matches!(
            p.insert(Entity::new(0), &1u32.to_le_bytes(), Vec::new()),
            Err(DataError::DuplicateComponent { .. })
        ));
        assert!(matches!(
            p.insert(Entity::new(1), &[0u8; 3], Vec::new()),
            Err(DataError::SizeMismatch { expected: 4, actual: 3, .. })
        ));
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn test_swap_remove_keeps_index_consistent() {
        let mut p = pool(8);
        for i in 0..4u32 {
            p.insert(Entity::new(i), &(i * 10).to_le_bytes(), vec![i as u8])
                .unwrap();
        }
        let epoch = p.epoch();
        assert!(p.remove(Entity::new(1)));
        assert!(p.epoch() > epoch);

        // Entity 3 moved into slot 1.
        assert_eq!(p.slot_of(Entity::new(3)), Some(1));
        assert_eq!(value(&p, Entity::new(3)), 30);
        assert_eq!(p.aux(Entity::new(3)).unwrap(), &[3]);
        assert_eq!(value(&p, Entity::new(0)), 0);
        assert_eq!(value(&p, Entity::new(2)), 20);
        assert!(p.get(Entity::new(1)).is_none());
        assert_eq!(p.len(), 3);
        assert!(!p.remove(Entity::new(1)));
    }

    #[test]
    fn test_clone_ids_are_distinct_keys() {
        let mut p = pool(4);
        p.insert(Entity::with_clone(5, 0), &1u32.to_le_bytes(), Vec::new())
            .unwrap();
        p.insert(Entity::with_clone(5, 1), &2u32.to_le_bytes(), Vec::new())
            .unwrap();
        assert_eq!(value(&p, Entity::with_clone(5, 0)), 1);
        assert_eq!(value(&p, Entity::with_clone(5, 1)), 2);
    }

    #[test]
    fn test_slots_mut_visits_each_slot_once() {
        let mut p = pool(4);
        for i in 0..3u32 {
            p.insert(Entity::new(i), &i.to_le_bytes(), Vec::new()).unwrap();
        }
        for (owner, bytes, aux) in p.slots_mut() {
            bytes.copy_from_slice(&(owner.id + 100).to_le_bytes());
            aux.push(1);
        }
        let seen: Vec<_> = p.iter().map(|(e, b)| (e.id, b.to_vec())).collect();
        assert_eq!(seen.len(), 3);
        for (id, bytes) in seen {
            assert_eq!(bytes, (id + 100).to_le_bytes());
        }
        assert_eq!(p.aux(Entity::new(2)).unwrap(), &[1]);
    }

    #[test]
    fn test_clear_resets_pool() {
        let mut p = pool(4);
        p.insert(Entity::new(0), &1u32.to_le_bytes(), Vec::new()).unwrap();
        p.clear();
        assert!(p.is_empty());
        assert!(p.get(Entity::new(0)).is_none());
        assert_eq!(p.epoch(), 1);
    }
}
