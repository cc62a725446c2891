//! # Handle Registry
//!
//! Opaque handles for containers, keys and hash objects.
//!
//! ## Layout
//!
//! Two generation-checked arenas:
//!
//! - **handle slots** name an object slot. Every handle value is distinct.
//! - **object slots** hold the object plus a reference count.
//!
//! Copying a reference allocates a new handle slot pointing at the same
//! object. Releasing a handle frees its slot and drops one reference; the
//! object is dropped with its last reference.
//!
//! A raw handle packs `tag:8 | generation:24 | index+1:32`. The tag keeps a
//! key handle from resolving in the hash registry, the generation keeps a
//! released handle from resolving after its slot is reused.

use std::marker::PhantomData;

use crate::domain::errors::{CspError, CspResult, HandleKind};

const GENERATION_MASK: u32 = 0x00ff_ffff;

/// Index plus generation into a [`SlotArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Arena with slot reuse and generation checks.
#[derive(Debug)]
struct SlotArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> SlotArena<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    fn insert(&mut self, value: T) -> SlotId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return SlotId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        SlotId {
            index,
            generation: 0,
        }
    }

    fn get(&self, id: SlotId) -> Option<&T> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    fn remove(&mut self, id: SlotId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = (slot.generation + 1) & GENERATION_MASK;
        self.free.push(id.index);
        self.live -= 1;
        Some(value)
    }
}

// =============================================================================
// TYPED HANDLES
// =============================================================================

/// Marker for the object type a handle names.
pub trait HandleTag {
    const TAG: u8;
    const KIND: HandleKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerTag {}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyTag {}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashTag {}

impl HandleTag for ContainerTag {
    const TAG: u8 = 0x11;
    const KIND: HandleKind = HandleKind::Container;
}

impl HandleTag for KeyTag {
    const TAG: u8 = 0x22;
    const KIND: HandleKind = HandleKind::Key;
}

impl HandleTag for HashTag {
    const TAG: u8 = 0x33;
    const KIND: HandleKind = HandleKind::Hash;
}

/// Opaque handle value, typed by the registry it belongs to.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Handle<T> {
    raw: u64,
    _tag: PhantomData<T>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T: HandleTag> Handle<T> {
    fn from_slot(id: SlotId) -> Self {
        let raw = (u64::from(T::TAG) << 56)
            | (u64::from(id.generation & GENERATION_MASK) << 32)
            | u64::from(id.index + 1);
        Self::from_raw(raw)
    }

    fn slot(self) -> Option<SlotId> {
        if (self.raw >> 56) as u8 != T::TAG {
            return None;
        }
        let index = (self.raw & 0xffff_ffff) as u32;
        if index == 0 {
            return None;
        }
        Some(SlotId {
            index: index - 1,
            generation: ((self.raw >> 32) as u32) & GENERATION_MASK,
        })
    }
}

impl<T> Handle<T> {
    /// Rebuild a handle from its integer form.
    pub fn from_raw(raw: u64) -> Self {
        Self {
            raw,
            _tag: PhantomData,
        }
    }

    /// Integer form handed across a binding boundary.
    pub fn raw(self) -> u64 {
        self.raw
    }
}

pub type ContainerHandle = Handle<ContainerTag>;
pub type KeyHandle = Handle<KeyTag>;
pub type HashHandle = Handle<HashTag>;

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Debug)]
struct Counted<V> {
    refs: usize,
    value: V,
}

/// Reference-counted object store addressed by typed handles.
#[derive(Debug)]
pub struct HandleRegistry<T: HandleTag, V> {
    handles: SlotArena<SlotId>,
    objects: SlotArena<Counted<V>>,
    capacity: usize,
    _tag: PhantomData<T>,
}

impl<T: HandleTag, V> HandleRegistry<T, V> {
    /// Registry refusing to hold more than `capacity` live handles.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            handles: SlotArena::new(),
            objects: SlotArena::new(),
            capacity,
            _tag: PhantomData,
        }
    }

    fn resolve(&self, handle: Handle<T>) -> Option<SlotId> {
        handle.slot().and_then(|id| self.handles.get(id).copied())
    }

    fn bad_handle() -> CspError {
        CspError::BadHandle(T::KIND)
    }

    fn alloc_handle(&mut self, object: SlotId) -> CspResult<Handle<T>> {
        if self.handles.live >= self.capacity {
            return Err(CspError::NoMemory);
        }
        Ok(Handle::from_slot(self.handles.insert(object)))
    }

    /// Store a new object with one reference.
    pub fn create(&mut self, value: V) -> CspResult<Handle<T>> {
        if self.handles.live >= self.capacity {
            return Err(CspError::NoMemory);
        }
        let object = self.objects.insert(Counted { refs: 1, value });
        self.alloc_handle(object)
    }

    pub fn is_valid(&self, handle: Handle<T>) -> bool {
        self.resolve(handle)
            .and_then(|id| self.objects.get(id))
            .is_some()
    }

    pub fn get(&self, handle: Handle<T>) -> CspResult<&V> {
        self.resolve(handle)
            .and_then(|id| self.objects.get(id))
            .map(|counted| &counted.value)
            .ok_or_else(Self::bad_handle)
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> CspResult<&mut V> {
        let id = self.resolve(handle).ok_or_else(Self::bad_handle)?;
        self.objects
            .get_mut(id)
            .map(|counted| &mut counted.value)
            .ok_or_else(Self::bad_handle)
    }

    /// New handle naming the same object; the object gains a reference.
    pub fn copy_reference(&mut self, handle: Handle<T>) -> CspResult<Handle<T>> {
        let id = self.resolve(handle).ok_or_else(Self::bad_handle)?;
        let copy = self.alloc_handle(id)?;
        if let Some(counted) = self.objects.get_mut(id) {
            counted.refs += 1;
        }
        Ok(copy)
    }

    /// Drop one handle. Returns the object when its last reference went away.
    pub fn release(&mut self, handle: Handle<T>) -> CspResult<Option<V>> {
        let slot = handle.slot().ok_or_else(Self::bad_handle)?;
        let id = self.handles.remove(slot).ok_or_else(Self::bad_handle)?;
        let remaining = match self.objects.get_mut(id) {
            Some(counted) => {
                counted.refs -= 1;
                counted.refs
            }
            None => return Err(Self::bad_handle()),
        };
        if remaining == 0 {
            Ok(self.objects.remove(id).map(|counted| counted.value))
        } else {
            Ok(None)
        }
    }

    /// Handles whose object matches `predicate`.
    pub fn handles_where(&self, mut predicate: impl FnMut(&V) -> bool) -> Vec<Handle<T>> {
        self.handles
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let object = slot.value?;
                let counted = self.objects.get(object)?;
                predicate(&counted.value).then(|| {
                    Handle::from_slot(SlotId {
                        index: index as u32,
                        generation: slot.generation,
                    })
                })
            })
            .collect()
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.handles.live
    }

    pub fn is_empty(&self) -> bool {
        self.handles.live == 0
    }
}
