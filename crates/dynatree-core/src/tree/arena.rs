use std::marker::PhantomData;

/// Index types an arena can hand out.
pub trait ArenaId: Copy + From<usize> {
    fn index(&self) -> usize;
}

impl ArenaId for crate::tree::ids::NodeId {
    fn index(&self) -> usize {
        crate::tree::ids::NodeId::index(self)
    }
}

impl ArenaId for crate::tree::ids::ActionNodeId {
    fn index(&self) -> usize {
        crate::tree::ids::ActionNodeId::index(self)
    }
}

/// Holds all items and allows for fast allocation and is cache friendly.
/// Items are never freed one by one; the whole arena is dropped with the tree,
/// or shrunk back to an earlier length when an iteration is abandoned.
#[derive(Debug, Clone)]
pub(crate) struct Arena<I, T> {
    storage: Vec<T>,
    _id: PhantomData<I>,
}

impl<I: ArenaId, T> Arena<I, T> {
    /// Create a new empty storage
    pub fn new() -> Self {
        Arena {
            storage: Vec::new(),
            _id: PhantomData,
        }
    }

    /// Allocate a new item to the storage and return the associated id
    pub fn allocate(&mut self, item: T) -> I {
        let id = I::from(self.storage.len());
        self.storage.push(item);
        id
    }

    /// Retrieve an associated item from the Arena
    pub fn get(&self, id: I) -> Option<&T> {
        self.storage.get(id.index())
    }

    /// Retrieve an associated item from the Arena as a mutable borrow
    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.storage.get_mut(id.index())
    }

    /// Check the length of the Arena
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Drop every item allocated at or after `len`.
    pub fn truncate(&mut self, len: usize) {
        self.storage.truncate(len);
    }

    /// Remove and return every item allocated at or after `len`.
    pub fn split_off(&mut self, len: usize) -> Vec<T> {
        if len >= self.storage.len() {
            return Vec::new();
        }
        self.storage.split_off(len)
    }

    /// Iterate items together with their ids.
    pub fn iter_with_ids(&self) -> impl Iterator<Item = (I, &T)> {
        self.storage
            .iter()
            .enumerate()
            .map(|(idx, item)| (I::from(idx), item))
    }
}
