//! Content-addressed chunk store.

use crate::chunk::{Chunk, ChunkId, Lifetime};
use crate::error::{ChunkError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
struct Entry {
    chunk: Arc<Chunk>,
    lifetime: Lifetime,
    /// Persistent registrations not yet deleted. Zero for transient entries.
    refs: usize,
    /// Child slots of stored nodes that name this chunk.
    parents: usize,
    /// Deleted while still a child of a stored node.
    released: bool,
    /// Bytes of the whole tree rooted here, shared subtrees counted per use.
    tree_bytes: usize,
}

/// Thread-safe map from content address to chunk.
///
/// Registering equal content twice yields the same id and one stored
/// copy. Persistent registrations are counted and each needs its own
/// [`remove`](ChunkStore::remove); a persistent registration of a
/// transient chunk promotes it.
///
/// A stored node keeps its children alive: removing a chunk that some
/// stored node still names only releases it, and it goes once the last
/// such node does.
#[derive(Debug, Default)]
pub struct ChunkStore {
    chunks: RwLock<HashMap<ChunkId, Entry>>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, chunk: Chunk, lifetime: Lifetime) -> ChunkId {
        let id = chunk.id();
        let mut chunks = self.chunks.write();
        if !chunks.contains_key(&id) {
            let mut tree_bytes = chunk.size_in_bytes();
            if let Some(children) = children_of(&chunk) {
                for child in children {
                    if let Some(entry) = chunks.get_mut(child) {
                        entry.parents += 1;
                        tree_bytes += entry.tree_bytes;
                    }
                }
            }
            chunks.insert(
                id,
                Entry {
                    chunk: Arc::new(chunk),
                    lifetime: Lifetime::Transient,
                    refs: 0,
                    parents: 0,
                    released: false,
                    tree_bytes,
                },
            );
        }
        if let Some(entry) = chunks.get_mut(&id) {
            entry.released = false;
            if lifetime == Lifetime::Persistent {
                entry.lifetime = Lifetime::Persistent;
                entry.refs += 1;
            }
        }
        id
    }

    /// Register one more persistent reference to a stored chunk.
    pub fn persist(&self, id: &ChunkId) -> Result<()> {
        let mut chunks = self.chunks.write();
        let entry = chunks.get_mut(id).ok_or(ChunkError::UnknownChunk(*id))?;
        entry.lifetime = Lifetime::Persistent;
        entry.refs += 1;
        entry.released = false;
        Ok(())
    }

    pub fn get(&self, id: &ChunkId) -> Result<Arc<Chunk>> {
        self.chunks
            .read()
            .get(id)
            .map(|e| Arc::clone(&e.chunk))
            .ok_or(ChunkError::UnknownChunk(*id))
    }

    pub fn contains(&self, id: &ChunkId) -> bool {
        self.chunks.read().contains_key(id)
    }

    pub fn lifetime(&self, id: &ChunkId) -> Option<Lifetime> {
        self.chunks.read().get(id).map(|e| e.lifetime)
    }

    /// Drop one persistent reference, or a transient chunk outright.
    ///
    /// A chunk still named by a stored node is only released; it is
    /// dropped together with the last node that holds it. Returns `true`
    /// once the chunk is gone from the store.
    pub fn remove(&self, id: &ChunkId) -> Result<bool> {
        let mut chunks = self.chunks.write();
        let entry = chunks.get_mut(id).ok_or(ChunkError::UnknownChunk(*id))?;
        if entry.lifetime == Lifetime::Persistent && entry.refs > 1 {
            entry.refs -= 1;
            return Ok(false);
        }
        if entry.parents > 0 {
            entry.lifetime = Lifetime::Transient;
            entry.refs = 0;
            entry.released = true;
            return Ok(false);
        }
        drop_tree(&mut chunks, *id);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes held directly by all stored chunks.
    pub fn size_in_bytes(&self) -> usize {
        self.chunks
            .read()
            .values()
            .map(|e| e.chunk.size_in_bytes())
            .sum()
    }

    /// Bytes of the whole matrix tree rooted at `id`.
    pub fn tree_size_in_bytes(&self, id: &ChunkId) -> Option<usize> {
        self.chunks.read().get(id).map(|e| e.tree_bytes)
    }
}

fn children_of(chunk: &Chunk) -> Option<&[ChunkId; 4]> {
    chunk.as_matrix().ok().and_then(|m| m.children())
}

/// Remove `root`, then every released child whose last parent it was.
fn drop_tree(chunks: &mut HashMap<ChunkId, Entry>, root: ChunkId) {
    let mut pending = vec![root];
    while let Some(id) = pending.pop() {
        let Some(entry) = chunks.remove(&id) else {
            continue;
        };
        let Some(children) = children_of(&entry.chunk) else {
            continue;
        };
        for child in children {
            if let Some(child_entry) = chunks.get_mut(child) {
                if child_entry.parents == 0 {
                    continue;
                }
                child_entry.parents -= 1;
                if child_entry.parents == 0 && child_entry.released {
                    pending.push(*child);
                }
            }
        }
    }
}
