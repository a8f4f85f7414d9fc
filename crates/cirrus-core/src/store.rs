//! Generic in-memory collections with flat-file persistence.
//!
//! A `Collection<T>` keeps entities in insertion order and enforces key
//! uniqueness on insert. Persistence is a whole-file snapshot: a u32
//! record count followed by each entity's binary encoding, written to a
//! temporary sibling and renamed into place so a crash mid-write leaves
//! the previous snapshot intact.

use crate::codec::{get_u32, BinaryCodec, CodecError};
use crate::error::{CoreError, Result};
use std::fs;
use std::path::Path;

/// An entity that can live in a [`Collection`].
pub trait Persistable: BinaryCodec + Clone {
    /// Unique key within the collection.
    fn key(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct Collection<T: Persistable> {
    items: Vec<T>,
}

impl<T: Persistable> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Persistable> Collection<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Insert a new entity; fails if the key is already present.
    pub fn add(&mut self, item: T) -> Result<()> {
        let key = item.key();
        if self.items.iter().any(|existing| existing.key() == key) {
            return Err(CoreError::DuplicateId { id: key });
        }
        self.items.push(item);
        Ok(())
    }

    pub fn find(&self, key: &str) -> Option<&T> {
        self.items.iter().find(|item| item.key() == key)
    }

    pub fn find_mut(&mut self, key: &str) -> Option<&mut T> {
        self.items.iter_mut().find(|item| item.key() == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Remove by key, returning the entity; `NotFound` if absent.
    pub fn remove(&mut self, key: &str) -> Result<T> {
        let pos = self
            .items
            .iter()
            .position(|item| item.key() == key)
            .ok_or_else(|| CoreError::NotFound {
                id: key.to_string(),
            })?;
        Ok(self.items.remove(pos))
    }

    /// Entities matching a predicate, in insertion order. Collected rather
    /// than streamed so callers can re-walk the results freely.
    pub fn filter(&self, mut pred: impl FnMut(&T) -> bool) -> Vec<&T> {
        self.items.iter().filter(|item| pred(item)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    /// Snapshot the collection to `path`, atomically replacing any previous
    /// file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.items.len() as u32).to_le_bytes());
        for item in &self.items {
            item.encode(&mut buf);
        }

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &buf)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load a fresh collection from `path`. The whole file must decode
    /// cleanly; trailing garbage after the declared records is corruption,
    /// not padding.
    pub fn load_from(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let mut slice = bytes.as_slice();

        let count = get_u32(&mut slice, "record count")?;
        let mut collection = Self::new();
        for _ in 0..count {
            let item = T::decode(&mut slice)?;
            collection.add(item)?;
        }
        if !slice.is_empty() {
            return Err(CoreError::Codec(CodecError::CorruptData(format!(
                "{} trailing bytes after {count} records",
                slice.len()
            ))));
        }
        Ok(collection)
    }
}

impl Persistable for crate::domain::Resource {
    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Persistable for crate::domain::User {
    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Persistable for crate::rental::RentalRequest {
    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Persistable for crate::rental::RentalRecord {
    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Persistable for crate::billing::Bill {
    fn key(&self) -> String {
        self.id.to_string()
    }
}

impl Persistable for crate::billing::BillingRule {
    fn key(&self) -> String {
        self.kind.to_string()
    }
}

impl Persistable for crate::notify::Notification {
    fn key(&self) -> String {
        self.id.to_string()
    }
}
