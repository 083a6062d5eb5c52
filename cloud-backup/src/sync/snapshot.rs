//! Archive snapshots.
//!
//! A snapshot records every entry in an archive with its content identity
//! (uncompressed size and CRC-32), which is enough to tell whether two
//! archives hold the same files without decompressing either of them.

use std::collections::BTreeMap;

/// Content identity of a single archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryIdentity {
    pub size: u64,
    pub crc32: u32,
}

impl EntryIdentity {
    pub fn new(size: u64, crc32: u32) -> Self {
        Self { size, crc32 }
    }
}

/// Ordered mapping from entry path to content identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<String, EntryIdentity>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, identity: EntryIdentity) {
        self.entries.insert(path.into(), identity);
    }

    pub fn get(&self, path: &str) -> Option<&EntryIdentity> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EntryIdentity)> {
        self.entries.iter()
    }

    /// Sum of the uncompressed entry sizes
    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }
}

impl FromIterator<(String, EntryIdentity)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, EntryIdentity)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
