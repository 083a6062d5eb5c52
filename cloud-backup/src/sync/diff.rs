//! Change detection between two archive snapshots.
//!
//! Compares the previously committed snapshot of a folder with a freshly built
//! candidate and sorts every entry path into one of three buckets:
//!
//! - **Added**: present in the candidate only
//! - **Removed**: present in the previous snapshot only
//! - **Changed**: present in both with a different content identity
//!
//! Entries with identical identity in both snapshots are left out. The three
//! buckets never share a key.
//!
//! ## Example
//!
//! ```
//! use cloud_backup::sync::diff::compute_differences;
//! use cloud_backup::sync::snapshot::{EntryIdentity, Snapshot};
//!
//! let mut previous = Snapshot::new();
//! previous.insert("letter.txt", EntryIdentity::new(12, 0xdead_beef));
//!
//! let mut candidate = Snapshot::new();
//! candidate.insert("letter.txt", EntryIdentity::new(14, 0x0bad_f00d));
//! candidate.insert("reply.txt", EntryIdentity::new(3, 0x1234_5678));
//!
//! let differences = compute_differences(&previous, &candidate);
//! assert_eq!(differences.total(), 2);
//! assert!(differences.changed.contains_key("letter.txt"));
//! assert!(differences.added.contains_key("reply.txt"));
//! ```

use crate::sync::snapshot::{EntryIdentity, Snapshot};
use std::collections::BTreeMap;

/// Identity of an entry on both sides of a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryChange {
    pub previous: EntryIdentity,
    pub candidate: EntryIdentity,
}

impl EntryChange {
    /// The same change seen from the other direction
    pub fn reversed(self) -> Self {
        Self {
            previous: self.candidate,
            candidate: self.previous,
        }
    }
}

/// Structured difference between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Differences {
    pub added: BTreeMap<String, EntryIdentity>,
    pub changed: BTreeMap<String, EntryChange>,
    pub removed: BTreeMap<String, EntryIdentity>,
}

impl Differences {
    /// Total number of differing entries across all buckets
    pub fn total(&self) -> usize {
        self.added.len() + self.changed.len() + self.removed.len()
    }

    /// True when the two snapshots hold the same entries
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Compute the differences from `previous` to `candidate`.
pub fn compute_differences(previous: &Snapshot, candidate: &Snapshot) -> Differences {
    let mut differences = Differences::default();

    for (path, identity) in candidate.iter() {
        match previous.get(path) {
            None => {
                differences.added.insert(path.clone(), *identity);
            }
            Some(old) if old != identity => {
                differences.changed.insert(
                    path.clone(),
                    EntryChange {
                        previous: *old,
                        candidate: *identity,
                    },
                );
            }
            Some(_) => {}
        }
    }

    for (path, identity) in previous.iter() {
        if !candidate.contains(path) {
            differences.removed.insert(path.clone(), *identity);
        }
    }

    differences
}
