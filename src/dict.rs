//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! String interning for identifiers and values.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Interns strings so that equal names and values share one allocation.
///
/// Entries are reference counted through `Arc`: an entry no longer used
/// outside the dictionary is released by [`Dictionary::purge`].
#[derive(Debug, Default)]
pub struct Dictionary {
    strings: Mutex<HashSet<Arc<str>>>,
}

// ===== impl Dictionary =====

impl Dictionary {
    pub fn new() -> Dictionary {
        Dictionary::default()
    }

    fn strings(&self) -> MutexGuard<'_, HashSet<Arc<str>>> {
        self.strings.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the shared instance of the given string, inserting it if
    /// needed.
    pub fn insert(&self, value: &str) -> Arc<str> {
        let mut strings = self.strings();
        if let Some(entry) = strings.get(value) {
            return entry.clone();
        }
        let entry: Arc<str> = Arc::from(value);
        strings.insert(entry.clone());
        entry
    }

    /// Drops the dictionary's reference to the string if nothing else holds
    /// it. Returns whether the entry was released.
    pub fn remove(&self, value: &str) -> bool {
        let mut strings = self.strings();
        match strings.get(value) {
            Some(entry) if Arc::strong_count(entry) == 1 => {
                strings.remove(value)
            }
            _ => false,
        }
    }

    /// Releases every entry that is only referenced by the dictionary.
    pub fn purge(&self) {
        self.strings().retain(|entry| Arc::strong_count(entry) > 1);
    }

    pub fn len(&self) -> usize {
        self.strings().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_strings_share_storage() {
        let dict = Dictionary::new();
        let a = dict.insert("interfaces");
        let b = dict.insert("interfaces");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn purge_releases_unused_entries() {
        let dict = Dictionary::new();
        let kept = dict.insert("kept");
        drop(dict.insert("dropped"));
        assert!(!dict.remove("kept"));
        dict.purge();
        assert_eq!(dict.len(), 1);
        assert_eq!(&*kept, "kept");
        drop(kept);
        assert!(dict.remove("kept"));
        assert!(dict.is_empty());
    }
}
