//! Insertion-ordered, duplicate-free collections.
//!
//! Flag lists handed to a compiler must be both deterministic and free of
//! repeats. `UniqueVec` keeps the first occurrence of every item and
//! remembers what it has seen, so merging surfaces stays linear.
//! Link lines are the exception: a library must follow everything that
//! needs it, so they keep the last occurrence instead.

use std::collections::HashSet;
use std::hash::Hash;
use std::ops::Deref;

/// A vector that silently drops items it already contains.
#[derive(Debug, Clone)]
pub struct UniqueVec<T: Eq + Hash + Clone> {
    items: Vec<T>,
    seen: HashSet<T>,
}

impl<T: Eq + Hash + Clone> UniqueVec<T> {
    pub fn new() -> Self {
        UniqueVec {
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Push an item, returning `false` if it was already present.
    pub fn push(&mut self, item: T) -> bool {
        if self.seen.contains(&item) {
            return false;
        }
        self.seen.insert(item.clone());
        self.items.push(item);
        true
    }

    /// Append every item in `iter`, keeping first-seen order.
    pub fn extend_from<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = T>,
    {
        for item in iter {
            self.push(item);
        }
    }

    /// Push an item, moving it to the end if it was already present.
    pub fn push_last(&mut self, item: T) {
        if !self.seen.insert(item.clone()) {
            self.items.retain(|existing| *existing != item);
        }
        self.items.push(item);
    }

    /// Append every item in `iter`, keeping last-seen order.
    pub fn extend_last<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = T>,
    {
        for item in iter {
            self.push_last(item);
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Eq + Hash + Clone> Default for UniqueVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash + Clone> Deref for UniqueVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

// Equality is order-sensitive: two sets holding the same items in a
// different order produce different command lines.
impl<T: Eq + Hash + Clone> PartialEq for UniqueVec<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: Eq + Hash + Clone> Eq for UniqueVec<T> {}

impl<T: Eq + Hash + Clone> FromIterator<T> for UniqueVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = UniqueVec::new();
        set.extend_from(iter);
        set
    }
}

impl<T: Eq + Hash + Clone> IntoIterator for UniqueVec<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T: Eq + Hash + Clone> IntoIterator for &'a UniqueVec<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_first_occurrence() {
        let set: UniqueVec<&str> = ["b", "a", "b", "c", "a"].into_iter().collect();
        assert_eq!(set.as_slice(), &["b", "a", "c"]);
    }

    #[test]
    fn test_push_reports_duplicates() {
        let mut set = UniqueVec::new();
        assert!(set.push(1));
        assert!(!set.push(1));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_push_last_moves_to_end() {
        let mut set: UniqueVec<&str> = ["core", "util", "z"].into_iter().collect();
        set.extend_last(["util", "m"]);
        assert_eq!(set.as_slice(), &["core", "z", "util", "m"]);
        set.push_last("m");
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_equality_is_ordered() {
        let a: UniqueVec<i32> = [1, 2].into_iter().collect();
        let b: UniqueVec<i32> = [2, 1].into_iter().collect();
        assert_ne!(a, b);
    }
}
