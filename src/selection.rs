//! Selection sets for the wizard's three selectable categories

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Anything that can be selected is identified by a single string key.
///
/// Flights use the provider-assigned offer id; lodging and activities have
/// no stable id and are keyed by name.
pub trait Keyed {
    fn key(&self) -> &str;
}

/// An insertion-ordered set of offers, unique by [`Keyed::key`].
///
/// Two selections are equal when they hold the same keys, regardless of the
/// order in which items were toggled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    from = "Vec<T>",
    into = "Vec<T>",
    bound(
        serialize = "T: Serialize + Keyed + Clone",
        deserialize = "T: Deserialize<'de> + Keyed"
    )
)]
pub struct Selection<T> {
    items: Vec<T>,
}

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Keyed> Selection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.iter().any(|item| item.key() == key)
    }

    /// Add the item if its key is absent, otherwise remove the selected item
    /// with that key. Returns `true` when the item is selected afterwards.
    pub fn toggle(&mut self, item: T) -> bool {
        let key = item.key().to_string();
        if let Some(pos) = self.items.iter().position(|i| i.key() == key) {
            self.items.remove(pos);
            false
        } else {
            self.items.push(item);
            true
        }
    }

    /// Remove by key; used when the candidate list no longer carries the item
    pub fn remove(&mut self, key: &str) -> Option<T> {
        let pos = self.items.iter().position(|i| i.key() == key)?;
        Some(self.items.remove(pos))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.key())
    }
}

impl<T> Selection<T> {
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Keyed> PartialEq for Selection<T> {
    fn eq(&self, other: &Self) -> bool {
        let ours: HashSet<&str> = self.keys().collect();
        let theirs: HashSet<&str> = other.keys().collect();
        ours == theirs
    }
}

impl<T: Keyed> From<Vec<T>> for Selection<T> {
    /// Later duplicates are dropped so the set invariant holds for
    /// deserialized input too.
    fn from(items: Vec<T>) -> Self {
        let mut seen = HashSet::new();
        let items = items
            .into_iter()
            .filter(|item| seen.insert(item.key().to_string()))
            .collect();
        Self { items }
    }
}

impl<T> From<Selection<T>> for Vec<T> {
    fn from(selection: Selection<T>) -> Self {
        selection.items
    }
}

impl<'a, T> IntoIterator for &'a Selection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Item {
        name: String,
        price: i32,
    }

    impl Keyed for Item {
        fn key(&self) -> &str {
            &self.name
        }
    }

    fn item(name: &str, price: i32) -> Item {
        Item {
            name: name.to_string(),
            price,
        }
    }

    #[test]
    fn test_toggle_twice_restores_original() {
        let mut selection = Selection::new();
        selection.toggle(item("Protea Hotel", 900));
        let before = selection.clone();

        assert!(selection.toggle(item("Beach Lodge", 700)));
        assert!(!selection.toggle(item("Beach Lodge", 700)));

        assert_eq!(selection, before);
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn test_toggle_matches_on_key_only() {
        let mut selection = Selection::new();
        selection.toggle(item("Protea Hotel", 900));

        // Same name, different price: still the same selection key
        assert!(!selection.toggle(item("Protea Hotel", 1200)));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_insertion_order_kept_for_display() {
        let mut selection = Selection::new();
        for name in ["c", "a", "b"] {
            selection.toggle(item(name, 1));
        }
        selection.toggle(item("a", 1));
        selection.toggle(item("a", 1));

        let keys: Vec<&str> = selection.keys().collect();
        assert_eq!(keys, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_never_holds_duplicate_keys() {
        let mut selection = Selection::new();
        for i in 0..20 {
            selection.toggle(item(&format!("stay-{}", i % 3), i));
        }
        let keys: Vec<&str> = selection.keys().collect();
        let unique: HashSet<&str> = keys.iter().copied().collect();
        assert_eq!(keys.len(), unique.len());
    }

    #[test]
    fn test_deserialize_drops_duplicates() {
        let json = r#"[{"name":"a","price":1},{"name":"b","price":2},{"name":"a","price":3}]"#;
        let selection: Selection<Item> = serde_json::from_str(json).unwrap();
        assert_eq!(selection.len(), 2);
        assert_eq!(selection.as_slice()[0].price, 1);

        let back = serde_json::to_string(&selection).unwrap();
        assert!(back.starts_with('['));
    }

    #[test]
    fn test_equality_ignores_order() {
        let a: Selection<Item> = vec![item("x", 1), item("y", 2)].into();
        let b: Selection<Item> = vec![item("y", 2), item("x", 1)].into();
        assert_eq!(a, b);
    }
}
