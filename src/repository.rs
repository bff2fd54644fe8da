//! Keyed registries for runtime objects.
//!
//! The runtime keeps its conditions, rules, actions and contexts in
//! [`NamedObjectRepository`] instances. Registration is checked and applied
//! under a single write lock, so a rejected registration never leaves a
//! partial entry behind.

use parking_lot::RwLock;

use crate::error::ConfigError;

/// A registry mapping ids to shared objects.
pub trait ObjectRepository<T> {
    /// Registers `value` under a freshly generated unique id and returns the id.
    fn register_new(&self, value: T) -> String;

    /// Registers `value` under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyId`] for an empty id and
    /// [`ConfigError::DuplicateId`] if the id is taken.
    fn register(&self, id: &str, value: T) -> Result<(), ConfigError>;

    /// Removes and returns the object registered under `id`.
    fn revoke(&self, id: &str) -> Option<T>;

    /// Returns the object registered under `id`.
    fn lookup(&self, id: &str) -> Option<T>;

    /// Returns the number of registered objects.
    fn count(&self) -> usize;

    /// Returns a snapshot of the registered ids, in registration order.
    fn ids(&self) -> Vec<String>;

    /// Returns a snapshot of the registered objects, in registration order.
    fn objects(&self) -> Vec<T>;
}

/// Thread-safe, insertion-ordered [`ObjectRepository`] keyed by name.
///
/// Reads return owned snapshots (objects are expected to be cheap handles
/// such as `Arc`s), so callers never hold the lock while using an entry.
#[derive(Debug)]
pub struct NamedObjectRepository<T> {
    entries: RwLock<Vec<(String, T)>>,
}

impl<T: Clone> NamedObjectRepository<T> {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Returns true if `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().iter().any(|(key, _)| key == id)
    }

    /// Returns true if the repository holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns a snapshot of `(id, object)` pairs, in registration order.
    pub fn entries(&self) -> Vec<(String, T)> {
        self.entries.read().clone()
    }

    /// Registers the value built by `make` under a freshly generated unique id.
    ///
    /// `make` receives the id, so objects can carry their own registry name.
    pub fn register_new_with(&self, make: impl FnOnce(&str) -> T) -> T {
        let mut entries = self.entries.write();
        let id = loop {
            let id = uuid::Uuid::new_v4().to_string();
            if !entries.iter().any(|(key, _)| *key == id) {
                break id;
            }
        };
        let value = make(&id);
        entries.push((id, value.clone()));
        value
    }

    /// Removes every entry and returns them in registration order.
    pub fn drain(&self) -> Vec<(String, T)> {
        std::mem::take(&mut *self.entries.write())
    }
}

impl<T: Clone> ObjectRepository<T> for NamedObjectRepository<T> {
    fn register_new(&self, value: T) -> String {
        let mut entries = self.entries.write();
        loop {
            let id = uuid::Uuid::new_v4().to_string();
            if !entries.iter().any(|(key, _)| *key == id) {
                entries.push((id.clone(), value));
                return id;
            }
        }
    }

    fn register(&self, id: &str, value: T) -> Result<(), ConfigError> {
        if id.is_empty() {
            return Err(ConfigError::EmptyId);
        }
        let mut entries = self.entries.write();
        if entries.iter().any(|(key, _)| key == id) {
            return Err(ConfigError::DuplicateId(id.to_string()));
        }
        entries.push((id.to_string(), value));
        Ok(())
    }

    fn revoke(&self, id: &str) -> Option<T> {
        let mut entries = self.entries.write();
        let pos = entries.iter().position(|(key, _)| key == id)?;
        Some(entries.remove(pos).1)
    }

    fn lookup(&self, id: &str) -> Option<T> {
        self.entries
            .read()
            .iter()
            .find(|(key, _)| key == id)
            .map(|(_, value)| value.clone())
    }

    fn count(&self) -> usize {
        self.entries.read().len()
    }

    fn ids(&self) -> Vec<String> {
        self.entries.read().iter().map(|(key, _)| key.clone()).collect()
    }

    fn objects(&self) -> Vec<T> {
        self.entries
            .read()
            .iter()
            .map(|(_, value)| value.clone())
            .collect()
    }
}

impl<T: Clone> Default for NamedObjectRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let repo = NamedObjectRepository::new();
        repo.register("a", 1).expect("fresh id");
        assert_eq!(repo.lookup("a"), Some(1));
        assert_eq!(repo.lookup("b"), None);
        assert_eq!(repo.count(), 1);
    }

    #[test]
    fn empty_id_is_rejected() {
        let repo = NamedObjectRepository::new();
        assert!(matches!(repo.register("", 1), Err(ConfigError::EmptyId)));
        assert!(repo.is_empty());
    }

    #[test]
    fn duplicate_id_is_rejected_without_mutation() {
        let repo = NamedObjectRepository::new();
        repo.register("a", 1).unwrap();
        let err = repo.register("a", 2).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateId(ref id) if id == "a"));
        assert_eq!(repo.lookup("a"), Some(1));
        assert_eq!(repo.count(), 1);
    }

    #[test]
    fn register_new_generates_unique_ids() {
        let repo = NamedObjectRepository::new();
        let a = repo.register_new(1);
        let b = repo.register_new(2);
        assert_ne!(a, b);
        assert!(!a.is_empty());
        assert_eq!(repo.lookup(&b), Some(2));
    }

    #[test]
    fn revoke_removes_entry() {
        let repo = NamedObjectRepository::new();
        repo.register("a", 1).unwrap();
        assert_eq!(repo.revoke("a"), Some(1));
        assert_eq!(repo.revoke("a"), None);
        assert!(!repo.contains("a"));
    }

    #[test]
    fn snapshots_preserve_registration_order() {
        let repo = NamedObjectRepository::new();
        repo.register("z", 26).unwrap();
        repo.register("a", 1).unwrap();
        repo.register("m", 13).unwrap();
        assert_eq!(repo.ids(), vec!["z", "a", "m"]);
        assert_eq!(repo.objects(), vec![26, 1, 13]);
    }

    #[test]
    fn register_new_with_passes_generated_id() {
        let repo = NamedObjectRepository::new();
        let value = repo.register_new_with(|id| format!("ctx:{id}"));
        let id = repo.ids().remove(0);
        assert_eq!(value, format!("ctx:{id}"));
        assert_eq!(repo.lookup(&id), Some(value));
    }

    #[test]
    fn drain_empties_repository() {
        let repo = NamedObjectRepository::new();
        repo.register("a", 1).unwrap();
        repo.register("b", 2).unwrap();
        let drained = repo.drain();
        assert_eq!(drained.len(), 2);
        assert!(repo.is_empty());
    }
}
