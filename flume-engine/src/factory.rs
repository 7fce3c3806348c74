// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! String-keyed class factories.
//!
//! Two factories are instantiated per [`Engine`](crate::engine::Engine): one
//! for component constructors and one for node descriptors. External
//! libraries self-register into both through the well-known entry point (see
//! [`external`](crate::external)).
//!
//! Registration happens at library-load time; lookups afterwards take the
//! read side of the lock only. Registration collisions are rejected and
//! recorded, and unknown-key lookups are recorded, so a host application can
//! inspect what went wrong after loading a library.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use crate::sim_error;
use crate::types::SimResult;

/// Outcome of one registration or lookup, kept in the status log.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegisterStatus {
    /// The key was registered.
    RegisteredOk,
    /// The key was already present; the factory was left unchanged.
    AlreadyRegistered,
    /// The key was not present (failed lookup or unregistration).
    NotRegistered,
}

/// A keyed registry of cloneable creators.
pub struct ClassFactory<T> {
    map: RwLock<HashMap<String, T>>,
    status: Mutex<Vec<(String, RegisterStatus)>>,
}

impl<T: Clone> ClassFactory<T> {
    /// Create an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            status: Mutex::new(Vec::new()),
        }
    }

    /// Register a creator under `key`.
    ///
    /// A collision leaves the factory unchanged and is recorded in the
    /// status log.
    pub fn register(&self, key: &str, value: T) -> SimResult {
        let mut map = self.map.write().unwrap();
        if map.contains_key(key) {
            self.push_status(key, RegisterStatus::AlreadyRegistered);
            return sim_error!("Key '{key}' is already registered");
        }
        map.insert(key.to_owned(), value);
        self.push_status(key, RegisterStatus::RegisteredOk);
        Ok(())
    }

    /// Remove the creator registered under `key`.
    pub fn unregister(&self, key: &str) -> SimResult {
        if self.map.write().unwrap().remove(key).is_none() {
            self.push_status(key, RegisterStatus::NotRegistered);
            return sim_error!("Key '{key}' was not registered");
        }
        Ok(())
    }

    /// Look up the creator for `key`. A miss is recorded in the status log.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<T> {
        let found = self.map.read().unwrap().get(key).cloned();
        if found.is_none() {
            self.push_status(key, RegisterStatus::NotRegistered);
        }
        found
    }

    /// Whether `key` is registered.
    #[must_use]
    pub fn has_key(&self, key: &str) -> bool {
        self.map.read().unwrap().contains_key(key)
    }

    /// All registered keys, sorted.
    #[must_use]
    pub fn registered_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.map.read().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// A copy of the status log accumulated by registrations and lookups.
    #[must_use]
    pub fn register_status(&self) -> Vec<(String, RegisterStatus)> {
        self.status.lock().unwrap().clone()
    }

    /// Clear the status log.
    pub fn clear_register_status(&self) {
        self.status.lock().unwrap().clear();
    }

    /// Unregister everything.
    pub fn clear(&self) {
        self.map.write().unwrap().clear();
        self.status.lock().unwrap().clear();
    }

    fn push_status(&self, key: &str, status: RegisterStatus) {
        self.status.lock().unwrap().push((key.to_owned(), status));
    }
}

impl<T: Clone> Default for ClassFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_rejected() {
        let factory: ClassFactory<usize> = ClassFactory::new();
        factory.register("volume", 1).unwrap();
        assert!(factory.register("volume", 2).is_err());

        // The factory keeps the original entry
        assert_eq!(factory.get("volume"), Some(1));
        assert_eq!(
            factory.register_status(),
            vec![
                ("volume".to_owned(), RegisterStatus::RegisteredOk),
                ("volume".to_owned(), RegisterStatus::AlreadyRegistered),
            ]
        );
    }

    #[test]
    fn missing_key_recorded() {
        let factory: ClassFactory<usize> = ClassFactory::new();
        assert_eq!(factory.get("nothing"), None);
        assert_eq!(
            factory.register_status(),
            vec![("nothing".to_owned(), RegisterStatus::NotRegistered)]
        );
    }

    #[test]
    fn unregister_frees_key() {
        let factory: ClassFactory<usize> = ClassFactory::new();
        factory.register("orifice", 7).unwrap();
        factory.unregister("orifice").unwrap();
        assert!(!factory.has_key("orifice"));
        assert!(factory.unregister("orifice").is_err());
        // The key can be reused after unregistration
        factory.register("orifice", 8).unwrap();
    }
}
