// SPDX-License-Identifier: MIT

//! The `states` tree: server id → last-observed [`PowerState`].

use crate::StoreError;
use std::collections::HashMap;
use wings_core::{PowerState, ServerId};

/// Handle to the persisted state-snapshot tree.
///
/// Absence of an entry for a server is not an error — spec.md §4.6.1 step 1
/// treats a missing snapshot (first boot, or a server added since the last
/// persist) as "assume offline".
pub struct StateSnapshot {
    tree: sled::Tree,
}

impl StateSnapshot {
    pub(crate) fn new(tree: sled::Tree) -> Self {
        Self { tree }
    }

    pub fn get(&self, server: &ServerId) -> Result<Option<PowerState>, StoreError> {
        match self.tree.get(server.to_string())? {
            Some(bytes) => {
                let s = std::str::from_utf8(&bytes).unwrap_or("offline");
                Ok(s.parse().ok())
            }
            None => Ok(None),
        }
    }

    pub fn put(&self, server: &ServerId, state: PowerState) -> Result<(), StoreError> {
        self.tree.insert(server.to_string(), state.to_string().as_bytes())?;
        Ok(())
    }

    pub fn delete(&self, server: &ServerId) -> Result<(), StoreError> {
        self.tree.remove(server.to_string())?;
        Ok(())
    }

    /// Read the entire snapshot, used once at boot.
    pub fn load_all(&self) -> Result<HashMap<ServerId, PowerState>, StoreError> {
        let mut map = HashMap::new();
        for entry in self.tree.iter() {
            let (key, value) = entry?;
            let key = std::str::from_utf8(&key).unwrap_or_default();
            let Ok(server) = key.parse::<ServerId>() else { continue };
            let value = std::str::from_utf8(&value).unwrap_or("offline");
            if let Ok(state) = value.parse() {
                map.insert(server, state);
            }
        }
        Ok(map)
    }

    /// Atomically rewrite the whole snapshot from a fresh map, as the
    /// 60s persistence ticker (spec.md §4.6.2) does.
    pub fn replace_all(&self, states: &HashMap<ServerId, PowerState>) -> Result<(), StoreError> {
        let existing_keys: Vec<sled::IVec> =
            self.tree.iter().keys().collect::<Result<_, _>>()?;

        self.tree
            .transaction(|tx| {
                for key in &existing_keys {
                    tx.remove(key.clone())?;
                }
                for (server, state) in states {
                    tx.insert(server.to_string().as_bytes(), state.to_string().as_bytes())?;
                }
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError<sled::Error>| match e {
                sled::transaction::TransactionError::Abort(inner) => StoreError::Sled(inner),
                sled::transaction::TransactionError::Storage(inner) => StoreError::Sled(inner),
            })?;
        self.tree.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;

    #[test]
    fn missing_server_returns_none_not_error() {
        let store = Store::open_temporary().unwrap();
        let snapshot = store.states().unwrap();
        assert!(snapshot.get(&ServerId::new()).unwrap().is_none());
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = Store::open_temporary().unwrap();
        let snapshot = store.states().unwrap();
        let server = ServerId::new();
        snapshot.put(&server, PowerState::Running).unwrap();
        assert_eq!(snapshot.get(&server).unwrap(), Some(PowerState::Running));
    }

    #[test]
    fn replace_all_rewrites_atomically() {
        let store = Store::open_temporary().unwrap();
        let snapshot = store.states().unwrap();
        let a = ServerId::new();
        let b = ServerId::new();
        snapshot.put(&a, PowerState::Running).unwrap();

        let mut fresh = HashMap::new();
        fresh.insert(b, PowerState::Offline);
        snapshot.replace_all(&fresh).unwrap();

        assert!(snapshot.get(&a).unwrap().is_none());
        assert_eq!(snapshot.get(&b).unwrap(), Some(PowerState::Offline));
    }
}
