//! Client roster and server settings (spec §3, §4.1).

use std::collections::HashMap;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::model::ClientInfo;

/// Mapping GUID -> client info. The local client always appears under its own GUID.
#[derive(Default)]
pub struct Roster {
    clients: DashMap<String, ClientInfo>,
}

impl Roster {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Unconditionally replace (or create) the roster entry for `guid`.
    pub fn insert_or_replace(&self, guid: &str, info: ClientInfo) {
        self.clients.insert(guid.to_string(), info);
    }

    /// Shallow field-wise overwrite of the roster entry for `guid`.
    ///
    /// On the wire the server always supplies a complete [`ClientInfo`] record, so a
    /// top-level "replace whatever keys are given" merge and an unconditional replace
    /// are the same operation here; nested `RadioInfo` is never merged per-slot (spec
    /// §9, "radio configuration merge granularity"). When `guid` is absent this behaves
    /// exactly like [`Roster::insert_or_replace`].
    pub fn merge_fields(&self, guid: &str, info: ClientInfo) {
        self.clients.insert(guid.to_string(), info);
    }

    /// Remove the entry for `guid`, if present. A no-op if it is not.
    pub fn remove(&self, guid: &str) {
        self.clients.remove(guid);
    }

    /// Fetch a clone of the roster entry for `guid`.
    pub fn get(&self, guid: &str) -> Option<ClientInfo> {
        self.clients.get(guid).map(|entry| entry.clone())
    }

    /// Mutate the roster entry for `guid` in place, if present.
    pub fn with_mut<R>(&self, guid: &str, f: impl FnOnce(&mut ClientInfo) -> R) -> Option<R> {
        self.clients.get_mut(guid).map(|mut entry| f(&mut entry))
    }

    /// Snapshot of every known GUID -> client info pair.
    pub fn snapshot(&self) -> HashMap<String, ClientInfo> {
        self.clients
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// All-upper-snake-case string keys to string values. Values are stringly-typed
/// booleans, numbers, or comma-joined lists; callers MUST parse specific keys on
/// demand rather than assume a type universally (spec §9).
#[derive(Default)]
pub struct ServerSettings {
    values: RwLock<HashMap<String, String>>,
}

impl ServerSettings {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the whole settings map wholesale, as delivered by SYNC.
    pub fn replace_all(&self, settings: HashMap<String, String>) {
        *self.values.write() = settings;
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    /// Parse a setting as a boolean. SRS emits `"true"`/`"false"` (and sometimes
    /// `"True"`/`"False"`); comparison is case-insensitive.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Parse a setting as a comma-joined list, e.g. `TEST_FREQUENCIES`.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key)
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.values.read().clone()
    }
}
