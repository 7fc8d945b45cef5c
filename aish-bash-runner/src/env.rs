//! Variables exported during the session.
//!
//! `export` never touches the shell's own process environment; instead the
//! variables are kept here and applied to every spawned child.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Shared, cloneable map of exported variables.
#[derive(Debug, Clone, Default)]
pub struct SessionEnv {
    vars: Arc<RwLock<BTreeMap<String, String>>>,
}

impl SessionEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.write().insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.vars.write().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.vars.read().get(name).cloned()
    }

    /// True if `name` is exported here or present in the process environment.
    pub fn is_defined(&self, name: &str) -> bool {
        self.vars.read().contains_key(name) || std::env::var_os(name).is_some()
    }

    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.vars
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Apply every exported variable to `command`.
    pub fn apply(&self, command: &mut tokio::process::Command) {
        for (key, value) in self.vars.read().iter() {
            command.env(key, value);
        }
    }
}
