//! User aliases, persisted as a JSON object.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

#[derive(Debug, Default)]
pub struct AliasStore {
    path: Option<PathBuf>,
    aliases: BTreeMap<String, String>,
}

impl AliasStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`; a missing file starts empty.
    pub fn load(path: &Path) -> Result<Self> {
        let aliases = match fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("invalid alias file {}", path.display()))?,
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read alias file {}", path.display()));
            }
        };
        debug!(path = %path.display(), count = aliases.len(), "loaded aliases");
        Ok(Self {
            path: Some(path.to_path_buf()),
            aliases,
        })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        self.aliases.insert(name.to_owned(), value.to_owned());
        self.save()
    }

    /// Returns whether the alias existed.
    pub fn remove(&mut self, name: &str) -> Result<bool> {
        let existed = self.aliases.remove(name).is_some();
        if existed {
            self.save()?;
        }
        Ok(existed)
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let text = serde_json::to_string_pretty(&self.aliases)?;
        fs::write(path, text)
            .with_context(|| format!("failed to write alias file {}", path.display()))
    }
}
