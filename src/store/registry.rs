use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::model::{Branch, LogicTree};

/// A registered branch identity and its content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// SHA-256 of the identity, hex encoded
    pub hash: String,
    pub identity: String,
    pub registered_at: DateTime<Utc>,
}

/// Maps branch registry identities to stable content hashes.
///
/// Constructed by the caller and passed where needed; persisted explicitly
/// with [`BranchRegistry::load`] and [`BranchRegistry::save`].
#[derive(Debug, Clone, Default)]
pub struct BranchRegistry {
    by_identity: BTreeMap<String, RegistryEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistryFile {
    entries: Vec<RegistryEntry>,
}

impl BranchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate the SHA-256 hash of a registry identity
    pub fn hash_identity(identity: &str) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(identity.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Register a branch, returning its hash. Registering the same content twice
    /// keeps the first entry.
    pub fn register(&mut self, branch: &Branch) -> &RegistryEntry {
        let identity = branch.registry_identity();
        self.by_identity
            .entry(identity.clone())
            .or_insert_with(|| RegistryEntry {
                hash: Self::hash_identity(&identity),
                identity,
                registered_at: Utc::now(),
            })
    }

    /// Register every branch of `tree`, returning the number of new entries.
    pub fn register_tree(&mut self, tree: &LogicTree) -> usize {
        let before = self.by_identity.len();
        for (_, branch) in tree.branches() {
            self.register(branch);
        }
        let added = self.by_identity.len() - before;
        debug!("Registered {} new branches from '{}'", added, tree.title());
        added
    }

    pub fn get_by_identity(&self, identity: &str) -> Option<&RegistryEntry> {
        self.by_identity.get(identity)
    }

    pub fn get_by_hash(&self, hash: &str) -> Option<&RegistryEntry> {
        self.by_identity.values().find(|e| e.hash == hash)
    }

    pub fn len(&self) -> usize {
        self.by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> + '_ {
        self.by_identity.values()
    }

    /// Load a registry file. A missing file yields an empty registry.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Branch registry {} not found, starting empty", path.display());
            return Ok(Self::new());
        }

        let contents = std::fs::read_to_string(path)?;
        let file: RegistryFile = serde_json::from_str(&contents)?;
        let mut registry = Self::new();
        for entry in file.entries {
            let expected = Self::hash_identity(&entry.identity);
            if entry.hash != expected {
                anyhow::bail!(
                    "registry entry '{}' has hash {} but its identity hashes to {}",
                    entry.identity,
                    entry.hash,
                    expected
                );
            }
            registry.by_identity.insert(entry.identity.clone(), entry);
        }
        debug!("Loaded {} registry entries from {}", registry.len(), path.display());
        Ok(registry)
    }

    /// Write the registry as JSON, entries sorted by identity.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let file = RegistryFile {
            entries: self.by_identity.values().cloned().collect(),
        };
        std::fs::write(path.as_ref(), serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::branch_set::tests::source_branch;

    #[test]
    fn test_hash_is_sha256_hex() {
        assert_eq!(
            BranchRegistry::hash_identity(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = BranchRegistry::new();
        let branch = source_branch("a1", 1.0, "SI");
        let first = registry.register(&branch).clone();
        let second = registry.register(&branch).clone();
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_by_hash(&first.hash), Some(&first));
        assert_eq!(first.identity, "nrml-a1");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");

        let mut registry = BranchRegistry::new();
        registry.register(&source_branch("a1", 0.5, "SI"));
        registry.register(&source_branch("a2", 0.5, "SI"));
        registry.save(&path).unwrap();

        let loaded = BranchRegistry::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(
            loaded.entries().cloned().collect::<Vec<_>>(),
            registry.entries().cloned().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_load_missing_and_tampered() {
        let dir = tempfile::tempdir().unwrap();
        let missing = BranchRegistry::load(dir.path().join("nope.json")).unwrap();
        assert!(missing.is_empty());

        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"entries": [{"hash": "abc", "identity": "nrml-a1", "registered_at": "2024-01-01T00:00:00Z"}]}"#,
        )
        .unwrap();
        assert!(BranchRegistry::load(&path).is_err());
    }

    #[test]
    fn test_registered_at_is_rfc3339() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let hash = BranchRegistry::hash_identity("nrml-a1");
        let entry = serde_json::json!({
            "entries": [{
                "hash": hash,
                "identity": "nrml-a1",
                "registered_at": "2024-01-01T00:00:00Z"
            }]
        });
        std::fs::write(&path, entry.to_string()).unwrap();

        let mut registry = BranchRegistry::load(&path).unwrap();
        let registered_at = registry.get_by_hash(&hash).unwrap().registered_at;
        assert_eq!(registered_at.to_rfc3339(), "2024-01-01T00:00:00+00:00");

        // re-registering keeps the original timestamp
        let again = registry.register(&source_branch("a1", 1.0, "SI"));
        assert_eq!(again.registered_at, registered_at);
    }
}
