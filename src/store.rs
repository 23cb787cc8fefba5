// Persisted settings: the bearer token and last-used project names.
//
// Values live in one of two scopes. `Global` is shared by every workspace
// (the token); `Workspace` is keyed by the workspace path, the empty id
// standing for "no workspace open".

use crate::error::DeployError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Global key holding the bearer token.
pub const TOKEN_KEY: &str = "hostme-bearer";
/// Workspace key holding the last name typed when no workspace is open.
pub const DETACHED_NAME_KEY: &str = "hostme-workspace-name";

/// Workspace key holding the last name used for a workspace whose folder
/// slugifies to `slug`.
pub fn workspace_name_key(slug: &str) -> String {
    format!("hostme-workspace-{slug}")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    Global,
    Workspace(String),
}

impl Scope {
    pub fn for_workspace(workspace: Option<&Path>) -> Self {
        Scope::Workspace(
            workspace
                .map(|path| path.to_string_lossy().into_owned())
                .unwrap_or_default(),
        )
    }
}

/// Key/value persistence used by the deploy workflow.
pub trait SettingsStore {
    fn get(&self, scope: &Scope, key: &str) -> Result<Option<String>, DeployError>;
    fn set(&mut self, scope: &Scope, key: &str, value: &str) -> Result<(), DeployError>;
    fn remove(&mut self, scope: &Scope, key: &str) -> Result<(), DeployError>;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
struct Document {
    #[serde(default)]
    global: BTreeMap<String, String>,
    #[serde(default)]
    workspaces: BTreeMap<String, BTreeMap<String, String>>,
}

impl Document {
    fn get(&self, scope: &Scope, key: &str) -> Option<String> {
        match scope {
            Scope::Global => self.global.get(key).cloned(),
            Scope::Workspace(id) => self.workspaces.get(id)?.get(key).cloned(),
        }
    }

    fn set(&mut self, scope: &Scope, key: &str, value: &str) {
        let map = match scope {
            Scope::Global => &mut self.global,
            Scope::Workspace(id) => self.workspaces.entry(id.clone()).or_default(),
        };
        map.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, scope: &Scope, key: &str) -> bool {
        match scope {
            Scope::Global => self.global.remove(key).is_some(),
            Scope::Workspace(id) => {
                let Some(map) = self.workspaces.get_mut(id) else {
                    return false;
                };
                let removed = map.remove(key).is_some();
                if map.is_empty() {
                    self.workspaces.remove(id);
                }
                removed
            }
        }
    }
}

/// Settings kept in a JSON file, rewritten after every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    doc: Document,
}

impl JsonFileStore {
    /// Default location: `<config dir>/hostme/state.json`.
    pub fn default_path() -> PathBuf {
        let dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        dir.join("hostme").join("state.json")
    }

    /// Load the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DeployError> {
        let path = path.into();
        let doc = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|err| {
                DeployError::Storage(format!("invalid {}: {err}", path.display()))
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Document::default(),
            Err(err) => {
                return Err(DeployError::Storage(format!(
                    "failed to read {}: {err}",
                    path.display()
                )))
            }
        };
        Ok(Self { path, doc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), DeployError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                DeployError::Storage(format!("failed to create {}: {err}", parent.display()))
            })?;
        }
        let serialized = serde_json::to_vec_pretty(&self.doc)
            .map_err(|err| DeployError::Storage(err.to_string()))?;
        fs::write(&self.path, serialized).map_err(|err| {
            DeployError::Storage(format!("failed to write {}: {err}", self.path.display()))
        })
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, scope: &Scope, key: &str) -> Result<Option<String>, DeployError> {
        Ok(self.doc.get(scope, key))
    }

    fn set(&mut self, scope: &Scope, key: &str, value: &str) -> Result<(), DeployError> {
        self.doc.set(scope, key, value);
        self.persist()
    }

    fn remove(&mut self, scope: &Scope, key: &str) -> Result<(), DeployError> {
        if self.doc.remove(scope, key) {
            self.persist()?;
        }
        Ok(())
    }
}

/// Non-persistent store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    doc: Document,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, scope: &Scope, key: &str) -> Result<Option<String>, DeployError> {
        Ok(self.doc.get(scope, key))
    }

    fn set(&mut self, scope: &Scope, key: &str, value: &str) -> Result<(), DeployError> {
        self.doc.set(scope, key, value);
        Ok(())
    }

    fn remove(&mut self, scope: &Scope, key: &str) -> Result<(), DeployError> {
        self.doc.remove(scope, key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_are_independent() {
        let mut store = MemoryStore::new();
        let ws = Scope::for_workspace(Some(Path::new("/home/me/site")));
        store.set(&Scope::Global, TOKEN_KEY, "abc").unwrap();
        store.set(&ws, "hostme-workspace-site", "my-site").unwrap();

        assert_eq!(store.get(&Scope::Global, TOKEN_KEY).unwrap().as_deref(), Some("abc"));
        assert_eq!(store.get(&ws, TOKEN_KEY).unwrap(), None);
        assert_eq!(
            store.get(&Scope::for_workspace(None), "hostme-workspace-site").unwrap(),
            None
        );
    }

    #[test]
    fn json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let ws = Scope::for_workspace(Some(Path::new("/srv/blog")));

        let mut store = JsonFileStore::open(&path).unwrap();
        store.set(&Scope::Global, TOKEN_KEY, "secret").unwrap();
        store.set(&ws, &workspace_name_key("blog"), "my-blog").unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get(&Scope::Global, TOKEN_KEY).unwrap().as_deref(),
            Some("secret")
        );
        assert_eq!(
            reopened.get(&ws, "hostme-workspace-blog").unwrap().as_deref(),
            Some("my-blog")
        );
    }

    #[test]
    fn remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut store = JsonFileStore::open(&path).unwrap();
        store.set(&Scope::Global, TOKEN_KEY, "secret").unwrap();
        store.remove(&Scope::Global, TOKEN_KEY).unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get(&Scope::Global, TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(DeployError::Storage(_))
        ));
    }
}
