use crate::error::CentralError;
use crate::fsio;
use crate::models::{CentralDocument, ServerDefinition};
use crate::validate;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Owns the canonical registry file. Every mutation re-validates the
/// whole prospective document and commits through a single-slot backup
/// plus an atomic rename; a failed validation leaves the file untouched.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn at_home(home: &Path) -> Self {
        Self::new(crate::paths::central_config_path(home))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        fsio::backup_path_for(&self.path)
    }

    /// Load the document, or an in-memory default when the file is
    /// absent. The default is never written back implicitly.
    pub fn load(&self) -> Result<CentralDocument, CentralError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(value) => value,
            Err(error) => {
                if error.kind() == std::io::ErrorKind::NotFound {
                    return Ok(CentralDocument::default());
                }
                return Err(CentralError::io(&self.path, error));
            }
        };
        if raw.trim().is_empty() {
            return Ok(CentralDocument::default());
        }
        let value: JsonValue = serde_json::from_str(&raw)?;
        validate::validate_document(&value)
    }

    /// Apply a pure transformation to a copy of the document, validate
    /// the result, then commit. Nothing touches disk on failure.
    pub fn mutate<F>(&self, op: F) -> Result<CentralDocument, CentralError>
    where
        F: FnOnce(&mut CentralDocument) -> Result<(), CentralError>,
    {
        let mut next = self.load()?;
        op(&mut next)?;
        self.commit(&next)?;
        Ok(next)
    }

    fn commit(&self, document: &CentralDocument) -> Result<(), CentralError> {
        let value = serde_json::to_value(document)?;
        validate::validate_document(&value)?;

        let _guard = crate::write_lock();
        fsio::take_backup(&self.path)?;
        let mut payload = serde_json::to_vec_pretty(&value)?;
        payload.push(b'\n');
        fsio::atomic_write(&self.path, &payload)
    }

    pub fn add_server(
        &self,
        name: &str,
        definition: ServerDefinition,
    ) -> Result<CentralDocument, CentralError> {
        self.mutate(|document| {
            if document.servers.contains_key(name) {
                return Err(CentralError::AlreadyExists(name.to_string()));
            }
            document.servers.insert(name.to_string(), definition);
            Ok(())
        })
    }

    pub fn remove_server(&self, name: &str) -> Result<CentralDocument, CentralError> {
        self.mutate(|document| {
            if document.servers.remove(name).is_none() {
                return Err(CentralError::NotFound(name.to_string()));
            }
            Ok(())
        })
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<CentralDocument, CentralError> {
        self.mutate(|document| {
            let entry = document
                .servers
                .get_mut(name)
                .ok_or_else(|| CentralError::NotFound(name.to_string()))?;
            entry.enabled = Some(enabled);
            Ok(())
        })
    }

    pub fn duplicate(&self, src: &str, dest: &str) -> Result<CentralDocument, CentralError> {
        self.mutate(|document| {
            let entry = document
                .servers
                .get(src)
                .cloned()
                .ok_or_else(|| CentralError::NotFound(src.to_string()))?;
            if document.servers.contains_key(dest) {
                return Err(CentralError::AlreadyExists(dest.to_string()));
            }
            document.servers.insert(dest.to_string(), entry);
            Ok(())
        })
    }

    pub fn update_server(
        &self,
        name: &str,
        spec: &UpdateSpec,
    ) -> Result<CentralDocument, CentralError> {
        self.mutate(|document| {
            let mut key = name.to_string();
            if !document.servers.contains_key(&key) {
                return Err(CentralError::NotFound(key));
            }

            if let Some(new_name) = &spec.rename {
                if new_name != &key && document.servers.contains_key(new_name) {
                    return Err(CentralError::RenameConflict(new_name.clone()));
                }
                if let Some(entry) = document.servers.remove(&key) {
                    key = new_name.clone();
                    document.servers.insert(key.clone(), entry);
                }
            }

            let entry = document
                .servers
                .get_mut(&key)
                .ok_or_else(|| CentralError::NotFound(key.clone()))?;
            spec.apply(entry);
            Ok(())
        })
    }

    pub fn export_to(&self, dest: Option<&Path>) -> Result<String, CentralError> {
        let document = self.load()?;
        let mut rendered = serde_json::to_string_pretty(&document)?;
        rendered.push('\n');
        if let Some(path) = dest {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|error| CentralError::io(parent, error))?;
            }
            fs::write(path, &rendered).map_err(|error| CentralError::io(path, error))?;
        }
        Ok(rendered)
    }

    /// Merge (or wholesale replace) an incoming document. Merging keeps
    /// the existing entry on a name collision unless `prefer_incoming`.
    pub fn import_merge(
        &self,
        incoming: &JsonValue,
        prefer_incoming: bool,
        replace: bool,
    ) -> Result<CentralDocument, CentralError> {
        if replace {
            let document = validate::validate_document(incoming)?;
            self.commit(&document)?;
            return Ok(document);
        }

        let incoming_servers: BTreeMap<String, ServerDefinition> = match incoming.get("servers") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|error| CentralError::Schema(error.to_string()))?,
            None => BTreeMap::new(),
        };

        self.mutate(move |document| {
            for (name, definition) in incoming_servers {
                match document.servers.entry(name) {
                    std::collections::btree_map::Entry::Vacant(slot) => {
                        slot.insert(definition);
                    }
                    std::collections::btree_map::Entry::Occupied(mut slot) => {
                        if prefer_incoming {
                            slot.insert(definition);
                        }
                    }
                }
            }
            Ok(())
        })
    }

    pub fn restore_backup(
        backup: &Path,
        dest: Option<&Path>,
    ) -> Result<PathBuf, CentralError> {
        fsio::restore_backup(backup, dest)
    }
}

/// Field-level edit operations for `central update`, mirroring the
/// CLI's flag set. Unset options leave the field alone.
#[derive(Debug, Clone, Default)]
pub struct UpdateSpec {
    pub rename: Option<String>,
    pub command: Option<String>,
    pub transport: Option<String>,
    pub url: Option<String>,
    pub timeout: Option<i64>,
    pub enabled: Option<bool>,
    pub prepend_args: Vec<String>,
    pub append_args: Vec<String>,
    pub remove_args: Vec<String>,
    pub set_env: Vec<(String, String)>,
    pub unset_env: Vec<String>,
    pub set_headers: Vec<(String, String)>,
    pub unset_headers: Vec<String>,
}

impl UpdateSpec {
    fn apply(&self, entry: &mut ServerDefinition) {
        if let Some(command) = &self.command {
            entry.command = command.clone();
        }
        if let Some(transport) = &self.transport {
            entry.transport = Some(transport.clone());
        }
        if let Some(url) = &self.url {
            entry.url = Some(url.clone());
        }
        if let Some(timeout) = self.timeout {
            entry.timeout = Some(timeout);
        }
        if let Some(enabled) = self.enabled {
            entry.enabled = Some(enabled);
        }

        let mut args = entry.args.clone();
        if !self.prepend_args.is_empty() {
            let mut next = self.prepend_args.clone();
            next.extend(args);
            args = next;
        }
        args.extend(self.append_args.iter().cloned());
        if !self.remove_args.is_empty() {
            args.retain(|value| !self.remove_args.contains(value));
        }
        entry.args = args;

        for (key, value) in &self.set_env {
            entry.env.insert(key.clone(), value.clone());
        }
        for key in &self.unset_env {
            entry.env.remove(key);
        }
        for (key, value) in &self.set_headers {
            entry.headers.insert(key.clone(), value.clone());
        }
        for key in &self.unset_headers {
            entry.headers.remove(key);
        }
    }
}

/// `KEY=VALUE` pairs as they arrive from the command line; entries
/// without `=` are skipped.
pub fn parse_kv_pairs(items: &[String]) -> Vec<(String, String)> {
    items
        .iter()
        .filter_map(|item| {
            item.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
        })
        .collect()
}
