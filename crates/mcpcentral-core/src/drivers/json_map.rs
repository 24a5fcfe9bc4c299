use crate::error::CentralError;
use crate::fsio;
use crate::models::TargetServerInfo;
use crate::target::Target;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Driver for targets whose store is a JSON object with one managed
/// key. Everything outside that key belongs to the user and is copied
/// through untouched; the managed key itself is fully replaced on each
/// write.
#[derive(Debug, Clone)]
pub struct JsonMapDriver {
    path: PathBuf,
    target: Target,
}

impl JsonMapDriver {
    pub fn new(target: Target, home: &Path) -> Option<Self> {
        let path = target.config_path(home)?;
        Some(Self { path, target })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_names(&self, warnings: &mut Vec<String>) -> BTreeSet<String> {
        let root = self.load_root(warnings);
        let preferred = root
            .get(self.target.managed_key())
            .and_then(JsonValue::as_object);
        // Older generations of some stores used the generic key.
        let map = preferred.or_else(|| root.get("servers").and_then(JsonValue::as_object));
        map.map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn write(
        &self,
        desired: &BTreeMap<String, TargetServerInfo>,
        warnings: &mut Vec<String>,
    ) -> Result<(), CentralError> {
        let mut root = self.load_root(warnings);

        let mut rendered = JsonMap::new();
        for (name, info) in desired {
            let value = if self.target.strict_render() {
                render_strict(info)
            } else {
                serde_json::to_value(info)?
            };
            rendered.insert(name.clone(), value);
        }
        root.insert(
            self.target.managed_key().to_string(),
            JsonValue::Object(rendered),
        );

        if self.target.has_allowed_list() {
            let allowed: Vec<JsonValue> = desired
                .keys()
                .map(|name| JsonValue::String(name.clone()))
                .collect();
            let mcp = root
                .entry("mcp")
                .or_insert_with(|| JsonValue::Object(JsonMap::new()));
            match mcp.as_object_mut() {
                Some(section) => {
                    section.insert(String::from("allowed"), JsonValue::Array(allowed));
                }
                None => warnings.push(format!(
                    "{}: 'mcp' is not an object, allow-list left alone",
                    self.path.display()
                )),
            }
        }

        let _guard = crate::write_lock();
        fsio::take_backup(&self.path)?;
        let mut payload = serde_json::to_vec_pretty(&JsonValue::Object(root))?;
        payload.push(b'\n');
        fsio::atomic_write(&self.path, &payload)
    }

    /// Empty the managed section. A missing file is left missing.
    pub fn clear(&self, warnings: &mut Vec<String>) -> Result<bool, CentralError> {
        if !self.path.exists() {
            return Ok(false);
        }
        self.write(&BTreeMap::new(), warnings)?;
        Ok(true)
    }

    /// Missing, empty, or corrupt content reads as an empty object with
    /// a warning; a broken target file must never abort the batch.
    fn load_root(&self, warnings: &mut Vec<String>) -> JsonMap<String, JsonValue> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(value) => value,
            Err(error) => {
                if error.kind() != std::io::ErrorKind::NotFound {
                    warnings.push(format!("failed to read {}: {error}", self.path.display()));
                }
                return JsonMap::new();
            }
        };
        if raw.trim().is_empty() {
            return JsonMap::new();
        }
        match serde_json::from_str::<JsonValue>(&raw) {
            Ok(JsonValue::Object(map)) => map,
            Ok(_) => {
                warnings.push(format!(
                    "{}: root is not an object, treating as empty",
                    self.path.display()
                ));
                JsonMap::new()
            }
            Err(error) => {
                warnings.push(format!(
                    "{}: invalid JSON ({error}), treating as empty",
                    self.path.display()
                ));
                JsonMap::new()
            }
        }
    }
}

/// Droid rejects the generic shape: transport tag pinned to `stdio`,
/// empty collections omitted entirely.
fn render_strict(info: &TargetServerInfo) -> JsonValue {
    let mut object = JsonMap::new();
    if !info.command.is_empty() {
        object.insert(
            String::from("command"),
            JsonValue::String(info.command.clone()),
        );
    }
    if !info.args.is_empty() {
        object.insert(
            String::from("args"),
            JsonValue::Array(
                info.args
                    .iter()
                    .map(|arg| JsonValue::String(arg.clone()))
                    .collect(),
            ),
        );
    }
    if !info.env.is_empty() {
        let mut env = JsonMap::new();
        for (key, value) in &info.env {
            env.insert(key.clone(), JsonValue::String(value.clone()));
        }
        object.insert(String::from("env"), JsonValue::Object(env));
    }
    if let Some(timeout) = info.timeout {
        object.insert(String::from("timeout"), JsonValue::from(timeout));
    }
    object.insert(String::from("type"), JsonValue::String(String::from("stdio")));
    JsonValue::Object(object)
}
