use crate::error::CentralError;
use crate::models::{CentralDocument, TIMEOUT_MAX, TIMEOUT_MIN};
use serde_json::Value as JsonValue;

const ALLOWED_TOP: [&str; 3] = ["version", "description", "servers"];
const ALLOWED_SERVER: [&str; 10] = [
    "enabled",
    "type",
    "command",
    "args",
    "env",
    "url",
    "timeout",
    "headers",
    "source",
    "client_overrides",
];
const ALLOWED_OVERRIDE: [&str; 7] = ["command", "args", "env", "url", "headers", "type", "timeout"];

/// Hand-written structural and content checks. This layer is
/// self-contained on purpose: the typed pass below is stricter, but
/// correctness must never depend on it alone.
pub fn validate_value(value: &JsonValue) -> Result<(), CentralError> {
    let root = value
        .as_object()
        .ok_or_else(|| structural("document must be an object"))?;

    for key in ALLOWED_TOP {
        if !root.contains_key(key) {
            return Err(structural(format!("missing required field: '{key}'")));
        }
    }
    let mut extra: Vec<&String> = root
        .keys()
        .filter(|k| !ALLOWED_TOP.contains(&k.as_str()))
        .collect();
    extra.sort();
    if !extra.is_empty() {
        return Err(structural(format!("unsupported top-level fields: {extra:?}")));
    }

    require_nonempty_string(root.get("version"), "'version'")?;
    require_nonempty_string(root.get("description"), "'description'")?;

    let servers = root
        .get("servers")
        .and_then(JsonValue::as_object)
        .ok_or_else(|| structural("'servers' must be an object"))?;

    for (name, entry) in servers {
        validate_server(name, entry)?;
    }

    Ok(())
}

fn validate_server(name: &str, entry: &JsonValue) -> Result<(), CentralError> {
    let info = entry
        .as_object()
        .ok_or_else(|| structural(format!("server '{name}' must be an object")))?;

    let mut extra: Vec<&String> = info
        .keys()
        .filter(|k| !ALLOWED_SERVER.contains(&k.as_str()))
        .collect();
    extra.sort();
    if !extra.is_empty() {
        return Err(structural(format!(
            "server '{name}' has unsupported fields: {extra:?}"
        )));
    }

    match info.get("command").and_then(JsonValue::as_str) {
        Some(cmd) if !cmd.trim().is_empty() => {}
        _ => {
            return Err(structural(format!(
                "server '{name}' is missing required field: 'command'"
            )))
        }
    }

    if let Some(enabled) = info.get("enabled") {
        if !enabled.is_boolean() {
            return Err(structural(format!("server '{name}': 'enabled' must be a boolean")));
        }
    }
    if let Some(kind) = info.get("type") {
        require_nonempty_string(Some(kind), &format!("server '{name}': 'type'"))?;
    }
    if let Some(args) = info.get("args") {
        validate_string_array(args, &format!("server '{name}': 'args'"))?;
    }
    if let Some(env) = info.get("env") {
        validate_string_map(env, &format!("server '{name}': 'env'"))?;
    }
    if let Some(url) = info.get("url") {
        require_nonempty_string(Some(url), &format!("server '{name}': 'url'"))?;
    }
    if let Some(timeout) = info.get("timeout") {
        validate_timeout(timeout, name)?;
    }
    if let Some(headers) = info.get("headers") {
        validate_string_map(headers, &format!("server '{name}': 'headers'"))?;
    }
    if let Some(source) = info.get("source") {
        require_nonempty_string(Some(source), &format!("server '{name}': 'source'"))?;
    }
    if let Some(overrides) = info.get("client_overrides") {
        validate_overrides(name, overrides)?;
    }

    Ok(())
}

fn validate_overrides(name: &str, overrides: &JsonValue) -> Result<(), CentralError> {
    let map = overrides.as_object().ok_or_else(|| {
        structural(format!("server '{name}': 'client_overrides' must be an object"))
    })?;

    for (client, entry) in map {
        let override_map = entry.as_object().ok_or_else(|| {
            structural(format!(
                "server '{name}': client_overrides.{client} must be an object"
            ))
        })?;

        let mut extra: Vec<&String> = override_map
            .keys()
            .filter(|k| !ALLOWED_OVERRIDE.contains(&k.as_str()))
            .collect();
        extra.sort();
        if !extra.is_empty() {
            return Err(structural(format!(
                "server '{name}': client_overrides.{client} has unsupported fields: {extra:?}"
            )));
        }

        let ctx = format!("server '{name}': client_overrides.{client}");
        if let Some(command) = override_map.get("command") {
            require_nonempty_string(Some(command), &format!("{ctx}.command"))?;
        }
        if let Some(args) = override_map.get("args") {
            validate_string_array(args, &format!("{ctx}.args"))?;
        }
        if let Some(env) = override_map.get("env") {
            validate_string_map(env, &format!("{ctx}.env"))?;
        }
        if let Some(url) = override_map.get("url") {
            require_nonempty_string(Some(url), &format!("{ctx}.url"))?;
        }
        if let Some(headers) = override_map.get("headers") {
            validate_string_map(headers, &format!("{ctx}.headers"))?;
        }
        if let Some(kind) = override_map.get("type") {
            require_nonempty_string(Some(kind), &format!("{ctx}.type"))?;
        }
        if let Some(timeout) = override_map.get("timeout") {
            validate_timeout(timeout, name)?;
        }
    }

    Ok(())
}

fn validate_timeout(timeout: &JsonValue, name: &str) -> Result<(), CentralError> {
    if timeout.is_boolean() {
        return Err(structural(format!(
            "server '{name}': 'timeout' must be an integer (seconds)"
        )));
    }
    let seconds = timeout.as_i64().ok_or_else(|| {
        structural(format!("server '{name}': 'timeout' must be an integer (seconds)"))
    })?;
    if !(TIMEOUT_MIN..=TIMEOUT_MAX).contains(&seconds) {
        return Err(structural(format!(
            "server '{name}': 'timeout' out of range ({TIMEOUT_MIN}-{TIMEOUT_MAX}): {seconds}"
        )));
    }
    Ok(())
}

fn require_nonempty_string(value: Option<&JsonValue>, what: &str) -> Result<(), CentralError> {
    match value.and_then(JsonValue::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(structural(format!("{what} must be a non-empty string"))),
    }
}

fn validate_string_array(value: &JsonValue, what: &str) -> Result<(), CentralError> {
    let items = value
        .as_array()
        .ok_or_else(|| structural(format!("{what} must be an array")))?;
    for (index, item) in items.iter().enumerate() {
        if !item.is_string() {
            return Err(structural(format!("{what}[{index}] must be a string")));
        }
    }
    Ok(())
}

fn validate_string_map(value: &JsonValue, what: &str) -> Result<(), CentralError> {
    let map = value
        .as_object()
        .ok_or_else(|| structural(format!("{what} must be an object")))?;
    for (key, item) in map {
        if !item.is_string() {
            return Err(structural(format!("{what}.{key} must be a string")));
        }
    }
    Ok(())
}

/// Stricter machine-checked pass: typed deserialization with unknown
/// fields denied. Richer error paths, but never the only line of
/// defense.
pub fn decode_document(value: &JsonValue) -> Result<CentralDocument, CentralError> {
    serde_json::from_value(value.clone()).map_err(|error| CentralError::Schema(error.to_string()))
}

/// Run both layers in order; the structural layer gates the typed one.
pub fn validate_document(value: &JsonValue) -> Result<CentralDocument, CentralError> {
    validate_value(value)?;
    decode_document(value)
}

/// `(ok, message)` report form used by the `central validate` command.
pub fn check(value: &JsonValue) -> (bool, String) {
    match validate_document(value) {
        Ok(_) => (true, String::from("ok")),
        Err(error) => (false, error.to_string()),
    }
}

fn structural(message: impl Into<String>) -> CentralError {
    CentralError::Structural(message.into())
}
