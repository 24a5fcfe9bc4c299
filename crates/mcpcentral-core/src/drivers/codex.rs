use crate::error::CentralError;
use crate::fsio;
use crate::models::TargetServerInfo;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const MANAGED_BEGIN: &str = "# mcp-central:servers:begin";
pub const MANAGED_END: &str = "# mcp-central:servers:end";

/// Header line written by earlier generations of this tool; recognized
/// for removal only.
const LEGACY_HEADER_PREFIX: &str = "# === MCP Servers";

const DEFAULT_STARTUP_TIMEOUT: i64 = 60;

/// Driver for the Codex `config.toml`: free-form user text plus zero
/// or more machine-managed sections. Writes rebuild only the managed
/// sections and keep every other byte of the file as-is.
#[derive(Debug, Clone)]
pub struct CodexTomlDriver {
    path: PathBuf,
}

impl CodexTomlDriver {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_names(&self, warnings: &mut Vec<String>) -> BTreeSet<String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(value) => value,
            Err(error) => {
                if error.kind() != std::io::ErrorKind::NotFound {
                    warnings.push(format!("failed to read {}: {error}", self.path.display()));
                }
                return BTreeSet::new();
            }
        };
        match parse_server_names(&raw) {
            Ok(names) => names,
            Err(error) => {
                warnings.push(format!(
                    "{}: falling back to line scan ({error})",
                    self.path.display()
                ));
                scan_server_names(&raw)
            }
        }
    }

    /// Replace every managed section with a fresh render of the desired
    /// set. The file must already exist: Codex owns its config and this
    /// tool only ever edits a section of it.
    pub fn write(
        &self,
        desired: &BTreeMap<String, TargetServerInfo>,
    ) -> Result<(), CentralError> {
        let existing = fs::read_to_string(&self.path)
            .map_err(|error| CentralError::io(&self.path, error))?;

        let _guard = crate::write_lock();
        fsio::take_backup(&self.path)?;
        let stripped = strip_managed_sections(&existing);
        let mut next = stripped.trim_end_matches('\n').to_string();
        if !desired.is_empty() {
            if !next.is_empty() {
                next.push_str("\n\n");
            }
            next.push_str(&render_block(desired));
        }
        next.push('\n');
        fsio::atomic_write(&self.path, next.as_bytes())
    }

    /// Drop the managed sections and nothing else. A missing file is
    /// left missing.
    pub fn clear(&self) -> Result<bool, CentralError> {
        if !self.path.exists() {
            return Ok(false);
        }
        self.write(&BTreeMap::new())?;
        Ok(true)
    }
}

fn parse_server_names(raw: &str) -> Result<BTreeSet<String>, String> {
    if raw.trim().is_empty() {
        return Ok(BTreeSet::new());
    }
    let parsed = raw.parse::<toml::Value>().map_err(|error| error.to_string())?;
    let Some(table) = parsed.get("mcp_servers").and_then(toml::Value::as_table) else {
        return Ok(BTreeSet::new());
    };
    Ok(table.keys().cloned().collect())
}

/// Line scan used when the file is not parseable TOML (partial edits,
/// unsupported syntax). Only table headers are considered.
fn scan_server_names(raw: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for line in raw.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix("[mcp_servers.") else {
            continue;
        };
        let Some(name) = rest.strip_suffix(']') else {
            continue;
        };
        if !name.contains('.') && !name.is_empty() {
            names.insert(name.to_string());
        }
    }
    names
}

/// Remove every machine-managed region: the marker-delimited block,
/// legacy generated-header blocks, and any `[mcp_servers.*]` table with
/// its sub-tables. Skipping ends the moment an unrelated line-anchored
/// table header appears, so a following user table can never be
/// consumed.
pub fn strip_managed_sections(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.trim_end() == MANAGED_BEGIN {
            while i < lines.len() && lines[i].trim_end() != MANAGED_END {
                i += 1;
            }
            i += 1; // the end marker itself
            continue;
        }
        if line.starts_with(LEGACY_HEADER_PREFIX) {
            i += 1;
            while i < lines.len() {
                let current = lines[i];
                if current.starts_with("# ===") || current.starts_with('[') {
                    break;
                }
                i += 1;
            }
            continue;
        }
        if line.starts_with("[mcp_servers.") {
            i += 1;
            while i < lines.len() {
                let current = lines[i];
                if current.starts_with('[') && !current.starts_with("[mcp_servers.") {
                    break;
                }
                i += 1;
            }
            continue;
        }
        kept.push(line);
        i += 1;
    }
    kept.join("\n")
}

fn render_block(desired: &BTreeMap<String, TargetServerInfo>) -> String {
    let mut lines = vec![MANAGED_BEGIN.to_string()];
    for (name, info) in desired {
        lines.push(format!("[mcp_servers.{name}]"));
        let timeout = match info.timeout {
            Some(seconds) if seconds >= 1 => seconds,
            _ => DEFAULT_STARTUP_TIMEOUT,
        };
        lines.push(format!("startup_timeout_sec = {timeout}"));
        lines.push(format!("command = \"{}\"", toml_escape(&info.command)));
        if !info.args.is_empty() {
            let rendered: Vec<String> = info
                .args
                .iter()
                .map(|arg| format!("\"{}\"", toml_escape(arg)))
                .collect();
            lines.push(format!("args = [{}]", rendered.join(", ")));
        }
        if !info.env.is_empty() {
            lines.push(String::new());
            lines.push(format!("[mcp_servers.{name}.env]"));
            for (key, value) in &info.env {
                lines.push(format!("{} = \"{}\"", toml_key(key), toml_escape(value)));
            }
        }
        lines.push(String::new());
    }
    if lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines.push(MANAGED_END.to_string());
    lines.join("\n")
}

fn toml_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn toml_key(key: &str) -> String {
    let bare = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if bare {
        key.to_string()
    } else {
        format!("\"{}\"", toml_escape(key))
    }
}

#[cfg(test)]
mod tests {
    use super::{scan_server_names, strip_managed_sections, MANAGED_BEGIN, MANAGED_END};

    #[test]
    fn strip_leaves_unrelated_tables_alone() {
        let text = format!(
            "[profile]\nmodel = \"gpt\"\n\n{MANAGED_BEGIN}\n[mcp_servers.fs]\ncommand = \"npx\"\n{MANAGED_END}\n\n[tools]\nsearch = true\n"
        );
        let stripped = strip_managed_sections(&text);
        assert!(stripped.contains("[profile]"));
        assert!(stripped.contains("[tools]"));
        assert!(!stripped.contains("mcp_servers"));
    }

    #[test]
    fn strip_removes_bare_legacy_tables_up_to_next_table() {
        let text = "[general]\na = 1\n[mcp_servers.fs]\ncommand = \"npx\"\n\n[mcp_servers.fs.env]\nK = \"v\"\n[other]\nb = 2\n";
        let stripped = strip_managed_sections(text);
        assert!(stripped.contains("[general]"));
        assert!(stripped.contains("[other]"));
        assert!(!stripped.contains("mcp_servers"));
        assert!(!stripped.contains("command"));
    }

    #[test]
    fn scan_ignores_env_subtables() {
        let raw = "[mcp_servers.fs]\n[mcp_servers.fs.env]\n[mcp_servers.web]\n";
        let names = scan_server_names(raw);
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec![String::from("fs"), String::from("web")]
        );
    }
}
