use std::path::{Path, PathBuf};

pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()))
}

pub fn central_config_path(home: &Path) -> PathBuf {
    home.join(".mcp-central").join("config").join("mcp-servers.json")
}

/// Expand a leading `~` or `~/` to the given home directory. Anything
/// else passes through untouched, which keeps projection idempotent.
pub fn expand_tilde(value: &str, home: &Path) -> String {
    if value == "~" {
        return home.display().to_string();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest).display().to_string();
    }
    value.to_string()
}

/// VS Code keeps its user profile under Application Support on macOS.
/// `MCP_OS` overrides detection so target paths stay testable anywhere.
fn is_macos() -> bool {
    if let Ok(value) = std::env::var("MCP_OS") {
        let v = value.trim().to_ascii_lowercase();
        if !v.is_empty() {
            return matches!(v.as_str(), "darwin" | "mac" | "macos" | "osx");
        }
    }
    cfg!(target_os = "macos")
}

pub fn vscode_user_path(home: &Path) -> PathBuf {
    if is_macos() {
        home.join("Library")
            .join("Application Support")
            .join("Code")
            .join("User")
            .join("mcp.json")
    } else {
        home.join(".config").join("Code").join("User").join("mcp.json")
    }
}

pub fn vscode_insiders_path(home: &Path) -> PathBuf {
    if is_macos() {
        home.join("Library")
            .join("Application Support")
            .join("Code - Insiders")
            .join("User")
            .join("mcp.json")
    } else {
        home.join(".config")
            .join("Code - Insiders")
            .join("User")
            .join("mcp.json")
    }
}
