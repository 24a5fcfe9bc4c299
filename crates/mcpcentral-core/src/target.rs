use crate::error::CentralError;
use crate::paths;
use std::path::{Path, PathBuf};

/// One consuming application with its own configuration store. The
/// closed set keeps driver selection a match on an enum instead of
/// string comparisons scattered across call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    ClaudeFile,
    ClaudeRegistry,
    Codex,
    Gemini,
    Iflow,
    Droid,
    Cursor,
    VscodeUser,
    VscodeInsiders,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    JsonMap,
    TomlText,
    CliRegistry,
}

impl Target {
    pub const ALL: [Self; 9] = [
        Self::ClaudeFile,
        Self::ClaudeRegistry,
        Self::Codex,
        Self::Gemini,
        Self::Iflow,
        Self::Droid,
        Self::Cursor,
        Self::VscodeUser,
        Self::VscodeInsiders,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClaudeFile => "claude-file",
            Self::ClaudeRegistry => "claude-reg",
            Self::Codex => "codex",
            Self::Gemini => "gemini",
            Self::Iflow => "iflow",
            Self::Droid => "droid",
            Self::Cursor => "cursor",
            Self::VscodeUser => "vscode-user",
            Self::VscodeInsiders => "vscode-insiders",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ClaudeFile => "Claude(file)",
            Self::ClaudeRegistry => "Claude(registry)",
            Self::Codex => "Codex",
            Self::Gemini => "Gemini",
            Self::Iflow => "iFlow",
            Self::Droid => "Droid",
            Self::Cursor => "Cursor",
            Self::VscodeUser => "VS Code(User)",
            Self::VscodeInsiders => "VS Code(Insiders)",
        }
    }

    /// Key looked up in a server's `client_overrides` block. Both
    /// Claude stores share one vocabulary.
    pub fn override_key(self) -> &'static str {
        match self {
            Self::ClaudeFile | Self::ClaudeRegistry => "claude",
            other => other.as_str(),
        }
    }

    pub fn store_kind(self) -> StoreKind {
        match self {
            Self::ClaudeRegistry => StoreKind::CliRegistry,
            Self::Codex => StoreKind::TomlText,
            _ => StoreKind::JsonMap,
        }
    }

    /// Configuration file for file-backed targets; the CLI registry
    /// has none.
    pub fn config_path(self, home: &Path) -> Option<PathBuf> {
        match self {
            Self::ClaudeFile => Some(home.join(".claude").join("settings.json")),
            Self::ClaudeRegistry => None,
            Self::Codex => Some(home.join(".codex").join("config.toml")),
            Self::Gemini => Some(home.join(".gemini").join("settings.json")),
            Self::Iflow => Some(home.join(".iflow").join("settings.json")),
            Self::Droid => Some(home.join(".factory").join("mcp.json")),
            Self::Cursor => Some(home.join(".cursor").join("mcp.json")),
            Self::VscodeUser => Some(paths::vscode_user_path(home)),
            Self::VscodeInsiders => Some(paths::vscode_insiders_path(home)),
        }
    }

    /// Top-level key owning the managed server map in JSON targets.
    pub fn managed_key(self) -> &'static str {
        match self {
            Self::VscodeUser | Self::VscodeInsiders => "servers",
            _ => "mcpServers",
        }
    }

    /// Gemini and iFlow reject a `type` field outright; the adapter
    /// omits it rather than letting the consumer error.
    pub fn emits_transport(self) -> bool {
        !matches!(self, Self::Gemini | Self::Iflow)
    }

    /// Droid's schema is stricter than the generic map shape: fixed
    /// `stdio` transport tag, empty fields dropped.
    pub fn strict_render(self) -> bool {
        matches!(self, Self::Droid)
    }

    /// Gemini keeps a parallel allow-list of server names that must
    /// track the managed map.
    pub fn has_allowed_list(self) -> bool {
        matches!(self, Self::Gemini)
    }

    /// Resolve a user-supplied alias to the targets it denotes.
    /// `claude` spans both the settings file and the CLI registry.
    pub fn resolve_alias(raw: &str) -> Result<Vec<Self>, CentralError> {
        let alias = raw.trim().to_ascii_lowercase();
        let targets = match alias.as_str() {
            "claude" => vec![Self::ClaudeFile, Self::ClaudeRegistry],
            "claude-file" => vec![Self::ClaudeFile],
            "claude-reg" => vec![Self::ClaudeRegistry],
            "codex" => vec![Self::Codex],
            "gemini" => vec![Self::Gemini],
            "iflow" => vec![Self::Iflow],
            "droid" => vec![Self::Droid],
            "cursor" => vec![Self::Cursor],
            "vscode" | "vscode-user" => vec![Self::VscodeUser],
            "vscode-insiders" | "vscode-ins" | "insiders" => vec![Self::VscodeInsiders],
            _ => return Err(CentralError::UnknownTarget(raw.to_string())),
        };
        Ok(targets)
    }
}

impl std::str::FromStr for Target {
    type Err = CentralError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "claude-file" => Ok(Self::ClaudeFile),
            "claude-reg" => Ok(Self::ClaudeRegistry),
            "codex" => Ok(Self::Codex),
            "gemini" => Ok(Self::Gemini),
            "iflow" => Ok(Self::Iflow),
            "droid" => Ok(Self::Droid),
            "cursor" => Ok(Self::Cursor),
            "vscode-user" => Ok(Self::VscodeUser),
            "vscode-insiders" => Ok(Self::VscodeInsiders),
            other => Err(CentralError::UnknownTarget(other.to_string())),
        }
    }
}
