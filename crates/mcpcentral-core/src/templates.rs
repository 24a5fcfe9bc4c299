use crate::models::ServerDefinition;
use std::collections::BTreeMap;

/// Built-in starting points for `central template`. Names double as
/// template identifiers on the command line.
pub fn builtin_templates() -> BTreeMap<&'static str, ServerDefinition> {
    let mut templates = BTreeMap::new();

    templates.insert("filesystem", {
        let mut def = ServerDefinition::new("npx");
        def.args = string_vec(&["-y", "mcp-server-filesystem@latest", "~/work"]);
        def
    });
    templates.insert("sequential-thinking", {
        let mut def = ServerDefinition::new("npx");
        def.args = string_vec(&["-y", "@modelcontextprotocol/server-sequential-thinking@latest"]);
        def
    });
    templates.insert("playwright", {
        let mut def = ServerDefinition::new("npx");
        def.args = string_vec(&["-y", "@playwright/mcp@latest", "--headless"]);
        def
    });
    templates.insert("serena", {
        let mut def = ServerDefinition::new("~/.local/bin/serena");
        def.args = string_vec(&["start-mcp-server", "--context", "desktop-app"]);
        def
    });
    templates.insert("context7", {
        let mut def = ServerDefinition::new("npx");
        def.args = string_vec(&["-y", "@upstash/context7-mcp@latest"]);
        def
    });
    templates.insert("task-master-ai", {
        let mut def = ServerDefinition::new("npx");
        def.args = string_vec(&["-y", "task-master-ai@latest"]);
        def.timeout = Some(300);
        def.env
            .insert(String::from("TASK_MASTER_TOOLS"), String::from("standard"));
        def
    });
    templates.insert("chrome-devtools", {
        let mut def = ServerDefinition::new("npx");
        def.args = string_vec(&["-y", "chrome-devtools-mcp@latest"]);
        def
    });
    templates.insert("custom-npx", {
        let mut def = ServerDefinition::new("npx");
        def.args = string_vec(&["-y", "<package>@latest"]);
        def
    });
    templates.insert("frontend-automation", {
        let mut def = ServerDefinition::new("npx");
        def.args = string_vec(&["-y", "@playwright/mcp@latest", "--headless"]);
        def.env
            .insert(String::from("PLAYWRIGHT_BROWSERS_PATH"), String::from("0"));
        def
    });
    templates.insert("doc-search", {
        let mut def = ServerDefinition::new("npx");
        def.args = string_vec(&["-y", "mcp-server-filesystem@latest", "~/work", "~/.mcp-central"]);
        def
    });
    templates.insert("task-suite", {
        let mut def = ServerDefinition::new("npx");
        def.args = string_vec(&["-y", "task-master-ai@latest"]);
        def.timeout = Some(300);
        def.env
            .insert(String::from("TASK_MASTER_TOOLS"), String::from("standard"));
        def
    });

    templates
}

pub fn template_description(name: &str) -> Option<&'static str> {
    match name {
        "filesystem" => Some("minimal filesystem server"),
        "sequential-thinking" => Some("structured step-by-step reasoning"),
        "playwright" => Some("browser automation (headless)"),
        "serena" => Some("local serena binary in desktop-app context"),
        "context7" => Some("Context7 documentation lookup"),
        "task-master-ai" => Some("timeout 300 + TASK_MASTER_TOOLS=standard"),
        "chrome-devtools" => Some("DevTools browser control"),
        "custom-npx" => Some("skeleton for any npx-launched package"),
        "frontend-automation" => Some("@playwright/mcp headless with pinned browser path"),
        "doc-search" => Some("filesystem pointed at ~/work and ~/.mcp-central"),
        "task-suite" => Some("task-master-ai with the recommended tuning"),
        _ => None,
    }
}

/// Named server bundles accepted by `sync --preset`.
pub fn preset_packs() -> Vec<(&'static str, &'static str, Vec<&'static str>)> {
    vec![
        (
            "cursor-minimal",
            "smallest useful Cursor setup",
            vec!["task-master-ai", "context7"],
        ),
        (
            "claude-basic",
            "Claude file + registry basics",
            vec!["task-master-ai", "context7"],
        ),
        (
            "vscode-user-basic",
            "VS Code user-profile basics",
            vec!["task-master-ai", "context7"],
        ),
        (
            "frontend-automation",
            "playwright + chrome-devtools",
            vec!["playwright", "chrome-devtools"],
        ),
        (
            "doc-search",
            "filesystem + context7",
            vec!["filesystem", "context7"],
        ),
        (
            "task-suite",
            "task management pair",
            vec!["task-master-ai", "context7"],
        ),
    ]
}

pub fn preset_servers(name: &str) -> Option<Vec<String>> {
    preset_packs()
        .into_iter()
        .find(|(pack, _, _)| *pack == name)
        .map(|(_, _, servers)| servers.into_iter().map(String::from).collect())
}

fn string_vec(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}
