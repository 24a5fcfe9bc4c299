use crate::models::{CentralDocument, DoctorEntry, DoctorReport, DoctorStatus};
use std::collections::BTreeMap;
use std::path::Path;

/// Read-only health check over the registry: command resolvability,
/// URL shape, and known per-server tuning advice. Mutates nothing.
pub fn build_doctor_report(document: &CentralDocument) -> DoctorReport {
    let mut issues = Vec::new();
    let mut servers = BTreeMap::new();

    for (name, info) in &document.servers {
        if !info.is_enabled() {
            servers.insert(
                name.clone(),
                DoctorEntry {
                    status: DoctorStatus::Skipped,
                    issues: Vec::new(),
                    suggestions: vec![String::from("disabled in the registry (enabled: false)")],
                },
            );
            continue;
        }

        let mut entry_issues = Vec::new();
        let mut suggestions = Vec::new();

        if info.command == "npx" {
            if !command_resolves("npx") {
                entry_issues.push(String::from("npx is not available"));
                suggestions.push(String::from(
                    "install node/npm, or switch command to a globally installed binary",
                ));
            }
        } else if !command_resolves(&info.command) {
            entry_issues.push(format!("command not found: {}", info.command));
            suggestions.push(format!(
                "make sure {} is on PATH, or use npx -y <pkg>@latest",
                info.command
            ));
        }

        if let Some(url) = &info.url {
            if !url_looks_valid(url) {
                entry_issues.push(String::from("url is not a valid http(s) address"));
            }
        }

        if name == "task-master-ai" {
            match info.timeout {
                None => {
                    entry_issues.push(String::from(
                        "task-master-ai has no timeout configured (300+ seconds recommended)",
                    ));
                    suggestions.push(String::from(
                        "mcpcentral central update task-master-ai --timeout 300",
                    ));
                }
                Some(seconds) if seconds < 300 => {
                    entry_issues.push(format!(
                        "task-master-ai timeout too small: {seconds} (at least 300 recommended)"
                    ));
                    suggestions.push(String::from(
                        "mcpcentral central update task-master-ai --timeout 300",
                    ));
                }
                Some(_) => {}
            }

            let tools_mode = info
                .env
                .get("TASK_MASTER_TOOLS")
                .map(|value| value.trim().to_string())
                .unwrap_or_default();
            if tools_mode.is_empty() {
                entry_issues.push(String::from(
                    "task-master-ai has no env.TASK_MASTER_TOOLS (standard recommended)",
                ));
                suggestions.push(String::from(
                    "mcpcentral central update task-master-ai --set-env TASK_MASTER_TOOLS=standard",
                ));
            } else if tools_mode.eq_ignore_ascii_case("all") {
                entry_issues.push(String::from(
                    "TASK_MASTER_TOOLS=all can slow loading (standard/core/lean recommended)",
                ));
                suggestions.push(String::from(
                    "mcpcentral central update task-master-ai --set-env TASK_MASTER_TOOLS=standard",
                ));
            }
        }

        issues.extend(entry_issues.iter().map(|issue| format!("{name}: {issue}")));
        servers.insert(
            name.clone(),
            DoctorEntry {
                status: if entry_issues.is_empty() {
                    DoctorStatus::Passed
                } else {
                    DoctorStatus::Failed
                },
                issues: entry_issues,
                suggestions,
            },
        );
    }

    DoctorReport {
        status: if issues.is_empty() {
            DoctorStatus::Passed
        } else {
            DoctorStatus::Failed
        },
        total_servers: document.servers.len(),
        issues,
        servers,
    }
}

fn command_resolves(command: &str) -> bool {
    let path = Path::new(command);
    if path.is_absolute() {
        return path.exists();
    }
    let Some(search) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&search).any(|dir| dir.join(command).is_file())
}

fn url_looks_valid(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host) => {
            let host = host.split('/').next().unwrap_or_default();
            !host.is_empty()
                && host
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::url_looks_valid;

    #[test]
    fn url_shapes() {
        assert!(url_looks_valid("http://localhost:3000/mcp"));
        assert!(url_looks_valid("https://api.example.com"));
        assert!(!url_looks_valid("ftp://example.com"));
        assert!(!url_looks_valid("https://"));
        assert!(!url_looks_valid("not a url"));
    }
}
