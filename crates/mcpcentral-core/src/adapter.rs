use crate::models::{ServerDefinition, TargetServerInfo};
use crate::paths::expand_tilde;
use crate::target::Target;
use std::path::Path;

/// Project a registry entry into the shape one target accepts: apply
/// the per-client override block, keep only the fields the target
/// understands, map the transport vocabulary, and expand `~` in the
/// command and arguments. Projecting an already-projected entry is a
/// no-op.
pub fn project(entry: &ServerDefinition, target: Target, home: &Path) -> TargetServerInfo {
    let mut merged = entry.clone();
    if let Some(overrides) = entry.client_overrides.get(target.override_key()) {
        if let Some(command) = &overrides.command {
            merged.command = command.clone();
        }
        if let Some(args) = &overrides.args {
            merged.args = args.clone();
        }
        if let Some(env) = &overrides.env {
            merged.env = env.clone();
        }
        if let Some(url) = &overrides.url {
            merged.url = Some(url.clone());
        }
        if let Some(headers) = &overrides.headers {
            merged.headers = headers.clone();
        }
        if let Some(transport) = &overrides.transport {
            merged.transport = Some(transport.clone());
        }
        if let Some(timeout) = overrides.timeout {
            merged.timeout = Some(timeout);
        }
    }

    let transport = if target.emits_transport() {
        // Map only an explicitly set tag. An absent tag usually marks a
        // remote server; inventing a local-process default here would
        // silently mis-describe it.
        merged
            .transport
            .as_deref()
            .and_then(|raw| map_transport(raw, target))
    } else {
        None
    };

    TargetServerInfo {
        command: expand_tilde(&merged.command, home),
        args: merged
            .args
            .iter()
            .map(|arg| expand_tilde(arg, home))
            .collect(),
        env: merged.env,
        url: merged.url,
        headers: merged.headers,
        transport,
        timeout: merged.timeout.filter(|seconds| *seconds >= 1),
    }
}

/// Consumers disagree on how to spell a locally spawned process:
/// Cursor writes `local`, Claude and VS Code write `stdio`. The
/// mapping is stable under repetition.
fn map_transport(raw: &str, target: Target) -> Option<String> {
    let tag = raw.trim().to_ascii_lowercase();
    if tag.is_empty() {
        return None;
    }
    let mapped = match target {
        Target::Cursor => {
            if tag == "stdio" {
                String::from("local")
            } else {
                tag
            }
        }
        Target::ClaudeFile
        | Target::ClaudeRegistry
        | Target::VscodeUser
        | Target::VscodeInsiders => {
            if tag == "local" {
                String::from("stdio")
            } else {
                tag
            }
        }
        _ => tag,
    };
    Some(mapped)
}

#[cfg(test)]
mod tests {
    use super::map_transport;
    use crate::target::Target;

    #[test]
    fn transport_mapping_is_idempotent() {
        for target in Target::ALL {
            if !target.emits_transport() {
                continue;
            }
            for tag in ["stdio", "local", "http", "sse"] {
                let once = map_transport(tag, target).expect("mapped");
                let twice = map_transport(&once, target).expect("mapped twice");
                assert_eq!(once, twice, "{tag} for {}", target.as_str());
            }
        }
    }

    #[test]
    fn blank_transport_maps_to_nothing() {
        assert_eq!(map_transport("  ", Target::Cursor), None);
    }
}
