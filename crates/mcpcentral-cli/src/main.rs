use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use mcpcentral_core::{
    build_doctor_report, parse_kv_pairs, templates, validate, CentralError, DoctorStatus,
    Reconciler, RegistryStore, ServerDefinition, Target, UpdateSpec,
};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "mcpcentral")]
#[command(about = "Central MCP server registry with per-client reconciliation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the registry's enabled servers (or a subset) to one client
    Sync {
        #[arg(long)]
        client: String,
        /// Comma-separated server names; defaults to every enabled server
        #[arg(long)]
        servers: Option<String>,
        /// Named server bundle instead of --servers
        #[arg(long)]
        preset: Option<String>,
        #[arg(long = "dry-run")]
        dry_run: bool,
        #[arg(long)]
        json: bool,
    },
    /// Read-only drift view per client
    Status {
        #[arg(long)]
        client: Option<String>,
        /// Also print the full registry listing
        #[arg(long)]
        central: bool,
        #[arg(long)]
        json: bool,
    },
    /// Empty the managed section of the given clients (all by default)
    Clear {
        #[arg(long)]
        client: Vec<String>,
        #[arg(long)]
        yes: bool,
        #[arg(long)]
        json: bool,
    },
    /// Restore a configuration file from its .backup slot
    Undo {
        backup: PathBuf,
        #[arg(long)]
        dest: Option<PathBuf>,
    },
    /// List every known client store and whether it exists
    Check,
    /// Manage the central registry itself
    Central {
        #[command(subcommand)]
        command: CentralCommands,
    },
}

#[derive(Subcommand, Debug)]
enum CentralCommands {
    List {
        #[arg(long)]
        json: bool,
    },
    Show {
        name: String,
        #[arg(long)]
        json: bool,
    },
    Add {
        name: String,
        #[arg(long)]
        command: String,
        #[arg(long = "arg")]
        args: Vec<String>,
        /// KEY=VALUE, repeatable
        #[arg(long = "env")]
        env: Vec<String>,
        /// KEY=VALUE, repeatable
        #[arg(long = "header")]
        headers: Vec<String>,
        #[arg(long = "type")]
        transport: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        timeout: Option<i64>,
        #[arg(long)]
        disabled: bool,
        #[arg(long)]
        json: bool,
    },
    Update {
        name: String,
        #[arg(long)]
        rename: Option<String>,
        #[arg(long)]
        command: Option<String>,
        #[arg(long = "type")]
        transport: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        timeout: Option<i64>,
        #[arg(long)]
        enable: bool,
        #[arg(long)]
        disable: bool,
        #[arg(long = "prepend-arg")]
        prepend_args: Vec<String>,
        #[arg(long = "append-arg")]
        append_args: Vec<String>,
        #[arg(long = "remove-arg")]
        remove_args: Vec<String>,
        #[arg(long = "set-env")]
        set_env: Vec<String>,
        #[arg(long = "unset-env")]
        unset_env: Vec<String>,
        #[arg(long = "set-header")]
        set_headers: Vec<String>,
        #[arg(long = "unset-header")]
        unset_headers: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    Remove {
        name: String,
        #[arg(long)]
        json: bool,
    },
    Enable {
        name: String,
    },
    Disable {
        name: String,
    },
    Export {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Import {
        file: PathBuf,
        #[arg(long)]
        replace: bool,
        #[arg(long = "prefer-incoming")]
        prefer_incoming: bool,
        #[arg(long)]
        yes: bool,
    },
    Template {
        template: String,
        name: String,
        #[arg(long = "from-path")]
        from_path: Option<PathBuf>,
        #[arg(long)]
        command: Option<String>,
        #[arg(long = "arg")]
        args: Vec<String>,
        #[arg(long = "env")]
        env: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    Dup {
        src: String,
        dest: String,
        #[arg(long)]
        json: bool,
    },
    Validate {
        #[arg(long)]
        json: bool,
    },
    Doctor {
        #[arg(long)]
        json: bool,
    },
}

/// Wrong invocation rather than a failed operation; exits with 2.
#[derive(Debug)]
struct UsageError(String);

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UsageError {}

fn usage(message: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(UsageError(message.into()))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            if error.downcast_ref::<UsageError>().is_some() {
                return ExitCode::from(2);
            }
            let code = match error.downcast_ref::<CentralError>() {
                Some(
                    CentralError::NotFound(_)
                    | CentralError::AlreadyExists(_)
                    | CentralError::RenameConflict(_)
                    | CentralError::UnknownTarget(_)
                    | CentralError::UnknownTemplate(_)
                    | CentralError::UnknownPreset(_),
                ) => 2,
                _ => 1,
            };
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let home = mcpcentral_core::paths::home_dir()
        .ok_or_else(|| anyhow!("cannot determine home directory"))?;
    let store = RegistryStore::at_home(&home);
    let reconciler = Reconciler::new(home.clone());

    match cli.command {
        Commands::Sync {
            client,
            servers,
            preset,
            dry_run,
            json,
        } => {
            let targets = Target::resolve_alias(&client)?;
            let document = store.load()?;

            let names: Option<Vec<String>> = match (servers, preset) {
                (Some(list), _) => Some(
                    list.split(',')
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .map(String::from)
                        .collect(),
                ),
                (None, Some(pack)) => Some(
                    templates::preset_servers(&pack)
                        .ok_or(CentralError::UnknownPreset(pack))?,
                ),
                (None, None) => None,
            };
            let subset: Option<BTreeSet<String>> = match names {
                Some(names) => Some(Reconciler::select_subset(&document, &names)?),
                None => None,
            };

            let outcome = reconciler.apply(&document, &targets, subset.as_ref(), dry_run);
            for warning in &outcome.warnings {
                tracing::warn!("{warning}");
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                for result in &outcome.results {
                    let prefix = if dry_run { "[DRY-RUN]" } else { "[OK]" };
                    match &result.error {
                        None => println!(
                            "{prefix} {}: {}",
                            result.target,
                            if result.written.is_empty() {
                                String::from("(none)")
                            } else {
                                result.written.join(", ")
                            }
                        ),
                        Some(error) => println!("[FAIL] {}: {error}", result.target),
                    }
                }
                println!("ok={} fail={}", outcome.ok, outcome.failed);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status {
            client,
            central,
            json,
        } => {
            let targets = match client {
                Some(alias) => Target::resolve_alias(&alias)?,
                None => Target::ALL.to_vec(),
            };
            let document = store.load()?;
            let report = reconciler.status(&document, &targets);
            for warning in &report.warnings {
                tracing::warn!("{warning}");
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(ExitCode::SUCCESS);
            }

            println!(
                "registry: total={} enabled={} disabled={}",
                report.total, report.enabled, report.disabled
            );
            if central {
                for (name, info) in &document.servers {
                    println!(
                        "- {name:24} [{}]  {}",
                        if info.is_enabled() { "on" } else { "off" },
                        info.command
                    );
                }
            }
            for target in &report.targets {
                println!("\n[{}]", target.target);
                println!(
                    "  on : {}",
                    if target.present_enabled.is_empty() {
                        String::from("(none)")
                    } else {
                        target.present_enabled.join(", ")
                    }
                );
                println!(
                    "  off: {}",
                    if target.missing.is_empty() {
                        String::from("(none)")
                    } else {
                        target.missing.join(", ")
                    }
                );
                for note in &target.notes {
                    println!("  !! {note}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Clear { client, yes, json } => {
            let targets = if client.is_empty() {
                Target::ALL.to_vec()
            } else {
                let mut resolved = Vec::new();
                for alias in &client {
                    for target in Target::resolve_alias(alias)? {
                        if !resolved.contains(&target) {
                            resolved.push(target);
                        }
                    }
                }
                resolved
            };
            if !yes {
                return Err(usage("clearing targets is destructive; pass --yes to proceed"));
            }

            let outcome = reconciler.clear(&targets);
            for warning in &outcome.warnings {
                tracing::warn!("{warning}");
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                for result in &outcome.results {
                    match &result.error {
                        None => println!("[OK] cleared {}", result.target),
                        Some(error) => println!("[FAIL] {}: {error}", result.target),
                    }
                }
                println!("ok={} fail={}", outcome.ok, outcome.failed);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Undo { backup, dest } => {
            let restored = RegistryStore::restore_backup(&backup, dest.as_deref())?;
            println!("restored to: {}", restored.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check => {
            println!("central registry: {}", store.path().display());
            for target in Target::ALL {
                match target.config_path(&home) {
                    Some(path) => println!(
                        "  {:18} {} ({})",
                        target.as_str(),
                        path.display(),
                        if path.exists() { "present" } else { "missing" }
                    ),
                    None => println!("  {:18} external registry (via CLI)", target.as_str()),
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Central { command } => run_central(&store, command),
    }
}

fn run_central(store: &RegistryStore, command: CentralCommands) -> Result<ExitCode> {
    match command {
        CentralCommands::List { json } => {
            let document = store.load()?;
            if json {
                let rows: Vec<serde_json::Value> = document
                    .servers
                    .iter()
                    .map(|(name, info)| {
                        serde_json::json!({
                            "name": name,
                            "enabled": info.is_enabled(),
                            "type": info.transport.clone().unwrap_or_default(),
                            "command": info.command,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "servers": rows,
                        "total": document.servers.len(),
                    }))?
                );
            } else {
                println!("{} server(s):", document.servers.len());
                for (name, info) in &document.servers {
                    println!(
                        "- {name:24} [{}]  {}",
                        if info.is_enabled() { "on" } else { "off" },
                        info.command
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        CentralCommands::Show { name, json: _ } => {
            let document = store.load()?;
            let entry = document
                .servers
                .get(&name)
                .ok_or(CentralError::NotFound(name.clone()))?;
            let mut wrapper = serde_json::Map::new();
            wrapper.insert(name, serde_json::to_value(entry)?);
            println!("{}", serde_json::to_string_pretty(&wrapper)?);
            Ok(ExitCode::SUCCESS)
        }
        CentralCommands::Add {
            name,
            command,
            args,
            env,
            headers,
            transport,
            url,
            timeout,
            disabled,
            json,
        } => {
            let mut definition = ServerDefinition::new(command);
            definition.args = args;
            definition.env = parse_kv_pairs(&env).into_iter().collect();
            definition.headers = parse_kv_pairs(&headers).into_iter().collect();
            definition.transport = transport;
            definition.url = url;
            definition.timeout = timeout;
            if disabled {
                definition.enabled = Some(false);
            }

            store.add_server(&name, definition.clone())?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "added": name,
                        "entry": definition,
                    }))?
                );
            } else {
                println!("added {name}");
            }
            Ok(ExitCode::SUCCESS)
        }
        CentralCommands::Update {
            name,
            rename,
            command,
            transport,
            url,
            timeout,
            enable,
            disable,
            prepend_args,
            append_args,
            remove_args,
            set_env,
            unset_env,
            set_headers,
            unset_headers,
            json,
        } => {
            if enable && disable {
                return Err(usage("--enable and --disable are mutually exclusive"));
            }
            let spec = UpdateSpec {
                rename: rename.clone(),
                command,
                transport,
                url,
                timeout,
                enabled: if enable {
                    Some(true)
                } else if disable {
                    Some(false)
                } else {
                    None
                },
                prepend_args,
                append_args,
                remove_args,
                set_env: parse_kv_pairs(&set_env),
                unset_env,
                set_headers: parse_kv_pairs(&set_headers),
                unset_headers,
            };
            let document = store.update_server(&name, &spec)?;
            let key = rename.unwrap_or(name);
            if json {
                let entry = document.servers.get(&key);
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "updated": key,
                        "after": entry,
                    }))?
                );
            } else {
                println!("updated {key}");
            }
            Ok(ExitCode::SUCCESS)
        }
        CentralCommands::Remove { name, json } => {
            store.remove_server(&name)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({ "removed": name }))?
                );
            } else {
                println!("removed {name}");
            }
            Ok(ExitCode::SUCCESS)
        }
        CentralCommands::Enable { name } => {
            store.set_enabled(&name, true)?;
            println!("enabled {name}");
            Ok(ExitCode::SUCCESS)
        }
        CentralCommands::Disable { name } => {
            store.set_enabled(&name, false)?;
            println!("disabled {name}");
            Ok(ExitCode::SUCCESS)
        }
        CentralCommands::Export { file } => {
            let rendered = store.export_to(file.as_deref())?;
            match file {
                Some(path) => println!("exported to: {}", path.display()),
                None => print!("{rendered}"),
            }
            Ok(ExitCode::SUCCESS)
        }
        CentralCommands::Import {
            file,
            replace,
            prefer_incoming,
            yes,
        } => {
            if replace && !yes {
                return Err(usage(
                    "replacing the whole registry is destructive; pass --yes to proceed",
                ));
            }
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            let incoming: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not valid JSON", file.display()))?;
            store.import_merge(&incoming, prefer_incoming, replace)?;
            println!("import complete");
            Ok(ExitCode::SUCCESS)
        }
        CentralCommands::Template {
            template,
            name,
            from_path,
            command,
            args,
            env,
            json,
        } => {
            let mut definition = match from_path {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("cannot read {}", path.display()))?;
                    serde_json::from_str::<ServerDefinition>(&raw)
                        .map_err(|error| CentralError::Schema(error.to_string()))?
                }
                None => templates::builtin_templates()
                    .remove(template.as_str())
                    .ok_or(CentralError::UnknownTemplate(template))?,
            };
            if let Some(command) = command {
                definition.command = command;
            }
            if !args.is_empty() {
                definition.args = args;
            }
            if !env.is_empty() {
                definition.env = parse_kv_pairs(&env).into_iter().collect();
            }

            store.add_server(&name, definition.clone())?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "created": name,
                        "entry": definition,
                    }))?
                );
            } else {
                println!("created {name}");
            }
            Ok(ExitCode::SUCCESS)
        }
        CentralCommands::Dup { src, dest, json } => {
            store.duplicate(&src, &dest)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(
                        &serde_json::json!({ "duplicated": { "from": src, "to": dest } })
                    )?
                );
            } else {
                println!("duplicated {src} -> {dest}");
            }
            Ok(ExitCode::SUCCESS)
        }
        CentralCommands::Validate { json } => {
            let value = match std::fs::read_to_string(store.path()) {
                Ok(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
                    .unwrap_or(serde_json::Value::Null),
                _ => serde_json::to_value(mcpcentral_core::CentralDocument::default())?,
            };
            let (ok, message) = validate::check(&value);
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(
                        &serde_json::json!({ "ok": ok, "message": message })
                    )?
                );
            } else if ok {
                println!("validation passed");
            } else {
                println!("validation failed: {message}");
            }
            Ok(if ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        CentralCommands::Doctor { json } => {
            let document = store.load()?;
            let report = build_doctor_report(&document);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "doctor: {} ({} server(s))",
                    match report.status {
                        DoctorStatus::Passed => "passed",
                        DoctorStatus::Failed => "failed",
                        DoctorStatus::Skipped => "skipped",
                    },
                    report.total_servers
                );
                for issue in &report.issues {
                    println!("  - {issue}");
                }
            }
            Ok(if report.status == DoctorStatus::Passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
    }
}
