use crate::adapter;
use crate::drivers::{CliRegistryDriver, CodexTomlDriver, JsonMapDriver};
use crate::error::CentralError;
use crate::models::{
    ApplyOutcome, CentralDocument, StatusReport, TargetOutcome, TargetReport, TargetServerInfo,
};
use crate::target::{StoreKind, Target};
use chrono::{SecondsFormat, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Orchestrates one pass per target: project the wanted subset, read
/// the observed state through the matching driver, diff, and apply.
/// Targets succeed or fail independently; the aggregate outcome counts
/// both.
#[derive(Debug, Clone)]
pub struct Reconciler {
    home: PathBuf,
    registry_program: Option<PathBuf>,
}

impl Reconciler {
    pub fn new(home: PathBuf) -> Self {
        Self {
            home,
            registry_program: None,
        }
    }

    /// Point the CLI-registry driver at a specific binary (tests use a
    /// shell stub).
    pub fn with_registry_program(mut self, program: PathBuf) -> Self {
        self.registry_program = Some(program);
        self
    }

    pub fn home(&self) -> &PathBuf {
        &self.home
    }

    fn cli_driver(&self) -> CliRegistryDriver {
        match &self.registry_program {
            Some(program) => CliRegistryDriver::new().with_program(program.clone()),
            None => CliRegistryDriver::new(),
        }
    }

    fn codex_driver(&self, target: Target) -> Option<CodexTomlDriver> {
        target.config_path(&self.home).map(CodexTomlDriver::new)
    }

    /// Observed server names at one target, recomputed on every pass.
    pub fn observed(&self, target: Target, warnings: &mut Vec<String>) -> BTreeSet<String> {
        match target.store_kind() {
            StoreKind::JsonMap => JsonMapDriver::new(target, &self.home)
                .map(|driver| driver.read_names(warnings))
                .unwrap_or_default(),
            StoreKind::TomlText => self
                .codex_driver(target)
                .map(|driver| driver.read_names(warnings))
                .unwrap_or_default(),
            StoreKind::CliRegistry => self.cli_driver().read_names(warnings),
        }
    }

    /// The subset of the registry this target should carry, already
    /// projected into the target's shape. Disabled entries are never
    /// projected; explicitly selecting one only earns a warning.
    pub fn desired(
        &self,
        document: &CentralDocument,
        target: Target,
        subset: Option<&BTreeSet<String>>,
        warnings: &mut Vec<String>,
    ) -> BTreeMap<String, TargetServerInfo> {
        let mut out = BTreeMap::new();
        for (name, definition) in &document.servers {
            if let Some(selection) = subset {
                if !selection.contains(name) {
                    continue;
                }
                if !definition.is_enabled() {
                    warnings.push(format!("server '{name}' is disabled in the registry, skipped"));
                    continue;
                }
            } else if !definition.is_enabled() {
                continue;
            }
            out.insert(name.clone(), adapter::project(definition, target, &self.home));
        }
        out
    }

    /// Reject unknown names before anything is written.
    pub fn select_subset(
        document: &CentralDocument,
        names: &[String],
    ) -> Result<BTreeSet<String>, CentralError> {
        let mut selection = BTreeSet::new();
        for name in names {
            if !document.servers.contains_key(name) {
                return Err(CentralError::NotFound(name.clone()));
            }
            selection.insert(name.clone());
        }
        Ok(selection)
    }

    /// Pure drift classification over (registry, observed).
    pub fn classify(
        document: &CentralDocument,
        target: Target,
        observed: &BTreeSet<String>,
    ) -> TargetReport {
        let enabled: BTreeSet<String> = document
            .servers
            .iter()
            .filter(|(_, def)| def.is_enabled())
            .map(|(name, _)| name.clone())
            .collect();
        let disabled: BTreeSet<String> = document
            .servers
            .iter()
            .filter(|(_, def)| !def.is_enabled())
            .map(|(name, _)| name.clone())
            .collect();

        let present_enabled: Vec<String> = observed.intersection(&enabled).cloned().collect();
        let missing: Vec<String> = enabled.difference(observed).cloned().collect();
        let disabled_present: Vec<String> = observed.intersection(&disabled).cloned().collect();
        let unknown: Vec<String> = observed
            .iter()
            .filter(|name| !enabled.contains(*name) && !disabled.contains(*name))
            .cloned()
            .collect();

        let mut notes = Vec::new();
        if !disabled_present.is_empty() {
            notes.push(format!(
                "disabled in the registry but still configured: {}",
                disabled_present.join(", ")
            ));
        }
        if !unknown.is_empty() {
            notes.push(format!(
                "present at the target but unknown to the registry: {}",
                unknown.join(", ")
            ));
        }

        TargetReport {
            target: target.as_str().to_string(),
            present_enabled,
            missing,
            disabled_present,
            unknown,
            notes,
        }
    }

    /// Read-only drift view across targets; nothing is mutated.
    pub fn status(&self, document: &CentralDocument, targets: &[Target]) -> StatusReport {
        let mut warnings = Vec::new();
        let mut reports = Vec::new();
        for target in targets {
            let observed = self.observed(*target, &mut warnings);
            reports.push(Self::classify(document, *target, &observed));
        }

        let enabled = document
            .servers
            .values()
            .filter(|def| def.is_enabled())
            .count();
        StatusReport {
            generated_at: iso8601_now(),
            total: document.servers.len(),
            enabled,
            disabled: document.servers.len() - enabled,
            targets: reports,
            warnings,
        }
    }

    /// Write the wanted set to each requested target, then re-read to
    /// confirm. One target failing never stops the rest.
    pub fn apply(
        &self,
        document: &CentralDocument,
        targets: &[Target],
        subset: Option<&BTreeSet<String>>,
        dry_run: bool,
    ) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();

        for target in targets {
            let desired = self.desired(document, *target, subset, &mut outcome.warnings);
            let written: Vec<String> = desired.keys().cloned().collect();

            if dry_run {
                outcome.results.push(TargetOutcome {
                    target: target.as_str().to_string(),
                    written,
                    confirmed: false,
                    error: None,
                });
                outcome.ok += 1;
                continue;
            }

            let result = self.commit_target(*target, &desired, &mut outcome.warnings);
            match result {
                Ok(confirmed) => {
                    if !confirmed {
                        outcome.warnings.push(format!(
                            "{}: post-write readback does not match the desired set",
                            target.as_str()
                        ));
                    }
                    outcome.results.push(TargetOutcome {
                        target: target.as_str().to_string(),
                        written,
                        confirmed,
                        error: None,
                    });
                    outcome.ok += 1;
                }
                Err(error) => {
                    outcome.results.push(TargetOutcome {
                        target: target.as_str().to_string(),
                        written,
                        confirmed: false,
                        error: Some(error.to_string()),
                    });
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }

    fn commit_target(
        &self,
        target: Target,
        desired: &BTreeMap<String, TargetServerInfo>,
        warnings: &mut Vec<String>,
    ) -> Result<bool, CentralError> {
        let wanted: BTreeSet<String> = desired.keys().cloned().collect();
        match target.store_kind() {
            StoreKind::JsonMap => {
                let driver = JsonMapDriver::new(target, &self.home)
                    .ok_or_else(|| CentralError::UnknownTarget(target.as_str().to_string()))?;
                driver.write(desired, warnings)?;
                Ok(driver.read_names(warnings) == wanted)
            }
            StoreKind::TomlText => {
                let driver = self
                    .codex_driver(target)
                    .ok_or_else(|| CentralError::UnknownTarget(target.as_str().to_string()))?;
                driver.write(desired)?;
                Ok(driver.read_names(warnings) == wanted)
            }
            StoreKind::CliRegistry => {
                let driver = self.cli_driver();
                let stats = driver.write(desired, warnings);
                if stats.failed() > 0 {
                    return Err(CentralError::CommandFailed {
                        command: format!("registry sync for {}", target.as_str()),
                        exit_code: None,
                        stderr: format!(
                            "remove failures: {}; add failures: {}",
                            stats.removed_failed.len(),
                            stats.added_failed.len()
                        ),
                    });
                }
                Ok(driver.read_names(warnings) == wanted)
            }
        }
    }

    /// Empty the managed section of each requested target. Explicit
    /// operation; ordinary reconciliation only surfaces unknown
    /// entries, it never removes them.
    pub fn clear(&self, targets: &[Target]) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        for target in targets {
            let result: Result<bool, CentralError> = match target.store_kind() {
                StoreKind::JsonMap => JsonMapDriver::new(*target, &self.home)
                    .ok_or_else(|| CentralError::UnknownTarget(target.as_str().to_string()))
                    .and_then(|driver| driver.clear(&mut outcome.warnings)),
                StoreKind::TomlText => self
                    .codex_driver(*target)
                    .ok_or_else(|| CentralError::UnknownTarget(target.as_str().to_string()))
                    .and_then(|driver| driver.clear()),
                StoreKind::CliRegistry => {
                    let stats = self.cli_driver().clear(&mut outcome.warnings);
                    if stats.failed() > 0 {
                        Err(CentralError::CommandFailed {
                            command: format!("registry clear for {}", target.as_str()),
                            exit_code: None,
                            stderr: format!("{} entries could not be removed", stats.failed()),
                        })
                    } else {
                        Ok(true)
                    }
                }
            };

            match result {
                Ok(touched) => {
                    if !touched {
                        outcome.warnings.push(format!(
                            "{}: nothing to clear (store absent)",
                            target.as_str()
                        ));
                    }
                    outcome.results.push(TargetOutcome {
                        target: target.as_str().to_string(),
                        written: Vec::new(),
                        confirmed: touched,
                        error: None,
                    });
                    outcome.ok += 1;
                }
                Err(error) => {
                    outcome.results.push(TargetOutcome {
                        target: target.as_str().to_string(),
                        written: Vec::new(),
                        confirmed: false,
                        error: Some(error.to_string()),
                    });
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }
}

pub fn iso8601_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
