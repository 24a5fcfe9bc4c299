use crate::error::CentralError;
use crate::models::TargetServerInfo;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const LIST_TIMEOUT: Duration = Duration::from_secs(10);
const REMOVE_TIMEOUT: Duration = Duration::from_secs(10);
const ADD_TIMEOUT: Duration = Duration::from_secs(45);

/// Driver for registry state that lives behind an external binary
/// rather than in a file. Reads go through the `mcp list` subcommand;
/// writes are a full remove-then-add pass so no stale flags survive on
/// a re-added entry. A missing or failing binary degrades to warnings,
/// never a batch abort.
#[derive(Debug, Clone)]
pub struct CliRegistryDriver {
    program: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct RegistrySyncStats {
    pub removed_ok: Vec<String>,
    pub removed_failed: Vec<String>,
    pub added_ok: Vec<String>,
    pub added_failed: Vec<String>,
}

impl RegistrySyncStats {
    pub fn failed(&self) -> usize {
        self.removed_failed.len() + self.added_failed.len()
    }
}

#[derive(Debug)]
struct CapturedOutput {
    stdout: String,
    stderr: String,
    exit_code: Option<i32>,
    success: bool,
}

impl CliRegistryDriver {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("claude"),
        }
    }

    pub fn with_program(mut self, program: PathBuf) -> Self {
        self.program = program;
        self
    }

    pub fn read_names(&self, warnings: &mut Vec<String>) -> BTreeSet<String> {
        match self.capture(&[String::from("mcp"), String::from("list")], LIST_TIMEOUT) {
            Ok(output) => {
                let combined = format!("{}\n{}", output.stdout, output.stderr);
                parse_list_output(&combined)
            }
            Err(error) => {
                warnings.push(format!("registry list failed: {error}"));
                BTreeSet::new()
            }
        }
    }

    pub fn write(
        &self,
        desired: &BTreeMap<String, TargetServerInfo>,
        warnings: &mut Vec<String>,
    ) -> RegistrySyncStats {
        let mut stats = RegistrySyncStats::default();

        let present = self.read_names(warnings);
        for name in &present {
            match self.remove(name) {
                Ok(()) => stats.removed_ok.push(name.clone()),
                Err(error) => {
                    warnings.push(format!("registry remove {name} failed: {error}"));
                    stats.removed_failed.push(name.clone());
                }
            }
        }

        for (name, info) in desired {
            match self.add(name, info) {
                Ok(()) => stats.added_ok.push(name.clone()),
                Err(error) => {
                    warnings.push(format!("registry add {name} failed: {error}"));
                    stats.added_failed.push(name.clone());
                }
            }
        }

        stats
    }

    pub fn clear(&self, warnings: &mut Vec<String>) -> RegistrySyncStats {
        self.write(&BTreeMap::new(), warnings)
    }

    fn remove(&self, name: &str) -> Result<(), CentralError> {
        let args = vec![
            String::from("mcp"),
            String::from("remove"),
            name.to_string(),
        ];
        self.capture(&args, REMOVE_TIMEOUT).map(|_| ())
    }

    fn add(&self, name: &str, info: &TargetServerInfo) -> Result<(), CentralError> {
        self.capture(&add_args(name, info), ADD_TIMEOUT).map(|_| ())
    }

    fn capture(
        &self,
        args: &[String],
        timeout: Duration,
    ) -> Result<CapturedOutput, CentralError> {
        let rendered = format!("{} {}", self.program.display(), args.join(" "));

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| CentralError::io(&self.program, error))?;

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait().map_err(|error| CentralError::io(&self.program, error))? {
                Some(status) => break status,
                None => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(CentralError::CommandTimeout {
                            command: rendered,
                            seconds: timeout.as_secs(),
                        });
                    }
                    std::thread::sleep(Duration::from_millis(25));
                }
            }
        };

        let mut stdout = String::new();
        let mut stderr = String::new();
        if let Some(mut pipe) = child.stdout.take() {
            use std::io::Read;
            let _ = pipe.read_to_string(&mut stdout);
        }
        if let Some(mut pipe) = child.stderr.take() {
            use std::io::Read;
            let _ = pipe.read_to_string(&mut stderr);
        }

        let output = CapturedOutput {
            stdout: stdout.trim().to_string(),
            stderr: stderr.trim().to_string(),
            exit_code: status.code(),
            success: status.success(),
        };
        if !output.success {
            return Err(CentralError::CommandFailed {
                command: rendered,
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}

impl Default for CliRegistryDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Argument order fixed by the external tool: transport and env pairs
/// before the `--` separator, then the literal command and args.
fn add_args(name: &str, info: &TargetServerInfo) -> Vec<String> {
    let mut args = vec![
        String::from("mcp"),
        String::from("add"),
        String::from("--transport"),
        String::from("stdio"),
        name.to_string(),
    ];
    for (key, value) in &info.env {
        args.push(String::from("-e"));
        args.push(format!("{key}={value}"));
    }
    args.push(String::from("--"));
    args.push(info.command.clone());
    args.extend(info.args.iter().cloned());
    args
}

/// One entry per `name: details` line; plugin-provided entries and
/// prose lines are ignored. Both output streams are scanned because
/// the tool is not consistent about which one it prints to.
fn parse_list_output(text: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("plugin:") {
            continue;
        }
        if let Some((name, _rest)) = line.split_once(':') {
            let name = name.trim();
            if !name.is_empty() {
                names.insert(name.to_string());
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::{add_args, parse_list_output};
    use crate::models::TargetServerInfo;

    #[test]
    fn list_output_parses_names_and_skips_plugins() {
        let text = "fs: npx -y pkg (stdio)\nplugin:embedded: internal\n\ncontext7: ok\nno separator line\n";
        let names = parse_list_output(text);
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec![String::from("context7"), String::from("fs")]
        );
    }

    #[test]
    fn add_arguments_keep_command_after_separator() {
        let mut info = TargetServerInfo {
            command: String::from("npx"),
            args: vec![String::from("-y"), String::from("pkg@latest")],
            ..TargetServerInfo::default()
        };
        info.env.insert(String::from("KEY"), String::from("v"));
        let args = add_args("fs", &info);
        assert_eq!(
            args,
            vec![
                "mcp", "add", "--transport", "stdio", "fs", "-e", "KEY=v", "--", "npx", "-y",
                "pkg@latest",
            ]
        );
    }
}
