use mcpcentral_core::drivers::codex::{CodexTomlDriver, MANAGED_BEGIN, MANAGED_END};
use mcpcentral_core::TargetServerInfo;
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

const USER_CONTENT: &str = "model = \"o3\"\n\n[profile.work]\napproval = \"never\"\n";

fn driver_with(temp: &TempDir, content: &str) -> CodexTomlDriver {
    let path = temp.path().join(".codex").join("config.toml");
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(&path, content).expect("seed");
    CodexTomlDriver::new(path)
}

fn desired(entries: &[(&str, Option<i64>)]) -> BTreeMap<String, TargetServerInfo> {
    entries
        .iter()
        .map(|(name, timeout)| {
            (
                name.to_string(),
                TargetServerInfo {
                    command: String::from("npx"),
                    args: vec![String::from("-y"), format!("{name}@latest")],
                    timeout: *timeout,
                    ..TargetServerInfo::default()
                },
            )
        })
        .collect()
}

#[test]
fn write_renders_tables_and_keeps_user_lines() {
    let temp = TempDir::new().expect("tempdir");
    let driver = driver_with(&temp, USER_CONTENT);

    driver.write(&desired(&[("fs", None)])).expect("write");

    let text = fs::read_to_string(driver.path()).expect("read");
    for line in USER_CONTENT.lines() {
        assert!(text.contains(line), "user line lost: {line}");
    }
    assert!(text.contains(MANAGED_BEGIN));
    assert!(text.contains(MANAGED_END));
    assert!(text.contains("[mcp_servers.fs]"));
    assert!(text.contains("command = \"npx\""));
    assert!(text.contains("args = [\"-y\", \"fs@latest\"]"));
}

#[test]
fn missing_or_non_positive_timeout_defaults_to_sixty() {
    let temp = TempDir::new().expect("tempdir");
    let driver = driver_with(&temp, "");

    driver
        .write(&desired(&[("absent", None), ("zero", Some(0)), ("kept", Some(300))]))
        .expect("write");

    let text = fs::read_to_string(driver.path()).expect("read");
    let timeouts: Vec<&str> = text
        .lines()
        .filter(|line| line.starts_with("startup_timeout_sec"))
        .collect();
    assert_eq!(
        timeouts,
        vec![
            "startup_timeout_sec = 60",
            "startup_timeout_sec = 300",
            "startup_timeout_sec = 60",
        ]
    );
}

#[test]
fn env_vars_render_as_a_sub_table() {
    let temp = TempDir::new().expect("tempdir");
    let driver = driver_with(&temp, "");

    let mut map = desired(&[("fs", None)]);
    map.get_mut("fs")
        .expect("entry")
        .env
        .insert(String::from("TASK_MASTER_TOOLS"), String::from("standard"));
    driver.write(&map).expect("write");

    let text = fs::read_to_string(driver.path()).expect("read");
    assert!(text.contains("[mcp_servers.fs.env]"));
    assert!(text.contains("TASK_MASTER_TOOLS = \"standard\""));
}

#[test]
fn rewrite_removes_two_prior_managed_generations() {
    let prior = format!(
        "{USER_CONTENT}\n# === MCP Servers (generated) ===\n[mcp_servers.old-one]\ncommand = \"old\"\n\n[mcp_servers.old-one.env]\nK = \"v\"\n\n{MANAGED_BEGIN}\n[mcp_servers.old-two]\ncommand = \"older\"\n{MANAGED_END}\n"
    );
    let temp = TempDir::new().expect("tempdir");
    let driver = driver_with(&temp, &prior);

    driver.write(&desired(&[("fresh", None)])).expect("write");

    let text = fs::read_to_string(driver.path()).expect("read");
    assert!(!text.contains("old-one"));
    assert!(!text.contains("old-two"));
    assert!(!text.contains("command = \"old\""));
    assert_eq!(text.matches(MANAGED_BEGIN).count(), 1);
    assert!(text.contains("[mcp_servers.fresh]"));
    for line in USER_CONTENT.lines() {
        assert!(text.contains(line), "user line lost: {line}");
    }
}

#[test]
fn rewrite_with_zero_prior_sections_only_appends() {
    let temp = TempDir::new().expect("tempdir");
    let driver = driver_with(&temp, USER_CONTENT);

    driver.write(&desired(&[("fs", None)])).expect("write");
    let text = fs::read_to_string(driver.path()).expect("read");
    assert!(text.starts_with("model = \"o3\""));
    assert_eq!(text.matches("[mcp_servers.fs]").count(), 1);
}

#[test]
fn a_user_table_after_the_managed_block_survives() {
    let prior = "[alpha]\na = 1\n\n[mcp_servers.stale]\ncommand = \"x\"\n\n[omega]\nz = 9\n";
    let temp = TempDir::new().expect("tempdir");
    let driver = driver_with(&temp, prior);

    driver.write(&desired(&[("fs", None)])).expect("write");
    let text = fs::read_to_string(driver.path()).expect("read");
    assert!(text.contains("[alpha]"));
    assert!(text.contains("[omega]"));
    assert!(text.contains("z = 9"));
    assert!(!text.contains("stale"));
}

#[test]
fn read_names_lists_managed_servers() {
    let temp = TempDir::new().expect("tempdir");
    let driver = driver_with(&temp, "");
    driver
        .write(&desired(&[("fs", None), ("context7", None)]))
        .expect("write");

    let mut warnings = Vec::new();
    let names = driver.read_names(&mut warnings);
    assert_eq!(
        names.into_iter().collect::<Vec<_>>(),
        vec![String::from("context7"), String::from("fs")]
    );
    assert!(warnings.is_empty());
}

#[test]
fn read_names_falls_back_to_a_line_scan_on_broken_toml() {
    let temp = TempDir::new().expect("tempdir");
    let driver = driver_with(
        &temp,
        "this is not == toml\n[mcp_servers.fs]\ncommand = \"npx\"\n",
    );

    let mut warnings = Vec::new();
    let names = driver.read_names(&mut warnings);
    assert_eq!(names.into_iter().collect::<Vec<_>>(), vec![String::from("fs")]);
    assert_eq!(warnings.len(), 1);
}

#[test]
fn write_requires_the_file_to_exist() {
    let temp = TempDir::new().expect("tempdir");
    let driver = CodexTomlDriver::new(temp.path().join(".codex").join("config.toml"));
    driver
        .write(&desired(&[("fs", None)]))
        .expect_err("missing codex config is a per-target failure");
}

#[test]
fn write_takes_a_backup_first() {
    let temp = TempDir::new().expect("tempdir");
    let driver = driver_with(&temp, USER_CONTENT);
    driver.write(&desired(&[("fs", None)])).expect("write");

    let backup = driver.path().with_file_name("config.toml.backup");
    assert_eq!(fs::read_to_string(backup).expect("backup"), USER_CONTENT);
}

#[test]
fn clear_strips_managed_sections_and_nothing_else() {
    let temp = TempDir::new().expect("tempdir");
    let driver = driver_with(&temp, USER_CONTENT);
    driver.write(&desired(&[("fs", None)])).expect("write");

    assert!(driver.clear().expect("clear"));
    let text = fs::read_to_string(driver.path()).expect("read");
    assert!(!text.contains("mcp_servers"));
    assert!(!text.contains(MANAGED_BEGIN));
    for line in USER_CONTENT.lines() {
        assert!(text.contains(line), "user line lost: {line}");
    }

    let missing = CodexTomlDriver::new(temp.path().join("absent.toml"));
    assert!(!missing.clear().expect("clear missing"));
}
