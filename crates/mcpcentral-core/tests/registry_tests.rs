use mcpcentral_core::{CentralError, RegistryStore, ServerDefinition, UpdateSpec};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn store_in(temp: &TempDir) -> RegistryStore {
    RegistryStore::new(temp.path().join("config").join("mcp-servers.json"))
}

#[test]
fn load_of_missing_file_yields_default_without_creating_it() {
    let temp = TempDir::new().expect("tempdir");
    let store = store_in(&temp);

    let document = store.load().expect("load default");
    assert_eq!(document.version, "1.1.0");
    assert!(document.servers.is_empty());
    assert!(!store.path().exists());
}

#[test]
fn add_server_persists_and_takes_a_backup_of_the_previous_content() {
    let temp = TempDir::new().expect("tempdir");
    let store = store_in(&temp);

    store
        .add_server("fs", ServerDefinition::new("npx"))
        .expect("first add");
    assert!(store.path().exists());
    // nothing existed before the first write
    assert!(!store.backup_path().exists());
    let first_content = fs::read_to_string(store.path()).expect("read");

    store
        .add_server("context7", ServerDefinition::new("npx"))
        .expect("second add");
    let backup = fs::read_to_string(store.backup_path()).expect("backup exists");
    assert_eq!(backup, first_content);

    let reloaded = store.load().expect("reload");
    assert_eq!(reloaded.servers.len(), 2);
}

#[test]
fn failed_validation_aborts_the_mutation_with_no_side_effects() {
    let temp = TempDir::new().expect("tempdir");
    let store = store_in(&temp);
    store
        .add_server("fs", ServerDefinition::new("npx"))
        .expect("seed");
    let before = fs::read_to_string(store.path()).expect("read");

    let error = store
        .add_server("broken", ServerDefinition::new("  "))
        .expect_err("blank command must fail");
    assert!(matches!(error, CentralError::Structural(_)));

    let after = fs::read_to_string(store.path()).expect("read");
    assert_eq!(before, after);
    let tmp_leftover = store.path().with_file_name("mcp-servers.json.tmp");
    assert!(!tmp_leftover.exists());
}

#[test]
fn duplicate_add_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let store = store_in(&temp);
    store
        .add_server("fs", ServerDefinition::new("npx"))
        .expect("seed");
    let error = store
        .add_server("fs", ServerDefinition::new("npx"))
        .expect_err("duplicate");
    assert!(matches!(error, CentralError::AlreadyExists(_)));
}

#[test]
fn update_edits_fields_args_env_and_rename() {
    let temp = TempDir::new().expect("tempdir");
    let store = store_in(&temp);
    let mut definition = ServerDefinition::new("npx");
    definition.args = vec![String::from("-y"), String::from("pkg@latest")];
    store.add_server("fs", definition).expect("seed");

    let spec = UpdateSpec {
        rename: Some(String::from("filesystem")),
        timeout: Some(120),
        prepend_args: vec![String::from("--quiet")],
        append_args: vec![String::from("~/work")],
        remove_args: vec![String::from("-y")],
        set_env: vec![(String::from("KEY"), String::from("v"))],
        ..UpdateSpec::default()
    };
    let document = store.update_server("fs", &spec).expect("update");

    assert!(!document.servers.contains_key("fs"));
    let entry = document.servers.get("filesystem").expect("renamed entry");
    assert_eq!(
        entry.args,
        vec![
            String::from("--quiet"),
            String::from("pkg@latest"),
            String::from("~/work"),
        ]
    );
    assert_eq!(entry.timeout, Some(120));
    assert_eq!(entry.env.get("KEY"), Some(&String::from("v")));
}

#[test]
fn rename_onto_an_existing_name_is_a_conflict() {
    let temp = TempDir::new().expect("tempdir");
    let store = store_in(&temp);
    store.add_server("a", ServerDefinition::new("npx")).expect("a");
    store.add_server("b", ServerDefinition::new("npx")).expect("b");

    let spec = UpdateSpec {
        rename: Some(String::from("b")),
        ..UpdateSpec::default()
    };
    let error = store.update_server("a", &spec).expect_err("conflict");
    assert!(matches!(error, CentralError::RenameConflict(_)));
}

#[test]
fn import_merge_keeps_existing_unless_prefer_incoming() {
    let temp = TempDir::new().expect("tempdir");
    let store = store_in(&temp);
    store
        .add_server("fs", ServerDefinition::new("existing-cmd"))
        .expect("seed");

    let incoming = json!({
        "version": "1.1.0",
        "description": "incoming",
        "servers": {
            "fs": {"command": "incoming-cmd"},
            "extra": {"command": "npx"}
        }
    });

    let merged = store
        .import_merge(&incoming, false, false)
        .expect("merge keep existing");
    assert_eq!(merged.servers["fs"].command, "existing-cmd");
    assert_eq!(merged.servers["extra"].command, "npx");

    let merged = store
        .import_merge(&incoming, true, false)
        .expect("merge prefer incoming");
    assert_eq!(merged.servers["fs"].command, "incoming-cmd");
}

#[test]
fn import_replace_substitutes_the_whole_document() {
    let temp = TempDir::new().expect("tempdir");
    let store = store_in(&temp);
    store
        .add_server("fs", ServerDefinition::new("npx"))
        .expect("seed");

    let incoming = json!({
        "version": "2.0.0",
        "description": "replacement",
        "servers": {"only": {"command": "bin"}}
    });
    let replaced = store.import_merge(&incoming, false, true).expect("replace");
    assert_eq!(replaced.version, "2.0.0");
    assert_eq!(replaced.servers.len(), 1);

    let invalid = json!({"version": "2.0.0", "servers": {}});
    store
        .import_merge(&invalid, false, true)
        .expect_err("invalid replacement rejected");
    let on_disk = store.load().expect("reload");
    assert_eq!(on_disk.version, "2.0.0");
}

#[test]
fn restore_backup_infers_the_original_path() {
    let temp = TempDir::new().expect("tempdir");
    let original = temp.path().join("settings.json");
    let backup = temp.path().join("settings.json.backup");
    fs::write(&backup, "{\"restored\": true}").expect("write backup");

    let restored = RegistryStore::restore_backup(&backup, None).expect("restore");
    assert_eq!(restored, original);
    assert_eq!(
        fs::read_to_string(&original).expect("read"),
        "{\"restored\": true}"
    );
}

#[test]
fn restore_backup_handles_the_legacy_timestamped_name() {
    let temp = TempDir::new().expect("tempdir");
    let backup = temp.path().join("config.json.20251125_143022.backup");
    fs::write(&backup, "old").expect("write backup");

    let restored = RegistryStore::restore_backup(&backup, None).expect("restore");
    assert_eq!(restored, temp.path().join("config.json"));
}

#[test]
fn restore_of_a_missing_backup_is_an_error() {
    let temp = TempDir::new().expect("tempdir");
    let error = RegistryStore::restore_backup(&temp.path().join("nope.backup"), None)
        .expect_err("missing backup");
    assert!(matches!(error, CentralError::BackupMissing(_)));
}

#[test]
fn export_renders_the_document_and_optionally_writes_it() {
    let temp = TempDir::new().expect("tempdir");
    let store = store_in(&temp);
    store
        .add_server("fs", ServerDefinition::new("npx"))
        .expect("seed");

    let rendered = store.export_to(None).expect("render");
    assert!(rendered.contains("\"fs\""));

    let dest = temp.path().join("out").join("export.json");
    store.export_to(Some(&dest)).expect("write");
    assert_eq!(fs::read_to_string(&dest).expect("read"), rendered);
}
