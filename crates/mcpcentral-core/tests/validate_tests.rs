use mcpcentral_core::validate::{check, decode_document, validate_document, validate_value};
use serde_json::json;

fn valid_doc() -> serde_json::Value {
    json!({
        "version": "1.1.0",
        "description": "Central MCP Servers config",
        "servers": {
            "fs": {
                "command": "npx",
                "args": ["-y", "mcp-server-filesystem@latest"],
                "env": {"KEY": "value"},
                "timeout": 120,
                "enabled": true
            },
            "remote": {
                "command": "proxy",
                "url": "https://api.example.com/mcp",
                "headers": {"Authorization": "Bearer token"},
                "type": "http"
            }
        }
    })
}

#[test]
fn accepts_a_valid_document_in_both_layers() {
    let value = valid_doc();
    validate_value(&value).expect("structural layer");
    decode_document(&value).expect("typed layer");
    let document = validate_document(&value).expect("combined");
    assert_eq!(document.servers.len(), 2);
}

#[test]
fn missing_command_fails_each_layer_independently() {
    let value = json!({
        "version": "1.1.0",
        "description": "d",
        "servers": {"broken": {"args": ["-y"]}}
    });
    let structural = validate_value(&value).expect_err("structural must fail");
    assert!(structural.to_string().contains("command"));
    decode_document(&value).expect_err("typed must fail");
}

#[test]
fn blank_command_is_rejected() {
    let mut value = valid_doc();
    value["servers"]["fs"]["command"] = json!("   ");
    validate_value(&value).expect_err("blank command");
}

#[test]
fn unknown_server_field_fails_each_layer_independently() {
    let mut value = valid_doc();
    value["servers"]["fs"]["auto_restart"] = json!(true);
    let structural = validate_value(&value).expect_err("structural must fail");
    assert!(structural.to_string().contains("auto_restart"));
    decode_document(&value).expect_err("typed must fail");
}

#[test]
fn unknown_top_level_field_fails_each_layer_independently() {
    let mut value = valid_doc();
    value["metadata"] = json!({});
    validate_value(&value).expect_err("structural must fail");
    decode_document(&value).expect_err("typed must fail");
}

#[test]
fn missing_required_top_level_keys_fail() {
    let value = json!({"version": "1.0.0", "servers": {}});
    let error = validate_value(&value).expect_err("missing description");
    assert!(error.to_string().contains("description"));
}

#[test]
fn timeout_range_is_enforced_by_the_hand_written_layer() {
    let mut value = valid_doc();
    value["servers"]["fs"]["timeout"] = json!(7200);
    let error = validate_value(&value).expect_err("7200 out of range");
    assert!(error.to_string().contains("timeout"));

    value["servers"]["fs"]["timeout"] = json!(0);
    validate_value(&value).expect_err("0 out of range");

    value["servers"]["fs"]["timeout"] = json!(3600);
    validate_value(&value).expect("3600 in range");

    value["servers"]["fs"]["timeout"] = json!(true);
    validate_value(&value).expect_err("bool is not an integer");
}

#[test]
fn enabled_must_be_boolean() {
    let mut value = valid_doc();
    value["servers"]["fs"]["enabled"] = json!("yes");
    validate_value(&value).expect_err("structural must fail");
    decode_document(&value).expect_err("typed must fail");
}

#[test]
fn args_and_env_element_types_are_checked() {
    let mut value = valid_doc();
    value["servers"]["fs"]["args"] = json!(["-y", 7]);
    validate_value(&value).expect_err("non-string arg");

    let mut value = valid_doc();
    value["servers"]["fs"]["env"] = json!({"KEY": 1});
    validate_value(&value).expect_err("non-string env value");
}

#[test]
fn client_override_unknown_key_fails_each_layer_independently() {
    let mut value = valid_doc();
    value["servers"]["fs"]["client_overrides"] = json!({
        "cursor": {"command": "local-bin", "restart": true}
    });
    let error = validate_value(&value).expect_err("structural must fail");
    assert!(error.to_string().contains("restart"));
    decode_document(&value).expect_err("typed must fail");
}

#[test]
fn client_override_field_types_are_checked() {
    let mut value = valid_doc();
    value["servers"]["fs"]["client_overrides"] = json!({"cursor": {"args": "not-a-list"}});
    validate_value(&value).expect_err("override args must be a list");

    let mut value = valid_doc();
    value["servers"]["fs"]["client_overrides"] = json!({"cursor": "whole-entry"});
    validate_value(&value).expect_err("override must be an object");
}

#[test]
fn check_reports_ok_and_message() {
    let (ok, message) = check(&valid_doc());
    assert!(ok);
    assert_eq!(message, "ok");

    let (ok, message) = check(&json!({"version": "1"}));
    assert!(!ok);
    assert!(!message.is_empty());
}
