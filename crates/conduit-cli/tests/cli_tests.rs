//! CLI integration tests for conduit-cli
//!
//! Commands that need no node, plus error reporting when the node is absent.

use std::path::Path;
use std::process::Command;

use serde_json::Value;

/// Run the CLI with a private config file so ~/.conduit is never read
fn run_conduit(config: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_conduit"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

const UNLINKED: &str = r#"{
    "contracts": {
        "User.sol:User": {
            "bin": "6060__Lib.sol:Lib___________________________6040",
            "abi": "[]"
        },
        "Lib.sol:Lib": {
            "bin": "6060604052",
            "abi": "[]"
        }
    }
}"#;

// ==================== Help & Version Tests ====================

#[test]
fn test_cli_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_conduit(&dir.path().join("c.toml"), &["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["account", "deploy", "call", "send", "link", "watch", "receipt"] {
        assert!(stdout.contains(command), "help lists {}", command);
    }
}

#[test]
fn test_cli_version() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_conduit(&dir.path().join("c.toml"), &["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("conduit"));
}

#[test]
fn test_account_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_conduit(&dir.path().join("c.toml"), &["account", "--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["new", "list", "unlock", "balance"] {
        assert!(stdout.contains(command));
    }
}

// ==================== Config Tests ====================

#[test]
fn test_config_set_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    let output = run_conduit(
        &config,
        &["config", "--set-rpc", "http://10.1.2.3:8545", "--json"],
    );
    assert!(output.status.success());
    assert!(config.exists());

    let output = run_conduit(&config, &["config", "--show", "--json"]);
    assert!(output.status.success());
    let shown = stdout_json(&output);
    assert_eq!(shown["rpc_url"], "http://10.1.2.3:8545");
    assert_eq!(shown["gas_limit"], 1_000_000);
}

#[test]
fn test_config_rejects_bad_default_from() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_conduit(
        &dir.path().join("config.toml"),
        &["config", "--set-from", "0x1234"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid address"));
}

// ==================== Link Tests ====================

#[test]
fn test_link_resolves_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("combined.json");
    std::fs::write(&artifact, UNLINKED).unwrap();
    let lib = format!("Lib.sol:Lib=0x{}", "ab".repeat(20));

    let output = run_conduit(
        &dir.path().join("c.toml"),
        &[
            "--json",
            "link",
            "--artifact",
            artifact.to_str().unwrap(),
            "--contract",
            "User.sol:User",
            "--link",
            &lib,
        ],
    );
    assert!(output.status.success());
    let linked = stdout_json(&output);
    assert_eq!(linked["contract"], "User.sol:User");
    assert_eq!(
        linked["bytecode"].as_str().unwrap(),
        format!("6060{}6040", "ab".repeat(20))
    );
}

#[test]
fn test_link_reports_unresolved() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("combined.json");
    std::fs::write(&artifact, UNLINKED).unwrap();

    let output = run_conduit(
        &dir.path().join("c.toml"),
        &[
            "--json",
            "link",
            "--artifact",
            artifact.to_str().unwrap(),
            "--contract",
            "User.sol:User",
        ],
    );
    assert!(!output.status.success());
    let error = stdout_json(&output);
    assert_eq!(error["success"], false);
    assert!(error["error"].as_str().unwrap().contains("Lib.sol:Lib"));
}

// ==================== Node Errors ====================

#[test]
fn test_unreachable_node_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_conduit(
        &dir.path().join("c.toml"),
        &["--json", "--rpc-url", "http://127.0.0.1:9", "info"],
    );
    assert!(!output.status.success());
    let error = stdout_json(&output);
    assert_eq!(error["success"], false);
    assert!(error["error"].as_str().unwrap().contains("web3_clientVersion"));
}

#[test]
fn test_invalid_address_argument() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_conduit(
        &dir.path().join("c.toml"),
        &["account", "balance", "not-an-address"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid address"));
}
