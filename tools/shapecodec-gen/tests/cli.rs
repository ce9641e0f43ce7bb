// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end runs of the `shapecodec-gen` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const PERSON_SCHEMA: &str = r#"
[[types]]
name = "Person"
generates_codec = true

[[types.members]]
name = "name"
shape = { kind = "primitive", primitive = "string" }

[[types.members]]
name = "age"
shape = { kind = "primitive", primitive = "i32" }

[[types.members]]
name = "nick"
shape = { kind = "primitive", primitive = "string", nullability = "nullable" }
"#;

const BROKEN_SCHEMA: &str = r#"
[[types]]
name = "Plugin"
kind = "interface"
constructors = []

[[types]]
name = "Host"
generates_codec = true

[[types.members]]
name = "plugin"
shape = { kind = "named", name = "Plugin" }
"#;

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_shapecodec-gen"))
        .args(args)
        .output()
        .expect("run shapecodec-gen")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn write_schema(dir: &TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("types.toml");
    std::fs::write(&path, text).expect("write schema");
    path
}

fn arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

#[test]
fn test_encode_then_decode() {
    let dir = TempDir::new().expect("tempdir");
    let schema = write_schema(&dir, PERSON_SCHEMA);

    let encoded = run(&[
        "encode",
        "--schema",
        arg(&schema),
        "--type",
        "Person",
        "--value",
        r#"{"name": "Ada", "age": 36, "nick": null}"#,
    ]);
    assert!(encoded.status.success(), "{:?}", encoded);
    let hex = stdout(&encoded);
    assert_eq!(hex.trim(), "034164612400000000");

    let decoded = run(&[
        "decode",
        "--schema",
        arg(&schema),
        "--type",
        "Person",
        "--hex",
        hex.trim(),
    ]);
    assert!(decoded.status.success(), "{:?}", decoded);
    let json: serde_json::Value = serde_json::from_str(&stdout(&decoded)).expect("json output");
    assert_eq!(
        json,
        serde_json::json!({"$type": "Person", "name": "Ada", "age": 36, "nick": null})
    );
}

#[test]
fn test_generate_writes_source_file() {
    let dir = TempDir::new().expect("tempdir");
    let schema = write_schema(&dir, PERSON_SCHEMA);
    let out = dir.path().join("codecs.rs");

    let output = run(&["generate", "--schema", arg(&schema), "-o", arg(&out)]);
    assert!(output.status.success(), "{:?}", output);
    let text = std::fs::read_to_string(&out).expect("generated file");
    assert!(text.starts_with("// @generated by shapecodec-gen"));
    assert!(text.contains("impl Person {"));
    assert!(text.contains("pub fn serialize(value: &Person"));
}

#[test]
fn test_generate_to_stdout_for_explicit_root() {
    let dir = TempDir::new().expect("tempdir");
    let schema = write_schema(&dir, PERSON_SCHEMA);
    let output = run(&["generate", "--schema", arg(&schema), "--type", "Person?"]);
    assert!(output.status.success(), "{:?}", output);
    assert!(stdout(&output).contains("fn serialize_person"));
}

#[test]
fn test_check_passes_and_fails() {
    let dir = TempDir::new().expect("tempdir");
    let schema = write_schema(&dir, PERSON_SCHEMA);
    let ok = run(&["check", "--schema", arg(&schema)]);
    assert!(ok.status.success(), "{:?}", ok);
    assert!(stdout(&ok).contains("[OK]"));

    let broken = write_schema(&dir, BROKEN_SCHEMA);
    let failed = run(&["check", "--schema", arg(&broken), "--json"]);
    assert!(!failed.status.success());
    let diagnostics: serde_json::Value =
        serde_json::from_str(&stdout(&failed)).expect("json diagnostics");
    assert_eq!(diagnostics[0]["code"], "unsupported_shape");
}

#[test]
fn test_gen_config_refuses_to_overwrite() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("shapecodec.toml");

    let first = run(&["gen-config", "-o", arg(&path)]);
    assert!(first.status.success(), "{:?}", first);
    let text = std::fs::read_to_string(&path).expect("config file");
    assert!(text.contains("[generator]"));

    let second = run(&["gen-config", "-o", arg(&path)]);
    assert!(!second.status.success());
    let forced = run(&["gen-config", "-o", arg(&path), "--force"]);
    assert!(forced.status.success());
}
