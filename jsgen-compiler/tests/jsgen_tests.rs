// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

// The integration test in this file is not part of the jsgen crate, and
// so we cannot directly depend on anything from jsgen. However, we can
// include the test_utils.rs file directly.

#[path = "../src/test_utils.rs"]
#[allow(dead_code)]
mod test_utils;
use test_utils::{assert_contains, find_binary};

fn jsgen_path() -> PathBuf {
    // Cargo will set `CARGO_BIN_EXE_jsgen` when compiling the crate. If
    // we're not using Cargo, we search for `jsgen` using find_binary.
    match std::option_env!("CARGO_BIN_EXE_jsgen") {
        Some(path) => PathBuf::from(path),
        None => find_binary("jsgen").unwrap(),
    }
}

/// Run `jsgen` with the selected arguments.
fn jsgen(args: &[&str]) -> Output {
    Command::new(jsgen_path()).args(args).output().expect("jsgen failed")
}

fn canonical_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/canonical")
}

#[test]
fn test_canonical_directory() {
    let tempdir = tempfile::tempdir().unwrap();
    let output_path = tempdir.path().join("models.g.h");
    let output = jsgen(&[
        "-o",
        output_path.to_str().unwrap(),
        canonical_dir().to_str().unwrap(),
    ]);
    assert!(output.status.success(), "jsgen failure: {:?}", output);

    let code = fs::read_to_string(&output_path).unwrap();
    assert_contains(&code, "#ifndef MODELS_G_H");
    assert_contains(&code, "// Forward declarations");

    // Files are processed in sorted order: models.h, then shapes.h.
    let role = code.find("JSGEN_DEF int _parse_role(Jsp *jsp, struct role *out, JsGenAllocator *a) {");
    let palette =
        code.find("JSGEN_DEF int _parse_palette(Jsp *jsp, struct palette *out, JsGenAllocator *a) {");
    assert!(role.is_some() && palette.is_some() && role < palette);

    assert_contains(&code, "JSGEN_DEF char *stringify_User_indent(const User *in, int indent) {");
    assert_contains(&code, "JSGEN_DEF char *stringify_Report_indent(const Report *in, int indent) {");
    assert!(!code.contains("_parse_Report("));
    assert_contains(&code, "JSGEN_DEF int parse_request(const char *json, struct request *out, JsGenAllocator *a) {");
    assert!(!code.contains("_stringify_request("));
    assert!(!code.contains("unrelated"));
    assert!(!code.contains("internal"));
    assert_contains(&code, r#"if (strcmp(jsp->string, "active") == 0) {"#);
    assert_contains(&code, "err = _parse_swatch(jsp, &out->swatches[i], a);");
}

#[test]
fn test_explicit_file_and_json_output() {
    let tempdir = tempfile::tempdir().unwrap();
    let output_path = tempdir.path().join("models.json");
    let input = canonical_dir().join("shapes.h");
    let output = jsgen(&[
        "--output-format",
        "json",
        "-o",
        output_path.to_str().unwrap(),
        input.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "jsgen failure: {:?}", output);

    let json = fs::read_to_string(&output_path).unwrap();
    let models: serde_json::Value = serde_json::from_str(&json).unwrap();
    let ids: Vec<_> =
        models.as_array().unwrap().iter().map(|m| m["id"].as_str().unwrap().to_owned()).collect();
    assert_eq!(ids, vec!["struct palette", "struct swatch"]);
}

#[test]
fn test_failing_file_does_not_stop_generation() {
    let tempdir = tempfile::tempdir().unwrap();
    let broken = tempdir.path().join("broken.h");
    let valid = tempdir.path().join("valid.h");
    fs::write(&broken, "JSON struct broken { int x; @ };\n").unwrap();
    fs::write(&valid, "JSON struct valid { int x; };\n").unwrap();
    let output_path = tempdir.path().join("out.g.h");

    let output = jsgen(&[
        "-o",
        output_path.to_str().unwrap(),
        broken.to_str().unwrap(),
        valid.to_str().unwrap(),
        tempdir.path().join("missing.h").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_contains(&stderr, "E13");
    assert_contains(&stderr, "missing.h");

    let code = fs::read_to_string(&output_path).unwrap();
    assert_contains(&code, "#ifndef OUT_G_H");
    assert_contains(&code, "_parse_valid(");
    assert!(!code.contains("_parse_broken("));
}

#[test]
fn test_analysis_errors_abort_generation() {
    let tempdir = tempfile::tempdir().unwrap();
    let input = tempdir.path().join("dup.h");
    fs::write(&input, "JSON struct dup { int x; };\nJSON struct dup { int y; };\n").unwrap();
    let output_path = tempdir.path().join("out.g.h");

    let output = jsgen(&["-o", output_path.to_str().unwrap(), input.to_str().unwrap()]);
    assert!(!output.status.success());
    assert_contains(&String::from_utf8_lossy(&output.stderr), "E1");
    assert!(!output_path.exists());
}

#[test]
fn test_annotations_header() {
    let tempdir = tempfile::tempdir().unwrap();
    let header = tempdir.path().join("jsgen.h");
    let output = jsgen(&["--annotations-header", header.to_str().unwrap()]);
    assert!(output.status.success(), "jsgen failure: {:?}", output);

    let code = fs::read_to_string(&header).unwrap();
    assert_contains(&code, "#define JSGEN_JSON\n");
    assert_contains(&code, "#define sized_by jsgen_sized_by\n");
}

#[test]
fn test_missing_inputs() {
    let output = jsgen(&[]);
    assert!(!output.status.success());
}
