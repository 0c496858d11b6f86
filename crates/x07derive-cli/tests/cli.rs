use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::{json, Value};
use x07_contracts::{
    X07DERIVE_BATCH_REPORT_SCHEMA_VERSION, X07DERIVE_GROUPS_REPORT_SCHEMA_VERSION, X07DERIVE_MANIFEST_SCHEMA_VERSION,
    X07DERIVE_REPORT_SCHEMA_VERSION, X07DERIVE_TYPES_SCHEMA_VERSION,
};

fn run_x07derive(args: &[&str]) -> std::process::Output {
    let exe = env!("CARGO_BIN_EXE_x07derive");
    Command::new(exe).args(args).output().expect("run x07derive")
}

fn parse_json_stdout(out: &std::process::Output) -> Value {
    serde_json::from_slice(&out.stdout).expect("parse stdout JSON")
}

fn write_bytes(path: &PathBuf, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(path, bytes).expect("write file");
}

fn p(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

fn types_json() -> Vec<u8> {
    serde_json::to_vec_pretty(&json!({
        "schema_version": X07DERIVE_TYPES_SCHEMA_VERSION,
        "types": [
            {"name": "tree", "params": ["a"], "body": {"kind": "variant", "ctors": [
                {"name": "Leaf"},
                {"name": "Node", "args": [{"kind": "var", "name": "a"}, {"kind": "recursive", "name": "forest"}]}
            ]}},
            {"name": "forest", "params": ["a"], "body": {"kind": "applied", "name": "list", "args": [
                {"kind": "recursive", "name": "tree"}
            ]}},
            {"name": "point", "body": {"kind": "record", "fields": [
                {"name": "x", "ty": {"kind": "primitive", "name": "int"}},
                {"name": "y", "ty": {"kind": "primitive", "name": "int"}}
            ]}}
        ]
    }))
    .expect("encode types JSON")
}

const DOC: &str = "\
(module demo)
;; @derive:begin tree compare
;; @derive:end tree compare
;; @derive:begin point hash
;; @derive:end point hash
";

fn setup(dir: &Path) -> (PathBuf, PathBuf) {
    let types = dir.join("types.json");
    let doc = dir.join("demo.sx");
    write_bytes(&types, &types_json());
    write_bytes(&doc, DOC.as_bytes());
    (types, doc)
}

#[test]
fn gen_then_check_is_clean_and_drift_fails() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (types, doc) = setup(tmp.path());

    let out = run_x07derive(&["gen", "--types", p(&types), "--doc", p(&doc)]);
    assert_eq!(out.status.code(), Some(0), "stderr:\n{}", String::from_utf8_lossy(&out.stderr));
    let v = parse_json_stdout(&out);
    assert_eq!(v["schema_version"], X07DERIVE_REPORT_SCHEMA_VERSION);
    assert_eq!(v["mode"], "accept");
    assert_eq!(v["ok"], true);
    assert_eq!(v["updated"].as_array().expect("updated[]").len(), 2);

    let written = std::fs::read_to_string(&doc).expect("read doc");
    assert!(written.contains("(defrec"), "{written}");
    assert!(written.contains("(defn hash_point (v)"), "{written}");

    let out = run_x07derive(&["gen", "--types", p(&types), "--doc", p(&doc), "--check"]);
    assert_eq!(out.status.code(), Some(0), "stderr:\n{}", String::from_utf8_lossy(&out.stderr));
    let v = parse_json_stdout(&out);
    assert_eq!(v["mode"], "check");
    assert_eq!(v["mismatches"].as_array().expect("mismatches[]").len(), 0);

    let drifted = written.replacen("hash_int", "hash_float", 1);
    write_bytes(&doc, drifted.as_bytes());
    let report = tmp.path().join("report.json");
    let out = run_x07derive(&[
        "gen",
        "--types",
        p(&types),
        "--doc",
        p(&doc),
        "--check",
        "--report-out",
        p(&report),
    ]);
    assert_eq!(out.status.code(), Some(1));
    let v: Value = serde_json::from_slice(&std::fs::read(&report).expect("read report")).expect("report JSON");
    assert_eq!(v["ok"], false);
    let mismatches = v["mismatches"].as_array().expect("mismatches[]");
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0]["region"]["type_name"], "point");
    assert_eq!(mismatches[0]["region"]["capability"], "hash");
    assert_eq!(std::fs::read_to_string(&doc).expect("read doc"), drifted);
}

#[test]
fn shape_errors_are_reported_as_diagnostics() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let types = tmp.path().join("types.json");
    let doc = tmp.path().join("doc.sx");
    write_bytes(
        &types,
        &serde_json::to_vec(&json!({
            "schema_version": X07DERIVE_TYPES_SCHEMA_VERSION,
            "types": [{"name": "bad", "body": {"kind": "recursive", "name": "missing"}}]
        }))
        .expect("encode"),
    );
    write_bytes(&doc, b"");
    let out = run_x07derive(&["gen", "--types", p(&types), "--doc", p(&doc), "--check"]);
    assert_eq!(out.status.code(), Some(1));
    let v = parse_json_stdout(&out);
    assert_eq!(v["diagnostics"][0]["code"], "X7D0106DanglingRecursive");
}

#[test]
fn groups_lists_recursive_groups_in_order() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (types, _) = setup(tmp.path());
    let out = run_x07derive(&["groups", "--types", p(&types)]);
    assert_eq!(out.status.code(), Some(0), "stderr:\n{}", String::from_utf8_lossy(&out.stderr));
    let v = parse_json_stdout(&out);
    assert_eq!(v["schema_version"], X07DERIVE_GROUPS_REPORT_SCHEMA_VERSION);
    assert_eq!(v["groups"][0]["members"], json!(["tree", "forest"]));
    assert_eq!(v["groups"][0]["recursive"], true);
    assert_eq!(v["groups"][1]["members"], json!(["point"]));
}

#[test]
fn batch_processes_every_entry() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (_, _) = setup(&tmp.path().join("a"));
    let (_, _) = setup(&tmp.path().join("b"));
    let manifest = tmp.path().join("manifest.json");
    write_bytes(
        &manifest,
        &serde_json::to_vec(&json!({
            "schema_version": X07DERIVE_MANIFEST_SCHEMA_VERSION,
            "entries": [
                {"types": "a/types.json", "doc": "a/demo.sx"},
                {"types": "b/types.json", "doc": "b/demo.sx", "marker": "derive"}
            ]
        }))
        .expect("encode manifest"),
    );

    let out = run_x07derive(&["batch", "--manifest", p(&manifest), "--check"]);
    assert_eq!(out.status.code(), Some(1));
    let v = parse_json_stdout(&out);
    assert_eq!(v["schema_version"], X07DERIVE_BATCH_REPORT_SCHEMA_VERSION);
    let entries = v["entries"].as_array().expect("entries[]");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["doc"], "a/demo.sx");
    assert_eq!(entries[0]["report"]["mismatches"].as_array().expect("mismatches[]").len(), 2);

    let out = run_x07derive(&["batch", "--manifest", p(&manifest)]);
    assert_eq!(out.status.code(), Some(0), "stderr:\n{}", String::from_utf8_lossy(&out.stderr));
    let out = run_x07derive(&["batch", "--manifest", p(&manifest), "--check"]);
    assert_eq!(out.status.code(), Some(0), "stderr:\n{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(parse_json_stdout(&out)["ok"], true);
}

#[test]
fn diagnostics_md_lists_every_code() {
    let out = run_x07derive(&["diagnostics-md"]);
    assert_eq!(out.status.code(), Some(0));
    let md = String::from_utf8(out.stdout).expect("utf-8");
    assert!(md.starts_with("# x07derive diagnostics catalog"));
    for code in ["X7D0001", "X7D0107", "X7D0200", "X7D0300", "X7D0403", "X7D0901"] {
        assert!(md.contains(code), "missing {code}");
    }
}

#[test]
fn schema_mismatch_is_a_finding_for_types_and_fatal_for_manifests() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (types, doc) = setup(tmp.path());
    write_bytes(
        &types,
        &serde_json::to_vec(&json!({"schema_version": "x07derive.types@9.9.9", "types": []})).expect("encode"),
    );
    let out = run_x07derive(&["gen", "--types", p(&types), "--doc", p(&doc), "--check"]);
    assert_eq!(out.status.code(), Some(1));
    let v = parse_json_stdout(&out);
    assert_eq!(v["diagnostics"][0]["code"], "X7D0002SchemaVersion");

    let manifest = tmp.path().join("manifest.json");
    write_bytes(
        &manifest,
        &serde_json::to_vec(&json!({"schema_version": "x07derive.manifest@9.9.9", "entries": []}))
            .expect("encode manifest"),
    );
    let out = run_x07derive(&["batch", "--manifest", p(&manifest)]);
    assert_eq!(out.status.code(), Some(2));
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("schema_version mismatch"), "{stderr}");
}

#[test]
fn batch_rejects_entries_sharing_a_document() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let (_, _) = setup(&tmp.path().join("a"));
    let manifest = tmp.path().join("manifest.json");
    write_bytes(
        &manifest,
        &serde_json::to_vec(&json!({
            "schema_version": X07DERIVE_MANIFEST_SCHEMA_VERSION,
            "entries": [
                {"types": "a/types.json", "doc": "a/demo.sx"},
                {"types": "a/types.json", "doc": "a/../a/demo.sx"}
            ]
        }))
        .expect("encode manifest"),
    );

    let out = run_x07derive(&["batch", "--manifest", p(&manifest)]);
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("entries [0] and [1]"), "{stderr}");
    let untouched = std::fs::read_to_string(tmp.path().join("a/demo.sx")).expect("read doc");
    assert_eq!(untouched, DOC);
}
