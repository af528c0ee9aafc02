use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("vpc-connectivity"))
}

#[test]
fn report_lists_endpoint_connectivity() {
    cmd()
        .arg("report")
        .arg(fixture("fixtures/acl-vpc.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "vsi1[10.240.1.4] => vsi2[10.240.2.4] : ",
        ))
        .stdout(predicate::str::contains(
            "vsi1[10.240.1.4] => Public Internet",
        ))
        .stdout(predicate::str::contains("vsi2[10.240.2.4] => Public Internet").not())
        .stdout(predicate::str::contains(
            "connections are stateful unless marked with *",
        ));
}

#[test]
fn report_at_subnet_level() {
    cmd()
        .arg("report")
        .arg(fixture("fixtures/acl-vpc.json"))
        .args(["--level", "subnets"])
        .assert()
        .success()
        .stdout(predicate::str::contains("subnet1 => subnet2 : "))
        .stdout(predicate::str::contains("vsi1[10.240.1.4]").not());
}

#[test]
fn report_markdown_and_json() {
    cmd()
        .arg("report")
        .arg(fixture("fixtures/acl-vpc.json"))
        .args(["--format", "md"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("| src | dst | conn |"));

    let output = cmd()
        .arg("report")
        .arg(fixture("fixtures/acl-vpc.json"))
        .args(["--format", "json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let architecture = &report["architecture"];
    assert_eq!(architecture["nodeSets"].as_array().map(Vec::len), Some(5));
    assert_eq!(architecture["routers"][0]["kind"], "public-gateway");
    assert!(report["connectivity"]
        .as_array()
        .expect("connectivity")
        .iter()
        .any(|e| e["src"] == "vsi1[10.240.1.4]" && e["dst"] == "vsi2[10.240.2.4]"));
}

#[test]
fn report_required_connections() {
    cmd()
        .arg("report")
        .arg(fixture("fixtures/simple-vpc.toml"))
        .args(["--format", "synthesis"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"allowedProtocols\""))
        .stdout(predicate::str::contains("\"type\": \"network-interface\""));
}

#[test]
fn toml_document_with_floating_ip() {
    cmd()
        .arg("report")
        .arg(fixture("fixtures/simple-vpc.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "web[10.10.1.10] => Public Internet 8.8.8.8/32 : protocol: UDP dst-ports: 53",
        ));
}

#[test]
fn report_writes_output_file() {
    let dir = tempdir().expect("tempdir");
    let out = dir.path().join("report.txt");
    cmd()
        .arg("report")
        .arg(fixture("fixtures/acl-vpc.json"))
        .arg("--grouping")
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    let written = fs::read_to_string(&out).expect("read output");
    assert!(written.contains("vsi1[10.240.1.4] => Public Internet"));
}

#[test]
fn report_debug_form() {
    cmd()
        .arg("report")
        .arg(fixture("fixtures/acl-vpc.json"))
        .args(["--format", "debug"])
        .assert()
        .success()
        .stdout(predicate::str::contains("  router: pgw1 (public-gateway)"))
        .stdout(predicate::str::contains("network ACL connectivity by subnet"))
        .stdout(predicate::str::contains("subnet1 => subnet2 : "));
}

#[test]
fn missing_file_fails() {
    cmd()
        .arg("report")
        .arg(fixture("fixtures/does-not-exist.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load"));
}

#[test]
fn unreadable_settings_fall_back_to_defaults() {
    cmd()
        .args(["--settings", "/nonexistent/settings.toml"])
        .arg("report")
        .arg(fixture("fixtures/acl-vpc.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("vsi1[10.240.1.4] => vsi2[10.240.2.4]"));
}
