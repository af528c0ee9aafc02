use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn explain() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vpc-connectivity"));
    cmd.arg("explain").arg(fixture("fixtures/acl-vpc.json"));
    cmd
}

#[test]
fn explain_allowed_pair() {
    explain()
        .args(["--src", "vsi1", "--dst", "vsi2"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Explaining connectivity from vsi1 to vsi2",
        ))
        .stdout(predicate::str::contains("Allowed connections: "))
        .stdout(predicate::str::contains(
            "Both endpoints are in the same VPC; no router is required",
        ))
        .stdout(predicate::str::contains("  security group sg1 allows"));
}

#[test]
fn explain_query_blocked_by_acl() {
    explain()
        .args(["--src", "vsi1", "--dst", "vsi2"])
        .args(["--protocol", "tcp", "--dst-ports", "22", "--detail"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "No connection; connection blocked by ingress",
        ))
        .stdout(predicate::str::contains("query is disallowed"))
        .stdout(predicate::str::contains("  network ACL acl2 denies"))
        .stdout(predicate::str::contains(
            "rule 0 (deny, shadowing): no ssh from subnet1",
        ));
}

#[test]
fn explain_through_public_gateway() {
    explain()
        .args(["--src", "vsi1", "--dst", "8.8.8.8"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Routed through public-gateway pgw1"));
    explain()
        .args(["--src", "vsi2", "--dst", "8.8.8.8"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "No connection; no router enables traffic between them",
        ));
}

#[test]
fn explain_unknown_endpoint_fails() {
    explain()
        .args(["--src", "nope", "--dst", "vsi2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no endpoint matches 'nope'"));
}

#[test]
fn explain_two_external_endpoints_fails() {
    explain()
        .args(["--src", "1.1.1.1", "--dst", "8.8.8.8"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("are both external"));
}

#[test]
fn explain_ambiguous_name_fails() {
    explain()
        .args(["--src", "eth0", "--dst", "vsi2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("matches more than one resource"));
}
