//! Rule-table lints.
//!
//! ## Checks Performed
//!
//! 1. **Redundant rules**: a rule that never changes a decision, found on the
//!    atomic cubes of its table. ACL rules are checked against higher-priority
//!    rules, security-group rules against the other rules of the group.
//! 2. **Unattached filters**: a security group or ACL that covers no
//!    interface or subnet.

use log::debug;
use serde::Serialize;

use crate::filters::{redundant_rules, FilterLayerKind, FilterTrafficResource};
use crate::model::{NamedResource, VpcConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintFinding {
    pub severity: FindingSeverity,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintReport {
    pub vpc: String,
    pub errors: usize,
    pub warnings: usize,
    pub findings: Vec<LintFinding>,
}

/// Run every lint on one configuration.
pub fn build_lint_report(config: &VpcConfig) -> LintReport {
    let mut findings = Vec::new();
    for layer in config.layers() {
        findings.extend(redundant_rule_findings(layer.as_ref()));
        findings.extend(unattached_filter_findings(layer.as_ref()));
    }
    let errors = findings
        .iter()
        .filter(|f| f.severity == FindingSeverity::Error)
        .count();
    let warnings = findings
        .iter()
        .filter(|f| f.severity == FindingSeverity::Warning)
        .count();
    debug!("{}: {} lint findings", config.name(), findings.len());
    LintReport {
        vpc: config.name().to_string(),
        errors,
        warnings,
        findings,
    }
}

/// Rules of every filter in `layer` that never change a decision.
pub fn redundant_rule_findings(layer: &dyn FilterTrafficResource) -> Vec<LintFinding> {
    let ordered = layer.layer() == FilterLayerKind::NetworkAcl;
    let mut out = Vec::new();
    for filter in layer.filters() {
        for pos in redundant_rules(&filter.rules, ordered) {
            let rule = &filter.rules[pos];
            let mut message = format!(
                "{} {} rule {} ({} {}) is redundant",
                layer.layer(),
                filter.name(),
                rule.index,
                rule.action,
                rule.direction
            );
            if !rule.description.is_empty() {
                message.push_str(&format!(": {}", rule.description));
            }
            out.push(warn("redundant_rule", message));
        }
    }
    out
}

/// Filters of `layer` attached to nothing.
pub fn unattached_filter_findings(layer: &dyn FilterTrafficResource) -> Vec<LintFinding> {
    layer
        .filters_and_attached_resources()
        .into_iter()
        .filter(|(_, attached)| attached.is_empty())
        .map(|(filter, _)| {
            warn(
                "unattached_filter",
                format!("{} {} is not attached to any resource", layer.layer(), filter.name()),
            )
        })
        .collect()
}

pub fn render_lint_text(report: &LintReport) -> String {
    let mut out = vec![
        format!("lint vpc={}", report.vpc),
        format!("result errors={} warnings={}", report.errors, report.warnings),
        "findings".to_string(),
    ];
    if report.findings.is_empty() {
        out.push("- none".to_string());
    }
    for finding in &report.findings {
        let sev = match finding.severity {
            FindingSeverity::Error => "error",
            FindingSeverity::Warning => "warning",
        };
        out.push(format!("- [{sev}] {}: {}", finding.code, finding.message));
    }
    out.join("\n")
}

fn warn(code: &str, message: String) -> LintFinding {
    LintFinding {
        severity: FindingSeverity::Warning,
        code: code.to_string(),
        message,
    }
}
