use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "vpc-connectivity")]
#[command(about = "Analyze, compare and explain VPC connectivity")]
pub struct Cli {
    /// Settings TOML (reserved ranges, report defaults). Embedded defaults otherwise.
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Report the connectivity of every VPC in a configuration.
    Report(ReportArgs),
    /// Compare the connectivity of two configurations.
    Diff(DiffArgs),
    /// Explain the connectivity between two endpoints.
    Explain(ExplainArgs),
    /// Report redundant rules and unattached filters.
    Lint(LintArgs),
}

#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// Configuration document (JSON or TOML).
    pub file: PathBuf,
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
    /// Analysis level; the settings default when absent.
    #[arg(long, value_enum)]
    pub level: Option<Level>,
    /// Group endpoints sharing the same connectivity.
    #[arg(long)]
    pub grouping: bool,
    /// Write to this file instead of stdout. An empty path means stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct DiffArgs {
    pub file1: PathBuf,
    pub file2: PathBuf,
    #[arg(long, value_enum)]
    pub level: Option<Level>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ExplainArgs {
    pub file: PathBuf,
    /// Source: name, UID, address or CIDR.
    #[arg(long)]
    pub src: String,
    /// Destination: name, UID, address or CIDR.
    #[arg(long)]
    pub dst: String,
    /// Restrict to one protocol (tcp, udp, icmp or all).
    #[arg(long)]
    pub protocol: Option<String>,
    #[arg(long)]
    pub src_ports: Option<String>,
    #[arg(long)]
    pub dst_ports: Option<String>,
    #[arg(long)]
    pub icmp_type: Option<String>,
    #[arg(long)]
    pub icmp_code: Option<String>,
    /// List the contributing rules.
    #[arg(long)]
    pub detail: bool,
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct LintArgs {
    pub file: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Treat warnings as failures.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Md,
    Json,
    /// Required connections as JSON.
    Synthesis,
    Debug,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum Level {
    Endpoints,
    Subnets,
}
