use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use log::info;
use netset_core::IpBlock;
use vpc_connectivity::compose::{analyze_endpoints, analyze_pairs, ConnectivityMap};
use vpc_connectivity::diff::{diff_configs, DiffLine, DiffType};
use vpc_connectivity::format::{
    grouped_lines, json_report, plain_lines, render_debug, render_markdown, render_text,
    required_connections, ReportLine,
};
use vpc_connectivity::grouping::{group_connectivity, GroupingOptions};
use vpc_connectivity::lint::{build_lint_report, render_lint_text};
use vpc_connectivity::loader::{load_config, parse_transport};
use vpc_connectivity::model::{MultiVpcConfig, NamedResource, VpcConfig};
use vpc_connectivity::settings::{resolve_settings, AnalysisLevel, Settings};
use vpc_connectivity::subnets::lift_to_subnets;

mod cli;

use cli::{Cli, Command, DiffArgs, ExplainArgs, Level, LintArgs, OutputFormat, ReportArgs, ReportFormat};

fn main() -> Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let (settings, source) = resolve_settings(cli.settings.as_deref());
    info!("using settings: {source}");

    match cli.command {
        Command::Report(args) => run_report(args, &settings),
        Command::Diff(args) => run_diff(args, &settings),
        Command::Explain(args) => run_explain(args, &settings),
        Command::Lint(args) => run_lint(args, &settings),
    }
}

fn load(path: &Path, public_internet: &IpBlock) -> Result<MultiVpcConfig> {
    load_config(path, public_internet)
        .with_context(|| format!("failed to load {}", path.display()))
}

fn analysis_level(level: Option<Level>, settings: &Settings) -> AnalysisLevel {
    match level {
        Some(Level::Endpoints) => AnalysisLevel::Endpoints,
        Some(Level::Subnets) => AnalysisLevel::Subnets,
        None => settings.analysis.level,
    }
}

fn connectivity(config: &VpcConfig, level: AnalysisLevel) -> Result<ConnectivityMap> {
    let map = analyze_endpoints(config)
        .with_context(|| format!("failed to analyze {}", config.name()))?;
    Ok(match level {
        AnalysisLevel::Endpoints => map,
        AnalysisLevel::Subnets => lift_to_subnets(config, &map),
    })
}

fn run_report(args: ReportArgs, settings: &Settings) -> Result<()> {
    let public = settings.public_internet()?;
    let configs = load(&args.file, &public)?;
    if configs.configs.is_empty() {
        bail!("{} defines no VPC", args.file.display());
    }
    let level = analysis_level(args.level, settings);
    let grouping = args.grouping || settings.analysis.grouping;
    let several = configs.configs.len() > 1;

    let mut sections = Vec::new();
    let mut json = BTreeMap::new();
    let mut required = Vec::new();
    for config in configs.configs.values() {
        if args.format == ReportFormat::Debug {
            let records = analyze_pairs(config)
                .with_context(|| format!("failed to analyze {}", config.name()))?;
            sections.push(titled(several, config, render_debug(config, &records)));
            continue;
        }
        let map = connectivity(config, level)?;
        let lines: Vec<ReportLine> = if grouping {
            let options = GroupingOptions {
                group_internal: true,
                graphical: false,
            };
            grouped_lines(config, &group_connectivity(config, &map, options))
        } else {
            plain_lines(config, &map)
        };
        match args.format {
            ReportFormat::Text => sections.push(titled(several, config, render_text(&lines))),
            ReportFormat::Md => sections.push(titled(several, config, render_markdown(&lines))),
            ReportFormat::Json => {
                json.insert(config.name().to_string(), json_report(config, &lines));
            }
            ReportFormat::Synthesis => required.extend(required_connections(&lines)),
            ReportFormat::Debug => {}
        }
    }

    let content = match args.format {
        ReportFormat::Json if several => serde_json::to_string_pretty(&json)?,
        ReportFormat::Json => match json.values().next() {
            Some(report) => serde_json::to_string_pretty(report)?,
            None => String::new(),
        },
        ReportFormat::Synthesis => {
            required.sort_by(|a, b| (&a.src.name, &a.dst.name).cmp(&(&b.src.name, &b.dst.name)));
            serde_json::to_string_pretty(&required)?
        }
        _ => sections.join("\n\n"),
    };
    write_output(args.output.as_deref(), &content)
}

fn titled(several: bool, config: &VpcConfig, body: String) -> String {
    if several {
        format!("Connectivity for {}:\n{body}", config.name())
    } else {
        body
    }
}

fn run_diff(args: DiffArgs, settings: &Settings) -> Result<()> {
    let public = settings.public_internet()?;
    let mut configs = load(&args.file1, &public)?;
    let other = load(&args.file2, &public)?;
    configs.to_compare = Some(other.configs);
    let level = analysis_level(args.level, settings);

    let pairs = configs.diff_pairs();
    if pairs.is_empty() {
        bail!(
            "no VPC of {} matches a VPC of {}",
            args.file1.display(),
            args.file2.display()
        );
    }
    let mut lines: Vec<DiffLine> = Vec::new();
    for (first, second) in pairs {
        let first_map = connectivity(first, level)?;
        let second_map = connectivity(second, level)?;
        let diff = diff_configs((first, &first_map), (second, &second_map), level);
        info!(
            "{} vs {}: {} removed, {} added",
            first.name(),
            second.name(),
            diff.removed.len(),
            diff.added.len()
        );
        lines.extend(diff.lines());
    }
    lines.sort_by(|a, b| a.text.cmp(&b.text));

    let content = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&lines)?,
        OutputFormat::Text if to_stdout(args.output.as_deref()) => render_diff_lines(&lines),
        OutputFormat::Text => lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
    };
    write_output(args.output.as_deref(), &content)
}

fn render_diff_lines(lines: &[DiffLine]) -> String {
    lines
        .iter()
        .map(|line| match line.diff_type {
            DiffType::Added => line.text.green().to_string(),
            DiffType::Removed => line.text.red().to_string(),
            DiffType::Changed => line.text.yellow().to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn run_explain(args: ExplainArgs, settings: &Settings) -> Result<()> {
    let public = settings.public_internet()?;
    let configs = load(&args.file, &public)?;
    let query = match &args.protocol {
        Some(protocol) => Some(
            parse_transport(
                protocol,
                args.src_ports.as_deref(),
                args.dst_ports.as_deref(),
                args.icmp_type.as_deref(),
                args.icmp_code.as_deref(),
            )
            .context("invalid connection query")?,
        ),
        None => None,
    };
    let explanation = configs
        .explain(&args.src, &args.dst, query)
        .with_context(|| format!("cannot explain {} -> {}", args.src, args.dst))?;
    let text = explanation
        .render(args.detail)
        .context("failed to render explanation")?;
    write_output(args.output.as_deref(), &text)
}

fn run_lint(args: LintArgs, settings: &Settings) -> Result<()> {
    let public = settings.public_internet()?;
    let configs = load(&args.file, &public)?;
    let reports: Vec<_> = configs.single_vpc_configs().map(build_lint_report).collect();

    match args.format {
        OutputFormat::Text => {
            let text: Vec<String> = reports.iter().map(render_lint_text).collect();
            println!("{}", text.join("\n\n"));
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    let errors: usize = reports.iter().map(|r| r.errors).sum();
    let warnings: usize = reports.iter().map(|r| r.warnings).sum();
    if errors > 0 {
        bail!("lint failed: {errors} errors");
    }
    if args.strict && warnings > 0 {
        bail!("lint failed in strict mode: {warnings} warnings");
    }
    Ok(())
}

fn to_stdout(path: Option<&Path>) -> bool {
    !matches!(path, Some(p) if !p.as_os_str().is_empty())
}

/// Print to stdout, or replace `path` atomically.
fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    let path = match path {
        Some(path) if !path.as_os_str().is_empty() => path,
        _ => {
            println!("{content}");
            return Ok(());
        }
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    writeln!(tmp, "{content}")
        .with_context(|| format!("failed to write output {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("failed to write output {}", path.display()))?;
    Ok(())
}
