use super::ReportLine;

/// A Markdown table with one row per line.
pub fn render_markdown(lines: &[ReportLine]) -> String {
    let mut out = vec![
        "| src | dst | conn |".to_string(),
        "|-----|-----|------|".to_string(),
    ];
    for line in lines {
        out.push(format!(
            "| {} | {} | {} |",
            escape(&line.src.name),
            escape(&line.dst.name),
            escape(&line.conn.to_string())
        ));
    }
    out.join("\n")
}

fn escape(cell: &str) -> String {
    cell.replace('|', "\\|")
}
