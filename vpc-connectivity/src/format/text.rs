use super::ReportLine;

pub const STATEFUL_FOOTNOTE: &str = "connections are stateful unless marked with *";

/// `src => dst : conn` lines; the footnote follows when some TCP flow is
/// not responsive.
pub fn render_text(lines: &[ReportLine]) -> String {
    let mut out: Vec<String> = lines
        .iter()
        .map(|line| format!("{} => {} : {}", line.src.name, line.dst.name, line.conn))
        .collect();
    if lines.iter().any(|line| !line.conn.is_fully_responsive()) {
        out.push(String::new());
        out.push(STATEFUL_FOOTNOTE.to_string());
    }
    out.join("\n")
}
