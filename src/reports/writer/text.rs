use crate::reports::writer::ReportWriter;
use crate::reports::{ReportError, RunReport, TestSuiteResult};
use std::io::Write;

const HEADERS: [&str; 3] = ["NODE", "AVERAGE LATENCY", "FAILED REQUESTS"];
const COLUMN_PADDING: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct TextWriter;

impl ReportWriter for TextWriter {
    fn write(&self, report: &RunReport, output: &mut dyn Write) -> Result<(), ReportError> {
        for suite in &report.suites {
            write_title(&suite.suite_name, output)?;
            write_table(suite, output)?;
        }

        if !report.unprovisioned_nodes.is_empty() {
            writeln!(output)?;
            writeln!(
                output,
                "Nodes skipped (probe could not be provisioned): {}",
                report.unprovisioned_nodes.join(", ")
            )?;
        }
        if report.cancelled {
            writeln!(output)?;
            writeln!(output, "Run was cancelled, results are partial")?;
        }
        Ok(())
    }
}

fn write_title(title: &str, output: &mut dyn Write) -> std::io::Result<()> {
    let line = "=".repeat(title.chars().count() + 2);
    write!(output, "\n{line}\n {title} \n{line}\n\n")
}

fn write_table(suite: &TestSuiteResult, output: &mut dyn Write) -> std::io::Result<()> {
    let rows: Vec<[String; 3]> = suite
        .results
        .iter()
        .map(|result| {
            [
                result.node_name.clone(),
                format!("{:?}", result.average_latency),
                format!(
                    "{:.2}% ({})",
                    result.failed_percentage, result.failed_request_count
                ),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header = HEADERS.map(str::to_string);
    for row in std::iter::once(&header).chain(&rows) {
        let line: String = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}", width = width + COLUMN_PADDING))
            .collect();
        writeln!(output, "{}", line.trim_end())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::TestResult;
    use std::time::Duration;

    fn result(node: &str, millis: u64, failed: u64, pct: f64) -> TestResult {
        TestResult {
            node_name: node.to_string(),
            average_latency: Duration::from_millis(millis),
            failed_request_count: failed,
            failed_percentage: pct,
        }
    }

    fn render(report: &RunReport) -> String {
        let mut buffer = Vec::new();
        TextWriter.write(report, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_title_and_aligned_rows() {
        let report = RunReport::new(
            "perf",
            vec![TestSuiteResult {
                suite_name: "Ping Test".to_string(),
                results: vec![
                    result("node-a", 12, 0, 0.0),
                    result("a-much-longer-node-name", 7, 100, 100.0),
                ],
            }],
            Vec::new(),
            false,
        );
        let text = render(&report);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[1], "===========");
        assert_eq!(lines[2], " Ping Test ");
        assert_eq!(lines[3], "===========");
        assert!(lines[5].starts_with("NODE"));
        assert!(lines[6].starts_with("node-a"));
        assert!(lines[6].ends_with("0.00% (0)"));
        assert!(lines[7].ends_with("100.00% (100)"));

        // Columns start at the same offset on every row
        let column = lines[5].find("AVERAGE LATENCY").unwrap();
        assert_eq!(lines[6].find("12ms"), Some(column));
        assert_eq!(lines[7].find("7ms"), Some(column));
        assert!(!text.contains("cancelled"));
    }

    #[test]
    fn test_skipped_nodes_and_cancellation_are_noted() {
        let report = RunReport::new("perf", Vec::new(), vec!["node-x".to_string()], true);
        let text = render(&report);
        assert!(text.contains("node-x"));
        assert!(text.contains("cancelled"));
    }
}
