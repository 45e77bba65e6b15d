//! Student report generation.
//!
//! Renders a student's statistics and scan history as Markdown or JSON.

use crate::analysis::{complete_category_counts, recent_first, StudentStats};
use crate::models::{CategoryCount, ScanResult, StoredError, Student};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything shown on a student's page.
#[derive(Debug, Clone, Serialize)]
pub struct StudentReport {
    pub student: Student,
    pub generated_at: DateTime<Utc>,
    pub stats: StudentStats,
    /// Category counts shown in the chart.
    pub chart: Vec<CategoryCount>,
    /// Scans, most recent first.
    pub history: Vec<ScanResult>,
}

impl StudentReport {
    /// Build a report from a student's scans (in recorded order).
    ///
    /// With `all_categories` the chart lists every category, zeros included.
    pub fn new(student: Student, scans: &[ScanResult], all_categories: bool) -> Self {
        let stats = StudentStats::from_scans(scans);
        let chart = if all_categories {
            complete_category_counts(scans)
        } else {
            stats.by_category.clone()
        };

        Self {
            student,
            generated_at: Utc::now(),
            stats,
            chart,
            history: recent_first(scans).into_iter().cloned().collect(),
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &StudentReport) -> String {
    let mut output = String::new();

    output.push_str(&generate_header(&report.student));
    output.push_str(&generate_summary_section(&report.stats, &report.chart));
    output.push_str(&generate_history_section(&report.history));
    output.push_str(&generate_footer(report.generated_at));

    output
}

/// Generate the student header.
fn generate_header(student: &Student) -> String {
    let mut section = String::new();

    section.push_str(&format!("# ({}) {}\n\n", student.initial(), student.name));
    if let Some(ref grade) = student.grade_level {
        section.push_str(&format!("- **Grade:** {}\n", grade));
    }
    section.push_str(&format!(
        "- **Added:** {}\n\n",
        student.created_at.format("%Y-%m-%d")
    ));

    section
}

/// Generate the error breakdown section.
fn generate_summary_section(stats: &StudentStats, chart: &[CategoryCount]) -> String {
    let mut section = String::new();

    section.push_str("## Error Analysis\n\n");

    if stats.submissions == 0 {
        section.push_str("No scans yet. Run `gradelens scan` to analyze a piece of work.\n\n");
        return section;
    }

    section.push_str(&format!("- **Submissions:** {}\n", stats.submissions));
    section.push_str(&format!("- **Total errors:** {}\n", stats.total_errors));
    if let Some(category) = stats.most_common() {
        section.push_str(&format!("- **Most common:** {}\n", category));
    }
    section.push('\n');

    if !chart.is_empty() {
        let max = chart.iter().map(|c| c.count).max().unwrap_or(0);

        section.push_str("| Category | Count | |\n");
        section.push_str("|:---|:---:|:---|\n");
        for entry in chart {
            section.push_str(&format!(
                "| {} | {} | {} |\n",
                entry.category,
                entry.count,
                bar(entry.count, max)
            ));
        }
        section.push('\n');
    }

    section
}

/// A fixed-width text bar scaled against the largest count.
fn bar(count: usize, max: usize) -> String {
    const WIDTH: usize = 20;
    if max == 0 || count == 0 {
        return String::new();
    }
    let filled = std::cmp::max(1, count * WIDTH / max);
    "█".repeat(filled)
}

/// Generate the scan history section.
fn generate_history_section(history: &[ScanResult]) -> String {
    let mut section = String::new();

    section.push_str("## Scan History\n\n");

    if history.is_empty() {
        section.push_str("No scans recorded.\n\n");
        return section;
    }

    for scan in history {
        section.push_str(&format!(
            "### {} • {} Issues Found\n\n",
            scan.timestamp.format("%Y-%m-%d %H:%M"),
            scan.errors.len()
        ));
        section.push_str(&format!("{}\n\n", scan.summary));

        for error in &scan.errors {
            section.push_str(&generate_error_block(error));
        }
    }

    section
}

/// Generate a single error entry.
fn generate_error_block(error: &StoredError) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "- **{}:** ~~{}~~ → {}\n",
        error.category(),
        error.original_text,
        error.correction
    ));
    if !error.explanation.is_empty() {
        block.push_str(&format!("  > {}\n", error.explanation));
    }

    block
}

fn generate_footer(generated_at: DateTime<Utc>) -> String {
    format!(
        "---\n\n*Report generated by GradeLens on {}*\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

/// Generate a JSON report.
pub fn generate_json_report(report: &StudentReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
