//! Error aggregation and per-student statistics.
//!
//! This module turns a student's accumulated scan results into the
//! per-category counts shown on the student report.

use crate::models::{CategoryCount, ErrorCategory, ScanResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Count every error in every scan, indexed by canonical category order.
fn count_by_category(scans: &[ScanResult]) -> [usize; 7] {
    let mut counts = [0usize; 7];

    for error in scans.iter().flat_map(|s| &s.errors) {
        counts[error.category().index()] += 1;
    }

    counts
}

/// Per-category error counts, non-zero only, most frequent first.
///
/// Ties keep the canonical category order since the sort is stable.
pub fn category_counts(scans: &[ScanResult]) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = complete_category_counts(scans)
        .into_iter()
        .filter(|c| c.count > 0)
        .collect();

    counts.sort_by_key(|c| std::cmp::Reverse(c.count));
    counts
}

/// Counts for all categories in canonical order, zeros included.
pub fn complete_category_counts(scans: &[ScanResult]) -> Vec<CategoryCount> {
    let counts = count_by_category(scans);

    ErrorCategory::ALL
        .into_iter()
        .map(|category| CategoryCount {
            category,
            count: counts[category.index()],
        })
        .collect()
}

/// Scans belonging to one student, in recorded order.
pub fn scans_for_student<'a>(scans: &'a [ScanResult], student_id: &str) -> Vec<&'a ScanResult> {
    scans.iter().filter(|s| s.student_id == student_id).collect()
}

/// Scan history with the most recently recorded scan first.
pub fn recent_first(scans: &[ScanResult]) -> Vec<&ScanResult> {
    scans.iter().rev().collect()
}

/// Summary statistics for one student's scans.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StudentStats {
    /// Number of analysed submissions.
    pub submissions: usize,
    /// Total number of errors over all submissions.
    pub total_errors: usize,
    /// Non-zero category counts, most frequent first.
    pub by_category: Vec<CategoryCount>,
    /// Timestamp of the most recent submission.
    pub last_scan: Option<DateTime<Utc>>,
}

impl StudentStats {
    /// Computes statistics from a student's scans.
    pub fn from_scans(scans: &[ScanResult]) -> Self {
        Self {
            submissions: scans.len(),
            total_errors: scans.iter().map(|s| s.errors.len()).sum(),
            by_category: category_counts(scans),
            last_scan: scans.iter().map(|s| s.timestamp).max(),
        }
    }

    /// The category with the highest count, if any errors were recorded.
    pub fn most_common(&self) -> Option<ErrorCategory> {
        self.by_category.first().map(|c| c.category)
    }

    /// Average number of errors per submission.
    pub fn errors_per_submission(&self) -> f64 {
        if self.submissions == 0 {
            0.0
        } else {
            self.total_errors as f64 / self.submissions as f64
        }
    }
}

/// Generate a text summary of a student's statistics.
pub fn generate_summary_text(stats: &StudentStats) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Submissions: {}", stats.submissions));
    lines.push(format!(
        "Total errors: {} ({:.1} per submission)",
        stats.total_errors,
        stats.errors_per_submission()
    ));

    if !stats.by_category.is_empty() {
        lines.push(String::new());
        lines.push("By Category:".to_string());

        for entry in &stats.by_category {
            lines.push(format!("- {}: {}", entry.category, entry.count));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StoredError;
    use chrono::TimeZone;

    fn create_test_error(category: &str) -> StoredError {
        StoredError {
            original_text: "teh cat".to_string(),
            correction: "the cat".to_string(),
            category: Some(category.to_string()),
            explanation: "Common misspelling".to_string(),
        }
    }

    fn create_test_scan(student_id: &str, categories: &[&str]) -> ScanResult {
        ScanResult {
            id: uuid::Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            timestamp: Utc::now(),
            image_url: None,
            summary: "Test summary".to_string(),
            errors: categories.iter().map(|c| create_test_error(c)).collect(),
        }
    }

    fn pairs(counts: &[CategoryCount]) -> Vec<(ErrorCategory, usize)> {
        counts.iter().map(|c| (c.category, c.count)).collect()
    }

    #[test]
    fn test_empty_scans() {
        assert!(category_counts(&[]).is_empty());
        assert_eq!(StudentStats::from_scans(&[]), StudentStats::default());
    }

    #[test]
    fn test_counts_sorted_by_frequency() {
        let scans = vec![create_test_scan("s1", &["Spelling", "Grammar", "Spelling"])];

        assert_eq!(
            pairs(&category_counts(&scans)),
            vec![(ErrorCategory::Spelling, 2), (ErrorCategory::Grammar, 1)]
        );
    }

    #[test]
    fn test_ties_keep_canonical_order() {
        let scans = vec![create_test_scan(
            "s1",
            &["Vocabulary", "Punctuation", "Grammar", "Vocabulary", "Punctuation", "Grammar"],
        )];

        assert_eq!(
            pairs(&category_counts(&scans)),
            vec![
                (ErrorCategory::Grammar, 2),
                (ErrorCategory::Punctuation, 2),
                (ErrorCategory::Vocabulary, 2),
            ]
        );
    }

    #[test]
    fn test_unknown_category_counts_as_other() {
        let mut scan = create_test_scan("s1", &["Tone", "Other"]);
        scan.errors.push(StoredError {
            category: None,
            ..create_test_error("")
        });

        assert_eq!(
            pairs(&category_counts(&[scan])),
            vec![(ErrorCategory::Other, 3)]
        );
    }

    #[test]
    fn test_complete_counts_include_zeros() {
        let scans = vec![create_test_scan("s1", &["Syntax"])];
        let counts = complete_category_counts(&scans);

        assert_eq!(counts.len(), 7);
        assert_eq!(counts[0].category, ErrorCategory::Spelling);
        assert_eq!(counts[0].count, 0);
        assert_eq!(counts[4].category, ErrorCategory::Syntax);
        assert_eq!(counts[4].count, 1);
    }

    #[test]
    fn test_student_scenario() {
        let scans = vec![
            create_test_scan("alex", &["Spelling", "Grammar"]),
            create_test_scan("sam", &["Punctuation"]),
            create_test_scan("alex", &["Spelling"]),
            create_test_scan("alex", &[]),
        ];

        let alex: Vec<ScanResult> = scans_for_student(&scans, "alex")
            .into_iter()
            .cloned()
            .collect();
        let stats = StudentStats::from_scans(&alex);

        assert_eq!(stats.submissions, 3);
        assert_eq!(stats.total_errors, 3);
        assert_eq!(
            pairs(&stats.by_category),
            vec![(ErrorCategory::Spelling, 2), (ErrorCategory::Grammar, 1)]
        );
        assert_eq!(stats.most_common(), Some(ErrorCategory::Spelling));
        assert!((stats.errors_per_submission() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_recent_first_and_last_scan() {
        let mut first = create_test_scan("s1", &[]);
        first.timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let mut second = create_test_scan("s1", &["Grammar"]);
        second.timestamp = Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap();

        let scans = vec![first.clone(), second.clone()];
        let history = recent_first(&scans);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);

        let stats = StudentStats::from_scans(&scans);
        assert_eq!(stats.last_scan, Some(second.timestamp));
    }

    #[test]
    fn test_generate_summary_text() {
        let scans = vec![create_test_scan("s1", &["Spelling", "Spelling", "Grammar"])];
        let text = generate_summary_text(&StudentStats::from_scans(&scans));

        assert!(text.contains("Submissions: 1"));
        assert!(text.contains("Total errors: 3 (3.0 per submission)"));
        assert!(text.contains("- Spelling: 2"));
        assert!(text.contains("- Grammar: 1"));
    }
}
