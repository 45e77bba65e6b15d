//! Data models for GradeLens.
//!
//! This module contains the core data structures shared by the gateway,
//! the store and the aggregator: students, scan results and the language
//! errors detected in a piece of work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Classification of a detected language error.
///
/// The declaration order is the canonical order used when counts tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Spelling,
    Grammar,
    Punctuation,
    Capitalization,
    Syntax,
    Vocabulary,
    Other,
}

impl ErrorCategory {
    /// Every category in canonical order.
    pub const ALL: [ErrorCategory; 7] = [
        ErrorCategory::Spelling,
        ErrorCategory::Grammar,
        ErrorCategory::Punctuation,
        ErrorCategory::Capitalization,
        ErrorCategory::Syntax,
        ErrorCategory::Vocabulary,
        ErrorCategory::Other,
    ];

    /// The wire name of the category, as sent to and received from the model.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Spelling => "Spelling",
            ErrorCategory::Grammar => "Grammar",
            ErrorCategory::Punctuation => "Punctuation",
            ErrorCategory::Capitalization => "Capitalization",
            ErrorCategory::Syntax => "Syntax",
            ErrorCategory::Vocabulary => "Vocabulary",
            ErrorCategory::Other => "Other",
        }
    }

    /// Position of the category in [`ErrorCategory::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Maps any string onto a category, falling back to `Other`.
    ///
    /// Only used for data that has already been persisted; fresh model
    /// responses are decoded strictly.
    pub fn from_lenient(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .unwrap_or(ErrorCategory::Other)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn normalize_grade(grade: Option<String>) -> Option<String> {
    grade.map(|g| g.trim().to_string()).filter(|g| !g.is_empty())
}

/// Older exports store a missing grade as `""`.
fn deserialize_grade<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(normalize_grade)
}

/// A student on the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Opaque unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional grade or class label.
    #[serde(
        default,
        deserialize_with = "deserialize_grade",
        skip_serializing_if = "Option::is_none"
    )]
    pub grade_level: Option<String>,
    /// When the student was added.
    pub created_at: DateTime<Utc>,
}

impl Student {
    /// Creates a student with a fresh identifier.
    ///
    /// An empty or whitespace-only grade is stored as `None`.
    pub fn new(name: impl Into<String>, grade_level: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            grade_level: normalize_grade(grade_level),
            created_at: Utc::now(),
        }
    }

    /// Upper-cased first letter of the name, used as an avatar.
    pub fn initial(&self) -> char {
        self.name
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('?')
    }
}

/// A single language error found in a piece of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedError {
    /// The exact quoted text containing the error.
    pub original_text: String,
    /// The corrected replacement.
    pub correction: String,
    /// Category of the error.
    pub category: ErrorCategory,
    /// Teacher-facing explanation.
    pub explanation: String,
}

/// Error record as it appears in persisted scans.
///
/// The category is kept as a raw string so that older or hand-edited
/// data with an unexpected category still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredError {
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub correction: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub explanation: String,
}

impl StoredError {
    /// Category of the error, with unknown or missing values counted as `Other`.
    pub fn category(&self) -> ErrorCategory {
        self.category
            .as_deref()
            .map(ErrorCategory::from_lenient)
            .unwrap_or(ErrorCategory::Other)
    }
}

impl From<DetectedError> for StoredError {
    fn from(err: DetectedError) -> Self {
        Self {
            original_text: err.original_text,
            correction: err.correction,
            category: Some(err.category.as_str().to_string()),
            explanation: err.explanation,
        }
    }
}

/// The outcome of one analysed image, attributed to a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Opaque unique identifier.
    pub id: String,
    /// Identifier of the student the work belongs to.
    pub student_id: String,
    /// When the analysis completed.
    pub timestamp: DateTime<Utc>,
    /// Image reference. Captured images are not retained, so this is always `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Short overall summary from the model.
    pub summary: String,
    /// Errors in the order the model reported them.
    #[serde(default)]
    pub errors: Vec<StoredError>,
}

impl ScanResult {
    /// Builds a scan result from a completed analysis.
    pub fn from_analysis(student_id: impl Into<String>, analysis: Analysis) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            student_id: student_id.into(),
            timestamp: Utc::now(),
            image_url: None,
            summary: analysis.summary,
            errors: analysis.errors.into_iter().map(StoredError::from).collect(),
        }
    }
}

/// The decoded result of one gateway call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// 1-2 sentence overview of the work.
    pub summary: String,
    /// Errors found, possibly empty.
    pub errors: Vec<DetectedError>,
}

/// Number of errors recorded for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: ErrorCategory,
    pub count: usize,
}
