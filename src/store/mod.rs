//! Local persistence for the roster and scan history.
//!
//! Two independent collections live in the data directory as JSON
//! arrays: `students.json` and `scans.json`. Both are loaded once when
//! the store is opened. Every mutation builds a new collection, writes it
//! out in full and only then replaces the in-memory copy.

use crate::models::{ScanResult, Student};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const STUDENTS_FILE: &str = "students.json";
const SCANS_FILE: &str = "scans.json";

/// Errors reading or writing the data directory.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid data in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown student: {0}")]
    UnknownStudent(String),
}

/// The two persisted collections.
#[derive(Debug)]
pub struct Store {
    dir: PathBuf,
    students: Vec<Student>,
    scans: Vec<ScanResult>,
}

impl Store {
    /// Open the store in `dir`, creating the directory if needed.
    ///
    /// A missing collection file is treated as an empty collection.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let students: Vec<Student> = load_collection(&dir.join(STUDENTS_FILE))?;
        let scans: Vec<ScanResult> = load_collection(&dir.join(SCANS_FILE))?;

        info!(
            "Loaded {} students and {} scans from {}",
            students.len(),
            scans.len(),
            dir.display()
        );

        Ok(Self {
            dir,
            students,
            scans,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn scans(&self) -> &[ScanResult] {
        &self.scans
    }

    /// Look up a student by exact identifier.
    pub fn student(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    /// Look up a student by identifier, or by case-insensitive name.
    ///
    /// Name matches return the first student added with that name.
    pub fn find_student(&self, key: &str) -> Option<&Student> {
        let key = key.trim();
        self.student(key).or_else(|| {
            let wanted = key.to_lowercase();
            self.students
                .iter()
                .find(|s| s.name.trim().to_lowercase() == wanted)
        })
    }

    /// All scans for a student, in the order they were recorded.
    pub fn scans_for(&self, student_id: &str) -> Vec<ScanResult> {
        self.scans
            .iter()
            .filter(|s| s.student_id == student_id)
            .cloned()
            .collect()
    }

    /// Add one student and persist the roster.
    pub fn add_student(&mut self, student: Student) -> Result<(), StoreError> {
        self.add_students(vec![student])
    }

    /// Add several students at once and persist the roster.
    pub fn add_students(&mut self, new_students: Vec<Student>) -> Result<(), StoreError> {
        let mut students = self.students.clone();
        students.extend(new_students);

        save_collection(&self.dir.join(STUDENTS_FILE), &students)?;
        self.students = students;
        Ok(())
    }

    /// Record a scan and persist the scan history.
    ///
    /// The scan must belong to a student on the roster.
    pub fn add_scan(&mut self, scan: ScanResult) -> Result<(), StoreError> {
        if self.student(&scan.student_id).is_none() {
            return Err(StoreError::UnknownStudent(scan.student_id));
        }

        let mut scans = self.scans.clone();
        scans.push(scan);

        save_collection(&self.dir.join(SCANS_FILE), &scans)?;
        self.scans = scans;
        Ok(())
    }
}

fn load_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    if !path.exists() {
        debug!("{} not found, starting empty", path.display());
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&content).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a collection to a temporary file next to `path`, then rename it into place.
fn save_collection<T: Serialize>(path: &Path, items: &[T]) -> Result<(), StoreError> {
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_string_pretty(items).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    file.write_all(json.as_bytes()).map_err(io_err)?;
    file.persist(path).map_err(|e| io_err(e.error))?;

    debug!("Wrote {} records to {}", items.len(), path.display());
    Ok(())
}
