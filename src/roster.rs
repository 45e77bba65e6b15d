//! Roster entry: single students and bulk lists.
//!
//! A bulk list has one student per line, either `Name` or `Name, Grade`.
//! Only the first comma separates name and grade; anything after it is
//! kept as the grade label.

use crate::models::Student;

/// A roster line before it becomes a [`Student`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub name: String,
    pub grade: Option<String>,
}

impl RosterEntry {
    pub fn into_student(self) -> Student {
        Student::new(self.name, self.grade)
    }
}

/// Parse one roster line. Blank lines (and lines with an empty name) yield `None`.
pub fn parse_line(line: &str) -> Option<RosterEntry> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (name, grade) = match line.split_once(',') {
        Some((name, grade)) => (name.trim(), Some(grade.trim())),
        None => (line, None),
    };

    if name.is_empty() {
        return None;
    }

    Some(RosterEntry {
        name: name.to_string(),
        grade: grade.filter(|g| !g.is_empty()).map(String::from),
    })
}

/// Parse a bulk list, skipping blank lines.
pub fn parse_bulk(text: &str) -> Vec<RosterEntry> {
    text.lines().filter_map(parse_line).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_only() {
        assert_eq!(
            parse_line("  Alex Smith "),
            Some(RosterEntry {
                name: "Alex Smith".to_string(),
                grade: None
            })
        );
    }

    #[test]
    fn test_parse_name_and_grade() {
        let entry = parse_line("Sam Lee, Grade 4, Room 12").unwrap();
        assert_eq!(entry.name, "Sam Lee");
        assert_eq!(entry.grade.as_deref(), Some("Grade 4, Room 12"));

        let empty_grade = parse_line("Kim,").unwrap();
        assert_eq!(empty_grade.grade, None);
    }

    #[test]
    fn test_parse_bulk_skips_blank_lines() {
        let entries = parse_bulk("Alex, 4A\n\n   \nSam\r\n, 5B\nKim, 4B\n");
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Alex", "Sam", "Kim"]);
    }

    #[test]
    fn test_entry_into_student() {
        let student = parse_line("Alex, 4A").unwrap().into_student();
        assert_eq!(student.name, "Alex");
        assert_eq!(student.grade_level.as_deref(), Some("4A"));
        assert!(!student.id.is_empty());
    }
}
