//! Class label table
//!
//! A plain-text file with one class name per line. Line `i` names model
//! output `i`.

use std::path::Path;
use visionserve_core::{Error, Result};

/// Ordered class names, index-aligned with the model's output vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// Load labels from a file, one per line
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::labels(format!("Failed to read label file {}: {}", path.display(), e))
        })?;

        let table = Self::parse(&content)?;
        tracing::debug!("Loaded {} labels from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parse label file contents
    ///
    /// Each line is trimmed. Trailing blank lines are dropped, but blank lines
    /// in the middle are kept so that indices stay aligned.
    pub fn parse(content: &str) -> Result<Self> {
        let mut labels: Vec<String> = content.lines().map(|l| l.trim().to_string()).collect();

        while labels.last().is_some_and(|l| l.is_empty()) {
            labels.pop();
        }

        Self::from_labels(labels)
    }

    /// Build a table from an in-memory list
    pub fn from_labels(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::labels("Label table is empty"));
        }
        Ok(Self { labels })
    }

    /// Look up the label for an output index
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_trims_lines() {
        let table = LabelTable::parse("tench\n  goldfish \r\ngreat white shark\n").unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0), Some("tench"));
        assert_eq!(table.get(1), Some("goldfish"));
        assert_eq!(table.get(2), Some("great white shark"));
        assert_eq!(table.get(3), None);
    }

    #[test]
    fn test_parse_keeps_interior_blank_lines() {
        let table = LabelTable::parse("a\n\nc\n\n\n").unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(1), Some(""));
        assert_eq!(table.get(2), Some("c"));
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(matches!(LabelTable::parse(""), Err(Error::Labels(_))));
        assert!(matches!(LabelTable::parse("\n\n"), Err(Error::Labels(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cat").unwrap();
        writeln!(file, "dog").unwrap();

        let table = LabelTable::from_file(file.path()).unwrap();
        assert_eq!(table.iter().collect::<Vec<_>>(), vec!["cat", "dog"]);
    }

    #[test]
    fn test_missing_file() {
        let err = LabelTable::from_file("/nonexistent/imagenet_classes.txt").unwrap_err();
        assert!(matches!(err, Error::Labels(_)));
        assert!(err.to_string().contains("imagenet_classes.txt"));
    }
}
