use std::path::Path;

use crate::error::{Error, Result};

/// Tabular formats the ingestion pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Xlsx,
}

impl SourceFormat {
    /// Detect the format from a file name's extension, ignoring case.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("xlsx") => Ok(Self::Xlsx),
            _ => Err(Error::UnsupportedFormat(filename.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_csv_and_xlsx_case_insensitively() {
        assert_eq!(
            SourceFormat::from_filename("data.csv").unwrap(),
            SourceFormat::Csv
        );
        assert_eq!(
            SourceFormat::from_filename("REPORT.XLSX").unwrap(),
            SourceFormat::Xlsx
        );
        assert_eq!(
            SourceFormat::from_filename("dir/Mixed.CsV").unwrap(),
            SourceFormat::Csv
        );
    }

    #[test]
    fn rejects_other_extensions() {
        for name in ["notes.txt", "sheet.xls", "csv", "archive.csv.gz", ""] {
            assert!(
                matches!(
                    SourceFormat::from_filename(name),
                    Err(Error::UnsupportedFormat(_))
                ),
                "{name} should be rejected"
            );
        }
    }
}
