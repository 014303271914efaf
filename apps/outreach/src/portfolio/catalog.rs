//! Catalog loader for the portfolio CSV (`Techstack`, `Links` columns).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::models::portfolio::CatalogRow;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[error("Malformed catalog row: {0}")]
    Csv(#[from] csv::Error),
}

pub fn load_catalog(path: &Path) -> Result<Vec<CatalogRow>, CatalogError> {
    let file = File::open(path).map_err(|source| CatalogError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let rows = parse_catalog(file)?;
    info!("Loaded {} catalog rows from {}", rows.len(), path.display());
    Ok(rows)
}

pub fn parse_catalog<R: Read>(input: R) -> Result<Vec<CatalogRow>, CatalogError> {
    read_rows(csv::Reader::from_reader(input))
}

/// Reads every row, trimming fields. Rows with a blank description or link are
/// skipped; they can never be matched or linked.
fn read_rows<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<CatalogRow>, CatalogError> {
    let mut rows = Vec::new();
    for (line, record) in reader.deserialize::<CatalogRow>().enumerate() {
        let record = record?;
        let description = record.description.trim();
        let link = record.link.trim();
        if description.is_empty() || link.is_empty() {
            warn!("Skipping catalog row {}: blank Techstack or Links", line + 1);
            continue;
        }
        rows.push(CatalogRow {
            description: description.to_string(),
            link: link.to_string(),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog_maps_headers() {
        let csv = "Techstack,Links\n\"React, Node.js, MongoDB\",https://example.com/react\nPython,https://example.com/py\n";
        let rows = parse_catalog(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].description, "React, Node.js, MongoDB");
        assert_eq!(rows[0].link, "https://example.com/react");
        assert_eq!(rows[1].description, "Python");
    }

    #[test]
    fn test_parse_catalog_skips_blank_rows() {
        let csv = "Techstack,Links\n  ,https://example.com/a\nGo, \nRust,https://example.com/rust\n";
        let rows = parse_catalog(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "Rust");
    }

    #[test]
    fn test_parse_catalog_requires_exact_headers() {
        let csv = "Stack,URL\nRust,https://example.com/rust\n";
        assert!(parse_catalog(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_load_catalog_missing_file_is_open_error() {
        let err = load_catalog(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, CatalogError::Open { .. }));
    }
}
