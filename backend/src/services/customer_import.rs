//! Delimited-file parsing and reporting for bulk customer import

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use shared::models::CustomerRecord;

use crate::error::{AppError, AppResult};

/// Errors listed in the summary before the rest are collapsed into a count
const SUMMARY_ERROR_LIMIT: usize = 10;

/// Data rows shown by a preview
const PREVIEW_ROWS: usize = 5;

pub const EXPECTED_FORMAT: &str = "Expected CSV Format:
- Column 1: Customer Name (required)
- Column 2: Description (optional)
- Column 3: Phone (optional)
- Column 4: Email (optional)
- Column 5: Latitude (decimal format, blank reads as 0)
- Column 6: Longitude (decimal format, blank reads as 0)

Example:
PT ABC,Main Office,+62-21-1234567,info@abc.com,-6.200000,106.816666";

/// Request body shared by preview and import
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub csv: String,
    pub delimiter: Option<String>,
    #[serde(default = "default_true")]
    pub has_header: bool,
    #[serde(default)]
    pub update_existing: bool,
}

fn default_true() -> bool {
    true
}

impl ImportRequest {
    pub fn delimiter_byte(&self) -> AppResult<u8> {
        match self.delimiter.as_deref() {
            None | Some("") => Ok(b','),
            Some(value) => shared::parse_delimiter(value).ok_or_else(|| {
                AppError::validation("delimiter", "Delimiter must be one of , ; | or tab")
            }),
        }
    }
}

/// One data row with its file line number
#[derive(Debug)]
pub struct ParsedRow {
    pub row_number: usize,
    pub record: Result<CustomerRecord, String>,
}

/// Read every row of the file. Row numbers count the header line when there is one.
pub fn parse_rows(csv: &str, delimiter: u8, has_header: bool) -> AppResult<Vec<ParsedRow>> {
    let rows = read_raw_rows(csv, delimiter)?;
    let skip = usize::from(has_header);
    let first_row = skip + 1;

    Ok(rows
        .into_iter()
        .skip(skip)
        .enumerate()
        .map(|(index, fields)| {
            let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
            ParsedRow {
                row_number: index + first_row,
                record: shared::parse_customer_record(&refs),
            }
        })
        .collect())
}

fn read_raw_rows(csv: &str, delimiter: u8) -> AppResult<Vec<Vec<String>>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(csv.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record
            .map_err(|e| AppError::ValidationError(format!("Error reading CSV file: {}", e)))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    if rows.is_empty() {
        return Err(AppError::ValidationError("The CSV file is empty.".to_string()));
    }
    Ok(rows)
}

/// First rows of the file plus the expected column layout
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub rows: Vec<String>,
    pub expected_format: &'static str,
}

pub fn preview(csv: &str, delimiter: u8, has_header: bool) -> AppResult<ImportPreview> {
    let take = PREVIEW_ROWS + usize::from(has_header);
    let rows = read_raw_rows(csv, delimiter)?
        .into_iter()
        .take(take)
        .enumerate()
        .map(|(i, fields)| format!("Row {}: {}", i + 1, fields.join(" | ")))
        .collect();

    Ok(ImportPreview {
        rows,
        expected_format: EXPECTED_FORMAT,
    })
}

/// Counts and messages from an import run
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub created: u32,
    pub updated: u32,
    pub errors: Vec<String>,
    pub summary: String,
}

impl ImportSummary {
    pub fn record_error(&mut self, row_number: usize, message: &str) {
        tracing::warn!("Import error on row {}: {}", row_number, message);
        self.errors.push(format!("Row {}: {}", row_number, message));
    }

    pub fn imported(&self) -> u32 {
        self.created + self.updated
    }

    /// Render the human-readable summary and store it on `self.summary`
    pub fn finish(mut self) -> Self {
        let mut lines = vec![
            "Import completed!".to_string(),
            format!("Created: {} customers", self.created),
            format!("Updated: {} customers", self.updated),
            format!("Errors: {} rows", self.errors.len()),
        ];

        if !self.errors.is_empty() {
            lines.push("\nErrors:".to_string());
            lines.extend(self.errors.iter().take(SUMMARY_ERROR_LIMIT).cloned());
            if self.errors.len() > SUMMARY_ERROR_LIMIT {
                lines.push(format!(
                    "... and {} more errors",
                    self.errors.len() - SUMMARY_ERROR_LIMIT
                ));
            }
        }

        self.summary = lines.join("\n");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "name,description,phone,email,lat,lon
PT ABC,Main Office,+62-21-1234567,info@abc.com,-6.200000,106.816666
,No name,,,1,1
PT XYZ,Depot,,,95,10
";

    #[test]
    fn test_row_numbers_count_header() {
        let rows = parse_rows(SAMPLE, b',', true).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].row_number, 2);
        assert!(rows[0].record.is_ok());
        assert_eq!(
            rows[1].record.as_ref().unwrap_err(),
            "Customer name is required"
        );
        assert_eq!(
            rows[2].record.as_ref().unwrap_err(),
            "Latitude must be between -90 and 90"
        );
        assert_eq!(rows[2].row_number, 4);
    }

    #[test]
    fn test_without_header_first_row_is_one() {
        let rows = parse_rows("A;b;c;d;1;2\n", b';', false).unwrap();
        assert_eq!(rows[0].row_number, 1);
        assert_eq!(rows[0].record.as_ref().unwrap().name, "A");
    }

    #[test]
    fn test_short_rows_are_errors() {
        let rows = parse_rows("A,b,c\n", b',', false).unwrap();
        assert_eq!(
            rows[0].record.as_ref().unwrap_err(),
            "Row must have at least 6 columns"
        );
    }

    #[test]
    fn test_empty_file_is_rejected() {
        assert!(matches!(
            parse_rows("", b',', true),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn test_preview_shows_header_plus_five_rows() {
        let mut csv = String::from("name,d,p,e,lat,lon\n");
        for i in 0..8 {
            csv.push_str(&format!("C{},,,,1,1\n", i));
        }
        let preview = preview(&csv, b',', true).unwrap();
        assert_eq!(preview.rows.len(), 6);
        assert_eq!(preview.rows[1], "Row 2: C0 |  |  |  | 1 | 1");
    }

    #[test]
    fn test_summary_truncates_errors() {
        let mut summary = ImportSummary {
            created: 1,
            ..Default::default()
        };
        for row in 2..15 {
            summary.record_error(row, "Customer name is required");
        }
        let summary = summary.finish();
        assert!(summary.summary.starts_with("Import completed!\nCreated: 1 customers"));
        assert!(summary.summary.contains("Errors: 13 rows"));
        assert!(summary.summary.contains("Row 11: Customer name is required"));
        assert!(!summary.summary.contains("Row 12:"));
        assert!(summary.summary.ends_with("... and 3 more errors"));
    }

    #[test]
    fn test_delimiter_names() {
        let request = ImportRequest {
            csv: String::new(),
            delimiter: Some("tab".to_string()),
            has_header: true,
            update_existing: false,
        };
        assert_eq!(request.delimiter_byte().unwrap(), b'\t');
    }
}
