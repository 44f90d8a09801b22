use rust_xlsxwriter::{Workbook, XlsxError};

use super::BulkError;
use super::format::ResultDetails;

pub const ERROR_REPORT_FILE_NAME: &str = "upload_errors.xlsx";

const HEADERS: [&str; 4] = ["Row", "Medicine", "Error", "Details"];

/// Renders the failed rows of an upload as a spreadsheet the user can fix and resubmit.
pub fn error_report_workbook(details: &ResultDetails) -> Result<Vec<u8>, BulkError> {
    build(details).map_err(|err| BulkError::Report(err.to_string()))
}

fn build(details: &ResultDetails) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }

    for (idx, row) in details.errors.iter().enumerate() {
        let line = (idx + 1) as u32;
        if let Some(source_row) = row.row {
            worksheet.write_number(line, 0, f64::from(source_row))?;
        }
        worksheet.write_string(line, 1, &row.entity)?;
        worksheet.write_string(line, 2, row.error.as_deref().unwrap_or_default())?;
        worksheet.write_string(line, 3, row.details.as_deref().unwrap_or_default())?;
    }

    workbook.save_to_buffer()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use calamine::{DataType, Reader, Xlsx};

    use super::*;
    use crate::bulk::{Outcome, RowOutcome};

    #[test]
    fn report_lists_error_rows() {
        let details = ResultDetails {
            created: Vec::new(),
            errors: vec![RowOutcome {
                row: Some(3),
                entity: "Ibuprofen".into(),
                outcome: Outcome::Error,
                error: Some("Unknown unit".into()),
                details: Some("unit 'box'".into()),
            }],
        };

        let bytes = error_report_workbook(&details).unwrap();

        let mut workbook = Xlsx::new(Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range_at(0).unwrap().unwrap();
        assert_eq!(range.get((0, 1)), Some(&DataType::String("Medicine".into())));
        assert_eq!(range.get((1, 0)), Some(&DataType::Float(3.0)));
        assert_eq!(range.get((1, 1)), Some(&DataType::String("Ibuprofen".into())));
        assert_eq!(range.get((1, 3)), Some(&DataType::String("unit 'box'".into())));
    }
}
