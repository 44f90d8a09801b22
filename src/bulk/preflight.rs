use std::{io::Cursor, path::Path};

use calamine::{DataType, Reader, Xlsx};

use super::BulkError;

pub const ALLOWED_EXTENSIONS: &[&str] = &["xlsx", "xls"];

/// What the dashboard could read from a workbook before sending it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetPreview {
    pub headers: Vec<String>,
    pub data_rows: usize,
}

/// Checks the extension and, for `.xlsx`, counts the data rows of the first worksheet.
///
/// Legacy `.xls` workbooks pass through unread (`Ok(None)`).
pub fn preview_workbook(file_name: &str, bytes: &[u8]) -> Result<Option<SheetPreview>, BulkError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(BulkError::Validation(
            "Only .xlsx and .xls files are supported".to_string(),
        ));
    }
    if bytes.is_empty() {
        return Err(BulkError::Validation("The selected file is empty".to_string()));
    }
    if extension == "xls" {
        return Ok(None);
    }

    let mut workbook = Xlsx::new(Cursor::new(bytes))
        .map_err(|err| BulkError::Validation(format!("Unable to open the workbook: {err}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| BulkError::Validation("The workbook has no worksheets".to_string()))?
        .map_err(|err| BulkError::Validation(format!("Unable to read the first worksheet: {err}")))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|header| header.iter().filter_map(|cell| cell_to_string(Some(cell))).collect())
        .unwrap_or_default();
    if headers.is_empty() {
        return Err(BulkError::Validation(
            "The first worksheet has no header row".to_string(),
        ));
    }

    let data_rows = rows
        .filter(|row| row.iter().any(|cell| cell_to_string(Some(cell)).is_some()))
        .count();

    Ok(Some(SheetPreview { headers, data_rows }))
}

fn cell_to_string(cell: Option<&DataType>) -> Option<String> {
    let value = cell?;
    let text = match value {
        DataType::String(s) => s.trim().to_string(),
        DataType::Float(f) => {
            let mut s = format!("{f}");
            if s.ends_with(".0") {
                s.truncate(s.len() - 2);
            }
            s
        }
        DataType::Int(i) => i.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::Empty => String::new(),
        other => other.to_string(),
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use rust_xlsxwriter::Workbook;

    use super::*;

    fn workbook_bytes(rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    worksheet.write_string(r as u32, c as u16, *value).unwrap();
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn counts_non_blank_data_rows() {
        let bytes = workbook_bytes(&[
            &["name", "manufacturer", "quantity"],
            &["Paracetamol", "Acme", "10"],
            &["", "", ""],
            &["Ibuprofen", "Acme", "4"],
        ]);

        let preview = preview_workbook("meds.XLSX", &bytes).unwrap().unwrap();

        assert_eq!(preview.headers, vec!["name", "manufacturer", "quantity"]);
        assert_eq!(preview.data_rows, 2);
    }

    #[test]
    fn rejects_unsupported_extension() {
        let err = preview_workbook("meds.csv", b"a,b").unwrap_err();
        assert!(matches!(err, BulkError::Validation(_)));
    }

    #[test]
    fn legacy_xls_is_not_read() {
        assert_eq!(preview_workbook("old.xls", b"\xd0\xcf\x11\xe0").unwrap(), None);
    }

    #[test]
    fn rejects_garbage_xlsx() {
        let err = preview_workbook("meds.xlsx", b"definitely not a zip").unwrap_err();
        assert!(err.to_string().contains("Unable to open"));
    }
}
