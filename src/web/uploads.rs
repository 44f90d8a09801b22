use std::{collections::HashMap, path::Path};

use axum::extract::Multipart;
use thiserror::Error;

use crate::{api::UploadFile, bulk::preflight::ALLOWED_EXTENSIONS};

pub const FILE_FIELD: &str = "file";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLS_CONTENT_TYPE: &str = "application/vnd.ms-excel";

/// Error returned when the submitted form cannot be turned into an upload.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct FormError(String);

impl FormError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The spreadsheet plus any plain text fields from an upload form.
#[derive(Debug)]
pub struct UploadForm {
    pub file: UploadFile,
    pub text_fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn text(&self, field_name: &str) -> Option<&str> {
        self.text_fields.get(field_name).map(String::as_str)
    }
}

/// Reads a single spreadsheet from the `file` field into memory.
pub async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, FormError> {
    let mut file: Option<UploadFile> = None;
    let mut text_fields = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| FormError::new(format!("Could not read the upload form: {err}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        let Some(original_name) = field.file_name().map(str::to_string) else {
            let value = field
                .text()
                .await
                .map_err(|err| FormError::new(format!("Could not read field `{field_name}`: {err}")))?;
            text_fields.insert(field_name, value);
            continue;
        };

        if field_name != FILE_FIELD {
            return Err(FormError::new(format!("Unexpected file field `{field_name}`")));
        }
        if file.is_some() {
            return Err(FormError::new("Select a single spreadsheet per upload"));
        }
        if original_name.trim().is_empty() {
            return Err(FormError::new("Choose a spreadsheet to upload"));
        }

        let extension = extension_of(&original_name);
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(FormError::new("Only .xlsx and .xls files are supported"));
        }

        let declared = field
            .content_type()
            .and_then(|value| value.parse::<mime::Mime>().ok());
        let bytes = field
            .bytes()
            .await
            .map_err(|err| FormError::new(format!("Could not read the uploaded file: {err}")))?;
        if bytes.is_empty() {
            return Err(FormError::new("The selected file is empty"));
        }

        file = Some(UploadFile::new(
            stored_name(&original_name, &extension),
            content_type_for(&extension, declared),
            bytes.to_vec(),
        ));
    }

    let file = file.ok_or_else(|| FormError::new("Choose a spreadsheet to upload"))?;
    Ok(UploadForm { file, text_fields })
}

fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

fn stored_name(original: &str, extension: &str) -> String {
    let sanitized = sanitize_filename::sanitize(original);
    if sanitized.is_empty() {
        format!("upload.{extension}")
    } else {
        sanitized
    }
}

// Browsers often send octet-stream for spreadsheets; fall back to the extension.
fn content_type_for(extension: &str, declared: Option<mime::Mime>) -> mime::Mime {
    if let Some(declared) = declared.filter(|m| *m != mime::APPLICATION_OCTET_STREAM) {
        return declared;
    }
    let by_extension = match extension {
        "xlsx" => XLSX_CONTENT_TYPE,
        _ => XLS_CONTENT_TYPE,
    };
    by_extension
        .parse()
        .unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_of("Stock.XLSX"), "xlsx");
        assert_eq!(extension_of("README"), "");
    }

    #[test]
    fn stored_name_strips_path_segments() {
        let name = stored_name("../../etc/meds.xlsx", "xlsx");
        assert!(!name.contains('/'));
        assert!(name.ends_with("meds.xlsx"));
        assert_eq!(stored_name("///", "xls"), "upload.xls");
    }

    #[test]
    fn octet_stream_is_replaced_by_extension_type() {
        let mime = content_type_for("xlsx", Some(mime::APPLICATION_OCTET_STREAM));
        assert_eq!(mime.as_ref(), XLSX_CONTENT_TYPE);

        let mime = content_type_for("xls", None);
        assert_eq!(mime.as_ref(), XLS_CONTENT_TYPE);
    }

    #[test]
    fn declared_type_is_kept() {
        let declared: mime::Mime = XLS_CONTENT_TYPE.parse().unwrap();
        let mime = content_type_for("xlsx", Some(declared.clone()));
        assert_eq!(mime, declared);
    }
}
