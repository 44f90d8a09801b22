use axum::{
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use tracing::error;

use crate::web::uploads::XLSX_CONTENT_TYPE;

/// Sends spreadsheet bytes with an attachment disposition so the browser saves them.
pub fn spreadsheet_attachment(filename: &str, bytes: Vec<u8>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(XLSX_CONTENT_TYPE),
    );

    let disposition = format!("attachment; filename=\"{}\"", filename);
    match HeaderValue::from_str(&disposition) {
        Ok(value) => {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
        Err(err) => {
            error!(?err, filename, "invalid download filename");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Invalid download header.",
            )
                .into_response();
        }
    }

    (headers, bytes).into_response()
}

pub fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Html("<h1>Not found</h1><p><a href=\"/\">Back to the dashboard</a></p>".to_string()),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_sets_disposition() {
        let response = spreadsheet_attachment("stock_update_template.xlsx", vec![1, 2, 3]);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"stock_update_template.xlsx\""
        );
        assert_eq!(response.headers()[header::CONTENT_TYPE], XLSX_CONTENT_TYPE);
    }

    #[test]
    fn attachment_rejects_header_breaking_names() {
        let response = spreadsheet_attachment("bad\nname.xlsx", Vec::new());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
