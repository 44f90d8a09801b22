use serde::Deserialize;

/// `?status=` / `?error=` codes carried across redirects.
#[derive(Debug, Default, Deserialize)]
pub struct FlashQuery {
    pub status: Option<String>,
    pub error: Option<String>,
}

impl FlashQuery {
    pub fn render(&self) -> String {
        compose_flash_message(self.status.as_deref(), self.error.as_deref())
    }
}

/// Compose a flash message HTML snippet for known status or error codes.
pub fn compose_flash_message(status: Option<&str>, error: Option<&str>) -> String {
    if let Some(status) = status {
        let message = match status {
            "logged_out" => "You have been signed out.",
            "medicine_deleted" => "Medicine deleted.",
            "stock_adjusted" => "Stock adjusted.",
            "reset" => "Upload cleared.",
            "medicine_added" => "Medicine added.",
            "medicine_updated" => "Medicine updated.",
            _ => "",
        };

        if !message.is_empty() {
            return format!(r#"<div class="flash success">{message}</div>"#);
        }
    }

    if let Some(error) = error {
        let message = match error {
            "delete_failed" => "Could not delete the medicine. It may still be referenced by stock or sales.",
            "adjust_failed" => "Could not adjust stock for that medicine.",
            "invalid_adjustment" => "Enter a whole number (negative to remove stock).",
            "no_report" => "There is no finished upload to export.",
            "report_failed" => "The error report could not be generated.",
            "upload_in_progress" => "An upload is already running. Wait for it to finish first.",
            "template_failed" => "The template could not be downloaded. Try again shortly.",
            "stock_failed" => "The medicine was created but its opening stock could not be recorded. Adjust it from the list.",
            "update_failed" => "Could not save changes to the medicine.",
            "not_found" => "That medicine no longer exists.",
            _ => "Something went wrong, check the server log.",
        };

        return format!(r#"<div class="flash error">{message}</div>"#);
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_status_renders_success() {
        let html = compose_flash_message(Some("stock_adjusted"), None);
        assert!(html.contains("flash success"));
    }

    #[test]
    fn unknown_error_falls_back_to_generic_message() {
        let html = compose_flash_message(None, Some("???"));
        assert!(html.contains("check the server log"));
    }

    #[test]
    fn busy_uploader_has_its_own_message() {
        let html = compose_flash_message(None, Some("upload_in_progress"));
        assert!(html.contains("already running"));
    }

    #[test]
    fn nothing_to_show_is_empty() {
        assert!(compose_flash_message(Some("unknown"), None).is_empty());
    }
}
