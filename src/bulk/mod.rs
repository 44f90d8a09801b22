pub mod format;
pub mod normalize;
pub mod preflight;
pub mod report;

use std::fmt;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{ApiError, PharmacyApi, UploadFile};

pub use format::{FormattedResults, format_results};
#[cfg(test)]
pub use format::{ResultDetails, UploadSummary};
pub use normalize::normalize;
pub use preflight::{SheetPreview, preview_workbook};
pub use report::{ERROR_REPORT_FILE_NAME, error_report_workbook};

/// The three spreadsheet imports the backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadKind {
    MedicineWithStock,
    Medicine,
    Stock,
}

impl UploadKind {
    pub const ALL: [UploadKind; 3] = [
        UploadKind::MedicineWithStock,
        UploadKind::Medicine,
        UploadKind::Stock,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UploadKind::MedicineWithStock => "medicine-with-stock",
            UploadKind::Medicine => "medicine",
            UploadKind::Stock => "stock",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "medicine-with-stock" => Some(UploadKind::MedicineWithStock),
            "medicine" => Some(UploadKind::Medicine),
            "stock" => Some(UploadKind::Stock),
            _ => None,
        }
    }

    pub fn upload_path(self) -> &'static str {
        match self {
            UploadKind::MedicineWithStock => "/bulk-medicine-stock/bulk-upload/medicine-with-stock",
            UploadKind::Medicine => "/excel/bulk-upload/medicine",
            UploadKind::Stock => "/excel-stock/bulk-upload/stock",
        }
    }

    pub fn template_path(self) -> &'static str {
        match self {
            UploadKind::MedicineWithStock => "/bulk-medicine-stock/bulk-medicine-stock-template",
            UploadKind::Medicine => "/excel/medicine",
            UploadKind::Stock => "/excel-stock/stock",
        }
    }

    pub fn template_file_name(self) -> &'static str {
        match self {
            UploadKind::MedicineWithStock => "bulk_medicine_with_stock_template.xlsx",
            UploadKind::Medicine => "medicine_template.xlsx",
            UploadKind::Stock => "stock_update_template.xlsx",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            UploadKind::MedicineWithStock => "Medicine with Stock",
            UploadKind::Medicine => "Medicine Only",
            UploadKind::Stock => "Stock Update",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            UploadKind::MedicineWithStock => {
                "Upload medicines with inventory and stock data. Creates manufacturers and categories automatically."
            }
            UploadKind::Medicine => {
                "Upload medicines only. Creates manufacturers and categories automatically."
            }
            UploadKind::Stock => "Update stock quantities for existing medicines.",
        }
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Error,
}

/// One spreadsheet row as the backend reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOutcome {
    pub row: Option<u32>,
    pub entity: String,
    pub outcome: Outcome,
    pub error: Option<String>,
    pub details: Option<String>,
}

/// Canonical upload result, whatever shape the endpoint answered with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadResult {
    pub message: String,
    pub success_count: u32,
    pub error_count: u32,
    pub created_manufacturers_count: u32,
    pub created_categories_count: u32,
    pub rows: Vec<RowOutcome>,
    pub created_manufacturers: Vec<String>,
    pub created_categories: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UploadState {
    #[default]
    Idle,
    Uploading,
    Succeeded(UploadResult),
    Failed(String),
}

impl UploadState {
    pub fn is_uploading(&self) -> bool {
        matches!(self, UploadState::Uploading)
    }
}

#[derive(Debug, Error)]
pub enum BulkError {
    #[error("Invalid upload type: {0}")]
    InvalidUploadType(String),
    #[error("Invalid template type: {0}")]
    InvalidTemplateType(String),
    #[error("An upload is already in progress")]
    AlreadyUploading,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Transport(#[from] ApiError),
    #[error("Failed to build report: {0}")]
    Report(String),
}

/// A downloaded template, named for the browser's save dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFile {
    pub file_name: &'static str,
    pub bytes: Vec<u8>,
}

type SuccessCallback = Box<dyn Fn(&UploadResult) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&BulkError) + Send + Sync>;

/// Drives one upload dialog: Idle -> Uploading -> Succeeded | Failed, and back via `reset`.
pub struct BulkUploader<A> {
    api: A,
    state: Mutex<UploadState>,
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
}

impl<A: PharmacyApi> BulkUploader<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: Mutex::new(UploadState::Idle),
            on_success: None,
            on_error: None,
        }
    }

    pub fn on_success(mut self, callback: impl Fn(&UploadResult) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&BulkError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    #[cfg(test)]
    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn state(&self) -> UploadState {
        self.state.lock().await.clone()
    }

    /// Submits `file` to the endpoint for `kind`.
    ///
    /// Rejected without any state change while another upload is in flight.
    pub async fn upload_file(
        &self,
        token: &str,
        file: UploadFile,
        kind: &str,
    ) -> Result<UploadResult, BulkError> {
        let kind = {
            let mut state = self.state.lock().await;
            if state.is_uploading() {
                warn!(kind, "upload rejected, another upload is in progress");
                return Err(BulkError::AlreadyUploading);
            }

            match UploadKind::parse(kind) {
                Some(kind) => {
                    *state = UploadState::Uploading;
                    kind
                }
                None => {
                    let err = BulkError::InvalidUploadType(kind.to_string());
                    *state = UploadState::Failed(err.to_string());
                    drop(state);
                    self.notify_error(&err);
                    return Err(err);
                }
            }
        };

        let attempt = Uuid::new_v4();
        info!(%attempt, %kind, file = %file.file_name, "bulk upload started");

        match self.api.upload(token, kind, &file).await {
            Ok(response) => {
                let result = normalize(response);
                *self.state.lock().await = UploadState::Succeeded(result.clone());
                info!(
                    %attempt,
                    success = result.success_count,
                    errors = result.error_count,
                    "bulk upload finished"
                );
                if let Some(callback) = &self.on_success {
                    callback(&result);
                }
                Ok(result)
            }
            Err(err) => {
                let err = BulkError::Transport(err);
                warn!(%attempt, error = %err, "bulk upload failed");
                *self.state.lock().await = UploadState::Failed(err.to_string());
                self.notify_error(&err);
                Err(err)
            }
        }
    }

    /// Fetches the spreadsheet template for `kind`. One GET, no retries.
    pub async fn download_template_file(
        &self,
        token: &str,
        kind: &str,
    ) -> Result<TemplateFile, BulkError> {
        let Some(kind) = UploadKind::parse(kind) else {
            let err = BulkError::InvalidTemplateType(kind.to_string());
            self.record_side_failure(&err).await;
            return Err(err);
        };

        match self.api.template(token, kind).await {
            Ok(bytes) => {
                info!(%kind, bytes = bytes.len(), "template downloaded");
                Ok(TemplateFile {
                    file_name: kind.template_file_name(),
                    bytes,
                })
            }
            Err(err) => {
                let err = BulkError::Transport(err);
                warn!(%kind, error = %err, "template download failed");
                self.record_side_failure(&err).await;
                Err(err)
            }
        }
    }

    /// Back to Idle from a finished upload. Refused while an upload is in flight.
    pub async fn reset(&self) -> Result<(), BulkError> {
        let mut state = self.state.lock().await;
        if state.is_uploading() {
            return Err(BulkError::AlreadyUploading);
        }
        *state = UploadState::Idle;
        Ok(())
    }

    // Template failures never replace a running upload or a finished result.
    async fn record_side_failure(&self, err: &BulkError) {
        {
            let mut state = self.state.lock().await;
            if matches!(*state, UploadState::Idle | UploadState::Failed(_)) {
                *state = UploadState::Failed(err.to_string());
            }
        }
        self.notify_error(err);
    }

    fn notify_error(&self, err: &BulkError) {
        if let Some(callback) = &self.on_error {
            callback(err);
        }
    }
}
