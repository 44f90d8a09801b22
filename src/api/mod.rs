mod models;

use std::future::Future;

use reqwest::{
    Client, RequestBuilder, Response, StatusCode,
    multipart::{Form, Part},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub use models::{
    LoginRequest, LoginResponse, Medicine, MedicineDraft, NamedRef, RawBulkResult,
    RefreshRequest, StockAdjustment, StockUpdate, TokenPair, UploadFile, UploadResponse,
    UserProfile,
};
#[cfg(test)]
pub use models::{RawBulkDetails, RawRowError, StockLevel};

use crate::bulk::UploadKind;

pub type ApiResult<T> = Result<T, ApiError>;

/// Failure talking to the pharmacy backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Unauthorized { message: String },
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response from backend: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// HTTP status the backend answered with, when it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(_) | ApiError::Decode(_) => None,
        }
    }
}

/// The slice of the backend the session manager and the upload orchestrator depend on.
///
/// `HttpApi` is the production implementation; tests substitute call-counting fakes.
pub trait PharmacyApi: Send + Sync {
    fn login(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = ApiResult<LoginResponse>> + Send;

    fn current_user(&self, token: &str) -> impl Future<Output = ApiResult<UserProfile>> + Send;

    fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = ApiResult<TokenPair>> + Send;

    fn upload(
        &self,
        token: &str,
        kind: UploadKind,
        file: &UploadFile,
    ) -> impl Future<Output = ApiResult<UploadResponse>> + Send;

    fn template(
        &self,
        token: &str,
        kind: UploadKind,
    ) -> impl Future<Output = ApiResult<Vec<u8>>> + Send;
}

#[derive(Clone)]
pub struct HttpApi {
    http: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let response = request.send().await?;
        ensure_success(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))
    }

    pub async fn list_medicines(&self, token: &str) -> ApiResult<Vec<Medicine>> {
        self.send_json(self.http.get(self.url("/medicine/")).bearer_auth(token))
            .await
    }

    pub async fn delete_medicine(&self, token: &str, id: i64) -> ApiResult<()> {
        self.send(
            self.http
                .delete(self.url(&format!("/medicine/{id}")))
                .bearer_auth(token),
        )
        .await?;
        Ok(())
    }

    pub async fn create_medicine(&self, token: &str, draft: &MedicineDraft) -> ApiResult<Medicine> {
        self.send_json(
            self.http
                .post(self.url("/medicine/"))
                .bearer_auth(token)
                .json(draft),
        )
        .await
    }

    pub async fn update_medicine(
        &self,
        token: &str,
        id: i64,
        draft: &MedicineDraft,
    ) -> ApiResult<Medicine> {
        self.send_json(
            self.http
                .put(self.url(&format!("/medicine/{id}")))
                .bearer_auth(token)
                .json(draft),
        )
        .await
    }

    pub async fn update_stock(&self, token: &str, medicine_id: i64, update: &StockUpdate) -> ApiResult<()> {
        self.send(
            self.http
                .patch(self.url(&format!("/stock/{medicine_id}")))
                .bearer_auth(token)
                .json(update),
        )
        .await?;
        Ok(())
    }

    pub async fn adjust_stock(&self, token: &str, medicine_id: i64, adjustment: i64) -> ApiResult<()> {
        self.send(
            self.http
                .patch(self.url(&format!("/stock/medicine/{medicine_id}/adjust")))
                .bearer_auth(token)
                .json(&StockAdjustment { adjustment }),
        )
        .await?;
        Ok(())
    }
}

impl PharmacyApi for HttpApi {
    async fn login(&self, email: &str, password: &str) -> ApiResult<LoginResponse> {
        self.send_json(
            self.http
                .post(self.url("/auth/login"))
                .json(&LoginRequest { email, password }),
        )
        .await
    }

    async fn current_user(&self, token: &str) -> ApiResult<UserProfile> {
        self.send_json(self.http.get(self.url("/auth/me")).bearer_auth(token))
            .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> ApiResult<TokenPair> {
        self.send_json(
            self.http
                .post(self.url("/auth/refresh"))
                .json(&RefreshRequest { refresh_token }),
        )
        .await
    }

    async fn upload(
        &self,
        token: &str,
        kind: UploadKind,
        file: &UploadFile,
    ) -> ApiResult<UploadResponse> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(file.content_type.as_ref())?;
        let form = Form::new().part("file", part);
        let request = self
            .http
            .post(self.url(kind.upload_path()))
            .bearer_auth(token)
            .multipart(form);

        debug!(kind = %kind, bytes = file.bytes.len(), "submitting bulk upload");

        match kind {
            UploadKind::MedicineWithStock => {
                let raw: RawBulkResult = self.send_json(request).await?;
                Ok(UploadResponse::Detailed(raw))
            }
            UploadKind::Medicine | UploadKind::Stock => {
                self.send(request).await?;
                Ok(UploadResponse::Acknowledged(kind))
            }
        }
    }

    async fn template(&self, token: &str, kind: UploadKind) -> ApiResult<Vec<u8>> {
        let response = self
            .send(
                self.http
                    .get(self.url(kind.template_path()))
                    .bearer_auth(token),
            )
            .await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

async fn ensure_success(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = backend_message(&body).unwrap_or_else(|| fallback_message(status));

    if status == StatusCode::UNAUTHORIZED {
        Err(ApiError::Unauthorized { message })
    } else {
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

/// Pulls the human-readable `message` out of an error body, if the backend sent one.
fn backend_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("message")? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        _ => None,
    }
}

fn fallback_message(status: StatusCode) -> String {
    format!("Request failed with status code {}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_message_reads_plain_string() {
        let body = r#"{"statusCode":400,"message":"Invalid file format"}"#;
        assert_eq!(backend_message(body).as_deref(), Some("Invalid file format"));
    }

    #[test]
    fn backend_message_joins_validation_lists() {
        let body = r#"{"message":["email must be an email","password is required"]}"#;
        assert_eq!(
            backend_message(body).as_deref(),
            Some("email must be an email; password is required")
        );
    }

    #[test]
    fn backend_message_ignores_non_json() {
        assert!(backend_message("<html>Bad Gateway</html>").is_none());
        assert!(backend_message(r#"{"message":""}"#).is_none());
    }

    #[test]
    fn status_is_known_only_for_backend_answers() {
        let rejected = ApiError::Status { status: 409, message: "Duplicate".into() };
        assert_eq!(rejected.status(), Some(409));
        let expired = ApiError::Unauthorized { message: "expired".into() };
        assert_eq!(expired.status(), Some(401));
        assert_eq!(ApiError::Decode("eof".into()).status(), None);
    }

    #[test]
    fn fallback_mentions_status_code() {
        assert_eq!(
            fallback_message(StatusCode::BAD_GATEWAY),
            "Request failed with status code 502"
        );
    }
}
