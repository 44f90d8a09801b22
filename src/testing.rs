//! Call-recording backend double shared by the unit tests.

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::{
    api::{
        ApiError, ApiResult, LoginResponse, PharmacyApi, RawBulkResult, TokenPair, UploadFile,
        UploadResponse, UserProfile,
    },
    bulk::UploadKind,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Login(String),
    CurrentUser(String),
    Refresh(String),
    Upload(UploadKind),
    Template(UploadKind),
}

pub fn sample_user() -> UserProfile {
    UserProfile {
        id: "1".into(),
        email: "ana@pharmacy.test".into(),
        role: "admin".into(),
        name: "Ana".into(),
    }
}

#[derive(Default)]
pub struct FakeApi {
    accepted_tokens: Vec<String>,
    refreshed: Option<TokenPair>,
    login: Option<(String, String)>,
    login_outage: bool,
    detailed: Option<RawBulkResult>,
    upload_failure: Option<String>,
    template_failure: Option<String>,
    upload_gate: Option<Arc<Notify>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepting(mut self, token: &str) -> Self {
        self.accepted_tokens.push(token.to_string());
        self
    }

    pub fn refreshing_to(mut self, access: &str, refresh: &str) -> Self {
        self.refreshed = Some(TokenPair {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
        });
        self
    }

    pub fn with_login(mut self, access: &str, refresh: &str) -> Self {
        self.login = Some((access.to_string(), refresh.to_string()));
        self
    }

    /// Login answers 503 instead of accepting or rejecting credentials.
    pub fn login_unavailable(mut self) -> Self {
        self.login_outage = true;
        self
    }

    pub fn with_detailed_result(mut self, raw: RawBulkResult) -> Self {
        self.detailed = Some(raw);
        self
    }

    pub fn failing_uploads(mut self, message: &str) -> Self {
        self.upload_failure = Some(message.to_string());
        self
    }

    pub fn failing_templates(mut self, message: &str) -> Self {
        self.template_failure = Some(message.to_string());
        self
    }

    /// Uploads block until the returned handle is notified.
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.upload_gate = Some(gate.clone());
        (self, gate)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn unauthorized() -> ApiError {
    ApiError::Unauthorized {
        message: "Unauthorized".into(),
    }
}

impl PharmacyApi for FakeApi {
    async fn login(&self, email: &str, _password: &str) -> ApiResult<LoginResponse> {
        self.record(Call::Login(email.to_string()));
        if self.login_outage {
            return Err(ApiError::Status {
                status: 503,
                message: "Service unavailable".into(),
            });
        }
        match &self.login {
            Some((access, refresh)) => Ok(LoginResponse {
                access_token: access.clone(),
                refresh_token: refresh.clone(),
                user: sample_user(),
            }),
            None => Err(ApiError::Unauthorized {
                message: "Invalid credentials".into(),
            }),
        }
    }

    async fn current_user(&self, token: &str) -> ApiResult<UserProfile> {
        self.record(Call::CurrentUser(token.to_string()));
        if self.accepted_tokens.iter().any(|t| t == token) {
            Ok(sample_user())
        } else {
            Err(unauthorized())
        }
    }

    async fn refresh_token(&self, refresh_token: &str) -> ApiResult<TokenPair> {
        self.record(Call::Refresh(refresh_token.to_string()));
        self.refreshed.clone().ok_or_else(unauthorized)
    }

    async fn upload(
        &self,
        _token: &str,
        kind: UploadKind,
        _file: &UploadFile,
    ) -> ApiResult<UploadResponse> {
        self.record(Call::Upload(kind));
        if let Some(gate) = &self.upload_gate {
            gate.notified().await;
        }
        if let Some(message) = &self.upload_failure {
            return Err(ApiError::Status {
                status: 400,
                message: message.clone(),
            });
        }
        match (kind, &self.detailed) {
            (UploadKind::MedicineWithStock, Some(raw)) => Ok(UploadResponse::Detailed(raw.clone())),
            (UploadKind::MedicineWithStock, None) => {
                Ok(UploadResponse::Detailed(RawBulkResult::default()))
            }
            (other, _) => Ok(UploadResponse::Acknowledged(other)),
        }
    }

    async fn template(&self, _token: &str, kind: UploadKind) -> ApiResult<Vec<u8>> {
        self.record(Call::Template(kind));
        match &self.template_failure {
            Some(message) => Err(ApiError::Status {
                status: 404,
                message: message.clone(),
            }),
            None => Ok(b"PK\x03\x04template".to_vec()),
        }
    }
}
