use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::{
    api::HttpApi,
    bulk::{BulkUploader, SheetPreview, UploadKind},
    config::Settings,
    session::{Access, FileTokenStore, SessionManager},
};

pub type AppSession = SessionManager<HttpApi, FileTokenStore>;

type LastSuccess = Arc<StdMutex<HashMap<UploadKind, DateTime<Utc>>>>;

/// Root-scope application state: one session, one uploader per upload page.
#[derive(Clone)]
pub struct AppState {
    api: HttpApi,
    session: Arc<RwLock<AppSession>>,
    uploaders: Arc<HashMap<UploadKind, BulkUploader<HttpApi>>>,
    previews: Arc<Mutex<HashMap<UploadKind, SheetPreview>>>,
    last_success: LastSuccess,
}

impl AppState {
    pub fn new(settings: &Settings) -> Self {
        let api = HttpApi::new(settings.api_base_url());
        let store = FileTokenStore::open(settings.token_store_path());
        info!(
            api = settings.api_base_url(),
            tokens = %store.path().display(),
            "configured backend"
        );

        let last_success: LastSuccess = Arc::default();
        let uploaders = UploadKind::ALL
            .into_iter()
            .map(|kind| (kind, build_uploader(api.clone(), kind, last_success.clone())))
            .collect();

        Self {
            session: Arc::new(RwLock::new(SessionManager::new(api.clone(), store))),
            api,
            uploaders: Arc::new(uploaders),
            previews: Arc::default(),
            last_success,
        }
    }

    /// Validates persisted tokens in the background; pages show a loading screen meanwhile.
    pub fn spawn_session_restore(&self) {
        let session = self.session.clone();
        tokio::spawn(async move {
            let mut guard = session.write().await;
            guard.initialize().await;
            info!(
                authenticated = guard.session().is_authenticated(),
                "session initialized"
            );
        });
    }

    /// Route guard decision. A held write lock means initialization or login is in flight.
    pub fn access(&self) -> Access {
        match self.session.try_read() {
            Ok(guard) => guard.access(),
            Err(_) => Access::Loading,
        }
    }

    pub fn session(&self) -> &RwLock<AppSession> {
        &self.session
    }

    pub fn api(&self) -> &HttpApi {
        &self.api
    }

    pub fn uploader(&self, kind: UploadKind) -> &BulkUploader<HttpApi> {
        // Every kind is registered in `new`.
        &self.uploaders[&kind]
    }

    pub async fn remember_preview(&self, kind: UploadKind, preview: Option<SheetPreview>) {
        let mut previews = self.previews.lock().await;
        match preview {
            Some(preview) => {
                previews.insert(kind, preview);
            }
            None => {
                previews.remove(&kind);
            }
        }
    }

    pub async fn preview(&self, kind: UploadKind) -> Option<SheetPreview> {
        self.previews.lock().await.get(&kind).cloned()
    }

    pub fn last_success(&self, kind: UploadKind) -> Option<DateTime<Utc>> {
        self.last_success
            .lock()
            .ok()
            .and_then(|map| map.get(&kind).copied())
    }
}

fn build_uploader(api: HttpApi, kind: UploadKind, last_success: LastSuccess) -> BulkUploader<HttpApi> {
    BulkUploader::new(api)
        .on_success(move |result| {
            if let Ok(mut map) = last_success.lock() {
                map.insert(kind, Utc::now());
            }
            info!(
                %kind,
                created_manufacturers = result.created_manufacturers_count,
                created_categories = result.created_categories_count,
                "inventory updated from spreadsheet"
            );
        })
        .on_error(move |err| {
            warn!(%kind, error = %err, "bulk operation failed");
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guard_reports_loading_while_session_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(&Settings::for_tests(dir.path().join("session.json")));
        assert_eq!(state.access(), Access::Loading);

        // No stored tokens, so restoring makes no network calls.
        state.session().write().await.initialize().await;
        assert_eq!(state.access(), Access::RedirectToLogin);

        let guard = state.session().write().await;
        assert_eq!(state.access(), Access::Loading);
        drop(guard);

        assert_eq!(state.access(), Access::RedirectToLogin);
    }
}
