pub mod store;

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, PharmacyApi, UserProfile};

pub use store::{FileTokenStore, TokenKey, TokenStore};
#[cfg(test)]
pub use store::MemoryTokenStore;

/// In-memory view of who is signed in.
///
/// `user` is only `Some` after a successful profile lookup for the current token pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserProfile>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Route guard outcome for pages behind the login wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Loading,
    Granted,
    RedirectToLogin,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("session expired, please sign in again")]
    SessionExpired,
    #[error(transparent)]
    Backend(#[from] ApiError),
}

pub struct SessionManager<A, S> {
    api: A,
    store: S,
    session: Session,
    ready: bool,
}

impl<A, S> SessionManager<A, S>
where
    A: PharmacyApi,
    S: TokenStore,
{
    pub fn new(api: A, store: S) -> Self {
        Self {
            api,
            store,
            session: Session::default(),
            ready: false,
        }
    }

    /// Restores the session from persisted tokens.
    ///
    /// Makes at most one refresh call and at most two profile lookups. Every failure
    /// degrades to a signed-out session; `is_ready()` is true once this returns.
    pub async fn initialize(&mut self) {
        let Some(access_token) = self.store.get(TokenKey::Access) else {
            self.session = Session::default();
            self.ready = true;
            return;
        };
        let refresh_token = self.store.get(TokenKey::Refresh);

        self.session = Session {
            access_token: Some(access_token.clone()),
            refresh_token: refresh_token.clone(),
            user: None,
        };

        match self.api.current_user(&access_token).await {
            Ok(user) => {
                info!(user = %user.email, "restored session");
                self.session.user = Some(user);
            }
            Err(err) => {
                warn!(?err, "stored access token was rejected");
                match refresh_token {
                    Some(refresh_token) => {
                        if let Err(err) = self.refresh_session(&refresh_token).await {
                            warn!(?err, "token refresh failed, signing out");
                            self.clear_persisted(&[TokenKey::Access, TokenKey::Refresh]);
                            self.session = Session::default();
                        }
                    }
                    None => {
                        self.clear_persisted(&[TokenKey::Access]);
                        self.session = Session::default();
                    }
                }
            }
        }

        self.ready = true;
    }

    async fn refresh_session(&mut self, refresh_token: &str) -> Result<(), AuthError> {
        let pair = self
            .api
            .refresh_token(refresh_token)
            .await
            .map_err(|err| match err {
                ApiError::Unauthorized { .. } => AuthError::SessionExpired,
                other => AuthError::Backend(other),
            })?;

        self.persist(TokenKey::Access, &pair.access_token);
        self.persist(TokenKey::Refresh, &pair.refresh_token);
        self.session = Session {
            access_token: Some(pair.access_token.clone()),
            refresh_token: Some(pair.refresh_token),
            user: None,
        };

        let user = self.api.current_user(&pair.access_token).await?;
        info!(user = %user.email, "session restored after token refresh");
        self.session.user = Some(user);
        Ok(())
    }

    /// Exchanges credentials for a token pair. The session is untouched on failure.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        let response = self
            .api
            .login(email, password)
            .await
            .map_err(|err| match err {
                ApiError::Unauthorized { message } => AuthError::InvalidCredentials(message),
                other => AuthError::Backend(other),
            })?;

        self.persist(TokenKey::Access, &response.access_token);
        self.persist(TokenKey::Refresh, &response.refresh_token);
        self.session = Session {
            access_token: Some(response.access_token),
            refresh_token: Some(response.refresh_token),
            user: Some(response.user.clone()),
        };
        self.ready = true;

        info!(user = %response.user.email, "signed in");
        Ok(response.user)
    }

    /// Drops the session locally. Never touches the network.
    pub fn logout(&mut self) {
        self.clear_persisted(&[TokenKey::Access, TokenKey::Refresh]);
        self.session = Session::default();
        info!("signed out");
    }

    pub fn access(&self) -> Access {
        if !self.ready {
            Access::Loading
        } else if self.session.is_authenticated() {
            Access::Granted
        } else {
            Access::RedirectToLogin
        }
    }

    #[cfg(test)]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn token(&self) -> Option<&str> {
        self.session.access_token.as_deref()
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.session.user.as_ref()
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub fn api(&self) -> &A {
        &self.api
    }

    fn persist(&mut self, key: TokenKey, value: &str) {
        if let Err(err) = self.store.set(key, value) {
            warn!(?err, key = key.as_str(), "failed to persist token");
        }
    }

    fn clear_persisted(&mut self, keys: &[TokenKey]) {
        for key in keys {
            if let Err(err) = self.store.clear(*key) {
                warn!(?err, key = key.as_str(), "failed to clear persisted token");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeApi, sample_user};

    fn manager(api: FakeApi, store: MemoryTokenStore) -> SessionManager<FakeApi, MemoryTokenStore> {
        SessionManager::new(api, store)
    }

    #[tokio::test]
    async fn initialize_without_tokens_makes_no_calls() {
        let mut manager = manager(FakeApi::new(), MemoryTokenStore::new());
        assert_eq!(manager.access(), Access::Loading);

        manager.initialize().await;

        assert!(manager.is_ready());
        assert_eq!(manager.session(), &Session::default());
        assert_eq!(manager.access(), Access::RedirectToLogin);
        assert!(manager.api().calls().is_empty());
    }

    #[tokio::test]
    async fn initialize_with_valid_token_fetches_profile_once() {
        let api = FakeApi::new().accepting("good");
        let store = MemoryTokenStore::with_tokens(Some("good"), Some("refresh"));
        let mut manager = manager(api, store);

        manager.initialize().await;

        assert_eq!(manager.api().count(|c| matches!(c, Call::CurrentUser(_))), 1);
        assert_eq!(manager.api().count(|c| matches!(c, Call::Refresh(_))), 0);
        assert_eq!(manager.token(), Some("good"));
        assert_eq!(manager.user(), Some(&sample_user()));
        assert_eq!(manager.access(), Access::Granted);
    }

    #[tokio::test]
    async fn initialize_refreshes_expired_token_and_retries_once() {
        let api = FakeApi::new()
            .accepting("fresh-access")
            .refreshing_to("fresh-access", "fresh-refresh");
        let store = MemoryTokenStore::with_tokens(Some("stale"), Some("old-refresh"));
        let mut manager = manager(api, store);

        manager.initialize().await;

        let calls = manager.api().calls();
        assert_eq!(
            calls,
            vec![
                Call::CurrentUser("stale".into()),
                Call::Refresh("old-refresh".into()),
                Call::CurrentUser("fresh-access".into()),
            ]
        );
        assert_eq!(
            manager.store().get(TokenKey::Access).as_deref(),
            Some("fresh-access")
        );
        assert_eq!(
            manager.store().get(TokenKey::Refresh).as_deref(),
            Some("fresh-refresh")
        );
        assert_eq!(manager.token(), Some("fresh-access"));
        assert!(manager.user().is_some());
    }

    #[tokio::test]
    async fn initialize_clears_everything_when_refresh_fails() {
        let api = FakeApi::new();
        let store = MemoryTokenStore::with_tokens(Some("stale"), Some("revoked"));
        let mut manager = manager(api, store);

        manager.initialize().await;

        assert_eq!(manager.api().count(|c| matches!(c, Call::Refresh(_))), 1);
        assert_eq!(manager.store().get(TokenKey::Access), None);
        assert_eq!(manager.store().get(TokenKey::Refresh), None);
        assert_eq!(manager.session(), &Session::default());
        assert!(manager.is_ready());
        assert_eq!(manager.access(), Access::RedirectToLogin);
    }

    #[tokio::test]
    async fn initialize_clears_everything_when_retried_fetch_fails() {
        // Refresh succeeds but the backend still rejects the new token.
        let api = FakeApi::new().refreshing_to("still-bad", "r2");
        let store = MemoryTokenStore::with_tokens(Some("stale"), Some("r1"));
        let mut manager = manager(api, store);

        manager.initialize().await;

        assert_eq!(manager.api().count(|c| matches!(c, Call::CurrentUser(_))), 2);
        assert_eq!(manager.store().get(TokenKey::Access), None);
        assert_eq!(manager.store().get(TokenKey::Refresh), None);
        assert_eq!(manager.session(), &Session::default());
    }

    #[tokio::test]
    async fn initialize_without_refresh_token_clears_access_token() {
        let api = FakeApi::new();
        let store = MemoryTokenStore::with_tokens(Some("stale"), None);
        let mut manager = manager(api, store);

        manager.initialize().await;

        assert_eq!(manager.api().count(|c| matches!(c, Call::Refresh(_))), 0);
        assert_eq!(manager.store().get(TokenKey::Access), None);
        assert_eq!(manager.access(), Access::RedirectToLogin);
    }

    #[tokio::test]
    async fn login_persists_tokens_and_user() {
        let api = FakeApi::new().with_login("a1", "r1");
        let mut manager = manager(api, MemoryTokenStore::new());
        manager.initialize().await;

        let user = manager.login("ana@pharmacy.test", "secret").await.unwrap();

        assert_eq!(user, sample_user());
        assert_eq!(manager.store().get(TokenKey::Access).as_deref(), Some("a1"));
        assert_eq!(manager.store().get(TokenKey::Refresh).as_deref(), Some("r1"));
        assert_eq!(manager.access(), Access::Granted);
    }

    #[tokio::test]
    async fn failed_login_leaves_session_untouched() {
        let api = FakeApi::new();
        let mut manager = manager(api, MemoryTokenStore::new());
        manager.initialize().await;

        let err = manager.login("ana@pharmacy.test", "wrong").await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials(_)));
        assert_eq!(manager.session(), &Session::default());
        assert_eq!(manager.store().get(TokenKey::Access), None);
    }

    #[tokio::test]
    async fn backend_outage_during_login_keeps_existing_session() {
        let api = FakeApi::new().accepting("good").login_unavailable();
        let store = MemoryTokenStore::with_tokens(Some("good"), Some("r"));
        let mut manager = manager(api, store);
        manager.initialize().await;
        let before = manager.session().clone();

        let err = manager.login("ana@pharmacy.test", "secret").await.unwrap_err();

        assert!(matches!(err, AuthError::Backend(ApiError::Status { status: 503, .. })));
        assert_eq!(manager.session(), &before);
        assert_eq!(manager.store().get(TokenKey::Access).as_deref(), Some("good"));
        assert_eq!(manager.store().get(TokenKey::Refresh).as_deref(), Some("r"));
        assert_eq!(manager.access(), Access::Granted);
    }

    #[tokio::test]
    async fn logout_clears_store_without_network() {
        let api = FakeApi::new().accepting("good");
        let store = MemoryTokenStore::with_tokens(Some("good"), Some("r"));
        let mut manager = manager(api, store);
        manager.initialize().await;
        let calls_before = manager.api().calls().len();

        manager.logout();

        assert_eq!(manager.api().calls().len(), calls_before);
        assert_eq!(manager.session(), &Session::default());
        assert_eq!(manager.store().get(TokenKey::Access), None);
        assert_eq!(manager.store().get(TokenKey::Refresh), None);
        assert_eq!(manager.access(), Access::RedirectToLogin);
    }
}
