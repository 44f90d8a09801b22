use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{error, warn};

use crate::{
    api::UserProfile,
    session::{Access, AuthError},
    web::{AppState, FlashQuery, render_loading_page, render_login_page},
};

/// What a guarded handler needs from the session.
pub struct SessionContext {
    pub token: String,
    pub user: Option<UserProfile>,
}

impl SessionContext {
    pub fn display_name(&self) -> Option<&str> {
        self.user.as_ref().map(|user| {
            if user.name.trim().is_empty() {
                user.email.as_str()
            } else {
                user.name.as_str()
            }
        })
    }
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Loading screen until the session is decided, then either the token or a redirect to `/login`.
pub async fn require_session(state: &AppState) -> Result<SessionContext, Response> {
    match state.access() {
        Access::Loading => Err(Html(render_loading_page()).into_response()),
        Access::RedirectToLogin => Err(Redirect::to("/login").into_response()),
        Access::Granted => {
            let guard = state.session().read().await;
            match guard.token() {
                Some(token) => Ok(SessionContext {
                    token: token.to_string(),
                    user: guard.user().cloned(),
                }),
                // Signed out between the guard check and the read.
                None => Err(Redirect::to("/login").into_response()),
            }
        }
    }
}

pub async fn login_page(State(state): State<AppState>, Query(flash): Query<FlashQuery>) -> Response {
    match state.access() {
        Access::Loading => Html(render_loading_page()).into_response(),
        Access::Granted => Redirect::to("/").into_response(),
        Access::RedirectToLogin => Html(render_login_page(None, &flash.render())).into_response(),
    }
}

pub async fn process_login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let email = form.email.trim();
    let mut session = state.session().write().await;

    match session.login(email, &form.password).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(AuthError::InvalidCredentials(message)) => {
            warn!(email, "rejected sign-in");
            (
                StatusCode::UNAUTHORIZED,
                Html(render_login_page(Some(&message), "")),
            )
                .into_response()
        }
        Err(err) => {
            error!(?err, "sign-in failed");
            (
                StatusCode::BAD_GATEWAY,
                Html(render_login_page(Some(&err.to_string()), "")),
            )
                .into_response()
        }
    }
}

pub async fn logout(State(state): State<AppState>) -> Redirect {
    state.session().write().await.logout();
    Redirect::to("/login?status=logged_out")
}
