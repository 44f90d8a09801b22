use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
};

use crate::{
    api::UserProfile,
    bulk::UploadKind,
    web::{AppState, FlashQuery, PageLayout, escape_html, render_page, auth::require_session},
};

pub async fn home(State(state): State<AppState>, Query(flash): Query<FlashQuery>) -> Response {
    let ctx = match require_session(&state).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    let last_uploads: Vec<(UploadKind, Option<String>)> = UploadKind::ALL
        .into_iter()
        .map(|kind| {
            let at = state
                .last_success(kind)
                .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string());
            (kind, at)
        })
        .collect();

    Html(render_page(PageLayout {
        title: "Dashboard",
        user_name: ctx.display_name(),
        flash_html: flash.render(),
        body_html: render_dashboard(ctx.user.as_ref(), &last_uploads),
        refresh_after: None,
    }))
    .into_response()
}

fn render_dashboard(user: Option<&UserProfile>, last_uploads: &[(UploadKind, Option<String>)]) -> String {
    let profile_html = user
        .map(|user| {
            format!(
                r#"<p class="note">{name} · {email} · role <strong>{role}</strong></p>"#,
                name = escape_html(&user.name),
                email = escape_html(&user.email),
                role = escape_html(&user.role),
            )
        })
        .unwrap_or_else(|| r#"<p class="note">Profile unavailable.</p>"#.to_string());

    let upload_cards = last_uploads
        .iter()
        .map(|(kind, at)| {
            let last = at
                .as_deref()
                .map(|at| format!(r#"<p class="note">Last upload {at}</p>"#))
                .unwrap_or_default();
            format!(
                r#"<a class="card" href="/bulk/{kind}">
                    <h3>{label}</h3>
                    <p class="note">{description}</p>
                    {last}
                </a>"#,
                kind = kind,
                label = kind.label(),
                description = kind.description(),
                last = last,
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"        <section class="panel">
            <h2>Welcome</h2>
            {profile_html}
        </section>
        <section>
            <div class="cards">
                <a class="card" href="/inventory">
                    <h3>Inventory</h3>
                    <p class="note">Browse medicines, adjust stock and remove entries.</p>
                </a>
                {upload_cards}
            </div>
        </section>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_user;

    #[test]
    fn dashboard_links_every_upload_kind() {
        let uploads: Vec<(UploadKind, Option<String>)> =
            UploadKind::ALL.into_iter().map(|kind| (kind, None)).collect();
        let html = render_dashboard(Some(&sample_user()), &uploads);
        for kind in UploadKind::ALL {
            assert!(html.contains(&format!(r#"href="/bulk/{kind}""#)));
        }
        assert!(html.contains(r#"href="/inventory""#));
    }

    #[test]
    fn last_upload_time_is_shown_when_known() {
        let uploads = vec![(UploadKind::Stock, Some("2026-01-02 10:00 UTC".to_string()))];
        let html = render_dashboard(None, &uploads);
        assert!(html.contains("Last upload 2026-01-02 10:00 UTC"));
        assert!(html.contains("Profile unavailable"));
    }
}
