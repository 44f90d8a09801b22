use axum::{
    extract::{Form, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
    api::{ApiError, Medicine, NamedRef},
    web::{AppState, FlashQuery, PageLayout, escape_html, render_page, auth::require_session},
};

#[derive(Deserialize)]
pub struct AdjustForm {
    pub adjustment: String,
}

pub async fn inventory_page(State(state): State<AppState>, Query(flash): Query<FlashQuery>) -> Response {
    let ctx = match require_session(&state).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    let medicines = match state.api().list_medicines(&ctx.token).await {
        Ok(medicines) => medicines,
        Err(err) if err.is_unauthorized() => return expired(&state).await,
        Err(err) => {
            error!(?err, "failed to load medicines");
            let flash_html = format!(
                r#"<div class="flash error">Could not load medicines: {}</div>"#,
                escape_html(&err.to_string())
            );
            let page = render_page(PageLayout {
                title: "Inventory",
                user_name: ctx.display_name(),
                flash_html,
                body_html: String::new(),
                refresh_after: None,
            });
            return (StatusCode::BAD_GATEWAY, Html(page)).into_response();
        }
    };

    Html(render_page(PageLayout {
        title: "Inventory",
        user_name: ctx.display_name(),
        flash_html: flash.render(),
        body_html: render_inventory(&medicines),
        refresh_after: None,
    }))
    .into_response()
}

pub async fn delete_medicine(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let ctx = match require_session(&state).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    match state.api().delete_medicine(&ctx.token, id).await {
        Ok(()) => {
            info!(medicine = id, "medicine deleted");
            Redirect::to("/inventory?status=medicine_deleted").into_response()
        }
        Err(err) => backend_failure(&state, err, "delete_failed").await,
    }
}

pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<AdjustForm>,
) -> Response {
    let ctx = match require_session(&state).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    let Some(adjustment) = parse_adjustment(&form.adjustment) else {
        return Redirect::to("/inventory?error=invalid_adjustment").into_response();
    };

    match state.api().adjust_stock(&ctx.token, id, adjustment).await {
        Ok(()) => {
            info!(medicine = id, adjustment, "stock adjusted");
            Redirect::to("/inventory?status=stock_adjusted").into_response()
        }
        Err(err) => backend_failure(&state, err, "adjust_failed").await,
    }
}

async fn backend_failure(state: &AppState, err: ApiError, code: &str) -> Response {
    if err.is_unauthorized() {
        return expired(state).await;
    }
    warn!(error = %err, status = ?err.status(), code, "inventory change rejected");
    Redirect::to(&format!("/inventory?error={code}")).into_response()
}

async fn expired(state: &AppState) -> Response {
    warn!("backend rejected the access token, signing out");
    state.session().write().await.logout();
    Redirect::to("/login").into_response()
}

// Signed whole numbers, zero excluded.
fn parse_adjustment(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|value| *value != 0)
}

fn render_inventory(medicines: &[Medicine]) -> String {
    if medicines.is_empty() {
        return r#"        <section class="panel">
            <p class="note">No medicines yet. Use a bulk upload to add some.</p>
            <div class="row-actions"><a href="/inventory/medicines/new">Add medicine</a></div>
        </section>"#
            .to_string();
    }

    let rows = medicines
        .iter()
        .map(|medicine| {
            let name_of = |named: &Option<NamedRef>| {
                named
                    .as_ref()
                    .map(|named| escape_html(&named.name))
                    .unwrap_or_default()
            };
            let dosage = medicine
                .dosage
                .as_deref()
                .map(escape_html)
                .unwrap_or_default();
            let updated = medicine
                .updated_at
                .map(|at| at.format("%Y-%m-%d").to_string())
                .unwrap_or_default();

            format!(
                r#"<tr>
                    <td>{name}</td>
                    <td>{dosage}</td>
                    <td>{category}</td>
                    <td>{manufacturer}</td>
                    <td>{price}</td>
                    <td>{quantity} {unit}</td>
                    <td>{updated}</td>
                    <td>
                        <form method="post" action="/inventory/stock/{id}/adjust">
                            <input type="number" name="adjustment" step="1" placeholder="±" required>
                            <button type="submit" class="secondary">Adjust</button>
                        </form>
                        <a href="/inventory/medicines/{id}/edit">Edit</a>
                        <form method="post" action="/inventory/medicines/{id}/delete" onsubmit="return confirm('Delete this medicine?');">
                            <button type="submit" class="danger">Delete</button>
                        </form>
                    </td>
                </tr>"#,
                id = medicine.id,
                name = escape_html(&medicine.name),
                dosage = dosage,
                category = name_of(&medicine.category),
                manufacturer = name_of(&medicine.manufacturer),
                price = escape_html(&medicine.sell_price),
                quantity = medicine.quantity(),
                unit = name_of(&medicine.unit),
                updated = updated,
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"        <section class="panel">
            <h2>Medicines ({count})</h2>
            <div class="row-actions"><a href="/inventory/medicines/new">Add medicine</a></div>
            <table>
                <thead>
                    <tr><th>Name</th><th>Dosage</th><th>Category</th><th>Manufacturer</th><th>Price</th><th>Stock</th><th>Updated</th><th>Actions</th></tr>
                </thead>
                <tbody>
{rows}
                </tbody>
            </table>
        </section>"#,
        count = medicines.len(),
        rows = rows,
    )
}
