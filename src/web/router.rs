use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::web::{AppState, auth, bulk, dashboard, inventory, medicines};

const UPLOAD_BODY_LIMIT: usize = 20 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard::home))
        .route("/login", get(auth::login_page).post(auth::process_login))
        .route("/logout", post(auth::logout))
        .route("/healthz", get(healthz))
        .route("/inventory", get(inventory::inventory_page))
        .route("/inventory/medicines", post(medicines::create_medicine))
        .route("/inventory/medicines/new", get(medicines::new_medicine_page))
        .route("/inventory/medicines/:id", post(medicines::update_medicine))
        .route(
            "/inventory/medicines/:id/edit",
            get(medicines::edit_medicine_page),
        )
        .route(
            "/inventory/medicines/:id/delete",
            post(inventory::delete_medicine),
        )
        .route(
            "/inventory/stock/:id/adjust",
            post(inventory::adjust_stock),
        )
        .route("/bulk/:kind", get(bulk::upload_page))
        .route(
            "/bulk/:kind/upload",
            post(bulk::submit_upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/bulk/:kind/template", get(bulk::download_template))
        .route("/bulk/:kind/report", get(bulk::download_error_report))
        .route("/bulk/:kind/reset", post(bulk::reset_upload))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
