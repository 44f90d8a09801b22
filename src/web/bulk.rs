use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use tokio::task;
use tracing::error;

use crate::{
    bulk::{
        BulkError, ERROR_REPORT_FILE_NAME, FormattedResults, Outcome, RowOutcome, SheetPreview,
        UploadKind, UploadResult, UploadState, error_report_workbook, format_results,
        preview_workbook,
    },
    web::{
        AppState, FlashQuery, PageLayout, escape_html, render_page,
        auth::{SessionContext, require_session},
        responses::{not_found, spreadsheet_attachment},
        uploads::read_upload_form,
    },
};

const UPLOADING_REFRESH_SECS: u32 = 2;

pub async fn upload_page(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    let ctx = match require_session(&state).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let Some(kind) = UploadKind::parse(&kind) else {
        return not_found();
    };

    Html(render_upload_page(&state, &ctx, kind, flash.render()).await).into_response()
}

pub async fn submit_upload(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    multipart: Multipart,
) -> Response {
    let ctx = match require_session(&state).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let Some(page_kind) = UploadKind::parse(&kind) else {
        return not_found();
    };

    let form = match read_upload_form(multipart).await {
        Ok(form) => form,
        Err(err) => return rejected(&state, &ctx, page_kind, &err.to_string()).await,
    };

    let file_name = form.file.file_name.clone();
    let bytes = form.file.bytes.clone();
    let preview = match task::spawn_blocking(move || preview_workbook(&file_name, &bytes)).await {
        Ok(Ok(preview)) => preview,
        Ok(Err(err)) => return rejected(&state, &ctx, page_kind, &err.to_string()).await,
        Err(err) => {
            error!(?err, "workbook preview task failed");
            return rejected(&state, &ctx, page_kind, "Could not inspect the workbook").await;
        }
    };

    // The form names its own upload type; the page only picks the uploader.
    let requested = form.text("type").unwrap_or(page_kind.as_str()).to_string();
    let outcome = state
        .uploader(page_kind)
        .upload_file(&ctx.token, form.file, &requested)
        .await;

    // Only the upload that produced the shown result may set the row-count preview.
    match &outcome {
        Ok(_) => state.remember_preview(page_kind, preview).await,
        Err(BulkError::AlreadyUploading) => {}
        Err(_) => state.remember_preview(page_kind, None).await,
    }

    Redirect::to(&after_upload_location(page_kind, &outcome)).into_response()
}

fn after_upload_location(kind: UploadKind, outcome: &Result<UploadResult, BulkError>) -> String {
    match outcome {
        Err(BulkError::AlreadyUploading) => format!("/bulk/{kind}?error=upload_in_progress"),
        _ => format!("/bulk/{kind}"),
    }
}

pub async fn download_template(State(state): State<AppState>, Path(kind): Path<String>) -> Response {
    let ctx = match require_session(&state).await {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let Some(page_kind) = UploadKind::parse(&kind) else {
        return not_found();
    };

    match state
        .uploader(page_kind)
        .download_template_file(&ctx.token, &kind)
        .await
    {
        Ok(template) => spreadsheet_attachment(template.file_name, template.bytes),
        Err(_) => Redirect::to(&format!("/bulk/{page_kind}?error=template_failed")).into_response(),
    }
}

pub async fn download_error_report(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Response {
    if let Err(response) = require_session(&state).await {
        return response;
    }
    let Some(kind) = UploadKind::parse(&kind) else {
        return not_found();
    };

    let UploadState::Succeeded(result) = state.uploader(kind).state().await else {
        return Redirect::to(&format!("/bulk/{kind}?error=no_report")).into_response();
    };

    let formatted = format_results(&result);
    match error_report_workbook(&formatted.details) {
        Ok(bytes) => spreadsheet_attachment(ERROR_REPORT_FILE_NAME, bytes),
        Err(err) => {
            error!(?err, %kind, "failed to build error report");
            Redirect::to(&format!("/bulk/{kind}?error=report_failed")).into_response()
        }
    }
}

pub async fn reset_upload(State(state): State<AppState>, Path(kind): Path<String>) -> Response {
    if let Err(response) = require_session(&state).await {
        return response;
    }
    let Some(kind) = UploadKind::parse(&kind) else {
        return not_found();
    };

    if state.uploader(kind).reset().await.is_err() {
        return Redirect::to(&format!("/bulk/{kind}?error=upload_in_progress")).into_response();
    }
    state.remember_preview(kind, None).await;
    Redirect::to(&format!("/bulk/{kind}?status=reset")).into_response()
}

async fn rejected(state: &AppState, ctx: &SessionContext, kind: UploadKind, message: &str) -> Response {
    let flash = format!(r#"<div class="flash error">{}</div>"#, escape_html(message));
    (
        StatusCode::BAD_REQUEST,
        Html(render_upload_page(state, ctx, kind, flash).await),
    )
        .into_response()
}

async fn render_upload_page(
    state: &AppState,
    ctx: &SessionContext,
    kind: UploadKind,
    flash_html: String,
) -> String {
    let upload_state = state.uploader(kind).state().await;
    let preview = state.preview(kind).await;

    let last_success = state
        .last_success(kind)
        .map(|at| {
            format!(
                r#"<p class="note">Last successful upload: {}</p>"#,
                at.format("%Y-%m-%d %H:%M UTC")
            )
        })
        .unwrap_or_default();

    let status_html = match &upload_state {
        UploadState::Idle => String::new(),
        UploadState::Uploading => {
            r#"<div class="flash warning">Uploading… please wait, this page refreshes automatically.</div>"#
                .to_string()
        }
        UploadState::Failed(message) => {
            format!(r#"<div class="flash error">{}</div>"#, escape_html(message))
        }
        UploadState::Succeeded(result) => {
            let results =
                render_results(kind, &result.message, &format_results(result), preview.as_ref());
            format!("{results}{}", render_created_names(result))
        }
    };

    let disabled = if upload_state.is_uploading() { " disabled" } else { "" };

    let body_html = format!(
        r#"        <section class="panel">
            <h2>Bulk Upload {label}</h2>
            <p class="note">{description}</p>
            {last_success}
            <div class="row-actions">
                <a href="/bulk/{kind}/template">Download Excel template</a>
                <span class="note">Fill in the template so columns match what the server expects.</span>
            </div>
        </section>
        <section class="panel">
            <h2>Select file</h2>
            <form method="post" action="/bulk/{kind}/upload" enctype="multipart/form-data">
                <input type="hidden" name="type" value="{kind}">
                <input type="file" name="file" accept=".xlsx,.xls" required{disabled}>
                <div class="row-actions">
                    <button type="submit"{disabled}>Upload</button>
                </div>
            </form>
        </section>
        <section>
            {status_html}
        </section>"#,
        label = kind.label(),
        description = kind.description(),
        last_success = last_success,
        kind = kind,
        disabled = disabled,
        status_html = status_html,
    );

    render_page(PageLayout {
        title: &format!("Bulk Upload {}", kind.label()),
        user_name: ctx.display_name(),
        flash_html,
        body_html,
        refresh_after: upload_state
            .is_uploading()
            .then_some(UPLOADING_REFRESH_SECS),
    })
}

fn render_results(
    kind: UploadKind,
    message: &str,
    formatted: &FormattedResults,
    preview: Option<&SheetPreview>,
) -> String {
    let summary = &formatted.summary;

    let row_check = preview
        .map(|preview| {
            if summary.total_processed == preview.data_rows as u64 || summary.total_processed == 0 {
                format!(
                    r#"<p class="note">The file contained {} data rows under columns: {}.</p>"#,
                    preview.data_rows,
                    escape_html(&preview.headers.join(", "))
                )
            } else {
                format!(
                    r#"<div class="flash warning">The file contained {} data rows but the server reported {} processed.</div>"#,
                    preview.data_rows, summary.total_processed
                )
            }
        })
        .unwrap_or_default();

    let report_link = if formatted.details.errors.is_empty() {
        String::new()
    } else {
        format!(r#"<a href="/bulk/{kind}/report">Download failed rows (.xlsx)</a>"#)
    };

    format!(
        r#"<div class="panel">
                <div class="flash success">{message}</div>
                <div class="stats">
                    <div class="stat"><strong>{total}</strong>Processed</div>
                    <div class="stat"><strong>{success}</strong>Succeeded</div>
                    <div class="stat"><strong>{errors}</strong>Failed</div>
                    <div class="stat"><strong>{manufacturers}</strong>New manufacturers</div>
                    <div class="stat"><strong>{categories}</strong>New categories</div>
                </div>
                {row_check}
                {error_table}
                {created_table}
                <div class="row-actions">
                    {report_link}
                    <form method="post" action="/bulk/{kind}/reset"><button type="submit" class="secondary">Start over</button></form>
                </div>
            </div>"#,
        message = escape_html(message),
        total = summary.total_processed,
        success = summary.success_count,
        errors = summary.error_count,
        manufacturers = summary.created_manufacturers_count,
        categories = summary.created_categories_count,
        row_check = row_check,
        error_table = render_rows("Errors", &formatted.details.errors),
        created_table = render_rows("Created", &formatted.details.created),
        report_link = report_link,
        kind = kind,
    )
}

// Names the backend created on the fly while importing rows.
fn render_created_names(result: &UploadResult) -> String {
    let list = |label: &str, names: &[String]| {
        if names.is_empty() {
            return String::new();
        }
        let names = names.iter().map(|name| escape_html(name)).collect::<Vec<_>>().join(", ");
        format!(r#"<p class="note">{label}: {names}</p>"#)
    };

    format!(
        "{}{}",
        list("New manufacturers", &result.created_manufacturers),
        list("New categories", &result.created_categories),
    )
}

fn render_rows(heading: &str, rows: &[RowOutcome]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let body = rows
        .iter()
        .map(|row| {
            let (tag_class, tag_label) = match row.outcome {
                Outcome::Created => ("created", "created"),
                Outcome::Error => ("error", "error"),
            };
            format!(
                r#"<tr><td>{row}</td><td>{entity}</td><td><span class="tag {tag_class}">{tag_label}</span></td><td>{error}</td><td>{details}</td></tr>"#,
                row = row.row.map(|r| r.to_string()).unwrap_or_else(|| "—".to_string()),
                entity = escape_html(&row.entity),
                tag_class = tag_class,
                tag_label = tag_label,
                error = escape_html(row.error.as_deref().unwrap_or("")),
                details = escape_html(row.details.as_deref().unwrap_or("")),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<h3>{heading} ({count})</h3>
                <table>
                    <thead><tr><th>Row</th><th>Medicine</th><th>Outcome</th><th>Error</th><th>Details</th></tr></thead>
                    <tbody>
{body}
                    </tbody>
                </table>"#,
        heading = heading,
        count = rows.len(),
        body = body,
    )
}
