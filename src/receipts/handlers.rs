use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    receipts::{dto::ReceiptForm, repo_types::Receipt, services},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/receipts/user/:user_id", get(list_receipts))
        .route("/receipts/:id/document", get(get_document))
}

pub fn write_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/receipts", axum::routing::post(create_receipt))
        .route(
            "/receipts/:id",
            get(get_receipt).put(update_receipt).delete(delete_receipt),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

#[instrument(skip(state))]
pub async fn list_receipts(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<Receipt>>> {
    let rows = services::list_by_user(state.receipts.as_ref(), user_id).await?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
pub async fn get_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Receipt>> {
    Ok(Json(services::get(state.receipts.as_ref(), id).await?))
}

#[instrument(skip(state))]
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let bytes = services::document(state.receipts.as_ref(), id).await?;
    let content_type = if bytes.starts_with(b"%PDF") {
        "application/pdf"
    } else {
        "application/octet-stream"
    };
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}

/// POST /receipts (multipart): receipt fields, `userId`, optional `file`.
#[instrument(skip(state, mp))]
pub async fn create_receipt(
    State(state): State<AppState>,
    mp: Multipart,
) -> AppResult<impl IntoResponse> {
    let form = read_form(mp).await?;
    let raw_user_id = form
        .user_id
        .as_deref()
        .ok_or_else(|| AppError::Validation("missing field userId".into()))?;
    let user_id = Uuid::parse_str(raw_user_id)
        .map_err(|_| AppError::Validation(format!("invalid userId: {raw_user_id:?}")))?;
    let draft = form.draft()?;

    let receipt = services::create(
        state.users.as_ref(),
        state.receipts.as_ref(),
        user_id,
        &draft,
        form.new_document(),
    )
    .await?;

    let location = format!("/api/receipts/{}", receipt.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(receipt)))
}

/// PUT /receipts/:id (multipart): full replace; `file` only replaces the document when non-empty.
#[instrument(skip(state, mp))]
pub async fn update_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mp: Multipart,
) -> AppResult<Json<Receipt>> {
    let form = read_form(mp).await?;
    let draft = form.draft()?;
    let receipt =
        services::update(state.receipts.as_ref(), id, &draft, form.document_update()).await?;
    Ok(Json(receipt))
}

#[instrument(skip(state))]
pub async fn delete_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    services::delete(state.receipts.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn read_form(mut mp: Multipart) -> AppResult<ReceiptForm> {
    let mut form = ReceiptForm::default();
    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            form.file = Some(field.bytes().await.map_err(bad_multipart)?);
            continue;
        }
        let value = field.text().await.map_err(bad_multipart)?;
        if !form.set_text(&name, value) {
            debug!(field = %name, "ignoring unknown form field");
        }
    }
    Ok(form)
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("malformed multipart body: {e}"))
}
