use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, ModelTrait, Set};

use crate::endpoints::extractors::{find_course, require_member, require_owner};
use crate::endpoints::files::{stream_stored_file, MultipartForm};
use crate::error::{AppError, Result};
use crate::middleware::permissions::Authenticated;
use crate::models::material;
use crate::models::prelude::*;
use crate::schemas::MaterialResponse;
use crate::services::notification::notify_material;
use crate::services::uploads::{
    discard_on_error, remove_file, store_file, validate_material, MATERIALS_DIR,
};
use crate::state::AppState;

pub fn materials_routes(state: AppState) -> Router {
    // Leave headroom over the upload cap so oversized files get a readable error
    let body_limit = (state.limits.max_upload_bytes as usize).saturating_mul(2);

    Router::new()
        .route(
            "/course/{course_id}/upload",
            post(upload_material).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/{id}/delete", post(delete_material))
        .route("/{id}/download", get(download_material))
        .with_state(state)
}

async fn find_material(state: &AppState, id: i64) -> Result<material::Model> {
    Material::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Material not found.".to_string()))
}

#[utoipa::path(
    post,
    path = "/materials/course/{course_id}/upload",
    tag = "Materials",
    params(("course_id" = i64, Path, description = "Course ID")),
    responses(
        (status = 201, body = MaterialResponse),
        (status = 400, description = "Invalid upload"),
        (status = 403),
        (status = 429, description = "Upload rate exceeded")
    )
)]
async fn upload_material(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(course_id): Path<i64>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MaterialResponse>)> {
    let course = find_course(&state.db, course_id).await?;
    require_owner(auth.user(), &course)?;

    let budget_key = format!("user:{}", auth.user_id());
    if state.upload_limiter.is_blocked(&budget_key) {
        tracing::warn!(user_id = auth.user_id(), "Upload throttled");
        return Err(AppError::TooManyRequests(
            "Too many uploads, please wait a minute and try again.".to_string(),
        ));
    }

    let form = MultipartForm::read(multipart).await?;
    let title = form.text("title").to_string();
    if title.is_empty() || title.chars().count() > 200 {
        return Err(AppError::BadRequest("Title must be 1-200 characters.".to_string()));
    }
    let file = form
        .file("file")
        .ok_or_else(|| AppError::BadRequest("Please choose a file to upload.".to_string()))?;

    let mime = validate_material(&file.file_name, file.size(), state.limits.max_upload_bytes)?;
    let stored = store_file(state.media_root(), MATERIALS_DIR, &file.file_name, &file.bytes).await?;

    let inserted = material::ActiveModel {
        course_id: Set(course.id),
        uploaded_by: Set(Some(auth.user_id())),
        title: Set(title),
        file: Set(stored.clone()),
        size_bytes: Set(file.size() as i64),
        mime: Set(mime),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await;
    let created = discard_on_error(state.media_root(), &stored, inserted).await?;
    // Only saved uploads count against the budget
    state.upload_limiter.record(&budget_key);

    let notified = notify_material(&state.db, &course, &created).await?;
    tracing::info!(
        material_id = created.id,
        course_id = course.id,
        notified,
        "Material uploaded"
    );

    Ok((StatusCode::CREATED, Json(MaterialResponse::from(created))))
}

#[utoipa::path(
    post,
    path = "/materials/{id}/delete",
    tag = "Materials",
    params(("id" = i64, Path, description = "Material ID")),
    responses((status = 200), (status = 403), (status = 404))
)]
async fn delete_material(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    let found = find_material(&state, id).await?;
    let course = find_course(&state.db, found.course_id).await?;
    require_owner(auth.user(), &course)?;

    let stored = found.file.clone();
    found.delete(&state.db).await?;
    if let Err(e) = remove_file(state.media_root(), &stored).await {
        tracing::warn!(material_id = id, "Stored file could not be removed: {}", e);
    }

    Ok(Json(serde_json::json!({"success": true})))
}

#[utoipa::path(
    get,
    path = "/materials/{id}/download",
    tag = "Materials",
    params(("id" = i64, Path, description = "Material ID")),
    responses((status = 200, description = "File contents"), (status = 403), (status = 404))
)]
async fn download_material(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
) -> Result<Response> {
    let found = find_material(&state, id).await?;
    let course = find_course(&state.db, found.course_id).await?;
    require_member(&state.db, auth.user(), &course, "Enrol to access this course.").await?;

    stream_stored_file(state.media_root(), &found.file, &found.mime).await
}
