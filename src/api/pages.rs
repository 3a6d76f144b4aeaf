//! Static page endpoints: public reads plus gated CRUD.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{CreatePageRequest, Page, UpdatePageRequest};
use crate::AppState;

use super::auth::Actor;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{generate_slug, validate_name, validate_slug};

const MODULE: &str = "pages";

fn validate_create_request(req: &CreatePageRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_name(&req.title, "Title") {
        errors.add("title", e);
    }
    if let Some(ref slug) = req.slug {
        if let Err(e) = validate_slug(slug) {
            errors.add("slug", e);
        }
    }
    errors.finish()
}

fn validate_update_request(req: &UpdatePageRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(ref title) = req.title {
        if let Err(e) = validate_name(title, "Title") {
            errors.add("title", e);
        }
    }
    if let Some(ref slug) = req.slug {
        if let Err(e) = validate_slug(slug) {
            errors.add("slug", e);
        }
    }
    errors.finish()
}

/// Get a published page by slug
///
/// GET /api/pages/:slug
pub async fn get_page(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Page>, ApiError> {
    let row: Option<Page> =
        sqlx::query_as("SELECT * FROM pages WHERE slug = ? AND is_published = 1")
            .bind(&slug)
            .fetch_optional(&state.db)
            .await?;
    row.map(Json).ok_or_else(|| ApiError::not_found("Page not found"))
}

/// List all pages for the back office
///
/// GET /api/admin/pages
pub async fn list_pages(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Page>>, ApiError> {
    actor.require(MODULE, "view")?;
    let rows: Vec<Page> = sqlx::query_as("SELECT * FROM pages ORDER BY slug ASC")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(rows))
}

/// Get a page by id
///
/// GET /api/admin/pages/:id
pub async fn get_page_by_id(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Page>, ApiError> {
    actor.require(MODULE, "view")?;
    let row: Option<Page> = sqlx::query_as("SELECT * FROM pages WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    row.map(Json).ok_or_else(|| ApiError::not_found("Page not found"))
}

/// Create a page
///
/// POST /api/admin/pages
pub async fn create_page(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(request): Json<CreatePageRequest>,
) -> Result<(StatusCode, Json<Page>), ApiError> {
    actor.require(MODULE, "edit")?;
    validate_create_request(&request)?;

    let id = Uuid::new_v4().to_string();
    let slug = request.slug.clone().unwrap_or_else(|| {
        let generated = generate_slug(&request.title);
        if generated.is_empty() {
            format!("page-{}", &id[..8])
        } else {
            generated
        }
    });
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO pages (id, slug, title, body, is_published, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&slug)
    .bind(&request.title)
    .bind(&request.body)
    .bind(request.is_published)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let created: Page = sqlx::query_as("SELECT * FROM pages WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(slug = %created.slug, "Page created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a page; only provided fields change
///
/// PUT /api/admin/pages/:id
pub async fn update_page(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(request): Json<UpdatePageRequest>,
) -> Result<Json<Page>, ApiError> {
    actor.require(MODULE, "edit")?;
    validate_update_request(&request)?;

    let existing: Option<Page> = sqlx::query_as("SELECT * FROM pages WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let mut row = existing.ok_or_else(|| ApiError::not_found("Page not found"))?;

    if let Some(title) = request.title {
        row.title = title;
    }
    if let Some(slug) = request.slug {
        row.slug = slug;
    }
    if let Some(body) = request.body {
        row.body = body;
    }
    if let Some(is_published) = request.is_published {
        row.is_published = is_published;
    }
    row.updated_at = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE pages SET slug = ?, title = ?, body = ?, is_published = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&row.slug)
    .bind(&row.title)
    .bind(&row.body)
    .bind(row.is_published)
    .bind(&row.updated_at)
    .bind(&id)
    .execute(&state.db)
    .await?;

    Ok(Json(row))
}

/// Delete a page
///
/// DELETE /api/admin/pages/:id
pub async fn delete_page(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    actor.require(MODULE, "delete")?;

    let result = sqlx::query("DELETE FROM pages WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Page not found"));
    }

    tracing::info!(page = %id, "Page deleted");
    Ok(StatusCode::NO_CONTENT)
}
