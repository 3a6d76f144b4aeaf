//! Site menu endpoints: public listing plus gated CRUD.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{self, CreateMenuItemRequest, MenuItem, UpdateMenuItemRequest};
use crate::AppState;

use super::auth::Actor;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_href, validate_name};

const MODULE: &str = "menu";

fn validate_create_request(req: &CreateMenuItemRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_name(&req.label, "Label") {
        errors.add("label", e);
    }
    if let Err(e) = validate_href(&req.href) {
        errors.add("href", e);
    }
    errors.finish()
}

fn validate_update_request(req: &UpdateMenuItemRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(ref label) = req.label {
        if let Err(e) = validate_name(label, "Label") {
            errors.add("label", e);
        }
    }
    if let Some(ref href) = req.href {
        if let Err(e) = validate_href(href) {
            errors.add("href", e);
        }
    }
    errors.finish()
}

/// List visible menu items in display order
///
/// GET /api/menu
pub async fn list_menu(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MenuItem>>, ApiError> {
    let rows: Vec<MenuItem> = match sqlx::query_as(
        "SELECT * FROM menu_items WHERE is_visible = 1 ORDER BY position ASC, created_at ASC",
    )
    .fetch_all(&state.db)
    .await
    {
        Ok(rows) => rows,
        Err(err) => db::degrade_to_empty("menu list", err)?,
    };
    Ok(Json(rows))
}

/// List every menu item for the back office
///
/// GET /api/admin/menu
pub async fn list_all_menu(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<MenuItem>>, ApiError> {
    actor.require(MODULE, "view")?;
    let rows: Vec<MenuItem> =
        sqlx::query_as("SELECT * FROM menu_items ORDER BY position ASC, created_at ASC")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(rows))
}

/// Create a menu item
///
/// POST /api/admin/menu
pub async fn create_menu_item(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(request): Json<CreateMenuItemRequest>,
) -> Result<(StatusCode, Json<MenuItem>), ApiError> {
    actor.require(MODULE, "edit")?;
    validate_create_request(&request)?;

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO menu_items (id, label, href, position, is_visible, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&request.label)
    .bind(&request.href)
    .bind(request.position)
    .bind(request.is_visible)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let created: MenuItem = sqlx::query_as("SELECT * FROM menu_items WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(label = %created.label, "Menu item created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a menu item; only provided fields change
///
/// PUT /api/admin/menu/:id
pub async fn update_menu_item(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(request): Json<UpdateMenuItemRequest>,
) -> Result<Json<MenuItem>, ApiError> {
    actor.require(MODULE, "edit")?;
    validate_update_request(&request)?;

    let existing: Option<MenuItem> = sqlx::query_as("SELECT * FROM menu_items WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let mut row = existing.ok_or_else(|| ApiError::not_found("Menu item not found"))?;

    if let Some(label) = request.label {
        row.label = label;
    }
    if let Some(href) = request.href {
        row.href = href;
    }
    if let Some(position) = request.position {
        row.position = position;
    }
    if let Some(is_visible) = request.is_visible {
        row.is_visible = is_visible;
    }

    sqlx::query(
        "UPDATE menu_items SET label = ?, href = ?, position = ?, is_visible = ? WHERE id = ?",
    )
    .bind(&row.label)
    .bind(&row.href)
    .bind(row.position)
    .bind(row.is_visible)
    .bind(&id)
    .execute(&state.db)
    .await?;

    Ok(Json(row))
}

/// Delete a menu item
///
/// DELETE /api/admin/menu/:id
pub async fn delete_menu_item(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    actor.require(MODULE, "delete")?;

    let result = sqlx::query("DELETE FROM menu_items WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Menu item not found"));
    }

    tracing::info!(item = %id, "Menu item deleted");
    Ok(StatusCode::NO_CONTENT)
}
