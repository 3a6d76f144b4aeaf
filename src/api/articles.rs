//! Article endpoints: public reads plus gated CRUD.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{self, Article, ArticleWithAuthor, CreateArticleRequest, UpdateArticleRequest};
use crate::AppState;

use super::auth::Actor;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{generate_slug, validate_name, validate_slug, validate_uuid};

const MODULE: &str = "articles";

const SELECT_WITH_AUTHOR: &str = "SELECT a.*, p.full_name AS author_name, p.slug AS author_slug \
     FROM articles a LEFT JOIN psychologists p ON a.author_id = p.id";

fn validate_create_request(req: &CreateArticleRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_name(&req.title, "Title") {
        errors.add("title", e);
    }
    if let Some(ref slug) = req.slug {
        if let Err(e) = validate_slug(slug) {
            errors.add("slug", e);
        }
    }
    if let Some(ref author_id) = req.author_id {
        if let Err(e) = validate_uuid(author_id, "author_id") {
            errors.add("author_id", e);
        }
    }
    errors.finish()
}

fn validate_update_request(req: &UpdateArticleRequest) -> Result<(), ApiError> {
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
    // Empty author_id means disconnect and is always valid
    if let Some(ref author_id) = req.author_id {
        if !author_id.is_empty() {
            if let Err(e) = validate_uuid(author_id, "author_id") {
                errors.add("author_id", e);
            }
        }
    }
    errors.finish()
}

/// Connecting an author requires the referenced psychologist to exist
async fn ensure_author_exists(state: &AppState, author_id: &str) -> Result<(), ApiError> {
    let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM psychologists WHERE id = ?")
        .bind(author_id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::bad_request("Author psychologist does not exist"));
    }
    Ok(())
}

/// List published articles, newest first
///
/// GET /api/articles
pub async fn list_articles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ArticleWithAuthor>>, ApiError> {
    let query = format!(
        "{} WHERE a.is_published = 1 ORDER BY a.created_at DESC",
        SELECT_WITH_AUTHOR
    );
    let rows: Vec<ArticleWithAuthor> = match sqlx::query_as(&query).fetch_all(&state.db).await {
        Ok(rows) => rows,
        Err(err) => db::degrade_to_empty("article list", err)?,
    };
    Ok(Json(rows))
}

/// Get a published article by slug or id
///
/// GET /api/articles/:id
pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<ArticleWithAuthor>, ApiError> {
    let query = format!(
        "{} WHERE (a.slug = ? OR a.id = ?) AND a.is_published = 1",
        SELECT_WITH_AUTHOR
    );
    let row: Option<ArticleWithAuthor> = sqlx::query_as(&query)
        .bind(&key)
        .bind(&key)
        .fetch_optional(&state.db)
        .await?;
    row.map(Json)
        .ok_or_else(|| ApiError::not_found("Article not found"))
}

/// List all articles for the back office, including drafts
///
/// GET /api/admin/articles
pub async fn list_all_articles(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<ArticleWithAuthor>>, ApiError> {
    actor.require(MODULE, "view")?;
    let query = format!("{} ORDER BY a.created_at DESC", SELECT_WITH_AUTHOR);
    let rows: Vec<ArticleWithAuthor> = sqlx::query_as(&query).fetch_all(&state.db).await?;
    Ok(Json(rows))
}

/// Create an article
///
/// POST /api/articles
pub async fn create_article(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(request): Json<CreateArticleRequest>,
) -> Result<(StatusCode, Json<Article>), ApiError> {
    actor.require(MODULE, "edit")?;
    validate_create_request(&request)?;

    if let Some(ref author_id) = request.author_id {
        ensure_author_exists(&state, author_id).await?;
    }

    let id = Uuid::new_v4().to_string();
    let slug = request.slug.clone().unwrap_or_else(|| {
        let generated = generate_slug(&request.title);
        if generated.is_empty() {
            format!("a-{}", &id[..8])
        } else {
            generated
        }
    });
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO articles (id, slug, title, excerpt, body, author_id, is_published, \
         created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&slug)
    .bind(&request.title)
    .bind(&request.excerpt)
    .bind(&request.body)
    .bind(&request.author_id)
    .bind(request.is_published)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let created: Article = sqlx::query_as("SELECT * FROM articles WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(slug = %created.slug, "Article created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update an article; only provided fields change
///
/// PUT /api/articles/:id
pub async fn update_article(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(request): Json<UpdateArticleRequest>,
) -> Result<Json<Article>, ApiError> {
    actor.require(MODULE, "edit")?;
    validate_update_request(&request)?;

    let existing: Option<Article> = sqlx::query_as("SELECT * FROM articles WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let mut row = existing.ok_or_else(|| ApiError::not_found("Article not found"))?;

    if let Some(title) = request.title {
        row.title = title;
    }
    if let Some(slug) = request.slug {
        row.slug = slug;
    }
    if let Some(excerpt) = request.excerpt {
        row.excerpt = excerpt;
    }
    if let Some(body) = request.body {
        row.body = body;
    }
    if let Some(author_id) = request.author_id {
        // Empty string disconnects, an id connects
        if author_id.is_empty() {
            row.author_id = None;
        } else {
            ensure_author_exists(&state, &author_id).await?;
            row.author_id = Some(author_id);
        }
    }
    if let Some(is_published) = request.is_published {
        row.is_published = is_published;
    }
    row.updated_at = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE articles SET slug = ?, title = ?, excerpt = ?, body = ?, author_id = ?, \
         is_published = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&row.slug)
    .bind(&row.title)
    .bind(&row.excerpt)
    .bind(&row.body)
    .bind(&row.author_id)
    .bind(row.is_published)
    .bind(&row.updated_at)
    .bind(&id)
    .execute(&state.db)
    .await?;

    Ok(Json(row))
}

/// Delete an article
///
/// DELETE /api/articles/:id
pub async fn delete_article(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    actor.require(MODULE, "delete")?;

    let result = sqlx::query("DELETE FROM articles WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Article not found"));
    }

    tracing::info!(article = %id, "Article deleted");
    Ok(StatusCode::NO_CONTENT)
}
