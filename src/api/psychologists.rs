//! Admin CRUD over psychologist profiles.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    serialize_education, serialize_string_list, CreatePsychologistRequest, Psychologist,
    UpdatePsychologistRequest,
};
use crate::AppState;

use super::auth::Actor;
use super::error::{ApiError, ValidationErrorBuilder};
use super::uploads::remove_stored_file;
use super::validation::{
    generate_slug, validate_birth_date, validate_certification_level, validate_name,
    validate_price, validate_slug, validate_uuid,
};

const MODULE: &str = "psychologists";

fn validate_create_request(req: &CreatePsychologistRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_name(&req.full_name, "Full name") {
        errors.add("full_name", e);
    }
    if let Some(ref slug) = req.slug {
        if let Err(e) = validate_slug(slug) {
            errors.add("slug", e);
        }
    }
    if let Some(ref birth_date) = req.birth_date {
        if let Err(e) = validate_birth_date(birth_date) {
            errors.add("birth_date", e);
        }
    }
    if let Err(e) = validate_certification_level(req.certification_level) {
        errors.add("certification_level", e);
    }
    if let Err(e) = validate_price(req.price) {
        errors.add("price", e);
    }

    errors.finish()
}

fn validate_update_request(req: &UpdatePsychologistRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(ref full_name) = req.full_name {
        if let Err(e) = validate_name(full_name, "Full name") {
            errors.add("full_name", e);
        }
    }
    if let Some(ref slug) = req.slug {
        if let Err(e) = validate_slug(slug) {
            errors.add("slug", e);
        }
    }
    if let Some(ref birth_date) = req.birth_date {
        if let Err(e) = validate_birth_date(birth_date) {
            errors.add("birth_date", e);
        }
    }
    if let Some(level) = req.certification_level {
        if let Err(e) = validate_certification_level(level) {
            errors.add("certification_level", e);
        }
    }
    if let Some(price) = req.price {
        if let Err(e) = validate_price(price) {
            errors.add("price", e);
        }
    }

    errors.finish()
}

/// Pick a slug for a new profile: explicit slug, else one generated from the
/// name, else an id-derived fallback for names outside ASCII
fn resolve_slug(explicit: Option<String>, full_name: &str, id: &str) -> String {
    if let Some(slug) = explicit {
        return slug;
    }
    let generated = generate_slug(full_name);
    if generated.is_empty() {
        format!("p-{}", &id[..8])
    } else {
        generated
    }
}

/// List all profiles, including unpublished
///
/// GET /api/admin/psychologists
pub async fn list_psychologists(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Psychologist>>, ApiError> {
    actor.require(MODULE, "view")?;
    let rows: Vec<Psychologist> =
        sqlx::query_as("SELECT * FROM psychologists ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(rows))
}

/// Get a profile by id
///
/// GET /api/admin/psychologists/:id
pub async fn get_psychologist(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Psychologist>, ApiError> {
    actor.require(MODULE, "view")?;
    if let Err(e) = validate_uuid(&id, "psychologist_id") {
        return Err(ApiError::validation_field("psychologist_id", e));
    }

    let row: Option<Psychologist> = sqlx::query_as("SELECT * FROM psychologists WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    row.map(Json)
        .ok_or_else(|| ApiError::not_found("Psychologist not found"))
}

/// Create a profile
///
/// POST /api/admin/psychologists
pub async fn create_psychologist(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(request): Json<CreatePsychologistRequest>,
) -> Result<(StatusCode, Json<Psychologist>), ApiError> {
    actor.require(MODULE, "edit")?;
    validate_create_request(&request)?;

    let id = Uuid::new_v4().to_string();
    let slug = resolve_slug(request.slug.clone(), &request.full_name, &id);
    let now = chrono::Utc::now().to_rfc3339();
    let birth_date = request.birth_date.filter(|s| !s.is_empty());

    sqlx::query(
        "INSERT INTO psychologists \
         (id, slug, full_name, gender, birth_date, city, work_format, main_paradigm, \
          certification_level, short_bio, long_bio, price, images, education, is_published, \
          created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&slug)
    .bind(&request.full_name)
    .bind(&request.gender)
    .bind(&birth_date)
    .bind(&request.city)
    .bind(&request.work_format)
    .bind(serialize_string_list(&request.main_paradigm))
    .bind(request.certification_level)
    .bind(&request.short_bio)
    .bind(&request.long_bio)
    .bind(request.price)
    .bind(serialize_string_list(&request.images))
    .bind(serialize_education(&request.education))
    .bind(request.is_published)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let created: Psychologist = sqlx::query_as("SELECT * FROM psychologists WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(slug = %created.slug, "Psychologist profile created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a profile; only provided fields change
///
/// PUT /api/admin/psychologists/:id
pub async fn update_psychologist(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(request): Json<UpdatePsychologistRequest>,
) -> Result<Json<Psychologist>, ApiError> {
    actor.require(MODULE, "edit")?;
    validate_update_request(&request)?;

    let existing: Option<Psychologist> = sqlx::query_as("SELECT * FROM psychologists WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let mut row = existing.ok_or_else(|| ApiError::not_found("Psychologist not found"))?;

    if let Some(full_name) = request.full_name {
        row.full_name = full_name;
    }
    if let Some(slug) = request.slug {
        row.slug = slug;
    }
    if let Some(gender) = request.gender {
        row.gender = gender;
    }
    if let Some(birth_date) = request.birth_date {
        // Empty string clears the stored date
        row.birth_date = if birth_date.is_empty() {
            None
        } else {
            Some(birth_date)
        };
    }
    if let Some(city) = request.city {
        row.city = city;
    }
    if let Some(work_format) = request.work_format {
        row.work_format = work_format;
    }
    if let Some(paradigms) = request.main_paradigm {
        row.main_paradigm = serialize_string_list(&paradigms);
    }
    if let Some(level) = request.certification_level {
        row.certification_level = level;
    }
    if let Some(short_bio) = request.short_bio {
        row.short_bio = short_bio;
    }
    if let Some(long_bio) = request.long_bio {
        row.long_bio = long_bio;
    }
    if let Some(price) = request.price {
        row.price = price;
    }
    if let Some(images) = request.images {
        row.images = serialize_string_list(&images);
    }
    if let Some(education) = request.education {
        row.education = serialize_education(&education);
    }
    if let Some(is_published) = request.is_published {
        row.is_published = is_published;
    }
    row.updated_at = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE psychologists SET slug = ?, full_name = ?, gender = ?, birth_date = ?, \
         city = ?, work_format = ?, main_paradigm = ?, certification_level = ?, \
         short_bio = ?, long_bio = ?, price = ?, images = ?, education = ?, \
         is_published = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&row.slug)
    .bind(&row.full_name)
    .bind(&row.gender)
    .bind(&row.birth_date)
    .bind(&row.city)
    .bind(&row.work_format)
    .bind(&row.main_paradigm)
    .bind(row.certification_level)
    .bind(&row.short_bio)
    .bind(&row.long_bio)
    .bind(row.price)
    .bind(&row.images)
    .bind(&row.education)
    .bind(row.is_published)
    .bind(&row.updated_at)
    .bind(&id)
    .execute(&state.db)
    .await?;

    Ok(Json(row))
}

/// Delete a profile and best-effort remove its uploaded images
///
/// DELETE /api/admin/psychologists/:id
pub async fn delete_psychologist(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    actor.require(MODULE, "delete")?;

    let existing: Option<Psychologist> = sqlx::query_as("SELECT * FROM psychologists WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let row = existing.ok_or_else(|| ApiError::not_found("Psychologist not found"))?;

    sqlx::query("DELETE FROM psychologists WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    for image in row.image_list() {
        remove_stored_file(&state.config, &image);
    }

    tracing::info!(slug = %row.slug, "Psychologist profile deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_resolution_prefers_explicit_then_generated() {
        let id = "0123456789abcdef";
        assert_eq!(
            resolve_slug(Some("custom".to_string()), "Anna Petrova", id),
            "custom"
        );
        assert_eq!(resolve_slug(None, "Anna Petrova", id), "anna-petrova");
        // Cyrillic names fall back to an id-derived slug
        assert_eq!(resolve_slug(None, "Анна Петрова", id), "p-01234567");
    }
}
