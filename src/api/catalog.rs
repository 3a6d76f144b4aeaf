//! Public catalog and profile endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::catalog::{
    query_catalog, CatalogFilters, CatalogPage, CatalogPagination, SortBy, SortOrder,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use crate::db::{Psychologist, PsychologistProfile};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::validate_certification_level;

/// Raw catalog query parameters; list-valued filters arrive comma-separated
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub age_min: Option<u32>,
    pub age_max: Option<u32>,
    pub paradigms: Option<String>,
    pub levels: Option<String>,
    pub city: Option<String>,
    pub gender: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub limit: Option<u32>,
    pub cursor: Option<String>,
}

fn split_csv(value: &Option<String>) -> Vec<String> {
    value
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl CatalogQuery {
    /// Validate and convert the raw parameters into engine filters
    pub fn into_filters(self) -> Result<(CatalogFilters, CatalogPagination), ApiError> {
        let mut errors = ValidationErrorBuilder::new();

        let mut certification_levels = Vec::new();
        for raw in split_csv(&self.levels) {
            match raw.parse::<i64>() {
                Ok(level) => {
                    if let Err(e) = validate_certification_level(level) {
                        errors.add("levels", e);
                    } else {
                        certification_levels.push(level);
                    }
                }
                Err(_) => {
                    errors.add("levels", format!("Invalid certification level: {}", raw));
                }
            }
        }

        let sort_by = match self.sort_by.as_deref() {
            None | Some("") => SortBy::CreatedAt,
            Some(raw) => match raw.parse() {
                Ok(sort_by) => sort_by,
                Err(e) => {
                    errors.add("sort_by", e);
                    SortBy::CreatedAt
                }
            },
        };

        let sort_order = match self.sort_order.as_deref() {
            // Creation-time sorting is fixed newest-first; the other sort
            // fields default to ascending
            None | Some("") => match sort_by {
                SortBy::CreatedAt => SortOrder::Desc,
                _ => SortOrder::Asc,
            },
            Some(raw) => match raw.parse() {
                Ok(order) => order,
                Err(e) => {
                    errors.add("sort_order", e);
                    SortOrder::Desc
                }
            },
        };

        if let (Some(min), Some(max)) = (self.price_min, self.price_max) {
            if min > max {
                errors.add("price_min", "price_min cannot exceed price_max");
            }
        }
        if let (Some(min), Some(max)) = (self.age_min, self.age_max) {
            if min > max {
                errors.add("age_min", "age_min cannot exceed age_max");
            }
        }

        errors.finish()?;

        let filters = CatalogFilters {
            price_min: self.price_min,
            price_max: self.price_max,
            age_min: self.age_min,
            age_max: self.age_max,
            paradigms: split_csv(&self.paradigms),
            certification_levels,
            city: self.city.filter(|s| !s.is_empty()),
            gender: self.gender.filter(|s| !s.is_empty()),
            sort_by,
            sort_order,
        };
        let pagination = CatalogPagination {
            limit: self
                .limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
            cursor: self.cursor.filter(|s| !s.is_empty()),
        };
        Ok((filters, pagination))
    }
}

/// Query the public catalog
///
/// GET /api/catalog
pub async fn list_catalog(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<CatalogPage>, ApiError> {
    let (filters, pagination) = query.into_filters()?;
    let page = query_catalog(&state.db, &filters, &pagination).await?;
    Ok(Json(page))
}

/// Get a published profile by slug
///
/// GET /api/psychologists/:slug
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<PsychologistProfile>, ApiError> {
    let row: Option<Psychologist> =
        sqlx::query_as("SELECT * FROM psychologists WHERE slug = ? AND is_published = 1")
            .bind(&slug)
            .fetch_optional(&state.db)
            .await?;

    let psychologist = row.ok_or_else(|| ApiError::not_found("Profile not found"))?;
    let today = chrono::Utc::now().date_naive();
    Ok(Json(psychologist.into_profile(today)))
}
