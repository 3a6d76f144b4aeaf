//! Static page models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Page {
    pub id: String,
    pub slug: String,
    pub title: String,
    /// Operator-supplied HTML, served verbatim
    pub body: String,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Request to create a page
#[derive(Debug, Deserialize)]
pub struct CreatePageRequest {
    pub title: String,
    /// Auto-generated from title when not provided
    pub slug: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub is_published: bool,
}

/// Request to update a page (only provided fields change)
#[derive(Debug, Deserialize)]
pub struct UpdatePageRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub body: Option<String>,
    pub is_published: Option<bool>,
}
