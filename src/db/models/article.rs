//! Article models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Article {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body: String,
    /// Optional psychologist reference
    pub author_id: Option<String>,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Article list entry with the author's public fields joined in
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ArticleWithAuthor {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body: String,
    pub author_id: Option<String>,
    pub is_published: bool,
    pub created_at: String,
    pub updated_at: String,
    pub author_name: Option<String>,
    pub author_slug: Option<String>,
}

/// Request to create an article
#[derive(Debug, Deserialize)]
pub struct CreateArticleRequest {
    pub title: String,
    /// Auto-generated from title when not provided
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub body: String,
    /// Psychologist id to connect as author
    pub author_id: Option<String>,
    #[serde(default)]
    pub is_published: bool,
}

/// Request to update an article (only provided fields change)
#[derive(Debug, Deserialize)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub body: Option<String>,
    /// Empty string disconnects the author, a psychologist id connects it
    pub author_id: Option<String>,
    pub is_published: Option<bool>,
}
