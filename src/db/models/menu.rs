//! Site menu models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MenuItem {
    pub id: String,
    pub label: String,
    pub href: String,
    pub position: i64,
    pub is_visible: bool,
    pub created_at: String,
}

/// Request to create a menu item
#[derive(Debug, Deserialize)]
pub struct CreateMenuItemRequest {
    pub label: String,
    pub href: String,
    #[serde(default)]
    pub position: i64,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
}

fn default_visible() -> bool {
    true
}

/// Request to update a menu item (only provided fields change)
#[derive(Debug, Deserialize)]
pub struct UpdateMenuItemRequest {
    pub label: Option<String>,
    pub href: Option<String>,
    pub position: Option<i64>,
    pub is_visible: Option<bool>,
}
