//! First-run content seeding.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Default menu entries: (label, href, position)
const DEFAULT_MENU: [(&str, &str, i64); 3] = [
    ("Каталог", "/catalog", 0),
    ("Статьи", "/articles", 1),
    ("О проекте", "/about", 2),
];

/// Seed the default menu and the "about" page when the site is empty.
/// Runs on every startup but only writes on a fresh database.
pub async fn seed_default_content(pool: &SqlitePool) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();

    let menu_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM menu_items")
        .fetch_one(pool)
        .await?;
    if menu_count.0 == 0 {
        for (label, href, position) in DEFAULT_MENU {
            sqlx::query(
                "INSERT INTO menu_items (id, label, href, position, is_visible, created_at)
                 VALUES (?, ?, ?, ?, 1, ?)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(label)
            .bind(href)
            .bind(position)
            .bind(&now)
            .execute(pool)
            .await?;
        }
        info!("Seeded default menu ({} items)", DEFAULT_MENU.len());
    }

    let page_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pages")
        .fetch_one(pool)
        .await?;
    if page_count.0 == 0 {
        sqlx::query(
            "INSERT INTO pages (id, slug, title, body, is_published, created_at, updated_at)
             VALUES (?, 'about', 'О проекте', ?, 1, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind("<h1>О проекте</h1><p>Реестр психологов.</p>")
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?;
        info!("Seeded default about page");
    }

    Ok(())
}
