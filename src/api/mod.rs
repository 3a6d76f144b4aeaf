mod articles;
pub mod auth;
mod catalog;
mod complaints;
pub mod error;
mod managers;
mod menu;
mod pages;
mod psychologists;
mod uploads;
mod validation;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Generous slack over the file cap for multipart framing
    let upload_body_limit = state.config.uploads.max_bytes + 64 * 1024;

    // Mutating handlers extract the Actor and check its module permission
    // themselves; public reads carry no auth at all.
    let api_routes = Router::new()
        // Public catalog and content
        .route("/catalog", get(catalog::list_catalog))
        .route("/psychologists/:slug", get(catalog::get_profile))
        .route("/pages/:slug", get(pages::get_page))
        .route("/menu", get(menu::list_menu))
        .route("/complaints", post(complaints::submit_complaint))
        // Articles: public reads, gated writes
        .route("/articles", get(articles::list_articles).post(articles::create_article))
        .route(
            "/articles/:id",
            get(articles::get_article)
                .put(articles::update_article)
                .delete(articles::delete_article),
        )
        // Sessions for both actor kinds
        .route("/admin/login", post(auth::admin_login))
        .route("/admin/logout", post(auth::admin_logout))
        .route("/auth/login", post(auth::manager_login))
        .route("/auth/check", get(auth::auth_check))
        .route("/auth/refresh", post(auth::auth_refresh))
        .route("/auth/logout", post(auth::manager_logout))
        // Psychologist administration
        .route(
            "/admin/psychologists",
            get(psychologists::list_psychologists).post(psychologists::create_psychologist),
        )
        .route(
            "/admin/psychologists/:id",
            get(psychologists::get_psychologist)
                .put(psychologists::update_psychologist)
                .delete(psychologists::delete_psychologist),
        )
        // Article drafts for the back office
        .route("/admin/articles", get(articles::list_all_articles))
        // Pages
        .route("/admin/pages", get(pages::list_pages).post(pages::create_page))
        .route(
            "/admin/pages/:id",
            get(pages::get_page_by_id)
                .put(pages::update_page)
                .delete(pages::delete_page),
        )
        // Menu
        .route("/admin/menu", get(menu::list_all_menu).post(menu::create_menu_item))
        .route(
            "/admin/menu/:id",
            put(menu::update_menu_item).delete(menu::delete_menu_item),
        )
        // Managers (admin only)
        .route(
            "/admin/managers",
            get(managers::list_managers).post(managers::create_manager),
        )
        .route(
            "/admin/managers/:id",
            get(managers::get_manager)
                .put(managers::update_manager)
                .delete(managers::delete_manager),
        )
        // Uploads
        .route(
            "/upload",
            post(uploads::upload_file).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route(
            "/uploads/*path",
            get(uploads::serve_file).delete(uploads::delete_file),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
