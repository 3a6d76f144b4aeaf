//! Manager account administration. Admin only: managers cannot grant or
//! revoke each other's access.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{CreateManagerRequest, Manager, ManagerResponse, UpdateManagerRequest};
use crate::AppState;

use super::auth::{hash_password, Actor};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_name, validate_password, validate_uuid};

fn validate_role(role: &str) -> Result<(), String> {
    role.parse::<crate::db::ManagerRole>()
        .map(|_| ())
        .map_err(|_| "Invalid role. Must be one of: manager, moderator, supervisor".to_string())
}

fn validate_create_request(req: &CreateManagerRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_name(&req.name, "Name") {
        errors.add("name", e);
    }
    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&req.password) {
        errors.add("password", e);
    }
    if let Err(e) = validate_role(&req.role) {
        errors.add("role", e);
    }
    errors.finish()
}

fn validate_update_request(req: &UpdateManagerRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(ref name) = req.name {
        if let Err(e) = validate_name(name, "Name") {
            errors.add("name", e);
        }
    }
    if let Some(ref email) = req.email {
        if let Err(e) = validate_email(email) {
            errors.add("email", e);
        }
    }
    if let Some(ref password) = req.password {
        if let Err(e) = validate_password(password) {
            errors.add("password", e);
        }
    }
    if let Some(ref role) = req.role {
        if let Err(e) = validate_role(role) {
            errors.add("role", e);
        }
    }
    errors.finish()
}

fn serialize_permissions(permissions: &crate::db::Permissions) -> Result<String, ApiError> {
    serde_json::to_string(permissions)
        .map_err(|e| ApiError::internal(format!("Failed to encode permissions: {}", e)))
}

/// List manager accounts
///
/// GET /api/admin/managers
pub async fn list_managers(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<ManagerResponse>>, ApiError> {
    actor.require_admin()?;
    let rows: Vec<Manager> = sqlx::query_as("SELECT * FROM managers ORDER BY created_at DESC")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(rows.into_iter().map(ManagerResponse::from).collect()))
}

/// Get a manager account by id
///
/// GET /api/admin/managers/:id
pub async fn get_manager(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<ManagerResponse>, ApiError> {
    actor.require_admin()?;
    if let Err(e) = validate_uuid(&id, "manager_id") {
        return Err(ApiError::validation_field("manager_id", e));
    }

    let row: Option<Manager> = sqlx::query_as("SELECT * FROM managers WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    row.map(|m| Json(ManagerResponse::from(m)))
        .ok_or_else(|| ApiError::not_found("Manager not found"))
}

/// Create a manager account
///
/// POST /api/admin/managers
pub async fn create_manager(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(request): Json<CreateManagerRequest>,
) -> Result<(StatusCode, Json<ManagerResponse>), ApiError> {
    actor.require_admin()?;
    validate_create_request(&request)?;

    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    let permissions = serialize_permissions(&request.permissions)?;
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO managers (id, name, email, password_hash, role, permissions, is_active, \
         created_at) VALUES (?, ?, ?, ?, ?, ?, 1, ?)",
    )
    .bind(&id)
    .bind(&request.name)
    .bind(&request.email)
    .bind(&password_hash)
    .bind(&request.role)
    .bind(&permissions)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    let created: Manager = sqlx::query_as("SELECT * FROM managers WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(manager = %created.email, "Manager account created");
    Ok((StatusCode::CREATED, Json(ManagerResponse::from(created))))
}

/// Update a manager account; only provided fields change. Deactivation keeps
/// the row but ends the account's ability to log in or act.
///
/// PUT /api/admin/managers/:id
pub async fn update_manager(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(request): Json<UpdateManagerRequest>,
) -> Result<Json<ManagerResponse>, ApiError> {
    actor.require_admin()?;
    validate_update_request(&request)?;

    let existing: Option<Manager> = sqlx::query_as("SELECT * FROM managers WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;
    let mut row = existing.ok_or_else(|| ApiError::not_found("Manager not found"))?;

    if let Some(name) = request.name {
        row.name = name;
    }
    if let Some(email) = request.email {
        row.email = email;
    }
    if let Some(password) = request.password {
        row.password_hash = hash_password(&password)
            .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    }
    if let Some(role) = request.role {
        row.role = role;
    }
    if let Some(ref permissions) = request.permissions {
        row.permissions = serialize_permissions(permissions)?;
    }
    if let Some(is_active) = request.is_active {
        row.is_active = is_active;
    }

    sqlx::query(
        "UPDATE managers SET name = ?, email = ?, password_hash = ?, role = ?, permissions = ?, \
         is_active = ? WHERE id = ?",
    )
    .bind(&row.name)
    .bind(&row.email)
    .bind(&row.password_hash)
    .bind(&row.role)
    .bind(&row.permissions)
    .bind(row.is_active)
    .bind(&id)
    .execute(&state.db)
    .await?;

    // Deactivation also revokes the account's live sessions
    if !row.is_active {
        sqlx::query("DELETE FROM sessions WHERE manager_id = ?")
            .bind(&id)
            .execute(&state.db)
            .await?;
    }

    Ok(Json(ManagerResponse::from(row)))
}

/// Hard-delete a manager account; its sessions go with it
///
/// DELETE /api/admin/managers/:id
pub async fn delete_manager(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    actor.require_admin()?;

    let result = sqlx::query("DELETE FROM managers WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Manager not found"));
    }

    tracing::info!(manager = %id, "Manager account deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::{manager_login, verify_password};
    use crate::config::Config;
    use crate::db::{init_memory, ManagerLoginRequest, Permissions};
    use axum_extra::extract::cookie::CookieJar;

    async fn test_state() -> Arc<AppState> {
        let pool = init_memory().await;
        Arc::new(AppState::new(Config::default(), pool))
    }

    fn create_request(email: &str) -> CreateManagerRequest {
        CreateManagerRequest {
            name: "Test Manager".to_string(),
            email: email.to_string(),
            password: "long-enough-password".to_string(),
            role: "manager".to_string(),
            permissions: serde_json::from_str::<Permissions>(
                r#"{"pages": {"view": true, "edit": true}}"#,
            )
            .unwrap(),
        }
    }

    #[tokio::test]
    async fn create_stores_a_bcrypt_hash_and_matrix() {
        let state = test_state().await;
        let (status, Json(created)) = create_manager(
            State(state.clone()),
            Actor::Admin,
            Json(create_request("m@example.com")),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert!(created.permissions.allows("pages", "edit"));
        assert!(created.is_active);

        let stored: Manager = sqlx::query_as("SELECT * FROM managers WHERE id = ?")
            .bind(&created.id)
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_ne!(stored.password_hash, "long-enough-password");
        assert!(verify_password("long-enough-password", &stored.password_hash));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let state = test_state().await;
        create_manager(
            State(state.clone()),
            Actor::Admin,
            Json(create_request("dup@example.com")),
        )
        .await
        .unwrap();

        let err = create_manager(
            State(state),
            Actor::Admin,
            Json(create_request("dup@example.com")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), crate::api::error::ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn managers_cannot_administer_managers() {
        let state = test_state().await;
        let manager = Manager {
            id: "m1".to_string(),
            name: "Peer".to_string(),
            email: "peer@example.com".to_string(),
            password_hash: String::new(),
            role: "supervisor".to_string(),
            permissions: r#"{"managers": {"view": true, "edit": true, "delete": true}}"#
                .to_string(),
            is_active: true,
            created_at: String::new(),
        };
        let permissions = manager.permission_matrix();
        let actor = Actor::Manager {
            manager,
            permissions,
        };

        let err = list_managers(State(state), actor).await.unwrap_err();
        assert_eq!(err.code(), crate::api::error::ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn deactivation_blocks_login_and_revokes_sessions() {
        let state = test_state().await;
        let (_, Json(created)) = create_manager(
            State(state.clone()),
            Actor::Admin,
            Json(create_request("off@example.com")),
        )
        .await
        .unwrap();

        // Login works while active
        let login = manager_login(
            State(state.clone()),
            CookieJar::new(),
            Json(ManagerLoginRequest {
                email: "off@example.com".to_string(),
                password: "long-enough-password".to_string(),
            }),
        )
        .await;
        assert!(login.is_ok());

        // Deactivate
        update_manager(
            State(state.clone()),
            Actor::Admin,
            Path(created.id.clone()),
            Json(UpdateManagerRequest {
                name: None,
                email: None,
                password: None,
                role: None,
                permissions: None,
                is_active: Some(false),
            }),
        )
        .await
        .unwrap();

        let sessions: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE manager_id = ?")
                .bind(&created.id)
                .fetch_one(&state.db)
                .await
                .unwrap();
        assert_eq!(sessions.0, 0);

        let err = manager_login(
            State(state),
            CookieJar::new(),
            Json(ManagerLoginRequest {
                email: "off@example.com".to_string(),
                password: "long-enough-password".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), crate::api::error::ErrorCode::Forbidden);
    }
}
