//! Authentication and authorization for the two back-office actor kinds.
//!
//! Admin credentials come from configuration and managers from the database,
//! but both end up with the same session mechanism: an opaque random token in
//! an HttpOnly cookie, stored server-side as a SHA-256 hash with an expiry.
//! Permission checks for managers always read the current matrix from the
//! database, so privilege changes apply to live sessions on their next
//! request.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::request::Parts,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::config::AdminConfig;
use crate::db::{
    AdminLoginRequest, DbPool, Manager, ManagerLoginRequest, ManagerResponse, Permissions,
    Session, SessionActor,
};
use crate::AppState;

use super::error::ApiError;

pub const ADMIN_COOKIE: &str = "admin_session";
pub const MANAGER_COOKIE: &str = "manager_session";

/// Manager session lifetime
const MANAGER_SESSION_DAYS: i64 = 7;

/// Hash a manager password using bcrypt
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
}

/// Verify a manager password against its bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Generate a random session token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    a.len() == b.len() && a.ct_eq(b).into()
}

/// Compare a submitted credential pair against the configured admin account
/// using constant-time comparison
pub fn verify_admin_credentials(config: &AdminConfig, login: &str, password: &str) -> bool {
    constant_time_eq(&config.login, login) & constant_time_eq(&config.password, password)
}

/// Create a session row and return the opaque token for the cookie
pub async fn create_session(
    pool: &DbPool,
    actor: SessionActor,
    manager_id: Option<&str>,
    expires_at: DateTime<Utc>,
) -> Result<String, sqlx::Error> {
    let token = generate_token();
    let token_hash = hash_token(&token);
    sqlx::query(
        "INSERT INTO sessions (id, actor, manager_id, token_hash, expires_at, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(actor.to_string())
    .bind(manager_id)
    .bind(&token_hash)
    .bind(expires_at.to_rfc3339())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(token)
}

/// Look up a live session for the token. Expired rows are deleted lazily.
pub async fn session_from_token(
    pool: &DbPool,
    token: &str,
    actor: SessionActor,
) -> Result<Option<Session>, sqlx::Error> {
    let token_hash = hash_token(token);
    let session: Option<Session> =
        sqlx::query_as("SELECT * FROM sessions WHERE token_hash = ? AND actor = ?")
            .bind(&token_hash)
            .bind(actor.to_string())
            .fetch_optional(pool)
            .await?;

    match session {
        Some(session) if session.is_expired() => {
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(&session.id)
                .execute(pool)
                .await?;
            Ok(None)
        }
        other => Ok(other),
    }
}

async fn delete_session_for_token(pool: &DbPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(hash_token(token))
        .execute(pool)
        .await?;
    Ok(())
}

fn session_cookie(name: &'static str, token: String) -> Cookie<'static> {
    Cookie::build((name, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// The authenticated caller of a back-office endpoint
#[derive(Debug)]
pub enum Actor {
    Admin,
    Manager {
        manager: Manager,
        permissions: Permissions,
    },
}

impl Actor {
    /// Admin passes every check; a manager must hold the named flag in the
    /// current permission matrix
    pub fn require(&self, module: &str, action: &str) -> Result<(), ApiError> {
        match self {
            Actor::Admin => Ok(()),
            Actor::Manager { permissions, .. } => {
                if permissions.allows(module, action) {
                    Ok(())
                } else {
                    Err(ApiError::forbidden(format!(
                        "This action requires the {}.{} permission",
                        module, action
                    )))
                }
            }
        }
    }

    /// Same check, taking a "module.action" key
    pub fn require_key(&self, key: &str) -> Result<(), ApiError> {
        let (module, action) = crate::db::split_permission_key(key)
            .ok_or_else(|| ApiError::internal(format!("Malformed permission key: {}", key)))?;
        self.require(module, action)
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        match self {
            Actor::Admin => Ok(()),
            Actor::Manager { .. } => Err(ApiError::forbidden("This area is admin only")),
        }
    }
}

async fn manager_for_session(pool: &DbPool, session: &Session) -> Result<Manager, ApiError> {
    let manager_id = session
        .manager_id
        .as_deref()
        .ok_or_else(|| ApiError::unauthorized("Session is not linked to a manager"))?;
    let manager: Option<Manager> = sqlx::query_as("SELECT * FROM managers WHERE id = ?")
        .bind(manager_id)
        .fetch_optional(pool)
        .await?;
    let manager = manager.ok_or_else(|| ApiError::unauthorized("Manager account no longer exists"))?;
    if !manager.is_active {
        return Err(ApiError::forbidden("Manager account is deactivated"));
    }
    Ok(manager)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);

        if let Some(cookie) = jar.get(ADMIN_COOKIE) {
            if session_from_token(&state.db, cookie.value(), SessionActor::Admin)
                .await?
                .is_some()
            {
                return Ok(Actor::Admin);
            }
        }

        if let Some(cookie) = jar.get(MANAGER_COOKIE) {
            if let Some(session) =
                session_from_token(&state.db, cookie.value(), SessionActor::Manager).await?
            {
                let manager = manager_for_session(&state.db, &session).await?;
                let permissions = manager.permission_matrix();
                return Ok(Actor::Manager {
                    manager,
                    permissions,
                });
            }
        }

        Err(ApiError::unauthorized("Authentication required"))
    }
}

/// Extractor for endpoints that specifically need a manager session
pub struct CurrentManager {
    pub session: Session,
    pub manager: Manager,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentManager {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let cookie = jar
            .get(MANAGER_COOKIE)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        let session = session_from_token(&state.db, cookie.value(), SessionActor::Manager)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Session expired or revoked"))?;
        let manager = manager_for_session(&state.db, &session).await?;
        Ok(CurrentManager { session, manager })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct ManagerSessionResponse {
    pub manager: ManagerResponse,
    pub expires_at: String,
}

/// Admin login endpoint
///
/// POST /api/admin/login
pub async fn admin_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<AdminLoginRequest>,
) -> Result<(CookieJar, Json<StatusResponse>), ApiError> {
    if !verify_admin_credentials(&state.config.admin, &request.login, &request.password) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let expires_at = Utc::now() + Duration::hours(state.config.admin.session_hours);
    let token = create_session(&state.db, SessionActor::Admin, None, expires_at).await?;

    tracing::info!("Admin logged in");
    let jar = jar.add(session_cookie(ADMIN_COOKIE, token));
    Ok((jar, Json(StatusResponse { ok: true })))
}

/// Admin logout endpoint
///
/// POST /api/admin/logout
pub async fn admin_logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<StatusResponse>), ApiError> {
    if let Some(cookie) = jar.get(ADMIN_COOKIE) {
        delete_session_for_token(&state.db, cookie.value()).await?;
    }
    let jar = jar.remove(Cookie::from(ADMIN_COOKIE));
    Ok((jar, Json(StatusResponse { ok: true })))
}

/// Manager login endpoint
///
/// POST /api/auth/login
pub async fn manager_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<ManagerLoginRequest>,
) -> Result<(CookieJar, Json<ManagerSessionResponse>), ApiError> {
    let manager: Option<Manager> = sqlx::query_as("SELECT * FROM managers WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;
    let manager = manager.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&request.password, &manager.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }
    if !manager.is_active {
        return Err(ApiError::forbidden("Manager account is deactivated"));
    }

    let expires_at = Utc::now() + Duration::days(MANAGER_SESSION_DAYS);
    let token = create_session(
        &state.db,
        SessionActor::Manager,
        Some(manager.id.as_str()),
        expires_at,
    )
    .await?;

    tracing::info!(manager = %manager.email, "Manager logged in");
    let jar = jar.add(session_cookie(MANAGER_COOKIE, token));
    Ok((
        jar,
        Json(ManagerSessionResponse {
            manager: ManagerResponse::from(manager),
            expires_at: expires_at.to_rfc3339(),
        }),
    ))
}

/// Report the current manager session with fresh permissions
///
/// GET /api/auth/check
pub async fn auth_check(current: CurrentManager) -> Json<ManagerSessionResponse> {
    Json(ManagerSessionResponse {
        expires_at: current.session.expires_at.clone(),
        manager: ManagerResponse::from(current.manager),
    })
}

/// Extend the current manager session and re-read permissions
///
/// POST /api/auth/refresh
pub async fn auth_refresh(
    State(state): State<Arc<AppState>>,
    current: CurrentManager,
) -> Result<Json<ManagerSessionResponse>, ApiError> {
    let expires_at = Utc::now() + Duration::days(MANAGER_SESSION_DAYS);
    sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
        .bind(expires_at.to_rfc3339())
        .bind(&current.session.id)
        .execute(&state.db)
        .await?;
    Ok(Json(ManagerSessionResponse {
        expires_at: expires_at.to_rfc3339(),
        manager: ManagerResponse::from(current.manager),
    }))
}

/// Manager logout endpoint
///
/// POST /api/auth/logout
pub async fn manager_logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<StatusResponse>), ApiError> {
    if let Some(cookie) = jar.get(MANAGER_COOKIE) {
        delete_session_for_token(&state.db, cookie.value()).await?;
    }
    let jar = jar.remove(Cookie::from(MANAGER_COOKIE));
    Ok((jar, Json(StatusResponse { ok: true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::config::Config;
    use crate::db::init_memory;

    async fn test_state() -> Arc<AppState> {
        let pool = init_memory().await;
        Arc::new(AppState::new(Config::default(), pool))
    }

    #[test]
    fn default_admin_credentials_verify() {
        let config = AdminConfig::default();
        assert!(verify_admin_credentials(&config, "Gasan123", "1111"));
        assert!(!verify_admin_credentials(&config, "Gasan123", "wrong"));
        assert!(!verify_admin_credentials(&config, "someone", "1111"));
        assert!(!verify_admin_credentials(&config, "", ""));
    }

    #[test]
    fn password_hashing_round_trips() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[tokio::test]
    async fn session_round_trip_and_expiry() {
        let pool = init_memory().await;

        let token = create_session(
            &pool,
            SessionActor::Admin,
            None,
            Utc::now() + Duration::hours(1),
        )
        .await
        .unwrap();

        assert!(session_from_token(&pool, &token, SessionActor::Admin)
            .await
            .unwrap()
            .is_some());
        // Actor kinds do not cross over
        assert!(session_from_token(&pool, &token, SessionActor::Manager)
            .await
            .unwrap()
            .is_none());
        assert!(session_from_token(&pool, "bogus", SessionActor::Admin)
            .await
            .unwrap()
            .is_none());

        // Expired sessions vanish on lookup
        let stale = create_session(
            &pool,
            SessionActor::Admin,
            None,
            Utc::now() - Duration::hours(1),
        )
        .await
        .unwrap();
        assert!(session_from_token(&pool, &stale, SessionActor::Admin)
            .await
            .unwrap()
            .is_none());
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn admin_login_sets_a_session_cookie() {
        let state = test_state().await;

        let (jar, body) = admin_login(
            State(state.clone()),
            CookieJar::new(),
            Json(AdminLoginRequest {
                login: "Gasan123".to_string(),
                password: "1111".to_string(),
            }),
        )
        .await
        .unwrap();

        assert!(body.ok);
        let cookie = jar.get(ADMIN_COOKIE).expect("admin cookie set");
        assert!(!cookie.value().is_empty());
        // The cookie token resolves to a live admin session
        assert!(
            session_from_token(&state.db, cookie.value(), SessionActor::Admin)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn admin_login_rejects_bad_credentials() {
        let state = test_state().await;

        let err = admin_login(
            State(state),
            CookieJar::new(),
            Json(AdminLoginRequest {
                login: "Gasan123".to_string(),
                password: "wrong".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[test]
    fn admin_actor_passes_every_check() {
        let actor = Actor::Admin;
        assert!(actor.require("pages", "edit").is_ok());
        assert!(actor.require("managers", "delete").is_ok());
        assert!(actor.require_admin().is_ok());
    }

    #[test]
    fn manager_actor_is_bound_by_the_matrix() {
        let manager = Manager {
            id: "m1".to_string(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            password_hash: String::new(),
            role: "manager".to_string(),
            permissions: r#"{"pages": {"view": true, "edit": true}}"#.to_string(),
            is_active: true,
            created_at: String::new(),
        };
        let permissions = manager.permission_matrix();
        let actor = Actor::Manager {
            manager,
            permissions,
        };

        assert!(actor.require("pages", "edit").is_ok());
        assert!(actor.require("pages", "delete").is_err());
        assert!(actor.require("articles", "view").is_err());
        assert!(actor.require_key("pages.edit").is_ok());
        assert!(actor.require_key("pages.delete").is_err());
        assert!(actor.require_key("not-a-key").is_err());
        assert_eq!(
            actor.require_admin().unwrap_err().code(),
            ErrorCode::Forbidden
        );
    }
}
