use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::{delete, post},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::application::use_cases::auth::login::{Login as LoginUc, LoginRequest as LoginDto};
use crate::application::use_cases::auth::logout::Logout as LogoutUc;
use crate::application::use_cases::auth::register::{
    Register as RegisterUc, RegisterRequest as RegisterDto,
};
use crate::bootstrap::app_context::AppContext;
use crate::presentation::http::envelope::{ApiError, ResponseEnvelope};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Admin registration token
    pub token: String,
    pub login: String,
    pub pswd: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub login: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AuthRequest {
    pub login: String,
    pub pswd: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/auth", post(authenticate))
        .route("/auth/:token", delete(logout))
        .with_state(ctx)
}

#[utoipa::path(post, path = "/api/register", tag = "Auth", request_body = RegisterRequest, responses(
    (status = 200, body = RegisterResponse)
))]
pub async fn register(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ResponseEnvelope<RegisterResponse>>, ApiError> {
    let repo = ctx.user_repo();
    let uc = RegisterUc {
        repo: repo.as_ref(),
        admin_token: &ctx.cfg.admin_token,
    };
    let dto = RegisterDto {
        token: req.token,
        login: req.login,
        password: req.pswd,
    };
    let login = uc.execute(&dto).await.inspect_err(|e| {
        tracing::warn!(login = %dto.login, error = %e, "register_failed");
    })?;
    Ok(Json(ResponseEnvelope {
        response: RegisterResponse { login },
    }))
}

#[utoipa::path(post, path = "/api/auth", tag = "Auth", request_body = AuthRequest, responses(
    (status = 200, body = AuthResponse)
))]
pub async fn authenticate(
    State(ctx): State<AppContext>,
    Json(req): Json<AuthRequest>,
) -> Result<Json<ResponseEnvelope<AuthResponse>>, ApiError> {
    let users = ctx.user_repo();
    let sessions = ctx.session_repo();
    let uc = LoginUc {
        users: users.as_ref(),
        sessions: sessions.as_ref(),
        session_ttl: chrono::Duration::seconds(ctx.cfg.session_ttl_secs),
    };
    let dto = LoginDto {
        login: req.login,
        password: req.pswd,
    };
    let token = uc.execute(&dto).await.inspect_err(|e| {
        tracing::warn!(login = %dto.login, error = %e, "authenticate_failed");
    })?;
    Ok(Json(ResponseEnvelope {
        response: AuthResponse { token },
    }))
}

#[utoipa::path(delete, path = "/api/auth/{token}", tag = "Auth",
    params(("token" = String, Path, description = "Session token to close")),
    responses((status = 200)))]
pub async fn logout(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
) -> Result<Json<ResponseEnvelope<serde_json::Value>>, ApiError> {
    let sessions = ctx.session_repo();
    let uc = LogoutUc {
        sessions: sessions.as_ref(),
        documents: ctx.documents(),
    };
    let closed = uc.execute(&token).await?;
    let mut body = serde_json::Map::new();
    body.insert(token, serde_json::Value::Bool(closed));
    Ok(Json(ResponseEnvelope {
        response: serde_json::Value::Object(body),
    }))
}

// --- acting token resolution ---

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    token: Option<String>,
}

pub fn token_from_json_body(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice::<TokenBody>(body)
        .ok()
        .and_then(|b| b.token)
}

fn bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

/// Picks the session token for a request. Later sources win: bearer
/// header, then the token in the body (JSON or multipart `meta`), then the
/// `token` query parameter.
pub fn acting_token(
    query: Option<String>,
    body: Option<String>,
    headers: &HeaderMap,
) -> Result<String, ApiError> {
    [query, body, bearer_from_headers(headers)]
        .into_iter()
        .flatten()
        .map(|t| t.trim().to_string())
        .find(|t| !t.is_empty())
        .ok_or_else(|| {
            tracing::debug!("acting_token_missing");
            ApiError::unauthorized()
        })
}
