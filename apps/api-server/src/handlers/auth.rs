//! Authentication handlers.

use actix_web::{HttpResponse, web};

use quill_core::domain::User;
use quill_core::services::{LoginOutcome, NewUser};
use quill_shared::MessageResponse;
use quill_shared::dto::{
    LoginRequest, LoginResponse, RefreshRequest, RegisterRequest, TokenPairResponse, UserProfile,
    VerifyRequest,
};

use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

fn user_profile(user: &User) -> UserProfile {
    UserProfile {
        username: user.username.clone(),
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    }
}

fn login_response(outcome: LoginOutcome) -> LoginResponse {
    LoginResponse {
        user: user_profile(&outcome.user),
        access_token: outcome.tokens.access_token,
        refresh_token: outcome.tokens.refresh_token,
        expires_in: outcome.tokens.expires_in,
    }
}

fn require_refresh_token(req: &RefreshRequest) -> AppResult<&str> {
    let token = req.refresh_token.trim();
    if token.is_empty() {
        return Err(AppError::BadRequest("Refresh token is required".to_string()));
    }
    Ok(token)
}

/// POST /api/auth/login
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let outcome = state.auth.login(&req.username, &req.password).await?;

    Ok(HttpResponse::Ok().json(login_response(outcome)))
}

/// POST /api/auth/register
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let outcome = state
        .auth
        .register(NewUser {
            username: req.username,
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
        })
        .await?;

    Ok(HttpResponse::Created().json(login_response(outcome)))
}

/// POST /api/auth/verify - 200 for a usable token of either kind, 400 otherwise.
pub async fn verify(
    state: web::Data<AppState>,
    body: web::Json<VerifyRequest>,
) -> AppResult<HttpResponse> {
    match state.auth.verify(body.token.trim()).await {
        Ok(_) => Ok(HttpResponse::Ok().json(MessageResponse::new("Token is valid."))),
        Err(e) if e.is_token_rejection() => {
            tracing::debug!(error = %e, "Token verification failed");
            Err(AppError::BadRequest("Token is invalid.".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /api/auth/refresh
pub async fn refresh(
    state: web::Data<AppState>,
    body: web::Json<RefreshRequest>,
) -> AppResult<HttpResponse> {
    let token = require_refresh_token(&body)?;
    let pair = state.auth.refresh(token).await?;

    Ok(HttpResponse::Ok().json(TokenPairResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: pair.expires_in,
    }))
}

/// POST /api/auth/logout - blacklists the presented refresh token.
pub async fn logout(
    state: web::Data<AppState>,
    body: web::Json<RefreshRequest>,
) -> AppResult<HttpResponse> {
    let token = require_refresh_token(&body)?;
    state.auth.logout(token).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Successfully logged out.")))
}

/// GET /api/auth/me - Protected route
pub async fn me(state: web::Data<AppState>, identity: Identity) -> AppResult<HttpResponse> {
    let user = state.auth.profile(identity.user_id).await?;

    Ok(HttpResponse::Ok().json(user_profile(&user)))
}
