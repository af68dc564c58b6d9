//! # wf-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the journal
//! and identity ports. Every handler that touches posts resolves the caller's
//! session first; the session's user is the only owner a request can reach.

use std::sync::Arc;

use actix_multipart::{Field, Multipart};
use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use futures_util::TryStreamExt;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;
use wf_core::error::AppError;
use wf_core::filter::FilterCriteria;
use wf_core::journal::Journal;
use wf_core::models::{NewPost, Session};
use wf_core::traits::IdentityProvider;

use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "wf_session";

type ApiResult = Result<HttpResponse, ApiError>;

/// State shared across all actix-web workers.
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub journal: Journal,
    /// Uploads above this size are rejected while streaming
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Bearer header first, then the session cookie.
pub(crate) fn access_token(req: &HttpRequest) -> Option<String> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    bearer.or_else(|| {
        req.cookie(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// The caller's live session, if the request carries a token for one.
pub(crate) async fn optional_session(
    req: &HttpRequest,
    state: &AppState,
) -> Result<Option<Session>, ApiError> {
    match access_token(req) {
        Some(token) => Ok(state.identity.get_session(&token).await?),
        None => Ok(None),
    }
}

pub(crate) async fn require_session(
    req: &HttpRequest,
    state: &AppState,
) -> Result<Session, ApiError> {
    let token = access_token(req).ok_or_else(|| AppError::unauthorized("not signed in"))?;
    let session = state
        .identity
        .get_session(&token)
        .await?
        .ok_or_else(|| AppError::unauthorized("session expired or unknown"))?;
    Ok(session)
}

pub(crate) fn session_cookie(session: &Session) -> Cookie<'static> {
    let ttl = (session.expires_at - Utc::now()).num_seconds().max(0);
    Cookie::build(SESSION_COOKIE, session.access_token.clone())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(ttl))
        .finish()
}

pub(crate) fn removal_cookie() -> Cookie<'static> {
    let mut removal = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    removal.make_removal();
    removal
}

fn signed_in(session: Session) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(session_cookie(&session))
        .json(session)
}

pub(crate) fn display_name(session: &Session) -> &str {
    session
        .user
        .full_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(&session.user.email)
}

// --- auth ---

pub async fn sign_up(data: web::Data<AppState>, body: web::Json<SignUpRequest>) -> ApiResult {
    let body = body.into_inner();
    let session = data
        .identity
        .sign_up(&body.email, &body.password, &body.full_name)
        .await?;
    Ok(signed_in(session))
}

pub async fn sign_in(data: web::Data<AppState>, body: web::Json<SignInRequest>) -> ApiResult {
    let session = data.identity.sign_in(&body.email, &body.password).await?;
    Ok(signed_in(session))
}

/// Always clears the cookie; an unknown token is not an error.
pub async fn sign_out(data: web::Data<AppState>, req: HttpRequest) -> ApiResult {
    if let Some(token) = access_token(&req) {
        data.identity.sign_out(&token).await?;
    }
    Ok(HttpResponse::NoContent().cookie(removal_cookie()).finish())
}

pub async fn current_session(data: web::Data<AppState>, req: HttpRequest) -> ApiResult {
    let session = require_session(&req, &data).await?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn update_profile(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ProfileRequest>,
) -> ApiResult {
    let session = require_session(&req, &data).await?;
    let user = data
        .identity
        .update_profile(&session.access_token, &body.full_name)
        .await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn change_password(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<PasswordRequest>,
) -> ApiResult {
    let session = require_session(&req, &data).await?;
    if body.new_password != body.confirm_password {
        return Err(AppError::validation("new passwords do not match").into());
    }
    data.identity
        .update_password(
            &session.access_token,
            &body.current_password,
            &body.new_password,
        )
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

// --- posts ---

/// The caller's posts, filtered and sorted by the query string criteria.
pub async fn list_posts(
    data: web::Data<AppState>,
    req: HttpRequest,
    criteria: web::Query<FilterCriteria>,
) -> ApiResult {
    let session = require_session(&req, &data).await?;
    let posts = data.journal.browse(&session, &criteria).await?;
    Ok(HttpResponse::Ok().json(posts))
}

pub async fn create_post(
    data: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<NewPost>,
) -> ApiResult {
    let session = require_session(&req, &data).await?;
    let post = data.journal.add_post(&session, body.into_inner()).await?;
    Ok(HttpResponse::Created()
        .insert_header((header::LOCATION, format!("/api/posts/{}", post.id)))
        .json(post))
}

pub async fn post_map(data: web::Data<AppState>, req: HttpRequest) -> ApiResult {
    let session = require_session(&req, &data).await?;
    let markers = data.journal.map(&session).await?;
    Ok(HttpResponse::Ok().json(markers))
}

pub async fn get_post(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> ApiResult {
    let session = require_session(&req, &data).await?;
    let post = data.journal.get_post(&session, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

/// Reads the `file` field of a multipart body and stores it as a media item.
pub async fn upload_media(
    data: web::Data<AppState>,
    req: HttpRequest,
    mut payload: Multipart,
) -> ApiResult {
    let session = require_session(&req, &data).await?;

    while let Some(mut field) = payload.try_next().await.map_err(bad_multipart)? {
        if field.name() != "file" {
            while field.try_next().await.map_err(bad_multipart)?.is_some() {}
            continue;
        }

        let filename = field
            .content_disposition()
            .get_filename()
            .map(str::to_owned)
            .ok_or_else(|| AppError::validation("file field has no filename"))?;

        let bytes = read_field(&mut field, data.max_upload_bytes).await?;
        debug!(%filename, size = bytes.len(), "multipart file received");

        let media = data.journal.attach_media(&session, &filename, bytes).await?;
        return Ok(HttpResponse::Created().json(media));
    }

    Err(AppError::validation("missing file field").into())
}

/// Collects one multipart field, failing once it grows past `limit` bytes.
pub(crate) async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, ApiError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(bad_multipart)? {
        if bytes.len() + chunk.len() > limit {
            return Err(AppError::ValidationError(format!("file exceeds {limit} bytes")).into());
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

pub(crate) fn bad_multipart(err: actix_multipart::MultipartError) -> ApiError {
    AppError::ValidationError(format!("malformed multipart body: {err}")).into()
}
