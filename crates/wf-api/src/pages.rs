//! # wf-api Pages
//!
//! Server-rendered HTML: sign-in, the post grid, post detail, the new-trip
//! form and account settings. Form submissions answer with a 303 redirect on
//! success and re-render the form with the error otherwise. Pages that need
//! a session redirect to `/signin` when there is none.

use actix_multipart::Multipart;
use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use askama::Template;
use futures_util::TryStreamExt;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;
use wf_core::error::{AppError, Result as CoreResult};
use wf_core::filter::{filter_refs, map_markers, FilterCriteria};
use wf_core::models::{NewPost, Post, Session};
use wf_ui::{
    IndexTemplate, NewPostTemplate, PostForm, PostTemplate, SettingsTemplate, SignInTemplate,
};

use crate::error::ApiError;
use crate::handlers::{
    access_token, bad_multipart, display_name, optional_session, read_field, removal_cookie,
    session_cookie, AppState, PasswordRequest, ProfileRequest, SignInRequest, SignUpRequest,
};

pub const SIGN_IN_PATH: &str = "/signin";

type PageResult = Result<HttpResponse, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct SettingsQuery {
    pub saved: Option<String>,
}

fn html(status: StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(body)
}

fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn render(template: &impl Template) -> Result<String, ApiError> {
    Ok(template.render().map_err(AppError::internal)?)
}

/// Errors a user can fix by resubmitting the form. Anything else is passed on.
fn rejected(err: AppError) -> Result<(StatusCode, String), ApiError> {
    match err {
        AppError::ValidationError(_) | AppError::Unauthorized(_) | AppError::Conflict(_) => {
            let err = ApiError(err);
            Ok((err.status_code(), err.to_string()))
        }
        other => Err(ApiError(other)),
    }
}

// --- sign in ---

pub async fn sign_in_page(data: web::Data<AppState>, req: HttpRequest) -> PageResult {
    if optional_session(&req, &data).await?.is_some() {
        return Ok(see_other("/"));
    }
    Ok(html(StatusCode::OK, render(&SignInTemplate::new("", ""))?))
}

fn signed_in(session: &Session) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/"))
        .cookie(session_cookie(session))
        .finish()
}

fn sign_in_failed(email: &str, err: AppError) -> PageResult {
    let (status, message) = rejected(err)?;
    Ok(html(status, render(&SignInTemplate::new(email, &message))?))
}

pub async fn sign_in_form(
    data: web::Data<AppState>,
    form: web::Form<SignInRequest>,
) -> PageResult {
    match data.identity.sign_in(&form.email, &form.password).await {
        Ok(session) => Ok(signed_in(&session)),
        Err(err) => sign_in_failed(&form.email, err),
    }
}

pub async fn sign_up_form(
    data: web::Data<AppState>,
    form: web::Form<SignUpRequest>,
) -> PageResult {
    match data
        .identity
        .sign_up(&form.email, &form.password, &form.full_name)
        .await
    {
        Ok(session) => Ok(signed_in(&session)),
        Err(err) => sign_in_failed(&form.email, err),
    }
}

pub async fn sign_out_form(data: web::Data<AppState>, req: HttpRequest) -> PageResult {
    if let Some(token) = access_token(&req) {
        data.identity.sign_out(&token).await?;
    }
    Ok(HttpResponse::SeeOther()
        .insert_header((header::LOCATION, SIGN_IN_PATH))
        .cookie(removal_cookie())
        .finish())
}

// --- journal ---

/// Renders the post grid (e.g., /?mood=happy&sort_by=spent)
pub async fn index(
    data: web::Data<AppState>,
    req: HttpRequest,
    criteria: web::Query<FilterCriteria>,
) -> PageResult {
    let Some(session) = optional_session(&req, &data).await? else {
        return Ok(see_other(SIGN_IN_PATH));
    };
    let posts = data.journal.list_posts(&session).await?;
    let visible = filter_refs(&posts, &criteria);
    let markers = map_markers(&posts);

    let page = render(&IndexTemplate::new(
        display_name(&session),
        &criteria,
        &visible,
        &markers,
    ))?;
    info!(owner_id = %session.user_id(), shown = visible.len(), "index rendered");
    Ok(html(StatusCode::OK, page))
}

/// Renders a single post (e.g., /post/<uuid>)
pub async fn view_post(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> PageResult {
    let Some(session) = optional_session(&req, &data).await? else {
        return Ok(see_other(SIGN_IN_PATH));
    };
    let post = data.journal.get_post(&session, path.into_inner()).await?;
    let page = render(&PostTemplate::new(display_name(&session), &post))?;
    Ok(html(StatusCode::OK, page))
}

pub async fn new_post_page(data: web::Data<AppState>, req: HttpRequest) -> PageResult {
    let Some(session) = optional_session(&req, &data).await? else {
        return Ok(see_other(SIGN_IN_PATH));
    };
    let form = PostForm::default();
    let page = render(&NewPostTemplate::new(display_name(&session), &form, ""))?;
    Ok(html(StatusCode::OK, page))
}

/// Handles the multipart new-trip form. Text fields fill a `PostForm`, every
/// non-empty `media` file is uploaded once the form itself has validated.
pub async fn new_post_form(
    data: web::Data<AppState>,
    req: HttpRequest,
    mut payload: Multipart,
) -> PageResult {
    let Some(session) = optional_session(&req, &data).await? else {
        return Ok(see_other(SIGN_IN_PATH));
    };

    let mut form = PostForm::default();
    let mut uploads = Vec::new();
    while let Some(mut field) = payload.try_next().await.map_err(bad_multipart)? {
        let name = field.name().to_string();
        let filename = field
            .content_disposition()
            .get_filename()
            .map(str::to_owned);
        let bytes = read_field(&mut field, data.max_upload_bytes).await?;

        match filename {
            Some(filename) if name == "media" => {
                // browsers send an empty part when no file was picked
                if !filename.is_empty() && !bytes.is_empty() {
                    uploads.push((filename, bytes));
                }
            }
            _ => form.set(&name, String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
    debug!(files = uploads.len(), "new post form received");

    match publish(&data, &session, &form, uploads).await {
        Ok(post) => Ok(see_other(&format!("/post/{}", post.id))),
        Err(err) => {
            let (status, message) = rejected(err)?;
            let page = render(&NewPostTemplate::new(
                display_name(&session),
                &form,
                &message,
            ))?;
            Ok(html(status, page))
        }
    }
}

async fn publish(
    data: &AppState,
    session: &Session,
    form: &PostForm,
    uploads: Vec<(String, Vec<u8>)>,
) -> CoreResult<Post> {
    // validate first so a rejected form leaves no orphaned uploads
    let mut post = parse_post_form(form)?.into_validated()?;
    for (filename, bytes) in uploads {
        let media = data.journal.attach_media(session, &filename, bytes).await?;
        post.media.push(media);
    }
    data.journal.add_post(session, post).await
}

/// Converts raw form strings into a payload. Blank inputs become `None`.
pub fn parse_post_form(form: &PostForm) -> CoreResult<NewPost> {
    let tags = Some(form.tags.trim())
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect()
        });

    Ok(NewPost {
        title: form.title.clone(),
        description: text(&form.description),
        media: Vec::new(),
        location_name: text(&form.location_name),
        latitude: number("latitude", &form.latitude)?,
        longitude: number("longitude", &form.longitude)?,
        mood: text(&form.mood),
        tags,
        positive_reflection: text(&form.positive_reflection),
        negative_reflection: text(&form.negative_reflection),
        physical_effort: number("physical_effort", &form.physical_effort)?,
        economic_effort: number("economic_effort", &form.economic_effort)?,
        spent: number("spent", &form.spent)?,
    })
}

fn text(raw: &str) -> Option<String> {
    Some(raw.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn number<T: std::str::FromStr>(field: &str, raw: &str) -> CoreResult<Option<T>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| AppError::ValidationError(format!("{field} is not a valid number")))
}

// --- settings ---

pub async fn settings_page(
    data: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<SettingsQuery>,
) -> PageResult {
    let Some(session) = optional_session(&req, &data).await? else {
        return Ok(see_other(SIGN_IN_PATH));
    };
    let notice = match query.saved.as_deref() {
        Some("profile") => "Profile updated.",
        Some("password") => "Password changed.",
        _ => "",
    };
    settings_response(&session, StatusCode::OK, notice, "")
}

fn settings_response(
    session: &Session,
    status: StatusCode,
    notice: &str,
    error: &str,
) -> PageResult {
    let page = render(&SettingsTemplate::new(
        &session.user,
        display_name(session),
        notice,
        error,
    ))?;
    Ok(html(status, page))
}

pub async fn profile_form(
    data: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<ProfileRequest>,
) -> PageResult {
    let Some(session) = optional_session(&req, &data).await? else {
        return Ok(see_other(SIGN_IN_PATH));
    };
    match data
        .identity
        .update_profile(&session.access_token, &form.full_name)
        .await
    {
        Ok(_) => Ok(see_other("/settings?saved=profile")),
        Err(err) => {
            let (status, message) = rejected(err)?;
            settings_response(&session, status, "", &message)
        }
    }
}

pub async fn password_form(
    data: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<PasswordRequest>,
) -> PageResult {
    let Some(session) = optional_session(&req, &data).await? else {
        return Ok(see_other(SIGN_IN_PATH));
    };
    let result = if form.new_password != form.confirm_password {
        Err(AppError::validation("new passwords do not match"))
    } else {
        data.identity
            .update_password(
                &session.access_token,
                &form.current_password,
                &form.new_password,
            )
            .await
    };
    match result {
        Ok(()) => Ok(see_other("/settings?saved=password")),
        Err(err) => {
            let (status, message) = rejected(err)?;
            settings_response(&session, status, "", &message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> PostForm {
        let mut form = PostForm::default();
        for (name, value) in pairs {
            form.set(name, value.to_string());
        }
        form
    }

    #[test]
    fn blank_inputs_become_missing_fields() {
        let post = parse_post_form(&form(&[("title", "Lagos"), ("spent", "  ")])).unwrap();
        assert_eq!(post.title, "Lagos");
        assert_eq!(post.spent, None);
        assert_eq!(post.tags, None);
        assert_eq!(post.mood, None);
    }

    #[test]
    fn numbers_and_tags_are_parsed() {
        let post = parse_post_form(&form(&[
            ("title", "Lagos"),
            ("tags", "beach, surf ,,"),
            ("physical_effort", "4"),
            ("spent", "80.5"),
            ("latitude", "37.1"),
        ]))
        .unwrap();
        assert_eq!(post.tags, Some(vec!["beach".to_string(), "surf".to_string()]));
        assert_eq!(post.physical_effort, Some(4));
        assert_eq!(post.spent, Some(80.5));
        assert_eq!(post.latitude, Some(37.1));
    }

    #[test]
    fn malformed_number_is_a_validation_error() {
        let err = parse_post_form(&form(&[("title", "Lagos"), ("economic_effort", "lots")]))
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn only_user_errors_are_rendered_back() {
        assert!(rejected(AppError::validation("bad")).is_ok());
        assert!(rejected(AppError::Conflict("dup".into())).is_ok());
        assert!(rejected(AppError::internal("disk")).is_err());
    }
}
