//! # ab-api Handlers
//!
//! JSON endpoints. Each handler extracts and forwards to [`BoardService`];
//! validation and persistence rules live there.

use std::sync::Arc;

use ab_core::error::AppError;
use ab_core::forms::{AdForm, AdUpdateForm, CategoryForm, CommentForm, ProfileForm, RegisterForm};
use ab_core::listing::ListingParams;
use ab_core::models::{Ad, AdId, AdWithCommentCount, Category, CategorySummary, Comment, Profile, ProfileId};
use ab_core::services::BoardService;
use ab_core::traits::MediaStore;
use axum::extract::multipart::Multipart;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ApiError;

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: BoardService,
    pub media: Arc<dyn MediaStore>,
}

impl AppState {
    pub fn new(service: BoardService, media: Arc<dyn MediaStore>) -> Self {
        Self { service, media }
    }

    pub fn image_urls(&self, ad: &Ad) -> (Option<String>, Option<String>) {
        match &ad.image {
            Some(media_id) => (
                Some(self.media.url(media_id)),
                Some(self.media.thumbnail_url(media_id)),
            ),
            None => (None, None),
        }
    }
}

/// An ad as the JSON API returns it, with resolved image URLs.
#[derive(Debug, Serialize)]
pub struct AdResource {
    #[serde(flatten)]
    pub ad: Ad,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl AdResource {
    fn new(state: &AppState, ad: Ad) -> Self {
        let (image_url, thumbnail_url) = state.image_urls(&ad);
        Self {
            ad,
            image_url,
            thumbnail_url,
        }
    }
}

fn resources(state: &AppState, ads: Vec<Ad>) -> Vec<AdResource> {
    ads.into_iter().map(|ad| AdResource::new(state, ad)).collect()
}

// ── Extraction helpers ──────────────────────────────────────────────────────

fn payload<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError(AppError::validation(rejection.body_text())))
}

fn path_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError(AppError::validation("A valid integer id is required.")))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| ApiError(AppError::validation(rejection.body_text())))
}

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

// ── Accounts ────────────────────────────────────────────────────────────────

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterForm>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (account, profile) = state.service.register(payload(body)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": account.id,
            "username": account.username,
            "email": account.email,
            "profile_id": profile.id,
        })),
    ))
}

pub async fn update_profile(
    State(state): State<AppState>,
    id: Result<Path<ProfileId>, PathRejection>,
    body: Result<Json<ProfileForm>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
    let profile = state
        .service
        .update_profile(path_id(id)?, payload(body)?)
        .await?;
    Ok(Json(profile))
}

pub async fn profile_ads(
    State(state): State<AppState>,
    id: Result<Path<ProfileId>, PathRejection>,
) -> Result<Json<Vec<AdResource>>, ApiError> {
    let ads = state.service.profile_ads(path_id(id)?).await?;
    Ok(Json(resources(&state, ads)))
}

// ── Categories ──────────────────────────────────────────────────────────────

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategorySummary>>, ApiError> {
    Ok(Json(state.service.categories().await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    body: Result<Json<CategoryForm>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.service.create_category(payload(body)?).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

// ── Ads ─────────────────────────────────────────────────────────────────────

pub async fn list_ads(
    State(state): State<AppState>,
    params: Result<Query<ListingParams>, QueryRejection>,
) -> Result<Json<Vec<AdResource>>, ApiError> {
    let ads = state.service.list_ads(&query(params)?).await?;
    Ok(Json(resources(&state, ads)))
}

pub async fn ads_last_month(
    State(state): State<AppState>,
) -> Result<Json<Vec<AdResource>>, ApiError> {
    let ads = state.service.ads_last_month().await?;
    Ok(Json(resources(&state, ads)))
}

pub async fn ads_with_comment_counts(
    State(state): State<AppState>,
) -> Result<Json<Vec<AdWithCommentCount>>, ApiError> {
    Ok(Json(state.service.ads_with_comment_counts().await?))
}

pub async fn create_ad(
    State(state): State<AppState>,
    body: Result<Json<AdForm>, JsonRejection>,
) -> Result<(StatusCode, Json<AdResource>), ApiError> {
    let ad = state.service.create_ad(payload(body)?).await?;
    Ok((StatusCode::CREATED, Json(AdResource::new(&state, ad))))
}

pub async fn get_ad(
    State(state): State<AppState>,
    id: Result<Path<AdId>, PathRejection>,
) -> Result<Json<AdResource>, ApiError> {
    let ad = state.service.get_ad(path_id(id)?).await?;
    Ok(Json(AdResource::new(&state, ad)))
}

pub async fn update_ad(
    State(state): State<AppState>,
    id: Result<Path<AdId>, PathRejection>,
    body: Result<Json<AdUpdateForm>, JsonRejection>,
) -> Result<Json<AdResource>, ApiError> {
    let ad = state.service.update_ad(path_id(id)?, payload(body)?).await?;
    Ok(Json(AdResource::new(&state, ad)))
}

pub async fn delete_ad(
    State(state): State<AppState>,
    id: Result<Path<AdId>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_ad(path_id(id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Accepts a multipart form with an `image` file field.
pub async fn upload_image(
    State(state): State<AppState>,
    id: Result<Path<AdId>, PathRejection>,
    mut multipart: Multipart,
) -> Result<Json<AdResource>, ApiError> {
    let id = path_id(id)?;
    state.service.get_ad(id).await?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(AppError::validation(e.body_text())))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(ApiError(AppError::validation(INVALID_IMAGE)));
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError(AppError::validation(e.body_text())))?;

        let media_id = state
            .media
            .save_upload(data.to_vec(), &content_type)
            .await
            .map_err(|err| {
                tracing::warn!(ad_id = id, error = %err, "rejected image upload");
                ApiError(AppError::validation(INVALID_IMAGE))
            })?;
        let ad = state.service.attach_image(id, media_id).await?;
        return Ok(Json(AdResource::new(&state, ad)));
    }

    Err(ApiError(AppError::validation("No image file was submitted.")))
}

// ── Comments ────────────────────────────────────────────────────────────────

pub async fn list_comments(
    State(state): State<AppState>,
    id: Result<Path<AdId>, PathRejection>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    Ok(Json(state.service.comments(path_id(id)?).await?))
}

pub async fn add_comment(
    State(state): State<AppState>,
    id: Result<Path<AdId>, PathRejection>,
    body: Result<Json<CommentForm>, JsonRejection>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let comment = state
        .service
        .add_comment(path_id(id)?, payload(body)?)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
