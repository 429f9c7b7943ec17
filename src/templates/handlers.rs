use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    error::AppError,
    state::AppState,
    templates::{
        dto::{
            CategoryResponse, CreateTemplateRequest, RenderRequest, TemplateMutationResponse,
            TemplateResponse, UpdateTemplateRequest,
        },
        services::{self, TemplateListing},
    },
};

pub fn template_routes() -> Router<AppState> {
    Router::new()
        .route("/api/templates", post(create_template).get(list_templates))
        .route(
            "/api/templates/:key",
            get(list_category).put(update_template).delete(delete_template),
        )
        .route("/api/templateById/:id", get(get_template))
}

pub fn render_routes() -> Router<AppState> {
    Router::new().route("/api/render-template/:id", post(render_template))
}

fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::invalid("Invalid template ID format"))
}

/// Filename for the download header; anything outside a safe set becomes `_`.
fn attachment_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "template".into()
    } else {
        cleaned
    }
}

#[instrument(skip(state, body))]
pub async fn create_template(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<TemplateMutationResponse>), AppError> {
    let (template, lists) = services::create_template(&state, user_id, body).await?;
    Ok((
        StatusCode::CREATED,
        Json(TemplateMutationResponse {
            message: "Template saved successfully",
            template,
            user: lists.counts(),
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_templates(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<TemplateListing>, AppError> {
    Ok(Json(services::list_templates(&state, user_id).await?))
}

#[instrument(skip(state))]
pub async fn list_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(category): Path<String>,
) -> Result<Json<CategoryResponse>, AppError> {
    let (category, templates) = services::list_category(&state, user_id, &category).await?;
    Ok(Json(CategoryResponse {
        category: category.as_str(),
        templates,
    }))
}

#[instrument(skip(state))]
pub async fn get_template(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TemplateResponse>, AppError> {
    let template = services::get_template(&state, user_id, parse_id(&id)?).await?;
    Ok(Json(TemplateResponse {
        message: "Template retrieved successfully",
        template,
    }))
}

#[instrument(skip(state, body))]
pub async fn update_template(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateTemplateRequest>,
) -> Result<Json<TemplateMutationResponse>, AppError> {
    let (template, lists) =
        services::update_template(&state, user_id, parse_id(&id)?, body).await?;
    Ok(Json(TemplateMutationResponse {
        message: "Template updated successfully",
        template,
        user: lists.counts(),
    }))
}

#[instrument(skip(state))]
pub async fn delete_template(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    services::delete_template(&state, user_id, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, body))]
pub async fn render_template(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    let values = RenderRequest::from_body(&body)?.into_values()?;
    let (name, html) = services::render_template(&state, user_id, id, &values).await?;

    let disposition = format!(r#"attachment; filename="{}.html""#, attachment_name(&name));
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        html,
    )
        .into_response())
}
