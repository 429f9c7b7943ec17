use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::instrument;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, ProfileResponse, PublicUser, RegisterRequest},
        jwt::AuthUser,
        services::{self, TokenPair},
    },
    error::AppError,
    state::AppState,
};

pub const REFRESH_COOKIE: &str = "refreshtoken";
pub const REFRESH_PATH: &str = "/user/refresh_token";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/user/register", post(register))
        .route("/user/login", post(login))
        .route(REFRESH_PATH, post(refresh))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/user/profile", get(get_profile))
}

fn refresh_cookie(st: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .path(REFRESH_PATH)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(st.jwt.refresh_ttl.as_secs() as i64))
        .build()
}

fn respond(
    st: &AppState,
    jar: CookieJar,
    user: PublicUser,
    tokens: TokenPair,
) -> (CookieJar, Json<AuthResponse>) {
    let jar = jar.add(refresh_cookie(st, tokens.refresh));
    (
        jar,
        Json(AuthResponse {
            access_token: tokens.access,
            user,
        }),
    )
}

#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let (user, tokens) = services::register(&state, payload).await?;
    Ok(respond(&state, jar, PublicUser::from(&user), tokens))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let (user, tokens) = services::authenticate(&state, payload).await?;
    Ok(respond(&state, jar, PublicUser::from(&user), tokens))
}

#[instrument(skip(state, jar))]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Unauthenticated("Missing refresh token".into()))?;
    let (user, tokens) = services::refresh(&state, &token).await?;
    Ok(respond(&state, jar, PublicUser::from(&user), tokens))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = services::profile(&state, user_id).await?;
    Ok(Json(ProfileResponse {
        name: user.name,
        email: user.email,
        templates: user.templates,
    }))
}
