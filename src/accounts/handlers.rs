use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::accounts::dto::{
    AddCreditsRequest, AddCreditsResponse, CheckCreditsResponse, LoginRequest, ProfileResponse,
    RegisterRequest, UpgradePlanRequest, UseCreditResponse, UserResponse,
};
use crate::accounts::error::AccountError;
use crate::accounts::services;
use crate::state::AppState;

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile/:id", get(profile))
}

pub fn credit_routes() -> Router<AppState> {
    Router::new()
        .route("/use-credit/:id", post(use_credit))
        .route("/add-credits/:id", post(add_credits))
        .route("/check-credits/:id", get(check_credits))
        .route("/upgrade-plan/:id", post(upgrade_plan))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AccountError> {
    let user = services::register(state.store.as_ref(), payload).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: "Account created successfully".into(),
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<UserResponse>, AccountError> {
    let user = services::login(state.store.as_ref(), payload).await?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(UserResponse {
        message: "Login successful".into(),
        user: user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProfileResponse>, AccountError> {
    let user = services::profile(state.store.as_ref(), id).await?;
    Ok(Json(ProfileResponse { user: user.into() }))
}

#[instrument(skip(state))]
pub async fn use_credit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UseCreditResponse>, AccountError> {
    let remaining = services::use_credit(state.store.as_ref(), id).await?;
    info!(user_id = %id, remaining, "credit used");
    Ok(Json(UseCreditResponse {
        message: "Credit used successfully".into(),
        remaining_credits: remaining,
    }))
}

#[instrument(skip(state, payload))]
pub async fn add_credits(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddCreditsRequest>,
) -> Result<Json<AddCreditsResponse>, AccountError> {
    let amount = payload.amount;
    let total = services::add_credits(state.store.as_ref(), id, payload).await?;
    info!(user_id = %id, amount, total, "credits added");
    Ok(Json(AddCreditsResponse {
        message: format!("{amount} credits added successfully"),
        total_credits: total,
    }))
}

#[instrument(skip(state))]
pub async fn check_credits(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CheckCreditsResponse>, AccountError> {
    let user = services::profile(state.store.as_ref(), id).await?;
    Ok(Json(CheckCreditsResponse {
        user_id: user.id,
        credits: user.credits,
        plan_type: user.plan_type,
    }))
}

#[instrument(skip(state, payload))]
pub async fn upgrade_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpgradePlanRequest>,
) -> Result<Json<UserResponse>, AccountError> {
    let user = services::upgrade_plan(state.store.as_ref(), id, payload).await?;
    info!(user_id = %user.id, plan = %user.plan_type, "plan changed");
    Ok(Json(UserResponse {
        message: format!("Plan upgraded to {}", user.plan_type),
        user: user.into(),
    }))
}
