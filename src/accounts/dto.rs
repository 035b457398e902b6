use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::store::{PlanType, User};

/// Request body for user registration. Fields are optional so a missing one
/// can be reported by name instead of failing whole-body deserialization.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddCreditsRequest {
    #[serde(default)]
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpgradePlanRequest {
    pub plan_type: Option<String>,
}

/// Public part of a user returned to the client. There is no
/// `password_hash` field here, so it cannot appear on any response path.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub credits: i64,
    pub plan_type: PlanType,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    pub is_active: bool,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            credits: user.credits,
            plan_type: user.plan_type,
            created_at: user.created_at,
            last_login: user.last_login,
            is_active: user.is_active,
        }
    }
}

/// Response for register, login and upgrade-plan.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub message: String,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct UseCreditResponse {
    pub message: String,
    pub remaining_credits: i64,
}

#[derive(Debug, Serialize)]
pub struct AddCreditsResponse {
    pub message: String,
    pub total_credits: i64,
}

#[derive(Debug, Serialize)]
pub struct CheckCreditsResponse {
    pub user_id: Uuid,
    pub credits: i64,
    pub plan_type: PlanType,
}
