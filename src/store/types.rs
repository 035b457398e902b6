use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// Credits granted to every freshly registered account.
pub const STARTING_CREDITS: i64 = 100;

/// Subscription tier controlling bonus credit grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "plan_type", rename_all = "lowercase")]
pub enum PlanType {
    Free,
    Pro,
    Premium,
}

impl PlanType {
    /// Credits granted when a plan change lands on this tier.
    pub fn bonus_credits(self) -> i64 {
        match self {
            PlanType::Free => 0,
            PlanType::Pro => 500,
            PlanType::Premium => 1000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanType::Free => "free",
            PlanType::Pro => "pro",
            PlanType::Premium => "premium",
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(PlanType::Free),
            "pro" => Ok(PlanType::Pro),
            "premium" => Ok(PlanType::Premium),
            _ => Err(()),
        }
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub credits: i64,
    pub plan_type: PlanType,
    pub created_at: OffsetDateTime,
    pub last_login: Option<OffsetDateTime>,
    pub is_active: bool,
}

/// Input for [`super::UserStore::create`]; everything else is assigned by
/// the store at creation time.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

impl NewUser {
    /// Materialize the full record with creation-time defaults.
    pub fn into_user(self) -> User {
        User {
            id: Uuid::new_v4(),
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            credits: STARTING_CREDITS,
            plan_type: PlanType::Free,
            created_at: OffsetDateTime::now_utc(),
            last_login: None,
            is_active: true,
        }
    }
}
