use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

mod memory;
mod postgres;
mod types;

pub use memory::InMemoryStore;
pub use postgres::PgUserStore;
pub use types::{NewUser, PlanType, User, STARTING_CREDITS};

/// Failures surfaced by a [`UserStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("no credits remaining")]
    InsufficientCredits,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Durable account storage. Injected into every service operation as a
/// trait object, so handlers never touch a concrete backend.
///
/// Implementations must make `create` enforce email uniqueness at write
/// time (not check-then-insert) and make `consume_credit` a single atomic
/// test-and-decrement, so the balance can never go negative under
/// concurrent callers.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<User, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Overwrite an existing record. Fails with `DuplicateEmail` if the
    /// email was changed to one another account already holds.
    async fn save(&self, user: &User) -> Result<(), StoreError>;

    /// Atomically decrement the balance if it is positive; returns the
    /// remaining credits.
    async fn consume_credit(&self, id: Uuid) -> Result<i64, StoreError>;

    /// Atomically increment the balance; returns the new total.
    async fn add_credits(&self, id: Uuid, amount: i64) -> Result<i64, StoreError>;

    /// Set the plan and grant the bonus in one write; returns the updated
    /// record.
    async fn change_plan(&self, id: Uuid, plan: PlanType, bonus: i64) -> Result<User, StoreError>;
}
