use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::store::{NewUser, PlanType, StoreError, User, UserStore};

/// Postgres-backed store. The unique index on `email` and the conditional
/// `UPDATE ... RETURNING` statements carry the atomicity contract; nothing
/// here does a check-then-write.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        // 23505 = unique_violation; the only unique index is on email.
        if db.code().as_deref() == Some("23505") {
            return StoreError::DuplicateEmail;
        }
    }
    StoreError::Backend(e.into())
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let user = new_user.into_user();
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, credits, plan_type,
                               created_at, last_login, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.credits)
        .bind(user.plan_type)
        .bind(user.created_at)
        .bind(user.last_login)
        .bind(user.is_active)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, credits, plan_type,
                   created_at, last_login, is_active
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        user.ok_or(StoreError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, credits, plan_type,
                   created_at, last_login, is_active
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = $2, email = $3, password_hash = $4, credits = $5,
                plan_type = $6, last_login = $7, is_active = $8
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.credits)
        .bind(user.plan_type)
        .bind(user.last_login)
        .bind(user.is_active)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn consume_credit(&self, id: Uuid) -> Result<i64, StoreError> {
        let remaining = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users
            SET credits = credits - 1
            WHERE id = $1 AND credits > 0
            RETURNING credits
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match remaining {
            Some(credits) => Ok(credits),
            // Distinguish a missing account from an exhausted balance.
            None => {
                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)",
                )
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx)?;
                if exists {
                    Err(StoreError::InsufficientCredits)
                } else {
                    Err(StoreError::NotFound)
                }
            }
        }
    }

    async fn add_credits(&self, id: Uuid, amount: i64) -> Result<i64, StoreError> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users
            SET credits = credits + $2
            WHERE id = $1
            RETURNING credits
            "#,
        )
        .bind(id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        total.ok_or(StoreError::NotFound)
    }

    async fn change_plan(&self, id: Uuid, plan: PlanType, bonus: i64) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET plan_type = $2, credits = credits + $3
            WHERE id = $1
            RETURNING id, name, email, password_hash, credits, plan_type,
                      created_at, last_login, is_active
            "#,
        )
        .bind(id)
        .bind(plan)
        .bind(bonus)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        user.ok_or(StoreError::NotFound)
    }
}
