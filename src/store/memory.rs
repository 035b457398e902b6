use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::store::{NewUser, PlanType, StoreError, User, UserStore};

/// Mutex-guarded map with the same semantics as the Postgres store. Every
/// trait method takes the lock exactly once, so each mutation is one atomic
/// step and no await point sits inside a critical section.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, User>>, StoreError> {
        self.users
            .lock()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("user map mutex poisoned")))
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.lock()?;
        if users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = new_user.into_user();
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        self.lock()?.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.values().find(|u| u.email == email).cloned())
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.lock()?;
        if users
            .values()
            .any(|u| u.email == user.email && u.id != user.id)
        {
            return Err(StoreError::DuplicateEmail);
        }
        match users.get_mut(&user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn consume_credit(&self, id: Uuid) -> Result<i64, StoreError> {
        let mut users = self.lock()?;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if user.credits <= 0 {
            return Err(StoreError::InsufficientCredits);
        }
        user.credits -= 1;
        Ok(user.credits)
    }

    async fn add_credits(&self, id: Uuid, amount: i64) -> Result<i64, StoreError> {
        let mut users = self.lock()?;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.credits += amount;
        Ok(user.credits)
    }

    async fn change_plan(&self, id: Uuid, plan: PlanType, bonus: i64) -> Result<User, StoreError> {
        let mut users = self.lock()?;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.plan_type = plan;
        user.credits += bonus;
        Ok(user.clone())
    }
}
