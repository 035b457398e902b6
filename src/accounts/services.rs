use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::accounts::dto::{AddCreditsRequest, LoginRequest, RegisterRequest, UpgradePlanRequest};
use crate::accounts::error::AccountError;
use crate::accounts::password;
use crate::store::{NewUser, PlanType, User, UserStore};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// A field is missing when it is absent or empty after trimming.
fn required(value: &Option<String>, field: &'static str) -> Result<String, AccountError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AccountError::MissingField(field)),
    }
}

fn required_password(value: &Option<String>) -> Result<&str, AccountError> {
    match value.as_deref() {
        Some(p) if !p.is_empty() => Ok(p),
        _ => Err(AccountError::MissingField("password")),
    }
}

/// Validate the registration payload and create the account. The store
/// enforces email uniqueness at write time, so concurrent registrations of
/// one email cannot both slip past an existence check.
pub async fn register(store: &dyn UserStore, req: RegisterRequest) -> Result<User, AccountError> {
    let name = required(&req.name, "name")?;
    let email = required(&req.email, "email")?.to_lowercase();
    let password = required_password(&req.password)?;

    if !is_valid_email(&email) {
        return Err(AccountError::InvalidEmailFormat);
    }
    if password.chars().count() < 6 {
        return Err(AccountError::WeakPassword);
    }

    let password_hash = password::hash_password(password)?;
    let user = store
        .create(NewUser {
            name,
            email,
            password_hash,
        })
        .await?;
    Ok(user)
}

/// Verify credentials and stamp `last_login`. Unknown email, wrong password
/// and deactivated account all answer with the one generic credentials
/// error, so callers cannot probe which emails exist or are disabled.
pub async fn login(store: &dyn UserStore, req: LoginRequest) -> Result<User, AccountError> {
    let email = required(&req.email, "email")?.to_lowercase();
    let password = required_password(&req.password)?;

    let Some(mut user) = store.find_by_email(&email).await? else {
        return Err(AccountError::InvalidCredentials);
    };
    if !password::verify_password(password, &user.password_hash)? {
        return Err(AccountError::InvalidCredentials);
    }
    if !user.is_active {
        return Err(AccountError::InvalidCredentials);
    }

    user.last_login = Some(OffsetDateTime::now_utc());
    store.save(&user).await?;
    Ok(user)
}

pub async fn profile(store: &dyn UserStore, id: Uuid) -> Result<User, AccountError> {
    Ok(store.get_by_id(id).await?)
}

/// Spend one credit. The store does the test-and-decrement atomically, so
/// the balance never goes negative under concurrent callers.
pub async fn use_credit(store: &dyn UserStore, id: Uuid) -> Result<i64, AccountError> {
    Ok(store.consume_credit(id).await?)
}

pub async fn add_credits(
    store: &dyn UserStore,
    id: Uuid,
    req: AddCreditsRequest,
) -> Result<i64, AccountError> {
    if req.amount <= 0 {
        return Err(AccountError::InvalidAmount);
    }
    Ok(store.add_credits(id, req.amount).await?)
}

/// Set the plan and grant its bonus. The bonus lands on every call reaching
/// a valid plan, including same-plan resubmissions and downgrades.
pub async fn upgrade_plan(
    store: &dyn UserStore,
    id: Uuid,
    req: UpgradePlanRequest,
) -> Result<User, AccountError> {
    let plan: PlanType = req
        .plan_type
        .as_deref()
        .unwrap_or("")
        .trim()
        .parse()
        .map_err(|_| AccountError::InvalidPlan)?;

    let user = store.change_plan(id, plan, plan.bonus_credits()).await?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::InMemoryStore;

    fn register_req(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: Some(name.into()),
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    fn plan_req(plan: &str) -> UpgradePlanRequest {
        UpgradePlanRequest {
            plan_type: Some(plan.into()),
        }
    }

    async fn seed(store: &InMemoryStore) -> User {
        register(store, register_req("Ann", "ann@test.com", "secret1"))
            .await
            .expect("seed user")
    }

    async fn set_credits(store: &InMemoryStore, user: &User, credits: i64) {
        let mut user = store.get_by_id(user.id).await.unwrap();
        user.credits = credits;
        store.save(&user).await.unwrap();
    }

    #[tokio::test]
    async fn registration_defaults_to_free_plan_with_100_credits() {
        let store = InMemoryStore::new();
        let user = seed(&store).await;

        assert_eq!(user.credits, 100);
        assert_eq!(user.plan_type, PlanType::Free);
        assert!(user.is_active);
        assert!(user.last_login.is_none());
        assert_ne!(user.password_hash, "secret1");
    }

    #[tokio::test]
    async fn registration_reports_the_first_missing_field() {
        let store = InMemoryStore::new();

        let err = register(
            &store,
            RegisterRequest {
                name: None,
                email: None,
                password: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AccountError::MissingField("name")));

        let err = register(
            &store,
            RegisterRequest {
                name: Some("Ann".into()),
                email: Some("   ".into()),
                password: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AccountError::MissingField("email")));

        let err = register(
            &store,
            RegisterRequest {
                name: Some("Ann".into()),
                email: Some("ann@test.com".into()),
                password: Some("".into()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AccountError::MissingField("password")));
    }

    #[tokio::test]
    async fn registration_rejects_malformed_emails() {
        let store = InMemoryStore::new();
        for email in ["no-at.test.com", "user@nodot", "user@host.c", "@host.com"] {
            let err = register(&store, register_req("Ann", email, "secret1"))
                .await
                .unwrap_err();
            assert!(
                matches!(err, AccountError::InvalidEmailFormat),
                "expected invalid format for {email}"
            );
        }
    }

    #[tokio::test]
    async fn registration_rejects_short_passwords() {
        let store = InMemoryStore::new();
        let err = register(&store, register_req("Ann", "ann@test.com", "12345"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::WeakPassword));

        // Exactly six characters is allowed.
        register(&store, register_req("Ann", "ann@test.com", "123456"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn duplicate_email_yields_one_success_and_one_conflict() {
        let store = InMemoryStore::new();
        register(&store, register_req("Ann", "ANN@Test.com", "secret1"))
            .await
            .unwrap();

        let err = register(&store, register_req("Ann", "ann@test.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Conflict));
    }

    #[tokio::test]
    async fn login_stamps_last_login() {
        let store = InMemoryStore::new();
        seed(&store).await;

        let before = OffsetDateTime::now_utc();
        let user = login(&store, login_req(" ANN@test.com ", "secret1"))
            .await
            .unwrap();
        assert!(user.last_login.expect("last_login set") >= before);

        let persisted = store.get_by_id(user.id).await.unwrap();
        assert!(persisted.last_login.is_some());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_share_one_error() {
        let store = InMemoryStore::new();
        seed(&store).await;

        let err = login(&store, login_req("ann@test.com", "wrong-pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));

        let err = login(&store, login_req("ghost@test.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
    }

    #[tokio::test]
    async fn deactivated_account_gets_the_same_generic_error() {
        let store = InMemoryStore::new();
        let mut user = seed(&store).await;
        user.is_active = false;
        store.save(&user).await.unwrap();

        let err = login(&store, login_req("ann@test.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let store = InMemoryStore::new();
        let err = login(
            &store,
            LoginRequest {
                email: None,
                password: Some("secret1".into()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AccountError::MissingField("email")));

        let err = login(
            &store,
            LoginRequest {
                email: Some("ann@test.com".into()),
                password: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AccountError::MissingField("password")));
    }

    #[tokio::test]
    async fn use_credit_decrements_until_exhausted() {
        let store = InMemoryStore::new();
        let user = seed(&store).await;
        set_credits(&store, &user, 1).await;

        let remaining = use_credit(&store, user.id).await.unwrap();
        assert_eq!(remaining, 0);

        let err = use_credit(&store, user.id).await.unwrap_err();
        assert!(matches!(err, AccountError::InsufficientCredits));
        assert_eq!(store.get_by_id(user.id).await.unwrap().credits, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_use_credit_never_drives_the_balance_negative() {
        let store = Arc::new(InMemoryStore::new());
        let user = seed(store.as_ref()).await;
        set_credits(store.as_ref(), &user, 1).await;
        let id = user.id;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                use_credit(store.as_ref(), id).await
            }));
        }

        let mut successes = 0;
        let mut failures = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(remaining) => {
                    successes += 1;
                    assert_eq!(remaining, 0);
                }
                Err(AccountError::InsufficientCredits) => failures += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(failures, 7);
        assert_eq!(store.get_by_id(id).await.unwrap().credits, 0);
    }

    #[tokio::test]
    async fn add_credits_rejects_non_positive_amounts() {
        let store = InMemoryStore::new();
        let user = seed(&store).await;
        set_credits(&store, &user, 10).await;

        for amount in [0, -5] {
            let err = add_credits(&store, user.id, AddCreditsRequest { amount })
                .await
                .unwrap_err();
            assert!(matches!(err, AccountError::InvalidAmount));
        }
        assert_eq!(store.get_by_id(user.id).await.unwrap().credits, 10);

        let total = add_credits(&store, user.id, AddCreditsRequest { amount: 50 })
            .await
            .unwrap();
        assert_eq!(total, 60);
    }

    #[tokio::test]
    async fn upgrade_plan_grants_the_bonus_on_every_call() {
        let store = InMemoryStore::new();
        let user = seed(&store).await;

        let user = upgrade_plan(&store, user.id, plan_req("pro")).await.unwrap();
        assert_eq!(user.plan_type, PlanType::Pro);
        assert_eq!(user.credits, 600);

        // Same-plan resubmission grants again.
        let user = upgrade_plan(&store, user.id, plan_req("PRO")).await.unwrap();
        assert_eq!(user.credits, 1100);

        // Downgrading to free grants nothing but still switches the plan.
        let user = upgrade_plan(&store, user.id, plan_req("free"))
            .await
            .unwrap();
        assert_eq!(user.plan_type, PlanType::Free);
        assert_eq!(user.credits, 1100);

        let user = upgrade_plan(&store, user.id, plan_req("premium"))
            .await
            .unwrap();
        assert_eq!(user.plan_type, PlanType::Premium);
        assert_eq!(user.credits, 2100);
    }

    #[tokio::test]
    async fn upgrade_plan_rejects_unknown_plans_without_mutating() {
        let store = InMemoryStore::new();
        let user = seed(&store).await;

        let err = upgrade_plan(&store, user.id, plan_req("gold"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidPlan));

        let err = upgrade_plan(&store, user.id, UpgradePlanRequest { plan_type: None })
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidPlan));

        let persisted = store.get_by_id(user.id).await.unwrap();
        assert_eq!(persisted.plan_type, PlanType::Free);
        assert_eq!(persisted.credits, 100);
    }

    #[tokio::test]
    async fn profile_misses_for_unknown_ids() {
        let store = InMemoryStore::new();
        let err = profile(&store, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AccountError::NotFound));
    }
}
