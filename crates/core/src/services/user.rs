//! User service.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use agora_common::{AppError, AppResult, Config, IdGenerator};
use agora_db::{entities::user, repositories::UserRepository};
use chrono::Utc;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::capability::{CapabilityService, Subject};

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    capabilities: CapabilityService,
    id_gen: IdGenerator,
    admin_usernames: Vec<String>,
}

/// Input for creating a new user.
#[derive(Debug, Deserialize, Validate)]
pub struct SignupInput {
    #[validate(length(min = 1, max = 100))]
    pub username: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Input for signing in.
#[derive(Debug, Deserialize, Validate)]
pub struct SigninInput {
    #[validate(length(min = 1, max = 100))]
    pub username: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// A signed-in account and its capability token.
#[derive(Debug, Serialize)]
pub struct AccountSession {
    pub user: user::Model,
    pub token: String,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub fn new(user_repo: UserRepository, capabilities: CapabilityService, config: &Config) -> Self {
        Self {
            user_repo,
            capabilities,
            id_gen: IdGenerator::new(),
            admin_usernames: config
                .auth
                .admin_usernames
                .iter()
                .map(|name| name.trim().to_lowercase())
                .collect(),
        }
    }

    /// Create a new account and sign it in.
    pub async fn signup(&self, mut input: SignupInput) -> AppResult<AccountSession> {
        input.username = input.username.trim().to_string();
        input.validate()?;

        if self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        let password_hash = hash_password(&input.password)?;
        let username_lower = input.username.to_lowercase();
        let is_admin = self.admin_usernames.contains(&username_lower);

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(input.username),
            username_lower: Set(username_lower),
            password_hash: Set(password_hash),
            is_admin: Set(is_admin),
            created_at: Set(Utc::now().into()),
        };
        let user = self.user_repo.create(model).await?;

        tracing::info!(user_id = %user.id, is_admin = user.is_admin, "Account created");

        self.session(user)
    }

    /// Sign in with username and password.
    ///
    /// Unknown usernames and wrong passwords fail identically.
    pub async fn signin(&self, input: SigninInput) -> AppResult<AccountSession> {
        input.validate()?;

        let Some(user) = self.user_repo.find_by_username(input.username.trim()).await? else {
            return Err(AppError::Unauthorized);
        };

        if !verify_password(&input.password, &user.password_hash)? {
            tracing::debug!(user_id = %user.id, "Sign-in with wrong password");
            return Err(AppError::Unauthorized);
        }

        self.session(user)
    }

    fn session(&self, user: user::Model) -> AppResult<AccountSession> {
        let token = self.capabilities.issue(Subject::Account {
            user_id: user.id.clone(),
            is_admin: user.is_admin,
        })?;
        Ok(AccountSession { user, token })
    }
}

/// Hash a password (or organizer code) with Argon2.
pub(crate) fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
pub(crate) fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
