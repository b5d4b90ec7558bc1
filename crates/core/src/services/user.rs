//! Administrator accounts.
//!
//! Sessions are issued elsewhere; this service resolves bearer tokens and
//! creates accounts with a fresh token.

use chrono::Utc;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use survey_common::{AppError, AppResult, IdGenerator};
use survey_db::entities::user;
use survey_db::repositories::UserRepository;
use validator::Validate;

/// Input for creating an administrator.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdminInput {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub name: Option<String>,
    #[serde(default)]
    pub is_super_admin: bool,
}

/// A created administrator with their token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedAdmin {
    pub user: user::Model,
    pub token: String,
}

/// Service for administrator accounts.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self {
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Resolve a bearer token to its administrator.
    pub async fn authenticate(&self, token: &str) -> AppResult<user::Model> {
        if token.is_empty() {
            return Err(AppError::Unauthorized);
        }
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Create an administrator account.
    pub async fn create_admin(&self, input: CreateAdminInput) -> AppResult<CreatedAdmin> {
        input.validate()?;

        let token = self.id_gen.generate_token();
        let user = self
            .user_repo
            .create(user::ActiveModel {
                id: Set(self.id_gen.generate()),
                username: Set(input.username),
                name: Set(input.name),
                token: Set(Some(token.clone())),
                is_super_admin: Set(input.is_super_admin),
                created_at: Set(Utc::now().into()),
            })
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "Administrator created");
        Ok(CreatedAdmin { user, token })
    }

    /// Create a super admin named `username` unless the name is taken.
    ///
    /// Returns the token of a newly created account.
    pub async fn ensure_super_admin(&self, username: &str) -> AppResult<Option<String>> {
        if self.user_repo.find_by_username(username).await?.is_some() {
            return Ok(None);
        }
        let created = self
            .create_admin(CreateAdminInput {
                username: username.to_string(),
                name: None,
                is_super_admin: true,
            })
            .await?;
        Ok(Some(created.token))
    }
}
