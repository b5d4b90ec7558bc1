//! Survey permissions.
//!
//! A user may administer a survey they own, any survey when they are a super
//! admin, or a survey they were granted through a manage record.

use chrono::Utc;
use sea_orm::Set;
use survey_common::{AppError, AppResult, IdGenerator};
use survey_db::entities::{manage, survey, user};
use survey_db::repositories::{ManageRepository, SurveyRepository, UserRepository};

/// Service for survey permissions.
#[derive(Clone)]
pub struct PermissionService {
    survey_repo: SurveyRepository,
    user_repo: UserRepository,
    manage_repo: ManageRepository,
    id_gen: IdGenerator,
}

impl PermissionService {
    /// Create a new permission service.
    #[must_use]
    pub const fn new(
        survey_repo: SurveyRepository,
        user_repo: UserRepository,
        manage_repo: ManageRepository,
    ) -> Self {
        Self {
            survey_repo,
            user_repo,
            manage_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Check that `user` may administer a survey and return it.
    pub async fn check(&self, user: &user::Model, survey_id: &str) -> AppResult<survey::Model> {
        let survey = self.survey_repo.get_by_id(survey_id).await?;
        if user.is_super_admin
            || survey.user_id == user.id
            || self.manage_repo.exists(&user.id, survey_id).await?
        {
            return Ok(survey);
        }
        Err(AppError::Forbidden(
            "You have no permission for this survey".to_string(),
        ))
    }

    /// Only owners and super admins may change who manages a survey.
    async fn check_owner(&self, actor: &user::Model, survey_id: &str) -> AppResult<survey::Model> {
        let survey = self.survey_repo.get_by_id(survey_id).await?;
        if actor.is_super_admin || survey.user_id == actor.id {
            Ok(survey)
        } else {
            Err(AppError::Forbidden(
                "Only the owner can change permissions".to_string(),
            ))
        }
    }

    /// Let the user named `username` manage a survey.
    pub async fn grant(
        &self,
        actor: &user::Model,
        survey_id: &str,
        username: &str,
    ) -> AppResult<manage::Model> {
        let survey = self.check_owner(actor, survey_id).await?;
        let target = self.user_repo.get_by_username(username).await?;
        if target.id == survey.user_id {
            return Err(AppError::BadRequest(
                "The owner already manages this survey".to_string(),
            ));
        }

        let grant = self
            .manage_repo
            .create(manage::ActiveModel {
                id: Set(self.id_gen.generate()),
                user_id: Set(target.id.clone()),
                survey_id: Set(survey.id.clone()),
                created_at: Set(Utc::now().into()),
            })
            .await?;

        tracing::info!(survey_id = %survey.id, user_id = %target.id, "Permission granted");
        Ok(grant)
    }

    /// Withdraw a grant.
    pub async fn revoke(&self, actor: &user::Model, survey_id: &str, username: &str) -> AppResult<()> {
        self.check_owner(actor, survey_id).await?;
        let target = self.user_repo.get_by_username(username).await?;
        self.manage_repo.delete(&target.id, survey_id).await?;

        tracing::info!(survey_id = %survey_id, user_id = %target.id, "Permission revoked");
        Ok(())
    }

    /// Grants held by a user.
    pub async fn list_managed(&self, user: &user::Model) -> AppResult<Vec<manage::Model>> {
        self.manage_repo.find_by_user(&user.id).await
    }
}
