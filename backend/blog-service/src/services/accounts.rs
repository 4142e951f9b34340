use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::cache::ProfileCache;
use crate::db::{comment_repo, post_repo, user_repo};
use crate::error::{AppError, Result};
use crate::middleware::permissions::{
    check_password_change, check_profile_modification, require_authenticated, Identity,
    Permission, Principal, DEFAULT_USER_PERMISSIONS,
};
use crate::models::{Page, PostSummary, User, UserId};
use crate::security::{hash_password, verify_password, JwtKeys};
use crate::services::Pagination;

pub const PROFILE_RECENT_POSTS: i64 = 5;
pub const PROFILE_RECENT_COMMENTS: i64 = 5;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 150))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub old_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
    #[validate(must_match(other = "new_password"))]
    pub new_password_confirm: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: User,
    /// Usernames this user follows
    pub following: Vec<String>,
    pub recent_posts: Vec<PostSummary>,
    /// Rendered as `"<post title>: <body>"`
    pub recent_comments: Vec<String>,
}

#[derive(Clone)]
pub struct AccountService {
    pool: PgPool,
    keys: Arc<JwtKeys>,
    profile_cache: Option<ProfileCache>,
}

impl AccountService {
    pub fn new(pool: PgPool, keys: Arc<JwtKeys>, profile_cache: Option<ProfileCache>) -> Self {
        Self {
            pool,
            keys,
            profile_cache,
        }
    }

    /// Create an account with the default permission set and sign the user in.
    pub async fn register(&self, input: RegisterRequest) -> Result<AuthResponse> {
        input.validate()?;
        let username = input.username.trim();
        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
        {
            return Err(AppError::ValidationError(
                "username may contain only letters, digits and @/./+/-/_".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password)?;
        let codenames: Vec<String> = DEFAULT_USER_PERMISSIONS
            .iter()
            .map(|p| p.codename().to_string())
            .collect();

        let mut tx = self.pool.begin().await?;
        let user = user_repo::create_user(
            &mut tx,
            &user_repo::NewUser {
                username,
                email: input.email.trim(),
                first_name: input.first_name.trim(),
                last_name: input.last_name.trim(),
                password_hash: &password_hash,
            },
        )
        .await?;
        user_repo::grant_permissions(&mut tx, user.id, &codenames).await?;
        tx.commit().await?;

        info!(user_id = user.id, username = %user.username, "user registered");

        let principal = Principal {
            id: user.user_id(),
            username: user.username.clone(),
            is_superuser: user.is_superuser,
            permissions: DEFAULT_USER_PERMISSIONS.iter().copied().collect(),
        };
        self.issue(principal, user)
    }

    pub async fn login(&self, input: LoginRequest) -> Result<AuthResponse> {
        input.validate()?;
        let invalid = || AppError::Unauthorized("Invalid username or password".to_string());

        let user = user_repo::find_by_username(&self.pool, input.username.trim())
            .await?
            .ok_or_else(invalid)?;
        if !verify_password(&input.password, &user.password_hash)? {
            return Err(invalid());
        }

        let permissions: HashSet<Permission> = user_repo::find_permissions(&self.pool, user.id)
            .await?
            .iter()
            .filter_map(|c| Permission::from_codename(c))
            .collect();

        let principal = Principal {
            id: user.user_id(),
            username: user.username.clone(),
            is_superuser: user.is_superuser,
            permissions,
        };
        info!(user_id = user.id, "user logged in");
        self.issue(principal, user)
    }

    fn issue(&self, principal: Principal, user: User) -> Result<AuthResponse> {
        Ok(AuthResponse {
            access_token: self.keys.issue(&principal)?,
            token_type: "Bearer",
            expires_in: self.keys.ttl_secs(),
            user,
        })
    }

    /// Users list; authentication required.
    pub async fn list_users(&self, actor: &Identity, pagination: Pagination) -> Result<Page<User>> {
        require_authenticated(actor)?;
        let (page, page_size, offset) = pagination.resolve();

        let count = user_repo::count_users(&self.pool).await?;
        let results = user_repo::list_users(&self.pool, page_size, offset).await?;
        Ok(Page {
            count,
            page,
            page_size,
            results,
        })
    }

    pub async fn profile(&self, user_id: UserId) -> Result<ProfileResponse> {
        let user = user_repo::find_by_id(&self.pool, user_id.0)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let following = user_repo::find_following(&self.pool, user_id.0)
            .await?
            .into_iter()
            .map(|u| u.username)
            .collect();
        let recent_posts = self.recent_posts(user_id).await?;
        let recent_comments =
            comment_repo::list_recent_by_author(&self.pool, user_id.0, PROFILE_RECENT_COMMENTS)
                .await?
                .into_iter()
                .map(|c| format!("{}: {}", c.post_title, c.body))
                .collect();

        Ok(ProfileResponse {
            user,
            following,
            recent_posts,
            recent_comments,
        })
    }

    pub async fn update_profile(
        &self,
        actor: &Identity,
        user_id: UserId,
        input: UpdateProfileRequest,
    ) -> Result<User> {
        input.validate()?;
        check_profile_modification(actor, user_id)?;

        let changes = user_repo::ProfileChanges {
            email: input.email.as_deref().map(str::trim),
            first_name: input.first_name.as_deref().map(str::trim),
            last_name: input.last_name.as_deref().map(str::trim),
        };

        let user = user_repo::update_profile(&self.pool, user_id.0, &changes)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        info!(user_id = user.id, "profile updated");
        Ok(user)
    }

    /// Replace the caller's password after checking the current one.
    /// Tokens issued earlier stay valid until they expire.
    pub async fn change_password(
        &self,
        actor: &Identity,
        user_id: UserId,
        input: ChangePasswordRequest,
    ) -> Result<()> {
        input.validate()?;
        check_password_change(actor, user_id)?;

        let user = user_repo::find_by_id(&self.pool, user_id.0)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        if !verify_password(&input.old_password, &user.password_hash)? {
            return Err(AppError::BadRequest(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = hash_password(&input.new_password)?;
        if !user_repo::update_password(&self.pool, user_id.0, &password_hash).await? {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        info!(user_id = user.id, "password changed");
        Ok(())
    }

    /// Delete an account with its posts and comments. Owner or administrator only.
    pub async fn delete_account(&self, actor: &Identity, user_id: UserId) -> Result<()> {
        check_profile_modification(actor, user_id)?;

        if !user_repo::delete_user(&self.pool, user_id.0).await? {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        info!(user_id = %user_id, "account deleted");

        if let Some(cache) = &self.profile_cache {
            if let Err(e) = cache.invalidate(user_id).await {
                warn!(user_id = %user_id, error = %e, "failed to invalidate profile cache");
            }
        }
        Ok(())
    }

    /// Latest posts, read through the profile cache. Cache failures fall back to the database.
    async fn recent_posts(&self, user_id: UserId) -> Result<Vec<PostSummary>> {
        if let Some(cache) = &self.profile_cache {
            match cache.read_recent_posts(user_id).await {
                Ok(Some(posts)) => return Ok(posts),
                Ok(None) => {}
                Err(e) => warn!(user_id = %user_id, error = %e, "profile cache read failed"),
            }
        }

        let posts =
            post_repo::find_recent_by_author(&self.pool, user_id.0, PROFILE_RECENT_POSTS).await?;

        if let Some(cache) = &self.profile_cache {
            if let Err(e) = cache.write_recent_posts(user_id, &posts).await {
                warn!(user_id = %user_id, error = %e, "profile cache write failed");
            }
        }
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_validation() {
        let bad_email: RegisterRequest = serde_json::from_str(
            r#"{"username":"alice","email":"nope","password":"long enough"}"#,
        )
        .unwrap();
        assert!(bad_email.validate().is_err());

        let short_password: RegisterRequest = serde_json::from_str(
            r#"{"username":"alice","email":"a@example.com","password":"short"}"#,
        )
        .unwrap();
        assert!(short_password.validate().is_err());

        let ok: RegisterRequest = serde_json::from_str(
            r#"{"username":"alice","email":"a@example.com","password":"long enough"}"#,
        )
        .unwrap();
        assert!(ok.validate().is_ok());
        assert_eq!(ok.first_name, "");
    }

    #[test]
    fn new_passwords_must_match() {
        let request = |confirm: &str| ChangePasswordRequest {
            old_password: "old secret".into(),
            new_password: "new secret 1".into(),
            new_password_confirm: confirm.into(),
        };

        assert!(request("new secret 2").validate().is_err());
        assert!(request("new secret 1").validate().is_ok());
    }

    fn offline_service() -> AccountService {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        AccountService::new(pool, Arc::new(JwtKeys::new("secret", 60)), None)
    }

    fn member(id: i64, is_superuser: bool) -> Identity {
        Identity::User(Principal {
            id: UserId(id),
            username: format!("user{}", id),
            is_superuser,
            permissions: DEFAULT_USER_PERMISSIONS.iter().copied().collect(),
        })
    }

    #[tokio::test]
    async fn password_of_another_user_cannot_be_changed() {
        let service = offline_service();
        let input = ChangePasswordRequest {
            old_password: "old secret".into(),
            new_password: "new secret".into(),
            new_password_confirm: "new secret".into(),
        };

        let err = service
            .change_password(&member(2, true), UserId(1), input)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn other_accounts_cannot_be_deleted() {
        let service = offline_service();

        let err = service
            .delete_account(&member(2, false), UserId(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = service
            .delete_account(&Identity::Anonymous, UserId(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn profile_update_checks_email() {
        let input = UpdateProfileRequest {
            email: Some("broken".into()),
            first_name: None,
            last_name: None,
        };
        assert!(input.validate().is_err());
    }
}
