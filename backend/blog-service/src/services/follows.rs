use sqlx::PgPool;
use tracing::info;

use crate::db::{follow_repo, user_repo};
use crate::error::{AppError, Result};
use crate::middleware::permissions::{require_authenticated, Identity};
use crate::models::UserId;

#[derive(Clone)]
pub struct FollowService {
    pool: PgPool,
}

impl FollowService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Follow `target` if not yet following, otherwise unfollow.
    /// Returns whether the caller follows `target` afterwards.
    pub async fn toggle(&self, actor: &Identity, target: UserId) -> Result<bool> {
        let principal = require_authenticated(actor)?;
        if principal.id == target {
            return Err(AppError::BadRequest("You cannot follow yourself".to_string()));
        }

        if user_repo::find_by_id(&self.pool, target.0).await?.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        let following = follow_repo::toggle_follow(&self.pool, principal.id.0, target.0).await?;
        info!(follower = %principal.id, target = %target, following, "follow toggled");
        Ok(following)
    }
}
