use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use validator::Validate;

use crate::db::{comment_repo, post_repo, PostQueryOptions};
use crate::error::{AppError, Result};
use crate::middleware::permissions::{
    check_comment_modification, require_permission, Identity, Permission,
};
use crate::models::{Comment, Page};
use crate::services::Pagination;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateComment {
    pub post_id: i64,
    #[validate(length(min = 1, max = 5000))]
    pub body: String,
}

/// Edit a comment; `post_id` moves it to another published post.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateComment {
    #[validate(length(min = 1, max = 5000))]
    pub body: Option<String>,
    pub post_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentListParams {
    pub post: Option<i64>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Clone)]
pub struct CommentService {
    pool: PgPool,
}

impl CommentService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, params: &CommentListParams) -> Result<Page<Comment>> {
        let (page, page_size, offset) = Pagination {
            page: params.page,
            page_size: params.page_size,
        }
        .resolve();

        let count = comment_repo::count_comments(&self.pool, params.post).await?;
        let results =
            comment_repo::list_comments(&self.pool, params.post, page_size, offset).await?;

        Ok(Page {
            count,
            page,
            page_size,
            results,
        })
    }

    pub async fn get(&self, comment_id: i64) -> Result<Comment> {
        comment_repo::get_comment_by_id(&self.pool, comment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
    }

    pub async fn create(&self, actor: &Identity, input: CreateComment) -> Result<Comment> {
        input.validate()?;
        let principal = require_permission(actor, Permission::AddComment)?;
        self.ensure_published_post(input.post_id).await?;

        let comment =
            comment_repo::create_comment(&self.pool, input.post_id, principal.id.0, &input.body)
                .await?;

        info!(comment_id = comment.id, post_id = comment.post_id, "comment created");
        Ok(comment)
    }

    pub async fn update(
        &self,
        actor: &Identity,
        comment_id: i64,
        input: UpdateComment,
    ) -> Result<Comment> {
        input.validate()?;
        let existing = self.get(comment_id).await?;
        check_comment_modification(actor, &existing, Permission::ChangeComment)?;

        if let Some(post_id) = input.post_id {
            self.ensure_published_post(post_id).await?;
        }

        comment_repo::update_comment(&self.pool, comment_id, input.body.as_deref(), input.post_id)
            .await?;
        info!(comment_id, "comment updated");

        self.get(comment_id).await
    }

    pub async fn delete(&self, actor: &Identity, comment_id: i64) -> Result<()> {
        let existing = self.get(comment_id).await?;
        check_comment_modification(actor, &existing, Permission::DeleteComment)?;

        if !comment_repo::delete_comment(&self.pool, comment_id).await? {
            return Err(AppError::NotFound("Comment not found".to_string()));
        }

        info!(comment_id, "comment deleted");
        Ok(())
    }

    async fn ensure_published_post(&self, post_id: i64) -> Result<()> {
        match post_repo::find_post_by_id(&self.pool, post_id, PostQueryOptions::bare()).await? {
            Some(post) if post.is_published() => Ok(()),
            _ => Err(AppError::NotFound("Post not found".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_comment_is_invalid() {
        let input: CreateComment = serde_json::from_str(r#"{"post_id":1,"body":""}"#).unwrap();
        assert!(input.validate().is_err());
    }

    #[test]
    fn update_may_omit_fields() {
        let input: UpdateComment = serde_json::from_str("{}").unwrap();
        assert!(input.validate().is_ok());
        assert!(input.body.is_none() && input.post_id.is_none());
    }
}
