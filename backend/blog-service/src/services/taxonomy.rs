use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;
use validator::Validate;

use crate::db::taxonomy_repo;
use crate::error::{AppError, Result};
use crate::middleware::permissions::{require_admin, require_permission, Identity, Permission};
use crate::models::{Category, Tag, TaxonomyDetail};
use crate::services::slug::slugify;

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 25))]
    pub title: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TagInput {
    #[validate(length(min = 1, max = 25))]
    pub name: String,
}

/// Categories and tags. Slugs are derived once at creation and never change.
#[derive(Clone)]
pub struct TaxonomyService {
    pool: PgPool,
}

impl TaxonomyService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(taxonomy_repo::list_categories(&self.pool).await?)
    }

    pub async fn category_detail(&self, id: i64) -> Result<TaxonomyDetail<Category>> {
        let item = taxonomy_repo::find_category(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
        let posts = taxonomy_repo::category_post_titles(&self.pool, id).await?;
        Ok(TaxonomyDetail { item, posts })
    }

    pub async fn create_category(
        &self,
        actor: &Identity,
        input: CategoryInput,
    ) -> Result<Category> {
        input.validate()?;
        require_admin(actor)?;

        let title = input.title.trim();
        let category =
            taxonomy_repo::create_category(&self.pool, title, &checked_slug(title)?).await?;
        info!(category_id = category.id, slug = %category.slug, "category created");
        Ok(category)
    }

    pub async fn update_category(
        &self,
        actor: &Identity,
        id: i64,
        input: CategoryInput,
    ) -> Result<Category> {
        input.validate()?;
        require_admin(actor)?;

        taxonomy_repo::update_category(&self.pool, id, input.title.trim())
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
    }

    /// Fails with 400 while published or draft posts still reference the category.
    pub async fn delete_category(&self, actor: &Identity, id: i64) -> Result<()> {
        require_admin(actor)?;
        if !taxonomy_repo::delete_category(&self.pool, id).await? {
            return Err(AppError::NotFound("Category not found".to_string()));
        }
        info!(category_id = id, "category deleted");
        Ok(())
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        Ok(taxonomy_repo::list_tags(&self.pool).await?)
    }

    pub async fn tag_detail(&self, id: i64) -> Result<TaxonomyDetail<Tag>> {
        let item = taxonomy_repo::find_tag(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Tag not found".to_string()))?;
        let posts = taxonomy_repo::tag_post_titles(&self.pool, id).await?;
        Ok(TaxonomyDetail { item, posts })
    }

    pub async fn create_tag(&self, actor: &Identity, input: TagInput) -> Result<Tag> {
        input.validate()?;
        require_permission(actor, Permission::AddTag)?;

        let name = input.name.trim();
        let tag = taxonomy_repo::create_tag(&self.pool, name, &checked_slug(name)?).await?;
        info!(tag_id = tag.id, slug = %tag.slug, "tag created");
        Ok(tag)
    }

    pub async fn update_tag(&self, actor: &Identity, id: i64, input: TagInput) -> Result<Tag> {
        input.validate()?;
        require_admin(actor)?;

        taxonomy_repo::update_tag(&self.pool, id, input.name.trim())
            .await?
            .ok_or_else(|| AppError::NotFound("Tag not found".to_string()))
    }

    pub async fn delete_tag(&self, actor: &Identity, id: i64) -> Result<()> {
        require_admin(actor)?;
        if !taxonomy_repo::delete_tag(&self.pool, id).await? {
            return Err(AppError::NotFound("Tag not found".to_string()));
        }
        info!(tag_id = id, "tag deleted");
        Ok(())
    }
}

fn checked_slug(name: &str) -> Result<String> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(AppError::ValidationError(format!(
            "'{}' does not produce a usable slug",
            name
        )));
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_must_be_non_empty() {
        assert_eq!(checked_slug("Web Dev").unwrap(), "web-dev");
        assert!(matches!(checked_slug("!!!"), Err(AppError::ValidationError(_))));
    }

    #[test]
    fn long_names_are_invalid() {
        let input = TagInput {
            name: "x".repeat(26),
        };
        assert!(input.validate().is_err());
    }
}
