use crate::models::{Category, Tag};
use sqlx::PgPool;

// Categories

pub async fn list_categories(pool: &PgPool) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>("SELECT id, title, slug FROM categories ORDER BY title")
        .fetch_all(pool)
        .await
}

pub async fn find_category(pool: &PgPool, id: i64) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>("SELECT id, title, slug FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create_category(
    pool: &PgPool,
    title: &str,
    slug: &str,
) -> Result<Category, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "INSERT INTO categories (title, slug) VALUES ($1, $2) RETURNING id, title, slug",
    )
    .bind(title)
    .bind(slug)
    .fetch_one(pool)
    .await
}

pub async fn update_category(
    pool: &PgPool,
    id: i64,
    title: &str,
) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "UPDATE categories SET title = $2 WHERE id = $1 RETURNING id, title, slug",
    )
    .bind(id)
    .bind(title)
    .fetch_optional(pool)
    .await
}

pub async fn delete_category(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Titles of published posts in a category
pub async fn category_post_titles(pool: &PgPool, id: i64) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT title FROM posts WHERE category_id = $1 AND status = 'published' \
         ORDER BY publish DESC",
    )
    .bind(id)
    .fetch_all(pool)
    .await
}

// Tags

pub async fn list_tags(pool: &PgPool) -> Result<Vec<Tag>, sqlx::Error> {
    sqlx::query_as::<_, Tag>("SELECT id, name, slug FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn find_tag(pool: &PgPool, id: i64) -> Result<Option<Tag>, sqlx::Error> {
    sqlx::query_as::<_, Tag>("SELECT id, name, slug FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create_tag(pool: &PgPool, name: &str, slug: &str) -> Result<Tag, sqlx::Error> {
    sqlx::query_as::<_, Tag>(
        "INSERT INTO tags (name, slug) VALUES ($1, $2) RETURNING id, name, slug",
    )
    .bind(name)
    .bind(slug)
    .fetch_one(pool)
    .await
}

pub async fn update_tag(pool: &PgPool, id: i64, name: &str) -> Result<Option<Tag>, sqlx::Error> {
    sqlx::query_as::<_, Tag>("UPDATE tags SET name = $2 WHERE id = $1 RETURNING id, name, slug")
        .bind(id)
        .bind(name)
        .fetch_optional(pool)
        .await
}

pub async fn delete_tag(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tags WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Titles of published posts carrying a tag
pub async fn tag_post_titles(pool: &PgPool, id: i64) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT p.title FROM posts p
        JOIN post_tags pt ON pt.post_id = p.id
        WHERE pt.tag_id = $1 AND p.status = 'published'
        ORDER BY p.publish DESC
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await
}

/// How many of `ids` exist
pub async fn count_existing_tags(pool: &PgPool, ids: &[i64]) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tags WHERE id = ANY($1)")
        .bind(ids)
        .fetch_one(pool)
        .await
}
