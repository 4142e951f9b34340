use crate::models::Comment;
use sqlx::PgPool;

const COMMENT_COLUMNS: &str = r#"
    c.id, c.post_id, p.title AS post_title, c.author_id, u.username AS author_username,
    c.body, c.created_at, c.updated_at
"#;

fn select_comments(tail: &str) -> String {
    format!(
        "SELECT {} FROM comments c \
         JOIN posts p ON p.id = c.post_id \
         JOIN users u ON u.id = c.author_id {}",
        COMMENT_COLUMNS, tail
    )
}

/// Create a comment and return it with joined post title and author
pub async fn create_comment(
    pool: &PgPool,
    post_id: i64,
    author_id: i64,
    body: &str,
) -> Result<Comment, sqlx::Error> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO comments (post_id, author_id, body) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(post_id)
    .bind(author_id)
    .bind(body)
    .fetch_one(pool)
    .await?;

    get_comment_by_id(pool, id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn get_comment_by_id(
    pool: &PgPool,
    comment_id: i64,
) -> Result<Option<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&select_comments("WHERE c.id = $1"))
        .bind(comment_id)
        .fetch_optional(pool)
        .await
}

/// Comments on published posts, newest first, optionally for a single post
pub async fn list_comments(
    pool: &PgPool,
    post_id: Option<i64>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&select_comments(
        "WHERE p.status = 'published' AND ($1::bigint IS NULL OR c.post_id = $1) \
         ORDER BY c.created_at DESC, c.id DESC LIMIT $2 OFFSET $3",
    ))
    .bind(post_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count_comments(pool: &PgPool, post_id: Option<i64>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM comments c
        JOIN posts p ON p.id = c.post_id
        WHERE p.status = 'published' AND ($1::bigint IS NULL OR c.post_id = $1)
        "#,
    )
    .bind(post_id)
    .fetch_one(pool)
    .await
}

/// All comments on a post in chronological order
pub async fn list_for_post(pool: &PgPool, post_id: i64) -> Result<Vec<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&select_comments(
        "WHERE c.post_id = $1 ORDER BY c.created_at ASC, c.id ASC",
    ))
    .bind(post_id)
    .fetch_all(pool)
    .await
}

/// Latest comments written by a user
pub async fn list_recent_by_author(
    pool: &PgPool,
    author_id: i64,
    limit: i64,
) -> Result<Vec<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&select_comments(
        "WHERE c.author_id = $1 ORDER BY c.created_at DESC, c.id DESC LIMIT $2",
    ))
    .bind(author_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Update body and optionally move the comment to another post
pub async fn update_comment(
    pool: &PgPool,
    comment_id: i64,
    body: Option<&str>,
    post_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE comments SET
            body       = COALESCE($2, body),
            post_id    = COALESCE($3, post_id),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(comment_id)
    .bind(body)
    .bind(post_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_comment(pool: &PgPool, comment_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(comment_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
