use crate::db::query::{PostFilter, PostQuery, PostQueryOptions};
use crate::models::{Post, PostSummary};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;

/// Run a [`PostQuery`] and return matching rows.
pub async fn find_posts(pool: &PgPool, query: &PostQuery) -> Result<Vec<Post>, sqlx::Error> {
    let mut qb = query.build_select();
    qb.build_query_as::<Post>().fetch_all(pool).await
}

/// Number of rows the query would return without pagination.
pub async fn count_posts(pool: &PgPool, query: &PostQuery) -> Result<i64, sqlx::Error> {
    let mut qb = query.build_count();
    qb.build_query_scalar::<i64>().fetch_one(pool).await
}

/// First row of a query, if any.
pub async fn find_one(pool: &PgPool, query: PostQuery) -> Result<Option<Post>, sqlx::Error> {
    let mut qb = query.paginate(1, 0).build_select();
    qb.build_query_as::<Post>().fetch_optional(pool).await
}

/// Find any post by ID regardless of status
pub async fn find_post_by_id(
    pool: &PgPool,
    post_id: i64,
    options: PostQueryOptions,
) -> Result<Option<Post>, sqlx::Error> {
    find_one(
        pool,
        PostQuery::new(options).any_status().filter(PostFilter::Id(post_id)),
    )
    .await
}

/// Tag names for each post, keyed by post id
pub async fn find_tags_for_posts(
    pool: &PgPool,
    post_ids: &[i64],
) -> Result<HashMap<i64, Vec<String>>, sqlx::Error> {
    if post_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT pt.post_id, t.name
        FROM post_tags pt
        JOIN tags t ON t.id = pt.tag_id
        WHERE pt.post_id = ANY($1)
        ORDER BY t.name
        "#,
    )
    .bind(post_ids)
    .fetch_all(pool)
    .await?;

    let mut tags: HashMap<i64, Vec<String>> = HashMap::new();
    for row in rows {
        tags.entry(row.get("post_id"))
            .or_default()
            .push(row.get("name"));
    }
    Ok(tags)
}

pub struct NewPost<'a> {
    pub title: &'a str,
    pub slug: &'a str,
    pub body: &'a str,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub title_image: Option<&'a str>,
    pub status: &'a str,
    pub publish: DateTime<Utc>,
}

/// How the stored slug is derived from [`NewPost::slug`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugMode {
    /// Use the slug as given
    Exact,
    /// Append `-<new post id>`
    WithId,
}

/// Insert a post and return its id and stored slug.
///
/// Returns `None` when the slug is already taken. The conflict is resolved by
/// the unique index, so concurrent inserts of the same slug cannot both win.
pub async fn insert_post(
    tx: &mut Transaction<'_, Postgres>,
    post: &NewPost<'_>,
    mode: SlugMode,
) -> Result<Option<(i64, String)>, sqlx::Error> {
    sqlx::query_as::<_, (i64, String)>(
        r#"
        WITH next AS (SELECT nextval(pg_get_serial_sequence('posts', 'id')) AS id)
        INSERT INTO posts
            (id, title, slug, body, author_id, category_id, title_image, status, publish)
        SELECT next.id,
               $1,
               CASE WHEN $9 THEN $2 || '-' || next.id::text ELSE $2 END,
               $3, $4, $5, $6, $7, $8
        FROM next
        ON CONFLICT (slug) DO NOTHING
        RETURNING id, slug
        "#,
    )
    .bind(post.title)
    .bind(post.slug)
    .bind(post.body)
    .bind(post.author_id)
    .bind(post.category_id)
    .bind(post.title_image)
    .bind(post.status)
    .bind(post.publish)
    .bind(mode == SlugMode::WithId)
    .fetch_optional(&mut **tx)
    .await
}

#[derive(Default)]
pub struct PostChanges<'a> {
    pub title: Option<&'a str>,
    pub body: Option<&'a str>,
    pub category_id: Option<Option<i64>>,
    pub title_image: Option<Option<&'a str>>,
    pub status: Option<&'a str>,
}

/// Apply partial changes. Untouched columns keep their values.
pub async fn update_post(
    tx: &mut Transaction<'_, Postgres>,
    post_id: i64,
    changes: &PostChanges<'_>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE posts SET
            title       = COALESCE($2, title),
            body        = COALESCE($3, body),
            category_id = CASE WHEN $4 THEN $5 ELSE category_id END,
            title_image = CASE WHEN $6 THEN $7 ELSE title_image END,
            status      = COALESCE($8, status),
            updated_at  = NOW()
        WHERE id = $1
        "#,
    )
    .bind(post_id)
    .bind(changes.title)
    .bind(changes.body)
    .bind(changes.category_id.is_some())
    .bind(changes.category_id.flatten())
    .bind(changes.title_image.is_some())
    .bind(changes.title_image.flatten())
    .bind(changes.status)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

/// Replace the tag set of a post
pub async fn set_post_tags(
    tx: &mut Transaction<'_, Postgres>,
    post_id: i64,
    tag_ids: &[i64],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
        .bind(post_id)
        .execute(&mut **tx)
        .await?;

    if !tag_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO post_tags (post_id, tag_id)
            SELECT $1, UNNEST($2::bigint[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(tag_ids)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Delete a post. Comments and tag links cascade.
pub async fn delete_post(pool: &PgPool, post_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(post_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Latest published posts by an author
pub async fn find_recent_by_author(
    pool: &PgPool,
    author_id: i64,
    limit: i64,
) -> Result<Vec<PostSummary>, sqlx::Error> {
    sqlx::query_as::<_, PostSummary>(
        r#"
        SELECT id, title, slug, publish
        FROM posts
        WHERE author_id = $1 AND status = 'published'
        ORDER BY publish DESC
        LIMIT $2
        "#,
    )
    .bind(author_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}
