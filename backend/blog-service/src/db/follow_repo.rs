use crate::models::Recipient;
use sqlx::PgPool;

/// Flip the follow relation and return the new state.
///
/// The delete and the insert each affect zero or one row, so concurrent
/// toggles from the same user settle on a consistent state.
pub async fn toggle_follow(
    pool: &PgPool,
    follower_id: i64,
    following_id: i64,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
        .bind(follower_id)
        .bind(following_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let following = if removed > 0 {
        false
    } else {
        sqlx::query(
            "INSERT INTO follows (follower_id, following_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(follower_id)
        .bind(following_id)
        .execute(&mut *tx)
        .await?;
        true
    };

    tx.commit().await?;
    Ok(following)
}

/// Followers of an author who have an email address
pub async fn find_follower_recipients(
    pool: &PgPool,
    author_id: i64,
) -> Result<Vec<Recipient>, sqlx::Error> {
    sqlx::query_as::<_, Recipient>(
        r#"
        SELECT u.username, u.email
        FROM follows f
        JOIN users u ON u.id = f.follower_id
        WHERE f.following_id = $1 AND u.email <> ''
        ORDER BY u.id
        "#,
    )
    .bind(author_id)
    .fetch_all(pool)
    .await
}
