use redis::{aio::ConnectionManager, AsyncCommands};
use redis_utils::with_timeout;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::{AppError, Result};
use crate::metrics::cache::record_cache_event;
use crate::models::{PostSummary, UserId};

/// Cache of each user's most recent posts, shown on their profile.
///
/// Reads and writes go through the same per-user key; author mutations
/// invalidate it.
#[derive(Clone)]
pub struct ProfileCache {
    redis: ConnectionManager,
    ttl: Duration,
    command_timeout: Duration,
}

impl ProfileCache {
    pub fn new(redis: ConnectionManager, ttl_secs: u64, command_timeout: Duration) -> Self {
        Self {
            redis,
            ttl: Duration::from_secs(ttl_secs),
            command_timeout,
        }
    }

    pub fn recent_posts_key(user_id: UserId) -> String {
        format!("profile:{}:recent_posts", user_id)
    }

    pub async fn read_recent_posts(&self, user_id: UserId) -> Result<Option<Vec<PostSummary>>> {
        let key = Self::recent_posts_key(user_id);
        let mut conn = self.redis.clone();

        match with_timeout(self.command_timeout, conn.get::<_, Option<String>>(&key)).await {
            Ok(Some(data)) => {
                debug!(user_id = %user_id, "profile cache HIT");
                record_cache_event("hit");
                serde_json::from_str::<Vec<PostSummary>>(&data)
                    .map(Some)
                    .map_err(|e| {
                        error!("Failed to deserialize cached profile posts: {}", e);
                        record_cache_event("error");
                        AppError::Internal(format!("Cache deserialization error: {}", e))
                    })
            }
            Ok(None) => {
                debug!(user_id = %user_id, "profile cache MISS");
                record_cache_event("miss");
                Ok(None)
            }
            Err(e) => {
                warn!("Redis read error for profile cache: {}", e);
                record_cache_event("error");
                Err(AppError::CacheError(e.to_string()))
            }
        }
    }

    pub async fn write_recent_posts(&self, user_id: UserId, posts: &[PostSummary]) -> Result<()> {
        let key = Self::recent_posts_key(user_id);
        let data = serde_json::to_string(posts)?;
        let mut conn = self.redis.clone();

        with_timeout(
            self.command_timeout,
            conn.set_ex::<_, _, ()>(&key, data, self.ttl.as_secs()),
        )
        .await
        .map_err(|e| {
            warn!("Redis write error for profile cache: {}", e);
            AppError::CacheError(e.to_string())
        })
    }

    pub async fn invalidate(&self, user_id: UserId) -> Result<()> {
        let key = Self::recent_posts_key(user_id);
        let mut conn = self.redis.clone();

        with_timeout(self.command_timeout, conn.del::<_, ()>(&key))
            .await
            .map_err(|e| AppError::CacheError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_per_user() {
        assert_eq!(
            ProfileCache::recent_posts_key(UserId(17)),
            "profile:17:recent_posts"
        );
        assert_ne!(
            ProfileCache::recent_posts_key(UserId(1)),
            ProfileCache::recent_posts_key(UserId(2))
        );
    }
}
