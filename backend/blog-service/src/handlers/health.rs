/// Liveness and readiness endpoints
use actix_web::{web, HttpResponse};
use chrono::Utc;
use redis::RedisError;
use redis_utils::RedisPool;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Clone)]
pub struct HealthState {
    db_pool: PgPool,
    redis: RedisPool,
}

#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Serialize)]
struct ComponentCheck {
    status: ComponentStatus,
    message: String,
    latency_ms: u64,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    status: ComponentStatus,
    checks: HashMap<String, ComponentCheck>,
    timestamp: String,
}

impl HealthState {
    pub fn new(db_pool: PgPool, redis: RedisPool) -> Self {
        Self { db_pool, redis }
    }

    async fn check_postgres(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.db_pool)
            .await
            .map(|_| ())
    }

    async fn check_redis(&self) -> Result<(), RedisError> {
        self.redis.ping().await
    }
}

/// Overall status from component results. Redis only degrades the service:
/// view counts and the profile cache are best-effort.
pub fn overall_status(postgres_ok: bool, redis_ok: bool) -> (bool, ComponentStatus) {
    match (postgres_ok, redis_ok) {
        (false, _) => (false, ComponentStatus::Unhealthy),
        (true, false) => (true, ComponentStatus::Degraded),
        (true, true) => (true, ComponentStatus::Healthy),
    }
}

pub async fn health(state: web::Data<HealthState>) -> HttpResponse {
    match state.check_postgres().await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "blog-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
        Err(e) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unhealthy",
            "error": format!("PostgreSQL connection failed: {}", e),
            "service": "blog-service"
        })),
    }
}

pub async fn ready(state: web::Data<HealthState>) -> HttpResponse {
    let mut checks = HashMap::new();

    let start = Instant::now();
    let pg_result = state.check_postgres().await;
    let pg_ok = pg_result.is_ok();
    checks.insert(
        "postgresql".to_string(),
        ComponentCheck {
            status: if pg_ok {
                ComponentStatus::Healthy
            } else {
                ComponentStatus::Unhealthy
            },
            message: match pg_result {
                Ok(_) => "PostgreSQL connection successful".to_string(),
                Err(e) => format!("PostgreSQL connection failed: {}", e),
            },
            latency_ms: start.elapsed().as_millis() as u64,
        },
    );

    let start = Instant::now();
    let redis_result = state.check_redis().await;
    let redis_ok = redis_result.is_ok();
    checks.insert(
        "redis".to_string(),
        ComponentCheck {
            status: if redis_ok {
                ComponentStatus::Healthy
            } else {
                ComponentStatus::Degraded
            },
            message: match redis_result {
                Ok(_) => "Redis ping successful".to_string(),
                Err(e) => format!("Redis ping failed: {}", e),
            },
            latency_ms: start.elapsed().as_millis() as u64,
        },
    );

    let (ready, status) = overall_status(pg_ok, redis_ok);
    let response = ReadinessResponse {
        ready,
        status,
        checks,
        timestamp: Utc::now().to_rfc3339(),
    };

    if ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
