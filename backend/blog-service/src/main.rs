use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use blog_service::cache::ProfileCache;
use blog_service::handlers::{self, health::HealthState};
use blog_service::jobs::{start_new_post_notifier, start_weekly_digest, NewPostNotifier};
use blog_service::middleware::IdentityMiddleware;
use blog_service::security::JwtKeys;
use blog_service::services::{
    AccountService, CommentService, EmailService, FollowService, PostService, RedisCounterStore,
    TaxonomyService, ViewCounter,
};
use blog_service::Config;
use redis_utils::{redact_url, RedisPool, RedisPoolConfig};

const NOTIFY_QUEUE_CAPACITY: usize = 1024;

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn to_io(e: anyhow::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{:#}", e))
}

/// Blog Service
///
/// # Routes
///
/// - `/api/v1/auth/*` - register and log in
/// - `/api/v1/users/*`, `/api/v1/follow/{id}` - profiles and follows
/// - `/api/v1/posts/*` - posts; detail requests count a view
/// - `/api/v1/comments/*` - comments
/// - `/api/v1/cats/*`, `/api/v1/tags/*` - taxonomy
/// - `/api/v1/health`, `/api/v1/health/ready`, `/metrics`
#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting blog-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to PostgreSQL")
        .map_err(to_io)?;
    tracing::info!("Database pool created");

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")
        .map_err(to_io)?;
    tracing::info!("Database migrations completed");

    let command_timeout = Duration::from_millis(config.cache.command_timeout_ms);
    tracing::info!(url = %redact_url(&config.cache.url), "Connecting to Redis");
    let redis_pool = RedisPool::connect(
        &RedisPoolConfig::new(config.cache.url.clone()).with_command_timeout(command_timeout),
    )
    .await
    .map_err(to_io)?;

    let views = ViewCounter::new(Arc::new(RedisCounterStore::new(&redis_pool)));
    let profile_cache = ProfileCache::new(
        redis_pool.manager(),
        config.cache.profile_ttl_secs,
        command_timeout,
    );
    let keys = Arc::new(JwtKeys::new(
        &config.auth.jwt_secret,
        config.auth.token_ttl_secs,
    ));
    let mailer = EmailService::new(&config.email)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    // Background jobs
    let (notifier, notify_rx) = NewPostNotifier::channel(NOTIFY_QUEUE_CAPACITY);
    let notifier_task = tokio::spawn(start_new_post_notifier(
        notify_rx,
        db_pool.clone(),
        mailer.clone(),
        config.site.base_url.clone(),
    ));
    let digest_task = tokio::spawn(start_weekly_digest(
        db_pool.clone(),
        views.clone(),
        mailer.clone(),
        config.digest.clone(),
        config.site.base_url.clone(),
    ));

    let post_service = web::Data::new(PostService::new(
        db_pool.clone(),
        views.clone(),
        notifier,
        Some(profile_cache.clone()),
    ));
    let comment_service = web::Data::new(CommentService::new(db_pool.clone()));
    let account_service = web::Data::new(AccountService::new(
        db_pool.clone(),
        keys.clone(),
        Some(profile_cache),
    ));
    let follow_service = web::Data::new(FollowService::new(db_pool.clone()));
    let taxonomy_service = web::Data::new(TaxonomyService::new(db_pool.clone()));
    let health_state = web::Data::new(HealthState::new(db_pool.clone(), redis_pool.clone()));

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server at {}", bind_address);

    let cors_origins = config.cors.allowed_origins.clone();
    let server = HttpServer::new(move || {
        let mut cors = Cors::default();
        for origin in cors_origins.split(',') {
            let origin = origin.trim();
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else if !origin.is_empty() {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        App::new()
            .app_data(post_service.clone())
            .app_data(comment_service.clone())
            .app_data(account_service.clone())
            .app_data(follow_service.clone())
            .app_data(taxonomy_service.clone())
            .app_data(health_state.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .route(
                "/metrics",
                web::get().to(blog_service::metrics::serve_metrics),
            )
            .service(
                web::scope("/api/v1")
                    .wrap(IdentityMiddleware::new(keys.clone()))
                    .configure(handlers::configure_routes),
            )
    })
    .bind(&bind_address)?
    .workers(config.app.workers)
    .shutdown_timeout(30)
    .disable_signals()
    .run();

    let server_handle = server.handle();
    let mut server_task = tokio::spawn(server);

    let finished = tokio::select! {
        result = &mut server_task => Some(result),
        _ = shutdown_signal() => None,
    };

    let result = match finished {
        Some(result) => result,
        None => {
            tracing::info!("Shutdown signal received; stopping HTTP server");
            server_handle.stop(true).await;
            server_task.await
        }
    };
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("HTTP server exited with error: {}", e),
        Err(e) => tracing::error!("HTTP server task failed: {}", e),
    }

    digest_task.abort();
    notifier_task.abort();
    redis_pool.close().await;
    db_pool.close().await;

    tracing::info!("blog-service stopped");
    Ok(())
}
