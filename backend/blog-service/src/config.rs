/// Configuration management for blog-service
///
/// Values come from environment variables. A `.env` file is loaded in `main`
/// through `dotenvy` before `Config::from_env` runs.
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Redis configuration (view counters and profile cache)
    pub cache: CacheConfig,
    /// Token signing settings
    pub auth: AuthConfig,
    /// Outbound SMTP settings
    pub email: EmailConfig,
    /// Weekly digest schedule
    pub digest: DigestConfig,
    /// Public site settings used in outbound links
    pub site: SiteConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
    /// Actix worker count
    pub workers: usize,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins
    pub allowed_origins: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Cache (Redis) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub url: String,
    /// Upper bound for a single counter round-trip
    pub command_timeout_ms: u64,
    /// TTL of the per-user profile posts cache
    pub profile_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Empty host puts the mailer in no-op mode
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    #[serde(skip_serializing)]
    pub smtp_password: Option<String>,
    pub smtp_from: String,
    pub use_starttls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    pub enabled: bool,
    /// Hours east of UTC in which the schedule is evaluated
    pub utc_offset_hours: i32,
    /// Hour of day (0-23) on Saturday
    pub hour: u32,
    /// Number of posts included in each digest
    pub top_posts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Base URL used when building links in emails
    pub base_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let production = app_env.eq_ignore_ascii_case("production");

        Ok(Config {
            app: AppConfig {
                env: app_env.clone(),
                host: std::env::var("BLOG_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("BLOG_SERVICE_PORT", 8080)?,
                workers: parse_env_or("BLOG_SERVICE_WORKERS", 4)?,
            },
            cors: {
                let allowed_origins = match std::env::var("CORS_ALLOWED_ORIGINS") {
                    Ok(value) => value,
                    Err(_) if production => {
                        return Err("CORS_ALLOWED_ORIGINS must be set in production".to_string())
                    }
                    Err(_) => "http://localhost:3000".to_string(),
                };

                if production && allowed_origins.trim() == "*" {
                    return Err("CORS_ALLOWED_ORIGINS cannot be '*' in production".to_string());
                }

                CorsConfig { allowed_origins }
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/webdev".to_string()),
                max_connections: parse_env_or("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            cache: CacheConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6379/0".to_string()),
                command_timeout_ms: parse_env_or("REDIS_COMMAND_TIMEOUT_MS", 500)?,
                profile_ttl_secs: parse_env_or("PROFILE_CACHE_TTL_SECS", 300)?,
            },
            auth: {
                let jwt_secret = match std::env::var("JWT_SECRET") {
                    Ok(secret) if !secret.trim().is_empty() => secret,
                    _ if production => {
                        return Err("JWT_SECRET must be set in production".to_string())
                    }
                    _ => "development-only-secret".to_string(),
                };

                AuthConfig {
                    jwt_secret,
                    token_ttl_secs: parse_env_or("JWT_TTL_SECS", 86_400)?,
                }
            },
            email: EmailConfig {
                smtp_host: std::env::var("SMTP_HOST").unwrap_or_default(),
                smtp_port: parse_env_or("SMTP_PORT", 587)?,
                smtp_username: std::env::var("SMTP_USERNAME").ok(),
                smtp_password: std::env::var("SMTP_PASSWORD").ok(),
                smtp_from: std::env::var("SMTP_FROM")
                    .unwrap_or_else(|_| "Webdev <noreply@webdev.com>".to_string()),
                use_starttls: parse_env_or("SMTP_STARTTLS", true)?,
            },
            digest: {
                let hour: u32 = parse_env_or("DIGEST_HOUR", 9)?;
                if hour > 23 {
                    return Err(format!("DIGEST_HOUR must be 0-23, got {}", hour));
                }
                let utc_offset_hours: i32 = parse_env_or("DIGEST_UTC_OFFSET_HOURS", 3)?;
                if !(-12..=14).contains(&utc_offset_hours) {
                    return Err(format!(
                        "DIGEST_UTC_OFFSET_HOURS out of range: {}",
                        utc_offset_hours
                    ));
                }

                DigestConfig {
                    enabled: parse_env_or("DIGEST_ENABLED", true)?,
                    utc_offset_hours,
                    hour,
                    top_posts: parse_env_or("DIGEST_TOP_POSTS", 3)?,
                }
            },
            site: SiteConfig {
                base_url: std::env::var("SITE_BASE_URL")
                    .unwrap_or_else(|_| "http://webdev.com".to_string())
                    .trim_end_matches('/')
                    .to_string(),
            },
        })
    }
}

fn parse_env_or<T>(key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "APP_ENV",
        "BLOG_SERVICE_PORT",
        "CORS_ALLOWED_ORIGINS",
        "JWT_SECRET",
        "DIGEST_HOUR",
        "SITE_BASE_URL",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_default_values() {
        clear_env();

        let config = Config::from_env().unwrap();

        assert_eq!(config.app.env, "development");
        assert_eq!(config.app.port, 8080);
        assert_eq!(config.cache.command_timeout_ms, 500);
        assert_eq!(config.digest.hour, 9);
        assert_eq!(config.digest.utc_offset_hours, 3);
        assert_eq!(config.digest.top_posts, 3);
    }

    #[test]
    #[serial]
    fn test_production_requires_jwt_secret() {
        clear_env();
        std::env::set_var("APP_ENV", "production");
        std::env::set_var("CORS_ALLOWED_ORIGINS", "https://webdev.com");

        let err = Config::from_env().unwrap_err();
        assert!(err.contains("JWT_SECRET"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_production_rejects_wildcard_cors() {
        clear_env();
        std::env::set_var("APP_ENV", "production");
        std::env::set_var("CORS_ALLOWED_ORIGINS", "*");
        std::env::set_var("JWT_SECRET", "s3cret");

        let err = Config::from_env().unwrap_err();
        assert!(err.contains("'*'"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_are_reported() {
        clear_env();
        std::env::set_var("BLOG_SERVICE_PORT", "not-a-port");
        assert!(Config::from_env().unwrap_err().contains("BLOG_SERVICE_PORT"));

        clear_env();
        std::env::set_var("DIGEST_HOUR", "25");
        assert!(Config::from_env().unwrap_err().contains("DIGEST_HOUR"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_site_base_url_trailing_slash_trimmed() {
        clear_env();
        std::env::set_var("SITE_BASE_URL", "https://blog.example.org/");

        let config = Config::from_env().unwrap();
        assert_eq!(config.site.base_url, "https://blog.example.org");

        clear_env();
    }
}
