/// Configuration management for the API server
///
/// Configuration comes from environment variables, with a `.env` file loaded
/// first when present.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `JWT_SECRET`: Secret key for JWT signing, at least 32 characters (required)
/// - `JWT_TTL_HOURS`: Access token lifetime, 1 to 8760 (default: 12)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `PRODUCTION`: Enables HSTS and strict CORS (default: false)
/// - `RUN_MIGRATIONS`: Apply pending migrations at startup (default: true)
/// - `RUST_LOG`, `LOG_FORMAT`: Logging, see `main.rs`
///
/// # Example
///
/// ```no_run
/// use bookdesk_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use bookdesk_shared::auth::jwt::DEFAULT_TTL_HOURS;
use serde::{Deserialize, Serialize};
use std::env;

pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// One year
pub const MAX_JWT_TTL_HOURS: i64 = 24 * 365;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,

    /// Apply pending migrations before serving
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `["*"]` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS on)
    pub production: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,

    /// Access token lifetime in hours
    pub ttl_hours: i64,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a value does not
    /// parse, or the JWT secret is too short.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("API_PORT is not a valid port: {}", e))?;

        let url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;
        validate_jwt_secret(&secret)?;

        let ttl_hours = match env::var("JWT_TTL_HOURS") {
            Ok(value) => value.parse::<i64>()?,
            Err(_) => DEFAULT_TTL_HOURS,
        };
        validate_ttl_hours(ttl_hours)?;

        let cors_origins = parse_origins(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()));
        let production = parse_flag(env::var("PRODUCTION").ok().as_deref(), false);
        let run_migrations = parse_flag(env::var("RUN_MIGRATIONS").ok().as_deref(), true);

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url,
                max_connections,
            },
            jwt: JwtConfig { secret, ttl_hours },
            run_migrations,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

pub fn validate_jwt_secret(secret: &str) -> anyhow::Result<()> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        anyhow::bail!(
            "JWT_SECRET must be at least {} characters long",
            MIN_JWT_SECRET_LENGTH
        );
    }
    Ok(())
}

pub fn validate_ttl_hours(ttl_hours: i64) -> anyhow::Result<()> {
    if !(1..=MAX_JWT_TTL_HOURS).contains(&ttl_hours) {
        anyhow::bail!(
            "JWT_TTL_HOURS must be between 1 and {}, got {}",
            MAX_JWT_TTL_HOURS,
            ttl_hours
        );
    }
    Ok(())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}

fn parse_flag(raw: Option<&str>, default: bool) -> bool {
    match raw.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/test".to_string(),
                max_connections: 10,
            },
            jwt: JwtConfig {
                secret: "test-secret-key-at-least-32-bytes-long".to_string(),
                ttl_hours: 12,
            },
            run_migrations: false,
        }
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(config().bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_jwt_secret_length() {
        assert!(validate_jwt_secret("short").is_err());
        assert!(validate_jwt_secret(&"x".repeat(32)).is_ok());
    }

    #[test]
    fn test_ttl_hours_bounds() {
        assert!(validate_ttl_hours(0).is_err());
        assert!(validate_ttl_hours(-3).is_err());
        assert!(validate_ttl_hours(1).is_ok());
        assert!(validate_ttl_hours(MAX_JWT_TTL_HOURS).is_ok());
        assert!(validate_ttl_hours(MAX_JWT_TTL_HOURS + 1).is_err());
        assert!(validate_ttl_hours(i64::MAX).is_err());
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://a.example, https://b.example ,"),
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(parse_origins("*"), vec!["*"]);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some("true"), false));
        assert!(parse_flag(Some("1"), false));
        assert!(!parse_flag(Some("off"), true));
        assert!(parse_flag(None, true));
        assert!(!parse_flag(Some("maybe"), false));
    }

    #[test]
    fn test_secret_not_serialized() {
        let json = serde_json::to_value(config()).unwrap();
        assert!(json["jwt"].get("secret").is_none());
        assert_eq!(json["jwt"]["ttl_hours"], 12);
    }
}
