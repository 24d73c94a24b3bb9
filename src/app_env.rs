use anyhow::Context;
use chrono::Duration;
use std::env;

/// URL for accessing the PostrgeSQL database (should contain a database name in the path)
pub const DB_URL: &str = "DATABASE_URL";
/// Log level configuration for the application. For formatting info, see [tracing_subscriber's EnvFilter documentation](https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html)
pub const LOG_LEVEL: &str = "LOG_LEVEL";
/// Address and port the HTTP server binds to, such as "0.0.0.0:8080"
pub const LISTEN_ADDRESS: &str = "LISTEN_ADDRESS";
/// Secret used to sign and verify bearer tokens
pub const JWT_SECRET: &str = "JWT_SECRET";
/// How long an issued bearer token stays valid, in minutes
pub const TOKEN_TTL_MINUTES: &str = "TOKEN_TTL_MINUTES";

/// OpenTelemetry span export URL. Should be http://localhost:4317 by default, as the service should
/// have an OpenTelemetry collector sidecar which directs metrics to the correct place
pub const OTEL_SPAN_EXPORT_URL: &str = "OTEL_SPAN_EXPORT_URL";
/// OpenTelemetry metrics export URL. Should be http://localhost:4317 by default, as the service should
/// have an OpenTelemetry collector sidecar which directs metrics to the correct place
pub const OTEL_METRIC_EXPORT_URL: &str = "OTEL_METRIC_EXPORT_URL";

const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_TOKEN_TTL_MINUTES: i64 = 24 * 60;

/// Endpoints for exporting OpenTelemetry data. Only present when both are configured.
pub struct OtelEndpoints {
    pub spans: String,
    pub metrics: String,
}

/// Application settings read from the environment at startup
pub struct AppConfig {
    pub db_url: String,
    pub listen_address: String,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub otel: Option<OtelEndpoints>,
}

impl AppConfig {
    /// Reads configuration from the process environment. Call [dotenv::dotenv] first if
    /// values should also be read from a .env file.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let db_url = env::var(DB_URL).with_context(|| format!("{DB_URL} must be set"))?;
        let jwt_secret =
            env::var(JWT_SECRET).with_context(|| format!("{JWT_SECRET} must be set"))?;
        if jwt_secret.is_empty() {
            anyhow::bail!("{JWT_SECRET} must not be empty");
        }

        let listen_address =
            env::var(LISTEN_ADDRESS).unwrap_or_else(|_| DEFAULT_LISTEN_ADDRESS.to_owned());
        let token_ttl_minutes = match env::var(TOKEN_TTL_MINUTES) {
            Ok(raw) => parse_ttl_minutes(&raw)?,
            Err(_) => DEFAULT_TOKEN_TTL_MINUTES,
        };

        let otel = match (
            env::var(OTEL_SPAN_EXPORT_URL),
            env::var(OTEL_METRIC_EXPORT_URL),
        ) {
            (Ok(spans), Ok(metrics)) => Some(OtelEndpoints { spans, metrics }),
            _ => None,
        };

        Ok(AppConfig {
            db_url,
            listen_address,
            jwt_secret,
            token_ttl: Duration::minutes(token_ttl_minutes),
            otel,
        })
    }
}

fn parse_ttl_minutes(raw: &str) -> Result<i64, anyhow::Error> {
    let minutes: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{TOKEN_TTL_MINUTES} must be a whole number of minutes"))?;
    if minutes <= 0 {
        anyhow::bail!("{TOKEN_TTL_MINUTES} must be positive, got {minutes}");
    }

    Ok(minutes)
}
