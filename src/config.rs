use std::env;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    /// `compact` or `json`.
    pub log_format: String,
    pub socket_host: String,
    pub socket_port: u16,
    /// Full relay URL; takes precedence over `socket_host`/`socket_port`.
    pub event_relay_url: Option<String>,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_orders_url: String,
    pub jwks_url: String,
    /// Minimum gap between key set refetches triggered by unknown key ids.
    pub jwks_refresh_cooldown_ms: u64,
    pub search_radius_km: f64,
    pub fare_base: Decimal,
    pub fare_per_km: Decimal,
    pub http_timeout_ms: u64,
    pub dispatch_queue_size: usize,
    pub dispatch_max_attempts: u32,
    pub dispatch_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            log_level: "info".to_string(),
            log_format: "compact".to_string(),
            socket_host: "localhost".to_string(),
            socket_port: 9092,
            event_relay_url: None,
            razorpay_key_id: String::new(),
            razorpay_key_secret: String::new(),
            razorpay_orders_url: "https://api.razorpay.com/v1/orders".to_string(),
            jwks_url: "http://localhost:3001/.well-known/jwks.json".to_string(),
            jwks_refresh_cooldown_ms: 30_000,
            search_radius_km: 5.0,
            fare_base: Decimal::from(25),
            fare_per_km: Decimal::from(8),
            http_timeout_ms: 5_000,
            dispatch_queue_size: 1024,
            dispatch_max_attempts: 3,
            dispatch_backoff_ms: 100,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: env::var("LOG_FORMAT").unwrap_or(defaults.log_format),
            socket_host: env::var("SOCKET_HOST").unwrap_or(defaults.socket_host),
            socket_port: parse_or_default("SOCKET_PORT", defaults.socket_port)?,
            event_relay_url: env::var("EVENT_RELAY_URL").ok(),
            razorpay_key_id: env::var("RAZORPAY_KEY_ID").unwrap_or(defaults.razorpay_key_id),
            razorpay_key_secret: env::var("RAZORPAY_KEY_SECRET")
                .unwrap_or(defaults.razorpay_key_secret),
            razorpay_orders_url: env::var("RAZORPAY_ORDERS_URL")
                .unwrap_or(defaults.razorpay_orders_url),
            jwks_url: env::var("JWKS_URL").unwrap_or(defaults.jwks_url),
            jwks_refresh_cooldown_ms: parse_or_default(
                "JWKS_REFRESH_COOLDOWN_MS",
                defaults.jwks_refresh_cooldown_ms,
            )?,
            search_radius_km: parse_or_default("SEARCH_RADIUS_KM", defaults.search_radius_km)?,
            fare_base: parse_or_default("FARE_BASE", defaults.fare_base)?,
            fare_per_km: parse_or_default("FARE_PER_KM", defaults.fare_per_km)?,
            http_timeout_ms: parse_or_default("HTTP_TIMEOUT_MS", defaults.http_timeout_ms)?,
            dispatch_queue_size: parse_or_default(
                "DISPATCH_QUEUE_SIZE",
                defaults.dispatch_queue_size,
            )?,
            dispatch_max_attempts: parse_or_default(
                "DISPATCH_MAX_ATTEMPTS",
                defaults.dispatch_max_attempts,
            )?,
            dispatch_backoff_ms: parse_or_default(
                "DISPATCH_BACKOFF_MS",
                defaults.dispatch_backoff_ms,
            )?,
        })
    }

    pub fn relay_url(&self) -> String {
        match &self.event_relay_url {
            Some(url) => url.clone(),
            None => format!("http://{}:{}/emit", self.socket_host, self.socket_port),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn relay_url_is_built_from_socket_host_and_port() {
        let config = Config {
            socket_host: "relay.internal".to_string(),
            ..Config::default()
        };
        assert_eq!(config.relay_url(), "http://relay.internal:9092/emit");
    }

    #[test]
    fn explicit_relay_url_wins() {
        let config = Config {
            event_relay_url: Some("http://127.0.0.1:4000/emit".to_string()),
            ..Config::default()
        };
        assert_eq!(config.relay_url(), "http://127.0.0.1:4000/emit");
    }
}
