use std::env;
use std::time::Duration;

use crate::models::Principal;
use crate::services::retry::RetryPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub backend_url: String,
    pub caller_principal: Principal,
    pub admin_principals: Vec<Principal>,
    pub create_booking_timeout: Duration,
    pub settle_delay: Duration,
    pub stale_time: Duration,
    pub retry: RetryPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            backend_url: "http://localhost:3000".to_string(),
            caller_principal: Principal::anonymous(),
            admin_principals: vec![],
            create_booking_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_millis(500),
            stale_time: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parse_var("PORT").unwrap_or(defaults.port),
            backend_url: env::var("BACKEND_URL").unwrap_or(defaults.backend_url),
            caller_principal: env::var("CALLER_PRINCIPAL")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(Principal::from_text)
                .unwrap_or(defaults.caller_principal),
            admin_principals: env::var("ADMIN_PRINCIPALS")
                .map(|v| parse_principals(&v))
                .unwrap_or_default(),
            create_booking_timeout: parse_var("CREATE_BOOKING_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.create_booking_timeout),
            settle_delay: parse_var("SETTLE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.settle_delay),
            stale_time: parse_var("QUERY_STALE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.stale_time),
            retry: RetryPolicy {
                max_retries: parse_var("QUERY_RETRIES").unwrap_or(defaults.retry.max_retries),
                base_delay: parse_var("RETRY_BASE_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.base_delay),
                max_delay: parse_var("RETRY_CAP_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.max_delay),
            },
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_principals(value: &str) -> Vec<Principal> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(Principal::from_text)
        .collect()
}
