//! Runtime configuration read from the process environment.

use std::{env, fmt::Display, str::FromStr};

use secrecy::SecretString;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Affiliate program knobs
#[derive(Debug, Clone)]
pub struct AffiliateConfig {
    pub commission_per_signup_cents: i64,
    pub attribution_window_days: i64,
    pub min_payout_cents: i64,
    pub public_base_url: String,
}

impl Default for AffiliateConfig {
    fn default() -> Self {
        Self {
            commission_per_signup_cents: 5_000,
            attribution_window_days: 30,
            min_payout_cents: 100_000,
            public_base_url: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub admin_token: Option<SecretString>,
    pub football_data_api_key: Option<SecretString>,
    pub football_data_base_url: String,
    pub odds_api_key: Option<SecretString>,
    pub odds_api_base_url: String,
    pub anthropic_api_key: Option<SecretString>,
    pub affiliate: AffiliateConfig,
    /// Offset of the time zone match forms are filled in, minutes east of UTC
    pub match_timezone_offset_minutes: i32,
    pub live_score_sync_seconds: u64,
    pub upstream_cache_seconds: u64,
    pub analytics_enabled: bool,
    pub static_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_url: "sqlite://ballmtaani.db".to_string(),
            admin_token: None,
            football_data_api_key: None,
            football_data_base_url: "https://v3.football.api-sports.io".to_string(),
            odds_api_key: None,
            odds_api_base_url: "https://api.the-odds-api.com/v4".to_string(),
            anthropic_api_key: None,
            affiliate: AffiliateConfig::default(),
            match_timezone_offset_minutes: 180,
            live_score_sync_seconds: 60,
            upstream_cache_seconds: 60,
            analytics_enabled: true,
            static_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let affiliate = AffiliateConfig {
            commission_per_signup_cents: parse_or("COMMISSION_PER_SIGNUP_CENTS", 5_000)?,
            attribution_window_days: parse_or("ATTRIBUTION_WINDOW_DAYS", 30)?,
            min_payout_cents: parse_or("MIN_PAYOUT_CENTS", 100_000)?,
            public_base_url: string_or("PUBLIC_BASE_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
        };

        if let Err(e) = Url::parse(&affiliate.public_base_url) {
            return Err(ConfigError::Invalid {
                key: "PUBLIC_BASE_URL",
                message: e.to_string(),
            });
        }

        if affiliate.attribution_window_days <= 0 {
            return Err(ConfigError::Invalid {
                key: "ATTRIBUTION_WINDOW_DAYS",
                message: "must be positive".to_string(),
            });
        }

        let config = Self {
            host: string_or("HOST", "0.0.0.0"),
            port: parse_or("PORT", 3001)?,
            database_url: string_or("DATABASE_URL", "sqlite://ballmtaani.db"),
            admin_token: secret("ADMIN_TOKEN"),
            football_data_api_key: secret("FOOTBALL_DATA_API_KEY"),
            football_data_base_url: string_or(
                "FOOTBALL_DATA_BASE_URL",
                "https://v3.football.api-sports.io",
            ),
            odds_api_key: secret("ODDS_API_KEY"),
            odds_api_base_url: string_or("ODDS_API_BASE_URL", "https://api.the-odds-api.com/v4"),
            anthropic_api_key: secret("ANTHROPIC_API_KEY"),
            affiliate,
            match_timezone_offset_minutes: parse_or("MATCH_TIMEZONE_OFFSET_MINUTES", 180)?,
            live_score_sync_seconds: parse_or("LIVE_SCORE_SYNC_SECONDS", 60)?,
            upstream_cache_seconds: parse_or("UPSTREAM_CACHE_SECONDS", 60)?,
            analytics_enabled: parse_or("ANALYTICS_ENABLED", true)?,
            static_dir: env::var("STATIC_DIR").ok().filter(|s| !s.is_empty()),
        };

        if !(-18 * 60..=18 * 60).contains(&config.match_timezone_offset_minutes) {
            return Err(ConfigError::Invalid {
                key: "MATCH_TIMEZONE_OFFSET_MINUTES",
                message: "must be within +/-1080 minutes".to_string(),
            });
        }
        if config.live_score_sync_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "LIVE_SCORE_SYNC_SECONDS",
                message: "must be positive".to_string(),
            });
        }

        if config.admin_token.is_none() {
            warn!("ADMIN_TOKEN not set - admin routes will reject every request");
        }

        Ok(config)
    }
}

fn string_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        debug!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn secret(key: &str) -> Option<SecretString> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(SecretString::from)
}

fn parse_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_reports_key() {
        unsafe { env::set_var("BALLMTAANI_TEST_BAD_NUMBER", "ten") };
        let err = parse_or::<i64>("BALLMTAANI_TEST_BAD_NUMBER", 1).unwrap_err();
        assert!(err.to_string().contains("BALLMTAANI_TEST_BAD_NUMBER"));
        unsafe { env::remove_var("BALLMTAANI_TEST_BAD_NUMBER") };
    }

    #[test]
    fn test_parse_or_default_when_missing() {
        assert_eq!(parse_or::<u16>("BALLMTAANI_TEST_UNSET_PORT", 3001).unwrap(), 3001);
    }
}
