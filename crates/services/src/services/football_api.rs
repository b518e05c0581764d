//! Clients for the football-data (fixtures, live scores) and odds providers.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use chrono::NaiveDate;
use db::models::football_match::MatchStatus;
use moka::future::Cache;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Error)]
pub enum FootballApiError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("network error: {0}")]
    Transport(String),
    #[error("upstream timeout")]
    Timeout,
    #[error("unexpected upstream payload: {0}")]
    Serde(String),
    #[error("{0}")]
    InvalidRequest(String),
}

impl FootballApiError {
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Upstream { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }
}

/// HTTP plumbing shared by both providers: timeout, retry with backoff and
/// a short-lived response cache keyed by path and query.
#[derive(Clone)]
struct CachedHttp {
    http: Client,
    base_url: String,
    cache: Option<Cache<String, Value>>,
}

impl CachedHttp {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

    fn new(base_url: &str, cache_seconds: u64) -> Result<Self, FootballApiError> {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("ballmtaani/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FootballApiError::Transport(e.to_string()))?;

        let cache = (cache_seconds > 0).then(|| {
            Cache::builder()
                .max_capacity(512)
                .time_to_live(Duration::from_secs(cache_seconds))
                .build()
        });

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
        })
    }

    /// GET `path` with `query`; `authorize` adds the provider's credentials
    /// and is kept out of the cache key. Error payloads are never cached.
    async fn get_json<F>(
        &self,
        path: &str,
        query: &[(&str, String)],
        authorize: F,
    ) -> Result<Value, FootballApiError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let cache_key = cache_key(path, query);
        if let Some(cache) = &self.cache
            && let Some(hit) = cache.get(&cache_key).await
        {
            debug!(key = %cache_key, "Upstream cache hit");
            return Ok(hit);
        }

        let url = format!("{}{}", self.base_url, path);
        let value = (|| async {
            let request = authorize(self.http.get(&url).query(query));
            let res = request.send().await.map_err(map_reqwest_error)?;
            let status = res.status();
            if !status.is_success() {
                let body = res.text().await.unwrap_or_default();
                return Err(FootballApiError::Upstream {
                    status: status.as_u16(),
                    body,
                });
            }
            res.json::<Value>()
                .await
                .map_err(|e| FootballApiError::Serde(e.to_string()))
        })
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(500))
                .with_max_delay(Duration::from_secs(5))
                .with_max_times(3)
                .with_jitter(),
        )
        .when(|e: &FootballApiError| e.should_retry())
        .notify(|e, dur| {
            warn!(
                "Upstream call to {} failed, retrying after {:.2}s: {}",
                path,
                dur.as_secs_f64(),
                e
            )
        })
        .await?;

        if let Some(errors) = provider_errors(&value) {
            warn!(path, errors = %errors, "Upstream answered with an error payload");
            return Err(FootballApiError::Upstream {
                status: 502,
                body: errors,
            });
        }

        if let Some(cache) = &self.cache {
            cache.insert(cache_key, value.clone()).await;
        }
        Ok(value)
    }
}

fn cache_key(path: &str, query: &[(&str, String)]) -> String {
    let mut key = path.to_string();
    for (i, (k, v)) in query.iter().enumerate() {
        key.push(if i == 0 { '?' } else { '&' });
        key.push_str(k);
        key.push('=');
        key.push_str(v);
    }
    key
}

fn map_reqwest_error(e: reqwest::Error) -> FootballApiError {
    if e.is_timeout() {
        FootballApiError::Timeout
    } else {
        FootballApiError::Transport(e.to_string())
    }
}

/// Live state of one fixture as reported by the football-data provider
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureSnapshot {
    pub external_id: i64,
    pub status_short: String,
    pub home_goals: Option<i64>,
    pub away_goals: Option<i64>,
}

impl FixtureSnapshot {
    pub fn match_status(&self) -> Option<MatchStatus> {
        map_provider_status(&self.status_short)
    }
}

/// Provider short status to ours. Postponed, cancelled and other states
/// we do not model return `None`.
pub fn map_provider_status(short: &str) -> Option<MatchStatus> {
    match short {
        "NS" | "TBD" => Some(MatchStatus::Upcoming),
        "1H" | "HT" | "2H" | "ET" | "BT" | "P" | "LIVE" => Some(MatchStatus::Live),
        "FT" | "AET" | "PEN" => Some(MatchStatus::Ft),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct FixturesEnvelope {
    #[serde(default)]
    response: Vec<FixtureEntry>,
}

#[derive(Debug, Deserialize)]
struct FixtureEntry {
    fixture: FixtureInfo,
    #[serde(default)]
    goals: Goals,
}

#[derive(Debug, Deserialize)]
struct FixtureInfo {
    id: i64,
    status: FixtureStatus,
}

#[derive(Debug, Deserialize)]
struct FixtureStatus {
    short: String,
}

#[derive(Debug, Default, Deserialize)]
struct Goals {
    home: Option<i64>,
    away: Option<i64>,
}

/// The provider answers 200 with an `errors` object for bad keys and
/// exhausted quotas.
fn provider_errors(payload: &Value) -> Option<String> {
    match payload.get("errors") {
        Some(Value::Object(map)) if !map.is_empty() => Some(Value::Object(map.clone()).to_string()),
        Some(Value::Array(items)) if !items.is_empty() => Some(Value::Array(items.clone()).to_string()),
        _ => None,
    }
}

pub fn parse_fixture_snapshots(payload: Value) -> Result<Vec<FixtureSnapshot>, FootballApiError> {
    if let Some(errors) = provider_errors(&payload) {
        return Err(FootballApiError::Upstream {
            status: 502,
            body: errors,
        });
    }
    let envelope: FixturesEnvelope =
        serde_json::from_value(payload).map_err(|e| FootballApiError::Serde(e.to_string()))?;
    Ok(envelope
        .response
        .into_iter()
        .map(|entry| FixtureSnapshot {
            external_id: entry.fixture.id,
            status_short: entry.fixture.status.short,
            home_goals: entry.goals.home,
            away_goals: entry.goals.away,
        })
        .collect())
}

#[derive(Clone)]
pub struct FootballApiClient {
    inner: CachedHttp,
    api_key: SecretString,
}

impl FootballApiClient {
    pub fn new(
        api_key: Option<&SecretString>,
        base_url: &str,
        cache_seconds: u64,
    ) -> Result<Self, FootballApiError> {
        let api_key = api_key
            .cloned()
            .ok_or(FootballApiError::NotConfigured("FOOTBALL_DATA_API_KEY"))?;
        Ok(Self {
            inner: CachedHttp::new(base_url, cache_seconds)?,
            api_key,
        })
    }

    /// Raw fixtures listing, passed through to the browser unchanged.
    pub async fn fixtures(
        &self,
        date: Option<NaiveDate>,
        league: Option<u32>,
    ) -> Result<Value, FootballApiError> {
        if date.is_none() && league.is_none() {
            return Err(FootballApiError::InvalidRequest(
                "either date or league is required".to_string(),
            ));
        }

        let mut query = Vec::new();
        if let Some(date) = date {
            query.push(("date", date.format("%Y-%m-%d").to_string()));
        }
        if let Some(league) = league {
            query.push(("league", league.to_string()));
            query.push(("season", season_for(date).to_string()));
        }

        self.get("/fixtures", &query).await
    }

    pub async fn fixture(&self, external_id: i64) -> Result<Option<FixtureSnapshot>, FootballApiError> {
        let payload = self
            .get("/fixtures", &[("id", external_id.to_string())])
            .await?;
        Ok(parse_fixture_snapshots(payload)?.into_iter().next())
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, FootballApiError> {
        self.inner
            .get_json(path, query, |req| {
                req.header("x-apisports-key", self.api_key.expose_secret())
            })
            .await
    }
}

/// European-style season year: fixtures from July onward belong to the
/// season starting that year.
fn season_for(date: Option<NaiveDate>) -> i32 {
    use chrono::Datelike;
    let date = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
    if date.month() >= 7 {
        date.year()
    } else {
        date.year() - 1
    }
}

#[derive(Clone)]
pub struct OddsApiClient {
    inner: CachedHttp,
    api_key: SecretString,
}

impl OddsApiClient {
    pub fn new(
        api_key: Option<&SecretString>,
        base_url: &str,
        cache_seconds: u64,
    ) -> Result<Self, FootballApiError> {
        let api_key = api_key
            .cloned()
            .ok_or(FootballApiError::NotConfigured("ODDS_API_KEY"))?;
        Ok(Self {
            inner: CachedHttp::new(base_url, cache_seconds)?,
            api_key,
        })
    }

    /// Head-to-head decimal odds for every upcoming event of `sport`
    /// (e.g. `soccer_epl`).
    pub async fn odds(&self, sport: &str) -> Result<Value, FootballApiError> {
        if !is_valid_sport_key(sport) {
            return Err(FootballApiError::InvalidRequest(format!(
                "invalid sport key '{sport}'"
            )));
        }

        let query = [
            ("regions", "eu,uk".to_string()),
            ("markets", "h2h".to_string()),
            ("oddsFormat", "decimal".to_string()),
        ];
        self.inner
            .get_json(&format!("/sports/{sport}/odds"), &query, |req| {
                req.query(&[("apiKey", self.api_key.expose_secret())])
            })
            .await
    }
}

fn is_valid_sport_key(sport: &str) -> bool {
    !sport.is_empty()
        && sport.len() <= 64
        && sport
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// One-line bookmaker summary of the first event between the two teams,
/// e.g. `Arsenal 1.85 / draw 3.60 / Chelsea 4.20 (Bet365)`.
pub fn summarize_h2h_odds(payload: &Value, home_team: &str, away_team: &str) -> Option<String> {
    let home_lc = home_team.to_lowercase();
    let away_lc = away_team.to_lowercase();

    let event = payload.as_array()?.iter().find(|event| {
        let home = event["home_team"].as_str().unwrap_or_default().to_lowercase();
        let away = event["away_team"].as_str().unwrap_or_default().to_lowercase();
        home.contains(&home_lc) && away.contains(&away_lc)
    })?;

    let bookmaker = event["bookmakers"].as_array()?.first()?;
    let outcomes = bookmaker["markets"]
        .as_array()?
        .iter()
        .find(|m| m["key"] == "h2h")?["outcomes"]
        .as_array()?;

    let price_for = |name: &str| {
        outcomes
            .iter()
            .find(|o| o["name"].as_str() == Some(name))
            .and_then(|o| o["price"].as_f64())
    };

    let home_name = event["home_team"].as_str()?;
    let away_name = event["away_team"].as_str()?;
    Some(format!(
        "{} {:.2} / draw {:.2} / {} {:.2} ({})",
        home_name,
        price_for(home_name)?,
        price_for("Draw")?,
        away_name,
        price_for(away_name)?,
        bookmaker["title"].as_str().unwrap_or("bookmaker"),
    ))
}
