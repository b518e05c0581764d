//! Background service that pulls live status and goals for provider-linked
//! matches.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use db::{
    DBService,
    models::football_match::{FootballMatch, MatchStatus},
};
use thiserror::Error;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use super::football_api::{FixtureSnapshot, FootballApiClient, FootballApiError};

/// Upcoming matches are polled until this long after kickoff
const LOOKBACK_HOURS: i64 = 3;

#[derive(Debug, Error)]
pub enum LiveScoreSyncError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait FixtureSource: Send + Sync {
    async fn fixture(&self, external_id: i64) -> Result<Option<FixtureSnapshot>, FootballApiError>;
}

#[async_trait]
impl FixtureSource for FootballApiClient {
    async fn fixture(&self, external_id: i64) -> Result<Option<FixtureSnapshot>, FootballApiError> {
        FootballApiClient::fixture(self, external_id).await
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    pub checked: usize,
    pub updated: usize,
    pub failed: usize,
}

pub struct LiveScoreSyncService {
    db: DBService,
    source: Arc<dyn FixtureSource>,
    poll_interval: Duration,
}

impl LiveScoreSyncService {
    pub fn new(db: DBService, source: Arc<dyn FixtureSource>, poll_interval: Duration) -> Self {
        Self {
            db,
            source,
            poll_interval,
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.start().await;
        })
    }

    async fn start(&self) {
        info!(
            "Starting live score sync with interval {:?}, lookback {}h",
            self.poll_interval, LOOKBACK_HOURS
        );

        let mut interval = interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match self.sync_once().await {
                Ok(summary) if summary.checked > 0 => debug!(
                    checked = summary.checked,
                    updated = summary.updated,
                    failed = summary.failed,
                    "Live score sync pass finished"
                ),
                Ok(_) => {}
                Err(e) => error!("Error during live score sync: {}", e),
            }
        }
    }

    /// One pass over every syncable match. Provider failures for a single
    /// match are logged and counted, not returned.
    pub async fn sync_once(&self) -> Result<SyncSummary, LiveScoreSyncError> {
        let matches = FootballMatch::find_syncable(&self.db.pool, LOOKBACK_HOURS).await?;
        let mut summary = SyncSummary {
            checked: matches.len(),
            ..Default::default()
        };

        for m in matches {
            let Some(external_id) = m.external_id else {
                continue;
            };

            match self.source.fixture(external_id).await {
                Ok(Some(snapshot)) => {
                    if self.apply_snapshot(&m, &snapshot).await? {
                        summary.updated += 1;
                    }
                }
                Ok(None) => {
                    warn!(match_id = %m.id, external_id, "Provider has no fixture with this id");
                    summary.failed += 1;
                }
                Err(e) => {
                    warn!(match_id = %m.id, external_id, error = %e, "Fixture lookup failed");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn apply_snapshot(
        &self,
        m: &FootballMatch,
        snapshot: &FixtureSnapshot,
    ) -> Result<bool, LiveScoreSyncError> {
        let Some(status) = snapshot.match_status() else {
            debug!(
                match_id = %m.id,
                provider_status = %snapshot.status_short,
                "Unmapped provider status, leaving match untouched"
            );
            return Ok(false);
        };

        if status != m.status && !m.status.can_transition_to(status) {
            debug!(match_id = %m.id, from = %m.status, to = %status, "Ignoring backwards status from provider");
            return Ok(false);
        }

        let (home, away) = match (status, snapshot.home_goals, snapshot.away_goals) {
            (MatchStatus::Upcoming, _, _) => (None, None),
            (_, Some(h), Some(a)) => (Some(h), Some(a)),
            (_, _, _) => (m.home_score.or(Some(0)), m.away_score.or(Some(0))),
        };

        if status == m.status && home == m.home_score && away == m.away_score {
            return Ok(false);
        }

        FootballMatch::apply_live_update(&self.db.pool, m.id, status, home, away).await?;
        info!(
            match_id = %m.id,
            status = %status,
            home_score = ?home,
            away_score = ?away,
            "Live score applied"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use chrono::{Duration as ChronoDuration, Utc};
    use db::models::football_match::NewMatch;
    use uuid::Uuid;

    use super::*;

    struct StubSource {
        fixtures: Mutex<HashMap<i64, Result<Option<FixtureSnapshot>, FootballApiError>>>,
    }

    #[async_trait]
    impl FixtureSource for StubSource {
        async fn fixture(
            &self,
            external_id: i64,
        ) -> Result<Option<FixtureSnapshot>, FootballApiError> {
            self.fixtures
                .lock()
                .unwrap()
                .get(&external_id)
                .cloned()
                .unwrap_or(Ok(None))
        }
    }

    fn snapshot(id: i64, short: &str, home: Option<i64>, away: Option<i64>) -> FixtureSnapshot {
        FixtureSnapshot {
            external_id: id,
            status_short: short.to_string(),
            home_goals: home,
            away_goals: away,
        }
    }

    async fn insert_match(db: &DBService, external_id: i64, minutes_ago: i64) -> FootballMatch {
        FootballMatch::create(
            &db.pool,
            Uuid::new_v4(),
            &NewMatch {
                home_team: format!("Home {external_id}"),
                away_team: format!("Away {external_id}"),
                competition: "FKF Premier League".to_string(),
                venue: None,
                kickoff_at: Utc::now() - ChronoDuration::minutes(minutes_ago),
                external_id: Some(external_id),
            },
        )
        .await
        .unwrap()
    }

    fn service(
        db: &DBService,
        fixtures: Vec<(i64, Result<Option<FixtureSnapshot>, FootballApiError>)>,
    ) -> LiveScoreSyncService {
        LiveScoreSyncService::new(
            db.clone(),
            Arc::new(StubSource {
                fixtures: Mutex::new(fixtures.into_iter().collect()),
            }),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_sync_applies_live_score_and_full_time() {
        let db = DBService::new_in_memory().await.unwrap();
        let m = insert_match(&db, 101, 30).await;

        let sync = service(&db, vec![(101, Ok(Some(snapshot(101, "1H", Some(1), Some(0)))))]);
        let summary = sync.sync_once().await.unwrap();
        assert_eq!(summary, SyncSummary { checked: 1, updated: 1, failed: 0 });

        let live = FootballMatch::find_by_id(&db.pool, m.id).await.unwrap().unwrap();
        assert_eq!(live.status, MatchStatus::Live);
        assert_eq!((live.home_score, live.away_score), (Some(1), Some(0)));

        let sync = service(&db, vec![(101, Ok(Some(snapshot(101, "FT", Some(2), Some(0)))))]);
        sync.sync_once().await.unwrap();
        let done = FootballMatch::find_by_id(&db.pool, m.id).await.unwrap().unwrap();
        assert_eq!(done.status, MatchStatus::Ft);
        assert_eq!(done.home_score, Some(2));

        // Finished matches drop out of the sync set
        assert_eq!(sync.sync_once().await.unwrap().checked, 0);
    }

    #[tokio::test]
    async fn test_sync_skips_old_and_future_matches() {
        let db = DBService::new_in_memory().await.unwrap();
        insert_match(&db, 201, 4 * 60).await;
        insert_match(&db, 202, -60).await;

        let sync = service(&db, vec![]);
        assert_eq!(sync.sync_once().await.unwrap().checked, 0);
    }

    #[tokio::test]
    async fn test_sync_continues_after_provider_error() {
        let db = DBService::new_in_memory().await.unwrap();
        insert_match(&db, 301, 10).await;
        let ok = insert_match(&db, 302, 5).await;

        let sync = service(
            &db,
            vec![
                (301, Err(FootballApiError::Timeout)),
                (302, Ok(Some(snapshot(302, "HT", None, None)))),
            ],
        );
        let summary = sync.sync_once().await.unwrap();
        assert_eq!(summary, SyncSummary { checked: 2, updated: 1, failed: 1 });

        let live = FootballMatch::find_by_id(&db.pool, ok.id).await.unwrap().unwrap();
        assert_eq!(live.status, MatchStatus::Live);
        assert_eq!((live.home_score, live.away_score), (Some(0), Some(0)));
    }

    #[tokio::test]
    async fn test_unmapped_status_leaves_match() {
        let db = DBService::new_in_memory().await.unwrap();
        let m = insert_match(&db, 401, 10).await;

        let sync = service(&db, vec![(401, Ok(Some(snapshot(401, "PST", None, None))))]);
        assert_eq!(sync.sync_once().await.unwrap().updated, 0);
        let unchanged = FootballMatch::find_by_id(&db.pool, m.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, MatchStatus::Upcoming);
    }
}
