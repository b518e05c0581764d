use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use db::{
    is_unique_violation,
    models::football_match::{
        CreateMatch, FootballMatch, MatchFilter, MatchStatus, NewMatch, UpdateScore,
    },
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Validation(String),
    #[error("match not found")]
    NotFound,
    #[error("a match with external id {0} already exists")]
    DuplicateExternalId(i64),
    #[error("cannot move match from {from} to {to}")]
    InvalidTransition { from: MatchStatus, to: MatchStatus },
    #[error("scores can only be set on live or finished matches, match is {0}")]
    ScoreNotAllowed(MatchStatus),
}

pub struct MatchService {
    pool: SqlitePool,
    offset: FixedOffset,
}

impl MatchService {
    /// `offset_minutes` is the local time zone match forms are filled in.
    pub fn new(pool: SqlitePool, offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix());
        Self { pool, offset }
    }

    /// Validate an admin match form and insert exactly one row with the
    /// composed kickoff stored in UTC.
    pub async fn create_from_form(&self, form: CreateMatch) -> Result<FootballMatch, MatchError> {
        let new_match = self.validate_form(&form)?;

        let created = FootballMatch::create(&self.pool, Uuid::new_v4(), &new_match)
            .await
            .map_err(|e| match new_match.external_id {
                Some(external_id) if is_unique_violation(&e) => {
                    MatchError::DuplicateExternalId(external_id)
                }
                _ => MatchError::Database(e),
            })?;

        info!(
            match_id = %created.id,
            home = %created.home_team,
            away = %created.away_team,
            kickoff_at = %created.kickoff_at.to_rfc3339(),
            "Match created"
        );
        Ok(created)
    }

    pub fn validate_form(&self, form: &CreateMatch) -> Result<NewMatch, MatchError> {
        let home_team = required(&form.home_team, "home team")?;
        let away_team = required(&form.away_team, "away team")?;
        if home_team.eq_ignore_ascii_case(&away_team) {
            return Err(MatchError::Validation(
                "home and away teams must differ".to_string(),
            ));
        }
        let competition = required(&form.competition, "competition")?;

        Ok(NewMatch {
            home_team,
            away_team,
            competition,
            venue: form
                .venue
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            kickoff_at: compose_kickoff(&form.match_date, &form.match_time, self.offset)?,
            external_id: form.external_id,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<FootballMatch, MatchError> {
        FootballMatch::find_by_id(&self.pool, id)
            .await?
            .ok_or(MatchError::NotFound)
    }

    pub async fn list(&self, filter: &MatchFilter) -> Result<Vec<FootballMatch>, MatchError> {
        Ok(FootballMatch::list(&self.pool, filter).await?)
    }

    pub async fn update_score(
        &self,
        id: Uuid,
        score: UpdateScore,
    ) -> Result<FootballMatch, MatchError> {
        if score.home_score < 0 || score.away_score < 0 {
            return Err(MatchError::Validation("scores cannot be negative".to_string()));
        }

        let current = self.get(id).await?;
        if current.status == MatchStatus::Upcoming {
            return Err(MatchError::ScoreNotAllowed(current.status));
        }

        let updated =
            FootballMatch::update_score(&self.pool, id, score.home_score, score.away_score)
                .await?
                .ok_or(MatchError::NotFound)?;
        info!(
            match_id = %id,
            home_score = score.home_score,
            away_score = score.away_score,
            "Match score updated"
        );
        Ok(updated)
    }

    pub async fn set_status(&self, id: Uuid, to: MatchStatus) -> Result<FootballMatch, MatchError> {
        let current = self.get(id).await?;
        if !current.status.can_transition_to(to) {
            return Err(MatchError::InvalidTransition {
                from: current.status,
                to,
            });
        }

        match FootballMatch::update_status(&self.pool, id, current.status, to).await? {
            Some(updated) => {
                info!(match_id = %id, from = %current.status, to = %to, "Match status changed");
                Ok(updated)
            }
            None => {
                let latest = self.get(id).await?;
                Err(MatchError::InvalidTransition {
                    from: latest.status,
                    to,
                })
            }
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), MatchError> {
        if FootballMatch::delete(&self.pool, id).await? == 0 {
            return Err(MatchError::NotFound);
        }
        info!(match_id = %id, "Match deleted");
        Ok(())
    }
}

fn required(value: &str, field: &str) -> Result<String, MatchError> {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > 100 {
        return Err(MatchError::Validation(format!(
            "{field} must be 1-100 characters"
        )));
    }
    Ok(value.to_string())
}

/// Combine `YYYY-MM-DD` and `HH:MM` read in `offset` into a UTC instant.
pub fn compose_kickoff(
    date: &str,
    time: &str,
    offset: FixedOffset,
) -> Result<DateTime<Utc>, MatchError> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| MatchError::Validation(format!("invalid match date '{date}'")))?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .map_err(|_| MatchError::Validation(format!("invalid match time '{time}'")))?;

    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| MatchError::Validation("kickoff time is ambiguous".to_string()))
}

#[cfg(test)]
mod tests {
    use db::DBService;

    use super::*;

    const EAT_MINUTES: i32 = 180;

    fn form(date: &str, time: &str) -> CreateMatch {
        CreateMatch {
            home_team: "Gor Mahia".to_string(),
            away_team: "AFC Leopards".to_string(),
            competition: "FKF Premier League".to_string(),
            venue: Some("Nyayo Stadium".to_string()),
            match_date: date.to_string(),
            match_time: time.to_string(),
            external_id: None,
        }
    }

    async fn setup() -> (DBService, MatchService) {
        let db = DBService::new_in_memory().await.unwrap();
        let service = MatchService::new(db.pool.clone(), EAT_MINUTES);
        (db, service)
    }

    async fn row_count(db: &DBService) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM matches")
            .fetch_one(&db.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_form_inserts_one_row_with_composed_timestamp() {
        let (db, service) = setup().await;

        let created = service
            .create_from_form(form("2025-03-15", "15:00"))
            .await
            .unwrap();

        assert_eq!(row_count(&db).await, 1);
        assert_eq!(created.kickoff_at.to_rfc3339(), "2025-03-15T12:00:00+00:00");
        assert_eq!(created.status, MatchStatus::Upcoming);
        assert_eq!(created.home_score, None);
    }

    #[tokio::test]
    async fn test_invalid_forms_insert_nothing() {
        let (db, service) = setup().await;

        let mut same_teams = form("2025-03-15", "15:00");
        same_teams.away_team = "gor mahia".to_string();
        let mut blank_home = form("2025-03-15", "15:00");
        blank_home.home_team = "  ".to_string();

        for bad in [
            form("2025-02-30", "15:00"),
            form("15/03/2025", "15:00"),
            form("2025-03-15", "25:00"),
            form("2025-03-15", "3pm"),
            same_teams,
            blank_home,
        ] {
            assert!(matches!(
                service.create_from_form(bad).await,
                Err(MatchError::Validation(_))
            ));
        }
        assert_eq!(row_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_external_id() {
        let (_db, service) = setup().await;
        let mut first = form("2025-03-15", "15:00");
        first.external_id = Some(1_035_001);
        service.create_from_form(first.clone()).await.unwrap();

        assert!(matches!(
            service.create_from_form(first).await,
            Err(MatchError::DuplicateExternalId(1_035_001))
        ));
    }

    #[tokio::test]
    async fn test_score_requires_kickoff() {
        let (_db, service) = setup().await;
        let m = service
            .create_from_form(form("2025-03-15", "15:00"))
            .await
            .unwrap();

        let early = service
            .update_score(m.id, UpdateScore { home_score: 1, away_score: 0 })
            .await;
        assert!(matches!(
            early,
            Err(MatchError::ScoreNotAllowed(MatchStatus::Upcoming))
        ));

        let live = service.set_status(m.id, MatchStatus::Live).await.unwrap();
        assert_eq!((live.home_score, live.away_score), (Some(0), Some(0)));

        let scored = service
            .update_score(m.id, UpdateScore { home_score: 2, away_score: 1 })
            .await
            .unwrap();
        assert_eq!((scored.home_score, scored.away_score), (Some(2), Some(1)));

        assert!(matches!(
            service
                .update_score(m.id, UpdateScore { home_score: -1, away_score: 0 })
                .await,
            Err(MatchError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_finished_match_cannot_go_back_live() {
        let (_db, service) = setup().await;
        let m = service
            .create_from_form(form("2025-03-15", "15:00"))
            .await
            .unwrap();
        service.set_status(m.id, MatchStatus::Ft).await.unwrap();

        assert!(matches!(
            service.set_status(m.id, MatchStatus::Live).await,
            Err(MatchError::InvalidTransition {
                from: MatchStatus::Ft,
                to: MatchStatus::Live
            })
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_match() {
        let (_db, service) = setup().await;
        assert!(matches!(
            service.delete(Uuid::new_v4()).await,
            Err(MatchError::NotFound)
        ));
    }

    #[test]
    fn test_compose_kickoff_crosses_midnight() {
        let offset = FixedOffset::east_opt(EAT_MINUTES * 60).unwrap();
        let kickoff = compose_kickoff("2025-01-01", "01:30", offset).unwrap();
        assert_eq!(kickoff.to_rfc3339(), "2024-12-31T22:30:00+00:00");
    }
}
