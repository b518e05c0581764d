use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "match_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MatchStatus {
    #[default]
    Upcoming,
    Live,
    Ft,
}

impl MatchStatus {
    /// upcoming -> live -> ft, plus upcoming -> ft for walkovers.
    pub fn can_transition_to(self, next: MatchStatus) -> bool {
        use MatchStatus::*;
        matches!((self, next), (Upcoming, Live) | (Live, Ft) | (Upcoming, Ft))
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct FootballMatch {
    pub id: Uuid,
    pub external_id: Option<i64>,
    pub home_team: String,
    pub away_team: String,
    pub competition: String,
    pub venue: Option<String>,
    pub kickoff_at: DateTime<Utc>,
    pub status: MatchStatus,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Match form as submitted from the admin page: date and time are separate
/// fields in the configured local time zone.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateMatch {
    pub home_team: String,
    pub away_team: String,
    pub competition: String,
    pub venue: Option<String>,
    /// `YYYY-MM-DD`
    pub match_date: String,
    /// `HH:MM`
    pub match_time: String,
    pub external_id: Option<i64>,
}

/// Validated match ready for insertion
#[derive(Debug, Clone)]
pub struct NewMatch {
    pub home_team: String,
    pub away_team: String,
    pub competition: String,
    pub venue: Option<String>,
    pub kickoff_at: DateTime<Utc>,
    pub external_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct MatchFilter {
    pub status: Option<MatchStatus>,
    pub competition: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateScore {
    pub home_score: i64,
    pub away_score: i64,
}

impl FootballMatch {
    pub async fn create(pool: &SqlitePool, id: Uuid, data: &NewMatch) -> Result<Self, sqlx::Error> {
        sqlx::query_as!(
            FootballMatch,
            r#"INSERT INTO matches (id, external_id, home_team, away_team, competition, venue, kickoff_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id as "id!: Uuid", external_id as "external_id?: i64", home_team as "home_team!", away_team as "away_team!", competition as "competition!", venue as "venue?", kickoff_at as "kickoff_at!: DateTime<Utc>", status as "status!: MatchStatus", home_score as "home_score?: i64", away_score as "away_score?: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>""#,
            id,
            data.external_id,
            data.home_team,
            data.away_team,
            data.competition,
            data.venue,
            data.kickoff_at
        )
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            FootballMatch,
            r#"SELECT id as "id!: Uuid", external_id as "external_id?: i64", home_team as "home_team!", away_team as "away_team!", competition as "competition!", venue as "venue?", kickoff_at as "kickoff_at!: DateTime<Utc>", status as "status!: MatchStatus", home_score as "home_score?: i64", away_score as "away_score?: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>"
               FROM matches
               WHERE id = $1"#,
            id
        )
        .fetch_optional(pool)
        .await
    }

    /// Upcoming fixtures come soonest first; live and finished ones most
    /// recent first.
    pub async fn list(pool: &SqlitePool, filter: &MatchFilter) -> Result<Vec<Self>, sqlx::Error> {
        let limit = filter.limit.unwrap_or(50).clamp(1, 200);
        sqlx::query_as!(
            FootballMatch,
            r#"SELECT id as "id!: Uuid", external_id as "external_id?: i64", home_team as "home_team!", away_team as "away_team!", competition as "competition!", venue as "venue?", kickoff_at as "kickoff_at!: DateTime<Utc>", status as "status!: MatchStatus", home_score as "home_score?: i64", away_score as "away_score?: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>"
               FROM matches
               WHERE ($1 IS NULL OR status = $1)
                 AND ($2 IS NULL OR competition = $2)
               ORDER BY CASE WHEN $1 = 'upcoming' THEN kickoff_at END ASC,
                        kickoff_at DESC
               LIMIT $3"#,
            filter.status,
            filter.competition,
            limit
        )
        .fetch_all(pool)
        .await
    }

    pub async fn update_score(
        pool: &SqlitePool,
        id: Uuid,
        home_score: i64,
        away_score: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            FootballMatch,
            r#"UPDATE matches
               SET home_score = $2, away_score = $3, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING id as "id!: Uuid", external_id as "external_id?: i64", home_team as "home_team!", away_team as "away_team!", competition as "competition!", venue as "venue?", kickoff_at as "kickoff_at!: DateTime<Utc>", status as "status!: MatchStatus", home_score as "home_score?: i64", away_score as "away_score?: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>""#,
            id,
            home_score,
            away_score
        )
        .fetch_optional(pool)
        .await
    }

    /// Conditional status move. Entering `live` fills a missing score with 0-0.
    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        from: MatchStatus,
        to: MatchStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as!(
            FootballMatch,
            r#"UPDATE matches
               SET status = $3,
                   home_score = CASE WHEN $3 = 'live' THEN COALESCE(home_score, 0) ELSE home_score END,
                   away_score = CASE WHEN $3 = 'live' THEN COALESCE(away_score, 0) ELSE away_score END,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1 AND status = $2
               RETURNING id as "id!: Uuid", external_id as "external_id?: i64", home_team as "home_team!", away_team as "away_team!", competition as "competition!", venue as "venue?", kickoff_at as "kickoff_at!: DateTime<Utc>", status as "status!: MatchStatus", home_score as "home_score?: i64", away_score as "away_score?: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>""#,
            id,
            from,
            to
        )
        .fetch_optional(pool)
        .await
    }

    /// Overwrite status and score from the upstream provider.
    pub async fn apply_live_update(
        pool: &SqlitePool,
        id: Uuid,
        status: MatchStatus,
        home_score: Option<i64>,
        away_score: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query!(
            "UPDATE matches
             SET status = $2,
                 home_score = COALESCE($3, home_score),
                 away_score = COALESCE($4, away_score),
                 updated_at = datetime('now', 'subsec')
             WHERE id = $1",
            id,
            status,
            home_score,
            away_score
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Matches linked to the provider that are live, or due to kick off and
    /// started no more than `lookback_hours` ago.
    pub async fn find_syncable(
        pool: &SqlitePool,
        lookback_hours: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let lookback = format!("-{} hours", lookback_hours);
        sqlx::query_as!(
            FootballMatch,
            r#"SELECT id as "id!: Uuid", external_id as "external_id?: i64", home_team as "home_team!", away_team as "away_team!", competition as "competition!", venue as "venue?", kickoff_at as "kickoff_at!: DateTime<Utc>", status as "status!: MatchStatus", home_score as "home_score?: i64", away_score as "away_score?: i64", created_at as "created_at!: DateTime<Utc>", updated_at as "updated_at!: DateTime<Utc>"
               FROM matches
               WHERE external_id IS NOT NULL
                 AND (
                      status = 'live'
                      OR (status = 'upcoming'
                          AND datetime(kickoff_at) <= datetime('now')
                          AND datetime(kickoff_at) >= datetime('now', $1))
                 )
               ORDER BY kickoff_at ASC"#,
            lookback
        )
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query!("DELETE FROM matches WHERE id = $1", id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
