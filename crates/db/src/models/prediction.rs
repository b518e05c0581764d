use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "match_outcome", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MatchOutcome {
    Home,
    Draw,
    Away,
}

impl MatchOutcome {
    pub fn from_score(home: i64, away: i64) -> Self {
        match home.cmp(&away) {
            std::cmp::Ordering::Greater => MatchOutcome::Home,
            std::cmp::Ordering::Equal => MatchOutcome::Draw,
            std::cmp::Ordering::Less => MatchOutcome::Away,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "content_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContentSource {
    #[default]
    Manual,
    AiGenerated,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Prediction {
    pub id: Uuid,
    pub match_id: Uuid,
    pub predicted_outcome: MatchOutcome,
    pub predicted_home_score: Option<i64>,
    pub predicted_away_score: Option<i64>,
    pub confidence: i64,
    pub analysis: Option<String>,
    pub source: ContentSource,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreatePrediction {
    pub predicted_outcome: MatchOutcome,
    pub predicted_home_score: Option<i64>,
    pub predicted_away_score: Option<i64>,
    pub confidence: i64,
    pub analysis: Option<String>,
}

/// Share of predictions on finished matches that called the outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct PredictionAccuracy {
    pub evaluated: i64,
    pub correct: i64,
    pub percentage: f64,
}

impl Prediction {
    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        match_id: Uuid,
        source: ContentSource,
        data: &CreatePrediction,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as!(
            Prediction,
            r#"INSERT INTO predictions (id, match_id, predicted_outcome, predicted_home_score, predicted_away_score, confidence, analysis, source)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING id as "id!: Uuid", match_id as "match_id!: Uuid", predicted_outcome as "predicted_outcome!: MatchOutcome", predicted_home_score as "predicted_home_score?: i64", predicted_away_score as "predicted_away_score?: i64", confidence as "confidence!: i64", analysis as "analysis?", source as "source!: ContentSource", created_at as "created_at!: DateTime<Utc>""#,
            id,
            match_id,
            data.predicted_outcome,
            data.predicted_home_score,
            data.predicted_away_score,
            data.confidence,
            data.analysis,
            source
        )
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_match_id(
        pool: &SqlitePool,
        match_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as!(
            Prediction,
            r#"SELECT id as "id!: Uuid", match_id as "match_id!: Uuid", predicted_outcome as "predicted_outcome!: MatchOutcome", predicted_home_score as "predicted_home_score?: i64", predicted_away_score as "predicted_away_score?: i64", confidence as "confidence!: i64", analysis as "analysis?", source as "source!: ContentSource", created_at as "created_at!: DateTime<Utc>"
               FROM predictions
               WHERE match_id = $1
               ORDER BY created_at DESC"#,
            match_id
        )
        .fetch_all(pool)
        .await
    }

    pub async fn find_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as!(
            Prediction,
            r#"SELECT id as "id!: Uuid", match_id as "match_id!: Uuid", predicted_outcome as "predicted_outcome!: MatchOutcome", predicted_home_score as "predicted_home_score?: i64", predicted_away_score as "predicted_away_score?: i64", confidence as "confidence!: i64", analysis as "analysis?", source as "source!: ContentSource", created_at as "created_at!: DateTime<Utc>"
               FROM predictions
               ORDER BY created_at DESC
               LIMIT $1"#,
            limit
        )
        .fetch_all(pool)
        .await
    }

    pub async fn accuracy(pool: &SqlitePool) -> Result<PredictionAccuracy, sqlx::Error> {
        let row = sqlx::query!(
            r#"SELECT
                 COUNT(*) as "evaluated!: i64",
                 COALESCE(SUM(CASE
                     WHEN (m.home_score > m.away_score AND p.predicted_outcome = 'home')
                       OR (m.home_score = m.away_score AND p.predicted_outcome = 'draw')
                       OR (m.home_score < m.away_score AND p.predicted_outcome = 'away')
                     THEN 1 ELSE 0 END), 0) as "correct!: i64"
               FROM predictions p
               JOIN matches m ON m.id = p.match_id
               WHERE m.status = 'ft'
                 AND m.home_score IS NOT NULL
                 AND m.away_score IS NOT NULL"#
        )
        .fetch_one(pool)
        .await?;

        let percentage = if row.evaluated == 0 {
            0.0
        } else {
            ((row.correct as f64 / row.evaluated as f64) * 10_000.0).round() / 100.0
        };

        Ok(PredictionAccuracy {
            evaluated: row.evaluated,
            correct: row.correct,
            percentage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_score() {
        assert_eq!(MatchOutcome::from_score(2, 1), MatchOutcome::Home);
        assert_eq!(MatchOutcome::from_score(0, 0), MatchOutcome::Draw);
        assert_eq!(MatchOutcome::from_score(1, 3), MatchOutcome::Away);
    }

    #[test]
    fn test_content_source_snake_case() {
        assert_eq!(ContentSource::AiGenerated.to_string(), "ai_generated");
        assert_eq!(
            "ai_generated".parse::<ContentSource>().unwrap(),
            ContentSource::AiGenerated
        );
    }
}
