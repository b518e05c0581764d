use std::sync::Arc;

use db::models::{
    football_match::{FootballMatch, MatchStatus},
    prediction::{ContentSource, CreatePrediction, MatchOutcome, Prediction, PredictionAccuracy},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    claude_api::{ClaudeApiError, ContentGenerator},
    football_api::{OddsApiClient, summarize_h2h_odds},
};

const PREDICTION_SYSTEM_PROMPT: &str = "You are a football analyst for a Kenyan sports site. \
Reply with a single JSON object and nothing else.";

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Validation(String),
    #[error("match not found")]
    MatchNotFound,
    #[error("predictions can only be generated for upcoming matches, match is {0}")]
    MatchNotUpcoming(MatchStatus),
    #[error(transparent)]
    Generation(#[from] ClaudeApiError),
    #[error("AI reply was not a usable prediction: {0}")]
    InvalidGeneratedContent(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct GeneratePrediction {
    /// Odds provider sport key such as `soccer_epl`; bookmaker prices are
    /// added to the prompt when given and the odds provider is configured.
    pub sport_key: Option<String>,
}

/// Shape the model is asked to reply with
#[derive(Debug, Deserialize)]
struct GeneratedPrediction {
    outcome: MatchOutcome,
    home_score: Option<i64>,
    away_score: Option<i64>,
    confidence: i64,
    analysis: String,
}

pub struct PredictionService {
    pool: SqlitePool,
    generator: Option<Arc<dyn ContentGenerator>>,
    odds: Option<OddsApiClient>,
}

impl PredictionService {
    pub fn new(
        pool: SqlitePool,
        generator: Option<Arc<dyn ContentGenerator>>,
        odds: Option<OddsApiClient>,
    ) -> Self {
        Self {
            pool,
            generator,
            odds,
        }
    }

    pub async fn create(
        &self,
        match_id: Uuid,
        data: CreatePrediction,
    ) -> Result<Prediction, PredictionError> {
        self.find_match(match_id).await?;
        let data = validate_prediction(data)?;
        let prediction =
            Prediction::create(&self.pool, Uuid::new_v4(), match_id, ContentSource::Manual, &data)
                .await?;
        info!(
            match_id = %match_id,
            prediction_id = %prediction.id,
            outcome = %prediction.predicted_outcome,
            "Prediction created"
        );
        Ok(prediction)
    }

    pub async fn list_for_match(&self, match_id: Uuid) -> Result<Vec<Prediction>, PredictionError> {
        Ok(Prediction::find_by_match_id(&self.pool, match_id).await?)
    }

    pub async fn list_recent(&self, limit: Option<i64>) -> Result<Vec<Prediction>, PredictionError> {
        let limit = limit.unwrap_or(20).clamp(1, 100);
        Ok(Prediction::find_recent(&self.pool, limit).await?)
    }

    pub async fn accuracy(&self) -> Result<PredictionAccuracy, PredictionError> {
        Ok(Prediction::accuracy(&self.pool).await?)
    }

    /// Ask the model for a prediction on an upcoming match and store it as
    /// `ai_generated`.
    pub async fn generate_with_ai(
        &self,
        match_id: Uuid,
        request: GeneratePrediction,
    ) -> Result<Prediction, PredictionError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or(PredictionError::Generation(ClaudeApiError::MissingApiKey))?;

        let football_match = self.find_match(match_id).await?;
        if football_match.status != MatchStatus::Upcoming {
            return Err(PredictionError::MatchNotUpcoming(football_match.status));
        }

        let odds_line = match (&self.odds, request.sport_key.as_deref()) {
            (Some(odds), Some(sport)) => match odds.odds(sport).await {
                Ok(payload) => summarize_h2h_odds(
                    &payload,
                    &football_match.home_team,
                    &football_match.away_team,
                ),
                Err(e) => {
                    warn!(match_id = %match_id, error = %e, "Odds lookup failed, predicting without odds");
                    None
                }
            },
            _ => None,
        };

        let prompt = build_prediction_prompt(&football_match, odds_line.as_deref());
        let reply = generator
            .ask_json(&prompt, PREDICTION_SYSTEM_PROMPT, 1024)
            .await?;

        let generated: GeneratedPrediction = serde_json::from_value(reply)
            .map_err(|e| PredictionError::InvalidGeneratedContent(e.to_string()))?;
        let data = validate_prediction(CreatePrediction {
            predicted_outcome: generated.outcome,
            predicted_home_score: generated.home_score,
            predicted_away_score: generated.away_score,
            confidence: generated.confidence,
            analysis: Some(generated.analysis),
        })
        .map_err(|e| PredictionError::InvalidGeneratedContent(e.to_string()))?;

        let prediction = Prediction::create(
            &self.pool,
            Uuid::new_v4(),
            match_id,
            ContentSource::AiGenerated,
            &data,
        )
        .await?;
        info!(
            match_id = %match_id,
            prediction_id = %prediction.id,
            with_odds = odds_line.is_some(),
            "AI prediction stored"
        );
        Ok(prediction)
    }

    async fn find_match(&self, match_id: Uuid) -> Result<FootballMatch, PredictionError> {
        FootballMatch::find_by_id(&self.pool, match_id)
            .await?
            .ok_or(PredictionError::MatchNotFound)
    }
}

fn build_prediction_prompt(m: &FootballMatch, odds_line: Option<&str>) -> String {
    let mut prompt = format!(
        "Predict the result of {home} vs {away} ({competition}) kicking off {kickoff} UTC{venue}.\n",
        home = m.home_team,
        away = m.away_team,
        competition = m.competition,
        kickoff = m.kickoff_at.format("%Y-%m-%d %H:%M"),
        venue = m
            .venue
            .as_deref()
            .map(|v| format!(" at {v}"))
            .unwrap_or_default(),
    );
    if let Some(odds) = odds_line {
        prompt.push_str(&format!("Current bookmaker prices: {odds}.\n"));
    }
    prompt.push_str(
        "Reply as JSON: {\"outcome\": \"home\" | \"draw\" | \"away\", \"home_score\": int, \
         \"away_score\": int, \"confidence\": 0-100, \"analysis\": \"two or three sentences\"}",
    );
    prompt
}

fn validate_prediction(mut data: CreatePrediction) -> Result<CreatePrediction, PredictionError> {
    if !(0..=100).contains(&data.confidence) {
        return Err(PredictionError::Validation(
            "confidence must be between 0 and 100".to_string(),
        ));
    }

    match (data.predicted_home_score, data.predicted_away_score) {
        (Some(home), Some(away)) => {
            if home < 0 || away < 0 {
                return Err(PredictionError::Validation(
                    "predicted scores cannot be negative".to_string(),
                ));
            }
            if MatchOutcome::from_score(home, away) != data.predicted_outcome {
                return Err(PredictionError::Validation(format!(
                    "predicted score {home}-{away} does not match outcome '{}'",
                    data.predicted_outcome
                )));
            }
        }
        (None, None) => {}
        _ => {
            return Err(PredictionError::Validation(
                "give both predicted scores or neither".to_string(),
            ));
        }
    }

    data.analysis = data
        .analysis
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());
    Ok(data)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use db::{DBService, models::football_match::NewMatch};
    use serde_json::json;

    use super::*;
    use crate::services::claude_api::tests::ScriptedGenerator;

    async fn setup_match(db: &DBService) -> FootballMatch {
        FootballMatch::create(
            &db.pool,
            Uuid::new_v4(),
            &NewMatch {
                home_team: "Gor Mahia".to_string(),
                away_team: "AFC Leopards".to_string(),
                competition: "FKF Premier League".to_string(),
                venue: Some("Kasarani".to_string()),
                kickoff_at: Utc::now() + Duration::days(2),
                external_id: None,
            },
        )
        .await
        .unwrap()
    }

    fn manual(outcome: MatchOutcome, home: Option<i64>, away: Option<i64>) -> CreatePrediction {
        CreatePrediction {
            predicted_outcome: outcome,
            predicted_home_score: home,
            predicted_away_score: away,
            confidence: 70,
            analysis: Some("K'Ogalo have won four straight.".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_score_outcome_mismatch() {
        let db = DBService::new_in_memory().await.unwrap();
        let m = setup_match(&db).await;
        let service = PredictionService::new(db.pool.clone(), None, None);

        assert!(matches!(
            service
                .create(m.id, manual(MatchOutcome::Away, Some(2), Some(1)))
                .await,
            Err(PredictionError::Validation(_))
        ));

        let ok = service
            .create(m.id, manual(MatchOutcome::Home, Some(2), Some(1)))
            .await
            .unwrap();
        assert_eq!(ok.source, ContentSource::Manual);
        assert_eq!(service.list_for_match(m.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_for_missing_match() {
        let db = DBService::new_in_memory().await.unwrap();
        let service = PredictionService::new(db.pool.clone(), None, None);
        assert!(matches!(
            service
                .create(Uuid::new_v4(), manual(MatchOutcome::Draw, None, None))
                .await,
            Err(PredictionError::MatchNotFound)
        ));
    }

    #[tokio::test]
    async fn test_generate_with_ai_stores_ai_prediction() {
        let db = DBService::new_in_memory().await.unwrap();
        let m = setup_match(&db).await;
        let generator = ScriptedGenerator::new(vec![Ok(json!({
            "outcome": "draw",
            "home_score": 1,
            "away_score": 1,
            "confidence": 55,
            "analysis": "Mashemeji derbies are usually tight."
        }))]);
        let service = PredictionService::new(db.pool.clone(), Some(Arc::new(generator)), None);

        let prediction = service
            .generate_with_ai(m.id, GeneratePrediction::default())
            .await
            .unwrap();

        assert_eq!(prediction.source, ContentSource::AiGenerated);
        assert_eq!(prediction.predicted_outcome, MatchOutcome::Draw);
        assert_eq!(prediction.confidence, 55);
    }

    #[tokio::test]
    async fn test_generate_with_ai_rejects_inconsistent_reply() {
        let db = DBService::new_in_memory().await.unwrap();
        let m = setup_match(&db).await;
        let generator = ScriptedGenerator::new(vec![Ok(json!({
            "outcome": "home",
            "home_score": 0,
            "away_score": 3,
            "confidence": 90,
            "analysis": "Confused."
        }))]);
        let service = PredictionService::new(db.pool.clone(), Some(Arc::new(generator)), None);

        assert!(matches!(
            service.generate_with_ai(m.id, GeneratePrediction::default()).await,
            Err(PredictionError::InvalidGeneratedContent(_))
        ));
        assert!(service.list_for_match(m.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_without_generator() {
        let db = DBService::new_in_memory().await.unwrap();
        let m = setup_match(&db).await;
        let service = PredictionService::new(db.pool.clone(), None, None);

        assert!(matches!(
            service.generate_with_ai(m.id, GeneratePrediction::default()).await,
            Err(PredictionError::Generation(ClaudeApiError::MissingApiKey))
        ));
    }

    #[tokio::test]
    async fn test_accuracy_counts_finished_matches() {
        let db = DBService::new_in_memory().await.unwrap();
        let m = setup_match(&db).await;
        let service = PredictionService::new(db.pool.clone(), None, None);
        service
            .create(m.id, manual(MatchOutcome::Home, None, None))
            .await
            .unwrap();
        service
            .create(m.id, manual(MatchOutcome::Away, None, None))
            .await
            .unwrap();

        FootballMatch::update_status(&db.pool, m.id, MatchStatus::Upcoming, MatchStatus::Ft)
            .await
            .unwrap();
        FootballMatch::update_score(&db.pool, m.id, 2, 0).await.unwrap();

        let accuracy = service.accuracy().await.unwrap();
        assert_eq!(accuracy.evaluated, 2);
        assert_eq!(accuracy.correct, 1);
        assert_eq!(accuracy.percentage, 50.0);
    }

    #[test]
    fn test_prompt_mentions_odds_when_present() {
        let m = FootballMatch {
            id: Uuid::new_v4(),
            external_id: None,
            home_team: "Tusker".to_string(),
            away_team: "KCB".to_string(),
            competition: "FKF Premier League".to_string(),
            venue: None,
            kickoff_at: Utc::now(),
            status: MatchStatus::Upcoming,
            home_score: None,
            away_score: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let prompt = build_prediction_prompt(&m, Some("Tusker 2.10 / draw 3.10 / KCB 3.40 (Bet365)"));
        assert!(prompt.contains("Tusker vs KCB"));
        assert!(prompt.contains("bookmaker prices"));
        assert!(!build_prediction_prompt(&m, None).contains("bookmaker"));
    }
}
