use std::collections::{HashMap, HashSet};

use db::models::quiz::{
    CreateQuizQuestion, LeaderboardEntry, PublicQuizQuestion, QuizAnswerResult, QuizQuestion,
    QuizResult, QuizSession, SubmitQuiz,
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

pub const MAX_DRAW: i64 = 20;
const MIN_OPTIONS: usize = 2;
const MAX_OPTIONS: usize = 6;

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Validation(String),
    #[error("question not found")]
    QuestionNotFound,
    #[error("unknown question ids: {0:?}")]
    UnknownQuestions(Vec<Uuid>),
}

pub struct QuizService {
    pool: SqlitePool,
}

impl QuizService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_question(
        &self,
        data: CreateQuizQuestion,
    ) -> Result<QuizQuestion, QuizError> {
        let data = validate_question(data)?;
        let question = QuizQuestion::create(&self.pool, Uuid::new_v4(), &data).await?;
        info!(question_id = %question.id, category = %question.category, "Quiz question created");
        Ok(question)
    }

    pub async fn delete_question(&self, id: Uuid) -> Result<(), QuizError> {
        if QuizQuestion::delete(&self.pool, id).await? == 0 {
            return Err(QuizError::QuestionNotFound);
        }
        Ok(())
    }

    pub async fn categories(&self) -> Result<Vec<String>, QuizError> {
        Ok(QuizQuestion::categories(&self.pool).await?)
    }

    /// Random questions with the answers stripped.
    pub async fn draw_questions(
        &self,
        category: Option<&str>,
        count: Option<i64>,
    ) -> Result<Vec<PublicQuizQuestion>, QuizError> {
        let count = count.unwrap_or(10);
        if !(1..=MAX_DRAW).contains(&count) {
            return Err(QuizError::Validation(format!(
                "count must be between 1 and {MAX_DRAW}"
            )));
        }
        let questions = QuizQuestion::find_random(&self.pool, category, count).await?;
        Ok(questions.into_iter().map(PublicQuizQuestion::from).collect())
    }

    /// Score a submitted quiz against the stored answers and record the
    /// session.
    pub async fn submit(&self, submission: SubmitQuiz) -> Result<QuizResult, QuizError> {
        let player_name = submission.player_name.trim();
        if player_name.is_empty() || player_name.chars().count() > 50 {
            return Err(QuizError::Validation(
                "player name must be 1-50 characters".to_string(),
            ));
        }
        if submission.answers.is_empty() || submission.answers.len() as i64 > MAX_DRAW {
            return Err(QuizError::Validation(format!(
                "submit between 1 and {MAX_DRAW} answers"
            )));
        }

        let mut seen = HashSet::new();
        for answer in &submission.answers {
            if !seen.insert(answer.question_id) {
                return Err(QuizError::Validation(format!(
                    "question {} answered more than once",
                    answer.question_id
                )));
            }
        }

        let ids: Vec<Uuid> = submission.answers.iter().map(|a| a.question_id).collect();
        let questions: HashMap<Uuid, QuizQuestion> = QuizQuestion::find_by_ids(&self.pool, &ids)
            .await?
            .into_iter()
            .map(|q| (q.id, q))
            .collect();

        let unknown: Vec<Uuid> = ids
            .iter()
            .filter(|id| !questions.contains_key(id))
            .copied()
            .collect();
        if !unknown.is_empty() {
            return Err(QuizError::UnknownQuestions(unknown));
        }

        let results: Vec<QuizAnswerResult> = submission
            .answers
            .iter()
            .map(|answer| {
                let correct_index = questions[&answer.question_id].correct_index;
                QuizAnswerResult {
                    question_id: answer.question_id,
                    selected_index: answer.selected_index,
                    correct_index,
                    is_correct: answer.selected_index == correct_index,
                }
            })
            .collect();

        let score = results.iter().filter(|r| r.is_correct).count() as i64;
        let total = results.len() as i64;
        let percentage = percentage(score, total);
        let category = submission
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let session = QuizSession::create(
            &self.pool,
            Uuid::new_v4(),
            player_name,
            category,
            score,
            total,
            percentage,
            &results,
        )
        .await?;

        info!(
            session_id = %session.id,
            score,
            total,
            "Quiz submitted"
        );

        Ok(QuizResult {
            session_id: session.id,
            score,
            total,
            percentage,
            answers: results,
        })
    }

    pub async fn leaderboard(
        &self,
        category: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<LeaderboardEntry>, QuizError> {
        let limit = limit.unwrap_or(10).clamp(1, 100);
        Ok(QuizSession::leaderboard(&self.pool, category, limit).await?)
    }
}

fn percentage(score: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((score as f64 / total as f64) * 10_000.0).round() / 100.0
}

fn validate_question(mut data: CreateQuizQuestion) -> Result<CreateQuizQuestion, QuizError> {
    data.category = data.category.trim().to_lowercase();
    data.question = data.question.trim().to_string();
    data.options = data.options.iter().map(|o| o.trim().to_string()).collect();

    if data.category.is_empty() || data.category.chars().count() > 50 {
        return Err(QuizError::Validation(
            "category must be 1-50 characters".to_string(),
        ));
    }
    if data.question.is_empty() || data.question.chars().count() > 500 {
        return Err(QuizError::Validation(
            "question must be 1-500 characters".to_string(),
        ));
    }
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&data.options.len()) {
        return Err(QuizError::Validation(format!(
            "a question needs {MIN_OPTIONS}-{MAX_OPTIONS} options"
        )));
    }
    if data.options.iter().any(|o| o.is_empty()) {
        return Err(QuizError::Validation("options cannot be blank".to_string()));
    }
    let distinct: HashSet<String> = data.options.iter().map(|o| o.to_lowercase()).collect();
    if distinct.len() != data.options.len() {
        return Err(QuizError::Validation("options must be distinct".to_string()));
    }
    if data.correct_index < 0 || data.correct_index as usize >= data.options.len() {
        return Err(QuizError::Validation(
            "correct index must point at one of the options".to_string(),
        ));
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use db::{DBService, models::quiz::QuizAnswer};

    use super::*;

    fn question(text: &str, options: &[&str], correct_index: i64) -> CreateQuizQuestion {
        CreateQuizQuestion {
            category: "Harambee Stars".to_string(),
            question: text.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_index,
            difficulty: None,
        }
    }

    async fn seeded() -> (DBService, QuizService, Vec<QuizQuestion>) {
        let db = DBService::new_in_memory().await.unwrap();
        let service = QuizService::new(db.pool.clone());
        let mut created = Vec::new();
        for (text, options, correct) in [
            ("Who captained Kenya at AFCON 2019?", &["Victor Wanyama", "Michael Olunga"][..], 0),
            ("Which club is nicknamed K'Ogalo?", &["AFC Leopards", "Gor Mahia", "Tusker"][..], 1),
            ("Where is Nyayo Stadium?", &["Mombasa", "Kisumu", "Nairobi"][..], 2),
        ] {
            created.push(
                service
                    .create_question(question(text, options, correct))
                    .await
                    .unwrap(),
            );
        }
        (db, service, created)
    }

    #[tokio::test]
    async fn test_create_question_validation() {
        let db = DBService::new_in_memory().await.unwrap();
        let service = QuizService::new(db.pool.clone());

        for bad in [
            question("One option?", &["Only"], 0),
            question("Seven options?", &["a", "b", "c", "d", "e", "f", "g"], 0),
            question("Index out of range?", &["a", "b"], 2),
            question("Duplicate options?", &["Gor", "gor"], 0),
            question("  ", &["a", "b"], 0),
        ] {
            assert!(matches!(
                service.create_question(bad).await,
                Err(QuizError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_draw_hides_answers_and_caps_count() {
        let (_db, service, _) = seeded().await;

        let drawn = service
            .draw_questions(Some("harambee stars"), Some(2))
            .await
            .unwrap();
        assert_eq!(drawn.len(), 2);
        let json = serde_json::to_value(&drawn[0]).unwrap();
        assert!(json.get("correct_index").is_none());

        assert!(matches!(
            service.draw_questions(None, Some(21)).await,
            Err(QuizError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_scores_and_records_session() {
        let (_db, service, questions) = seeded().await;

        let result = service
            .submit(SubmitQuiz {
                player_name: "Wanjiku".to_string(),
                category: Some("harambee stars".to_string()),
                answers: vec![
                    QuizAnswer { question_id: questions[0].id, selected_index: 0 },
                    QuizAnswer { question_id: questions[1].id, selected_index: 0 },
                    QuizAnswer { question_id: questions[2].id, selected_index: 2 },
                ],
            })
            .await
            .unwrap();

        assert_eq!(result.score, 2);
        assert_eq!(result.total, 3);
        assert_eq!(result.percentage, 66.67);
        assert!(!result.answers[1].is_correct);
        assert_eq!(result.answers[1].correct_index, 1);

        let board = service.leaderboard(None, None).await.unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].player_name, "Wanjiku");
    }

    #[tokio::test]
    async fn test_submit_rejects_unknown_and_duplicate_answers() {
        let (_db, service, questions) = seeded().await;

        let stranger = Uuid::new_v4();
        let unknown = service
            .submit(SubmitQuiz {
                player_name: "Otieno".to_string(),
                category: None,
                answers: vec![
                    QuizAnswer { question_id: questions[0].id, selected_index: 0 },
                    QuizAnswer { question_id: stranger, selected_index: 1 },
                ],
            })
            .await;
        assert!(matches!(unknown, Err(QuizError::UnknownQuestions(ids)) if ids == vec![stranger]));

        let duplicate = service
            .submit(SubmitQuiz {
                player_name: "Otieno".to_string(),
                category: None,
                answers: vec![
                    QuizAnswer { question_id: questions[0].id, selected_index: 0 },
                    QuizAnswer { question_id: questions[0].id, selected_index: 1 },
                ],
            })
            .await;
        assert!(matches!(duplicate, Err(QuizError::Validation(_))));
    }

    #[tokio::test]
    async fn test_leaderboard_orders_by_percentage() {
        let (_db, service, questions) = seeded().await;

        for (player, selected) in [("Achieng", 1), ("Kamau", 0)] {
            service
                .submit(SubmitQuiz {
                    player_name: player.to_string(),
                    category: None,
                    answers: vec![QuizAnswer {
                        question_id: questions[0].id,
                        selected_index: selected,
                    }],
                })
                .await
                .unwrap();
        }

        let board = service.leaderboard(None, Some(5)).await.unwrap();
        assert_eq!(board[0].player_name, "Kamau");
        assert_eq!(board[0].percentage, 100.0);
        assert_eq!(board[1].percentage, 0.0);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(0, 0), 0.0);
    }
}
